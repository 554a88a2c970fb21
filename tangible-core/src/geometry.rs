//! Order-invariant triangle geometry.
//!
//! Touch ids are not stably ordered from one frame to the next, so every
//! function here returns the same result for any permutation of its input.

use std::cmp::Ordering;
use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Basic two dimensional point in tracking-surface pixels
/// (origin at the top-left of the target element).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from(v: (f64, f64)) -> Self {
        Point { x: v.0, y: v.1 }
    }
}

/// Anything that sits at a position on the surface.
pub trait HasPosition {
    fn position(&self) -> Point;
}

impl HasPosition for Point {
    fn position(&self) -> Point {
        *self
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Arithmetic mean of the positions; the origin for an empty slice.
pub fn centroid<P: HasPosition>(points: &[P]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    // Summed in sorted order so permutations of one set are bit-identical.
    let mut xs: Vec<f64> = points.iter().map(|p| p.position().x).collect();
    let mut ys: Vec<f64> = points.iter().map(|p| p.position().y).collect();
    xs.sort_by(f64::total_cmp);
    ys.sort_by(f64::total_cmp);
    let n = points.len() as f64;
    Point {
        x: xs.iter().sum::<f64>() / n,
        y: ys.iter().sum::<f64>() / n,
    }
}

/// Sort the items by polar angle around their centroid, counter-clockwise
/// from the +x axis. Exact angle ties fall back to (x, y).
pub fn canonical_order<P: HasPosition + Clone>(points: &[P]) -> Vec<P> {
    let c = centroid(points);
    let mut keyed: Vec<(f64, Point, P)> = points
        .iter()
        .map(|item| {
            let p = item.position();
            ((p.y - c.y).atan2(p.x - c.x), p, item.clone())
        })
        .collect();
    keyed.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.x.total_cmp(&b.1.x))
            .then_with(|| a.1.y.total_cmp(&b.1.y))
    });
    keyed.into_iter().map(|(_, _, item)| item).collect()
}

/// The three pairwise distances, ascending.
///
/// # Panics
/// If `points` does not hold exactly three items.
pub fn sorted_sides<P: HasPosition>(points: &[P]) -> [f64; 3] {
    assert_eq!(
        points.len(),
        3,
        "sorted_sides needs exactly 3 points, got {}",
        points.len()
    );
    let (a, b, c) = (
        points[0].position(),
        points[1].position(),
        points[2].position(),
    );
    let mut sides = [distance(a, b), distance(b, c), distance(c, a)];
    sides.sort_by(f64::total_cmp);
    sides
}

/// Facing of a triangle, in radians within (-π, π].
///
/// The angle of the longest edge, walked in canonical order, with the line's
/// 180° ambiguity resolved by the side the third point falls on. With a
/// `previous` rotation the result is whichever of the candidate and its
/// π-flipped twin is closer to it, so a marginal change of longest edge
/// does not snap the facing around.
///
/// # Panics
/// If `points` does not hold exactly three items.
pub fn canonical_rotation<P: HasPosition>(points: &[P], previous: Option<f64>) -> f64 {
    assert_eq!(
        points.len(),
        3,
        "canonical_rotation needs exactly 3 points, got {}",
        points.len()
    );
    let positions: Vec<Point> = points.iter().map(HasPosition::position).collect();
    let ordered = canonical_order(&positions);

    let mut longest = 0;
    let mut longest_len = f64::NEG_INFINITY;
    for i in 0..3 {
        let len = distance(ordered[i], ordered[(i + 1) % 3]);
        if len.total_cmp(&longest_len) == Ordering::Greater {
            longest_len = len;
            longest = i;
        }
    }
    let a = ordered[longest];
    let b = ordered[(longest + 1) % 3];
    let c = ordered[(longest + 2) % 3];

    let mut angle = (b.y - a.y).atan2(b.x - a.x);
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if cross < 0.0 {
        angle += PI;
    }
    let angle = normalize_angle(angle);

    match previous {
        Some(prev) => {
            let flipped = normalize_angle(angle + PI);
            if angular_distance(flipped, prev) < angular_distance(angle, prev) {
                flipped
            } else {
                angle
            }
        }
        None => angle,
    }
}

/// Wrap an angle into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    // Odd multiples of π land a few ulps either side of -π once the input
    // has lost precision; those all mean π.
    let slack = 4.0 * f64::EPSILON * angle.abs().max(1.0);
    if (a + PI).abs() <= slack { PI } else { a }
}

/// Absolute angular difference, in [0, π].
pub fn angular_distance(a: f64, b: f64) -> f64 {
    normalize_angle(a - b).abs()
}

/// Rotate a vector about the origin.
pub fn rotate_vector(v: Point, ang: f64) -> Point {
    let (s, c) = ang.sin_cos();
    Point {
        x: v.x * c - v.y * s,
        y: v.x * s + v.y * c,
    }
}

/// Rotate `p` about `c`.
pub fn rotate_point(p: Point, c: Point, ang: f64) -> Point {
    let d = rotate_vector(Point::new(p.x - c.x, p.y - c.y), ang);
    Point {
        x: c.x + d.x,
        y: c.y + d.y,
    }
}
