use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BOX_HEIGHT, DEFAULT_BOX_WIDTH};
use crate::error::SignatureError;
use crate::geometry::{Point, normalize_angle, rotate_vector};

/// Rectangle representing an object's real footprint, relative to its touch
/// triangle. Offsets live in the object's own rotated frame; the
/// orientation offset is in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub x_offset: f64,
    #[serde(default)]
    pub y_offset: f64,
    #[serde(default)]
    pub orientation_offset: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            width: DEFAULT_BOX_WIDTH,
            height: DEFAULT_BOX_HEIGHT,
            x_offset: 0.0,
            y_offset: 0.0,
            orientation_offset: 0.0,
        }
    }
}

/// Reference data for one physical object: the sorted side lengths of its
/// three contact points plus an optional footprint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownObjectSignature {
    pub id: String,
    pub sides: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl KnownObjectSignature {
    /// Build a signature; the sides are sorted ascending.
    pub fn new(
        id: impl Into<String>,
        mut sides: [f64; 3],
        bounding_box: Option<BoundingBox>,
    ) -> Self {
        sides.sort_by(f64::total_cmp);
        KnownObjectSignature {
            id: id.into(),
            sides,
            bounding_box,
        }
    }

    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.id.trim().is_empty() {
            return Err(SignatureError::EmptyId);
        }
        if self.sides.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(SignatureError::NonPositiveSide {
                id: self.id.clone(),
                sides: self.sides,
            });
        }
        if !(self.sides[0] <= self.sides[1] && self.sides[1] <= self.sides[2]) {
            return Err(SignatureError::UnsortedSides {
                id: self.id.clone(),
                sides: self.sides,
            });
        }
        if let Some(bb) = &self.bounding_box {
            let finite = [bb.width, bb.height, bb.x_offset, bb.y_offset, bb.orientation_offset]
                .iter()
                .all(|v| v.is_finite());
            if !finite || bb.width < 0.0 || bb.height < 0.0 {
                return Err(SignatureError::BadBoundingBox { id: self.id.clone() });
            }
        }
        Ok(())
    }
}

/// Ids of the physical objects the game ships with.
pub const DEFAULT_OBJECT_IDS: [&str; 3] = ["box", "tape", "iron"];

/// Pre-tuned signature for a shipped object, so tracking works before any
/// calibration has been recorded.
pub fn default_signature(id: &str) -> Option<KnownObjectSignature> {
    let (sides, bb) = match id {
        "box" => (
            [96.0, 132.0, 158.0],
            BoundingBox {
                width: 210.0,
                height: 150.0,
                x_offset: 0.0,
                y_offset: 12.0,
                orientation_offset: 0.0,
            },
        ),
        "tape" => (
            [58.0, 58.0, 82.0],
            BoundingBox {
                width: 110.0,
                height: 110.0,
                x_offset: 0.0,
                y_offset: 0.0,
                orientation_offset: 0.0,
            },
        ),
        "iron" => (
            [64.0, 104.0, 150.0],
            BoundingBox {
                width: 240.0,
                height: 120.0,
                x_offset: 18.0,
                y_offset: 0.0,
                orientation_offset: std::f64::consts::FRAC_PI_2,
            },
        ),
        _ => return None,
    };
    Some(KnownObjectSignature::new(id, sides, Some(bb)))
}

pub fn default_signatures() -> Vec<KnownObjectSignature> {
    DEFAULT_OBJECT_IDS
        .iter()
        .filter_map(|id| default_signature(id))
        .collect()
}

/// World-space rectangle of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub center: Point,
    /// Facing of the rectangle (triangle rotation plus orientation offset).
    pub rotation: f64,
    pub width: f64,
    pub height: f64,
}

impl Footprint {
    /// Place `bb` on a touch triangle with the given centroid and rotation.
    /// The local offset is rotated into world space by the object's facing.
    pub fn place(centroid: Point, rotation: f64, bb: &BoundingBox) -> Self {
        let facing = normalize_angle(rotation + bb.orientation_offset);
        let offset = rotate_vector(Point::new(bb.x_offset, bb.y_offset), facing);
        Footprint {
            center: Point::new(centroid.x + offset.x, centroid.y + offset.y),
            rotation: facing,
            width: bb.width,
            height: bb.height,
        }
    }

    /// Corners in order: top-left, top-right, bottom-right, bottom-left
    /// (in the rectangle's own frame).
    pub fn corners(&self) -> [Point; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| {
            let d = rotate_vector(Point::new(x, y), self.rotation);
            Point::new(self.center.x + d.x, self.center.y + d.y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn new_sorts_sides() {
        let sig = KnownObjectSignature::new("box", [150.0, 100.0, 200.0], None);
        assert_eq!(sig.sides, [100.0, 150.0, 200.0]);
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_records() {
        let zero = KnownObjectSignature::new("a", [0.0, 1.0, 2.0], None);
        assert!(matches!(zero.validate(), Err(SignatureError::NonPositiveSide { .. })));

        let unsorted = KnownObjectSignature {
            id: "a".into(),
            sides: [3.0, 2.0, 1.0],
            bounding_box: None,
        };
        assert!(matches!(unsorted.validate(), Err(SignatureError::UnsortedSides { .. })));

        let blank = KnownObjectSignature::new(" ", [1.0, 1.0, 1.0], None);
        assert!(matches!(blank.validate(), Err(SignatureError::EmptyId)));

        let nan_box = KnownObjectSignature::new(
            "a",
            [1.0, 1.0, 1.0],
            Some(BoundingBox {
                width: f64::NAN,
                ..BoundingBox::default()
            }),
        );
        assert!(matches!(nan_box.validate(), Err(SignatureError::BadBoundingBox { .. })));
    }

    #[test]
    fn stored_shape_uses_camel_case() {
        let sig = KnownObjectSignature::new(
            "iron",
            [1.0, 2.0, 3.0],
            Some(BoundingBox {
                width: 10.0,
                height: 5.0,
                x_offset: 1.5,
                y_offset: -2.0,
                orientation_offset: 0.25,
            }),
        );
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["boundingBox"]["xOffset"], 1.5);
        assert_eq!(json["boundingBox"]["orientationOffset"], 0.25);
        let back: KnownObjectSignature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn defaults_are_valid_and_distinct() {
        let sigs = default_signatures();
        assert_eq!(sigs.len(), DEFAULT_OBJECT_IDS.len());
        for sig in &sigs {
            sig.validate().unwrap();
        }
        assert!(default_signature("kettle").is_none());
    }

    #[test]
    fn footprint_offset_follows_facing() {
        let bb = BoundingBox {
            width: 40.0,
            height: 20.0,
            x_offset: 10.0,
            y_offset: 0.0,
            orientation_offset: FRAC_PI_2,
        };
        let fp = Footprint::place(Point::new(100.0, 100.0), 0.0, &bb);
        assert!((fp.rotation - FRAC_PI_2).abs() < 1e-12);
        assert!((fp.center.x - 100.0).abs() < 1e-9);
        assert!((fp.center.y - 110.0).abs() < 1e-9);

        let corners = fp.corners();
        // Rotated a quarter turn, the 40-wide box spans 40 along y.
        let max_y = corners.iter().map(|p| p.y).fold(f64::MIN, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::MAX, f64::min);
        let span = max_y - min_y;
        assert!((span - 40.0).abs() < 1e-9);
    }
}
