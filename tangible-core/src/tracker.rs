//! Matching live touch points to known objects, frame by frame.
//!
//! Every triad of live points is scored against every registered signature
//! by relative side-length error. Candidates that share touch ids with an
//! object's previous triad get a discount, then a greedy pass hands out
//! objects and touch ids best-score first. Touches that match nothing are
//! ignored, so plain finger touches can coexist with tracked objects.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTINUITY_DISCOUNT_PER_ID, LOST_CONFIDENCE, MATCH_TOLERANCE, MATCHED_CONFIDENCE,
};
use crate::error::ConfigError;
use crate::geometry::{Point, canonical_rotation, centroid, sorted_sides};
use crate::input::{TouchFrame, TouchInputAdapter, TouchPoint};
use crate::signature::{BoundingBox, Footprint, KnownObjectSignature};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Largest accepted relative error between a triad and a signature.
    pub match_tolerance: f64,
    /// Fraction of the score removed per touch id shared with the
    /// object's previous triad.
    pub continuity_discount: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            match_tolerance: MATCH_TOLERANCE,
            continuity_discount: CONTINUITY_DISCOUNT_PER_ID,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tol = self.match_tolerance;
        if !tol.is_finite() || tol <= 0.0 || tol > 1.0 {
            return Err(ConfigError::OutOfRange {
                name: "match_tolerance",
                range: "(0, 1]",
                value: tol,
            });
        }
        // Three shared ids must not push a score below zero.
        let d = self.continuity_discount;
        if !d.is_finite() || !(0.0..1.0 / 3.0).contains(&d) {
            return Err(ConfigError::OutOfRange {
                name: "continuity_discount",
                range: "[0, 1/3)",
                value: d,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Down,
    Move,
    Up,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Down => "down",
            UpdateKind::Move => "move",
            UpdateKind::Up => "up",
        }
    }
}

/// Emitted once per object per processed frame in which something changed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub position: Point,
    pub rotation: f64,
    /// 1.0 when matched this frame, 0.0 otherwise.
    pub confidence: f64,
    pub active_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub touch_ids: Vec<i32>,
}

impl ObjectUpdate {
    pub fn footprint(&self) -> Option<Footprint> {
        self.bounding_box
            .as_ref()
            .map(|bb| Footprint::place(self.position, self.rotation, bb))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObjectState {
    pub id: String,
    pub signature: [f64; 3],
    pub bounding_box: Option<BoundingBox>,
    pub is_active: bool,
    pub position: Option<Point>,
    pub rotation: Option<f64>,
    /// Continuity hint only; cleared whenever the object goes inactive.
    pub touch_ids: BTreeSet<i32>,
}

impl TrackedObjectState {
    fn new(sig: KnownObjectSignature) -> Self {
        TrackedObjectState {
            id: sig.id,
            signature: sig.sides,
            bounding_box: sig.bounding_box,
            is_active: false,
            position: None,
            rotation: None,
            touch_ids: BTreeSet::new(),
        }
    }

    fn lost(&mut self) -> ObjectUpdate {
        self.is_active = false;
        self.touch_ids.clear();
        ObjectUpdate {
            id: self.id.clone(),
            kind: UpdateKind::Up,
            position: self.position.unwrap_or_default(),
            rotation: self.rotation.unwrap_or(0.0),
            confidence: LOST_CONFIDENCE,
            active_points: 0,
            bounding_box: self.bounding_box,
            touch_ids: Vec::new(),
        }
    }
}

/// Sum of absolute side differences over the sum of the reference sides.
pub fn relative_error(sides: &[f64; 3], reference: &[f64; 3]) -> f64 {
    let total: f64 = reference.iter().sum();
    let diff: f64 = sides
        .iter()
        .zip(reference)
        .map(|(a, b)| (a - b).abs())
        .sum();
    diff / total
}

#[derive(Clone, Debug)]
struct Candidate {
    object: usize,
    triad: [TouchPoint; 3],
    score: f64,
    shared: usize,
}

fn triads(n: usize) -> impl Iterator<Item = [usize; 3]> {
    (0..n).flat_map(move |i| {
        (i + 1..n).flat_map(move |j| (j + 1..n).map(move |k| [i, j, k]))
    })
}

/// Owns the live touch map and the per-object track state. Everything is
/// mutated from one event callback, one frame at a time.
#[derive(Debug)]
pub struct ObjectTracker {
    config: TrackerConfig,
    objects: Vec<TrackedObjectState>,
    input: TouchInputAdapter,
}

impl ObjectTracker {
    pub fn new(signatures: Vec<KnownObjectSignature>) -> Self {
        ObjectTracker {
            config: TrackerConfig::default(),
            objects: register(signatures),
            input: TouchInputAdapter::new(),
        }
    }

    pub fn with_config(
        signatures: Vec<KnownObjectSignature>,
        config: TrackerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ObjectTracker {
            config,
            objects: register(signatures),
            input: TouchInputAdapter::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn states(&self) -> &[TrackedObjectState] {
        &self.objects
    }

    pub fn state(&self, id: &str) -> Option<&TrackedObjectState> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn live_points(&self) -> Vec<TouchPoint> {
        self.input.snapshot()
    }

    /// Fold a raw touch event into the live map and match on the result.
    pub fn handle(&mut self, frame: &TouchFrame) -> Vec<ObjectUpdate> {
        let points = self.input.apply(frame);
        self.update(&points)
    }

    /// Match one snapshot of live points.
    pub fn update(&mut self, points: &[TouchPoint]) -> Vec<ObjectUpdate> {
        if points.len() < 3 {
            return self.release_all();
        }

        let mut candidates = self.candidates(points);
        // Stable: equal scores keep enumeration order after the
        // shared-id tie-break.
        candidates.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| b.shared.cmp(&a.shared))
        });

        let mut assigned: Vec<Option<[TouchPoint; 3]>> = vec![None; self.objects.len()];
        let mut used_ids: BTreeSet<i32> = BTreeSet::new();
        for c in candidates {
            if assigned[c.object].is_some() || c.triad.iter().any(|t| used_ids.contains(&t.id)) {
                continue;
            }
            debug!(
                "assign '{}' <- {:?} (score {:.4}, shared {})",
                self.objects[c.object].id,
                c.triad.map(|t| t.id),
                c.score,
                c.shared
            );
            used_ids.extend(c.triad.iter().map(|t| t.id));
            assigned[c.object] = Some(c.triad);
        }

        let mut updates = Vec::new();
        for (obj, triad) in self.objects.iter_mut().zip(assigned) {
            match triad {
                Some(triad) => {
                    let position = centroid(&triad);
                    let seed = if obj.is_active { obj.rotation } else { None };
                    let rotation = canonical_rotation(&triad, seed);
                    let kind = if obj.is_active {
                        UpdateKind::Move
                    } else {
                        info!(
                            "object '{}' down at ({:.1}, {:.1})",
                            obj.id, position.x, position.y
                        );
                        UpdateKind::Down
                    };
                    obj.is_active = true;
                    obj.position = Some(position);
                    obj.rotation = Some(rotation);
                    obj.touch_ids = triad.iter().map(|t| t.id).collect();
                    updates.push(ObjectUpdate {
                        id: obj.id.clone(),
                        kind,
                        position,
                        rotation,
                        confidence: MATCHED_CONFIDENCE,
                        active_points: 3,
                        bounding_box: obj.bounding_box,
                        touch_ids: obj.touch_ids.iter().copied().collect(),
                    });
                }
                None if obj.is_active => {
                    info!("object '{}' up", obj.id);
                    updates.push(obj.lost());
                }
                None => {}
            }
        }
        updates
    }

    fn candidates(&self, points: &[TouchPoint]) -> Vec<Candidate> {
        let mut out = Vec::new();
        for [i, j, k] in triads(points.len()) {
            let triad = [points[i], points[j], points[k]];
            let sides = sorted_sides(&triad);
            for (idx, obj) in self.objects.iter().enumerate() {
                let error = relative_error(&sides, &obj.signature);
                if error > self.config.match_tolerance {
                    continue;
                }
                let shared = triad
                    .iter()
                    .filter(|t| obj.touch_ids.contains(&t.id))
                    .count();
                out.push(Candidate {
                    object: idx,
                    triad,
                    score: error * (1.0 - self.config.continuity_discount * shared as f64),
                    shared,
                });
            }
        }
        out
    }

    fn release_all(&mut self) -> Vec<ObjectUpdate> {
        self.objects
            .iter_mut()
            .filter(|o| o.is_active)
            .map(|o| {
                info!("object '{}' up", o.id);
                o.lost()
            })
            .collect()
    }

    /// Drop all live touches and release every active object.
    pub fn reset(&mut self) -> Vec<ObjectUpdate> {
        self.input.clear();
        self.release_all()
    }

    /// Swap in a new signature set (after recalibration). Active objects are
    /// released first.
    pub fn replace_signatures(
        &mut self,
        signatures: Vec<KnownObjectSignature>,
    ) -> Vec<ObjectUpdate> {
        let released = self.release_all();
        self.objects = register(signatures);
        released
    }
}

fn register(signatures: Vec<KnownObjectSignature>) -> Vec<TrackedObjectState> {
    let mut objects: Vec<TrackedObjectState> = Vec::with_capacity(signatures.len());
    for sig in signatures {
        if let Err(e) = sig.validate() {
            warn!("skipping signature: {e}");
            continue;
        }
        if objects.iter().any(|o| o.id == sig.id) {
            warn!("duplicate signature for '{}' ignored", sig.id);
            continue;
        }
        objects.push(TrackedObjectState::new(sig));
    }
    objects
}
