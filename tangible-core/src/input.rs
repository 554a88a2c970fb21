//! Live touch-point map fed by raw touch events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{HasPosition, Point};

/// One contact. `id` is only stable while the contact stays down and may be
/// reused by an unrelated touch afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub const fn new(id: i32, x: f64, y: f64) -> Self {
        TouchPoint { id, x, y }
    }
}

impl HasPosition for TouchPoint {
    fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// A raw platform event, already in element-local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct TouchFrame {
    pub phase: TouchPhase,
    /// Every contact still on the surface.
    pub touches: Vec<TouchPoint>,
    /// Contacts this event is about.
    pub changed: Vec<TouchPoint>,
}

#[derive(Debug, Default)]
pub struct TouchInputAdapter {
    live: BTreeMap<i32, Point>,
}

impl TouchInputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the live map and return the resulting snapshot,
    /// ordered by touch id.
    pub fn apply(&mut self, frame: &TouchFrame) -> Vec<TouchPoint> {
        match frame.phase {
            TouchPhase::Start | TouchPhase::Move => {
                for t in &frame.touches {
                    self.live.insert(t.id, t.position());
                }
            }
            TouchPhase::End | TouchPhase::Cancel => {
                for t in &frame.changed {
                    self.live.remove(&t.id);
                }
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> Vec<TouchPoint> {
        self.live
            .iter()
            .map(|(&id, p)| TouchPoint::new(id, p.x, p.y))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(phase: TouchPhase, touches: &[TouchPoint], changed: &[TouchPoint]) -> TouchFrame {
        TouchFrame {
            phase,
            touches: touches.to_vec(),
            changed: changed.to_vec(),
        }
    }

    #[test]
    fn start_move_end_lifecycle() {
        let mut adapter = TouchInputAdapter::new();
        let a = TouchPoint::new(7, 10.0, 10.0);
        let b = TouchPoint::new(3, 50.0, 20.0);

        let snap = adapter.apply(&frame(TouchPhase::Start, &[a], &[a]));
        assert_eq!(snap, vec![a]);

        let snap = adapter.apply(&frame(TouchPhase::Start, &[a, b], &[b]));
        assert_eq!(snap.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 7]);

        let moved = TouchPoint::new(7, 12.0, 14.0);
        let snap = adapter.apply(&frame(TouchPhase::Move, &[moved, b], &[moved]));
        assert_eq!(snap[1], moved);

        let snap = adapter.apply(&frame(TouchPhase::End, &[b], &[moved]));
        assert_eq!(snap, vec![b]);

        let snap = adapter.apply(&frame(TouchPhase::Cancel, &[], &[b]));
        assert!(snap.is_empty());
        assert!(adapter.is_empty());
    }

    #[test]
    fn reused_id_overwrites_position() {
        let mut adapter = TouchInputAdapter::new();
        let first = TouchPoint::new(1, 0.0, 0.0);
        adapter.apply(&frame(TouchPhase::Start, &[first], &[first]));
        adapter.apply(&frame(TouchPhase::End, &[], &[first]));
        let again = TouchPoint::new(1, 300.0, 200.0);
        let snap = adapter.apply(&frame(TouchPhase::Start, &[again], &[again]));
        assert_eq!(snap, vec![again]);
        assert_eq!(adapter.len(), 1);
    }
}
