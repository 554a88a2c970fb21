use tangible_core::calibration::{
    BoxConfig, CalibrationConfig, CalibrationRecorder, RecorderOutput,
};
use tangible_core::geometry::{Point, normalize_angle, rotate_point};
use tangible_core::signature::{DEFAULT_OBJECT_IDS, default_signature};
use tangible_core::store::{MemoryStore, SignatureStore};
use tangible_core::{
    KnownObjectSignature, ObjectTracker, TouchFrame, TouchPhase, TouchPoint, TrackerConfig,
    UpdateKind,
};

fn points(raw: &[(i32, f64, f64)]) -> Vec<TouchPoint> {
    raw.iter().map(|&(id, x, y)| TouchPoint::new(id, x, y)).collect()
}

#[test]
fn loose_triangle_goes_down_at_its_centroid() {
    // Sides come out near [100, 126.5, 134.2]: a relative error of about
    // 0.2 against [100, 150, 200].
    let sig = KnownObjectSignature::new("box", [100.0, 150.0, 200.0], None);
    let touches = points(&[(1, 0.0, 0.0), (2, 100.0, 0.0), (3, 40.0, 120.0)]);

    let mut strict = ObjectTracker::new(vec![sig.clone()]);
    assert!(strict.update(&touches).is_empty());

    let config = TrackerConfig {
        match_tolerance: 0.25,
        ..TrackerConfig::default()
    };
    let mut tracker = ObjectTracker::with_config(vec![sig], config).unwrap();
    let updates = tracker.update(&touches);
    assert_eq!(updates.len(), 1);
    let u = &updates[0];
    assert_eq!(u.kind, UpdateKind::Down);
    assert_eq!(u.confidence, 1.0);
    assert_eq!(u.active_points, 3);
    assert!((u.position.x - 140.0 / 3.0).abs() < 1e-9);
    assert!((u.position.y - 40.0).abs() < 1e-9);
}

#[test]
fn calibrated_signature_is_tracked_with_the_previewed_box() {
    let mut store = SignatureStore::new(MemoryStore::new());
    let current = store.load_or_default(["box"]);
    let mut recorder = CalibrationRecorder::new(current, CalibrationConfig::default());

    let shape = [
        Point::new(200.0, 200.0),
        Point::new(290.0, 210.0),
        Point::new(230.0, 330.0),
    ];
    recorder.set_box_config(BoxConfig {
        width: 160.0,
        height: 100.0,
        x_offset: 12.0,
        y_offset: -6.0,
        rotation_deg: 30.0,
    });
    let preview = recorder.preview_footprint(&shape).unwrap();
    recorder.begin_sampling();

    let ticket = match recorder.on_touches(&shape) {
        Some(RecorderOutput::StartWindow { ticket, .. }) => ticket,
        other => panic!("expected a window, got {other:?}"),
    };
    for jitter in [0.5, -0.5, 0.25, -0.25] {
        let noisy: Vec<Point> = shape
            .iter()
            .map(|p| Point::new(p.x + jitter, p.y))
            .collect();
        assert!(recorder.on_touches(&noisy).is_none());
    }
    let Some(RecorderOutput::Recorded { signature, finished }) = recorder.window_elapsed(ticket)
    else {
        panic!("expected a record");
    };
    assert!(finished);
    store.save(&signature).unwrap();

    let mut tracker = ObjectTracker::new(store.load_or_default(DEFAULT_OBJECT_IDS));
    let touches: Vec<TouchPoint> = shape
        .iter()
        .enumerate()
        .map(|(i, p)| TouchPoint::new(i as i32 + 10, p.x, p.y))
        .collect();
    let updates = tracker.update(&touches);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id, "box");

    let tracked = updates[0].footprint().unwrap();
    assert!((tracked.center.x - preview.center.x).abs() < 1e-6);
    assert!((tracked.center.y - preview.center.y).abs() < 1e-6);
    assert!((tracked.rotation - preview.rotation).abs() < 1e-9);
    assert_eq!(tracked.width, 160.0);
}

#[test]
fn objects_come_and_go_across_frames() {
    let tape = default_signature("tape").unwrap();
    let mut tracker = ObjectTracker::new(vec![tape.clone()]);

    // Build the tape triangle from its sides: base on the x axis.
    let [s0, s1, s2] = tape.sides;
    let cx = (s1 * s1 - s0 * s0 + s2 * s2) / (2.0 * s2);
    let cy = (s1 * s1 - cx * cx).sqrt();
    let base = [
        Point::new(400.0, 300.0),
        Point::new(400.0 + s2, 300.0),
        Point::new(400.0 + cx, 300.0 + cy),
    ];
    let at = |ids: [i32; 3], angle: f64| -> Vec<TouchPoint> {
        let c = Point::new(400.0 + s2 / 2.0, 320.0);
        base.iter()
            .zip(ids)
            .map(|(p, id)| {
                let q = rotate_point(*p, c, angle);
                TouchPoint::new(id, q.x, q.y)
            })
            .collect()
    };

    let down = at([1, 2, 3], 0.0);
    let start = TouchFrame {
        phase: TouchPhase::Start,
        touches: down.clone(),
        changed: down.clone(),
    };
    let kinds: Vec<UpdateKind> = tracker.handle(&start).iter().map(|u| u.kind).collect();
    assert_eq!(kinds, vec![UpdateKind::Down]);

    let mut last = 0.0;
    for step in 1..=10 {
        let turned = at([1, 2, 3], 0.03 * step as f64);
        let frame = TouchFrame {
            phase: TouchPhase::Move,
            touches: turned.clone(),
            changed: turned,
        };
        let updates = tracker.handle(&frame);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, UpdateKind::Move);
        if step > 1 {
            assert!((normalize_angle(updates[0].rotation - last) - 0.03).abs() < 1e-9);
        }
        last = updates[0].rotation;
    }

    // Lift everything: one up, then silence.
    let lifted = at([1, 2, 3], 0.3);
    let end = TouchFrame {
        phase: TouchPhase::End,
        touches: Vec::new(),
        changed: lifted,
    };
    let updates = tracker.handle(&end);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, UpdateKind::Up);
    assert!(tracker.handle(&end).is_empty());

    // Put it back down with recycled ids plus a finger nearby.
    let mut again = at([3, 1, 2], 1.0);
    again.push(TouchPoint::new(4, 50.0, 50.0));
    let start = TouchFrame {
        phase: TouchPhase::Start,
        touches: again.clone(),
        changed: again,
    };
    let updates = tracker.handle(&start);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, UpdateKind::Down);
    assert!(!updates[0].touch_ids.contains(&4));
}
