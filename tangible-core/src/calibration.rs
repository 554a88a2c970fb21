//! Step-by-step signature recording, one object at a time.
//!
//! Each object goes through a preview (the operator lines up the box
//! overlay on the live triangle), then a sampling window during which the
//! triangle's sorted sides are recorded every frame and averaged. The
//! legacy flow skips the preview and asks for the box after sampling.
//!
//! The recorder never waits on time itself: opening a window returns a
//! [`SamplingTicket`], the host arms a one-shot timer and hands the ticket
//! back through [`CalibrationRecorder::window_elapsed`]. Any touch-count
//! change in between invalidates the ticket.

use std::f64::consts::PI;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::SAMPLE_WINDOW_MS;
use crate::geometry::{HasPosition, Point, canonical_rotation, centroid, sorted_sides};
use crate::signature::{BoundingBox, Footprint, KnownObjectSignature};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Live box overlay, no sampling yet.
    Preview,
    /// Waiting for (or inside) a sampling window.
    Touch,
    /// Legacy flow: sides recorded, box dimensions pending.
    BoundingBox,
    Complete,
    Canceled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationMode {
    #[default]
    PreviewFirst,
    BoxAfterSampling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub sample_window_ms: u32,
    pub mode: CalibrationMode,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            sample_window_ms: SAMPLE_WINDOW_MS,
            mode: CalibrationMode::default(),
        }
    }
}

/// Box fields as the operator edits them. Rotation is in degrees here and
/// only becomes radians in [`BoxConfig::to_bounding_box`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxConfig {
    pub width: f64,
    pub height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
    pub rotation_deg: f64,
}

impl Default for BoxConfig {
    fn default() -> Self {
        BoxConfig::from_bounding_box(&BoundingBox::default())
    }
}

impl BoxConfig {
    pub fn from_bounding_box(bb: &BoundingBox) -> Self {
        BoxConfig {
            width: bb.width,
            height: bb.height,
            x_offset: bb.x_offset,
            y_offset: bb.y_offset,
            rotation_deg: bb.orientation_offset * 180.0 / PI,
        }
    }

    pub fn to_bounding_box(&self) -> BoundingBox {
        BoundingBox {
            width: self.width,
            height: self.height,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
            orientation_offset: self.rotation_deg * PI / 180.0,
        }
    }
}

/// Identifies one sampling window. Stale tickets are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplingTicket(u64);

#[derive(Clone, Debug, PartialEq)]
pub enum RecorderOutput {
    /// A window opened; arm a timer for `duration_ms` and return the ticket.
    StartWindow {
        ticket: SamplingTicket,
        duration_ms: u32,
    },
    /// The touch count changed mid-window; samples were dropped.
    Aborted,
    /// Legacy flow: sides are averaged, waiting for the box step.
    AwaitingBox { sides: [f64; 3] },
    /// A signature is ready to persist. `finished` is set after the last
    /// object.
    Recorded {
        signature: KnownObjectSignature,
        finished: bool,
    },
}

#[derive(Debug)]
struct Sampling {
    ticket: SamplingTicket,
    samples: Vec<[f64; 3]>,
}

pub struct CalibrationRecorder {
    config: CalibrationConfig,
    objects: Vec<KnownObjectSignature>,
    index: usize,
    phase: CalibrationPhase,
    box_config: BoxConfig,
    sampling: Option<Sampling>,
    next_ticket: u64,
    awaiting_release: bool,
    /// Points in the last snapshot seen.
    touches_down: usize,
    pending_sides: Option<[f64; 3]>,
    recorded: Vec<KnownObjectSignature>,
}

impl CalibrationRecorder {
    /// Start a session over `current`, the signatures in effect now; their
    /// boxes seed the editable fields.
    pub fn new(current: Vec<KnownObjectSignature>, config: CalibrationConfig) -> Self {
        let mut recorder = CalibrationRecorder {
            config,
            objects: current,
            index: 0,
            phase: CalibrationPhase::Complete,
            box_config: BoxConfig::default(),
            sampling: None,
            next_ticket: 0,
            awaiting_release: false,
            touches_down: 0,
            pending_sides: None,
            recorded: Vec::new(),
        };
        recorder.enter_object();
        recorder
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn current_object(&self) -> Option<&str> {
        match self.phase {
            CalibrationPhase::Complete | CalibrationPhase::Canceled => None,
            _ => self.objects.get(self.index).map(|o| o.id.as_str()),
        }
    }

    /// (objects done, objects total)
    pub fn progress(&self) -> (usize, usize) {
        (self.index.min(self.objects.len()), self.objects.len())
    }

    pub fn box_config(&self) -> &BoxConfig {
        &self.box_config
    }

    pub fn set_box_config(&mut self, cfg: BoxConfig) {
        self.box_config = cfg;
    }

    pub fn recorded(&self) -> &[KnownObjectSignature] {
        &self.recorded
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.is_some()
    }

    pub fn samples_collected(&self) -> usize {
        self.sampling.as_ref().map_or(0, |s| s.samples.len())
    }

    /// True until every touch has been lifted after the previous object.
    pub fn awaiting_release(&self) -> bool {
        self.awaiting_release
    }

    pub fn pending_sides(&self) -> Option<[f64; 3]> {
        self.pending_sides
    }

    /// Leave the preview and start waiting for a sampling touch.
    pub fn begin_sampling(&mut self) {
        if self.phase == CalibrationPhase::Preview {
            self.phase = CalibrationPhase::Touch;
        }
    }

    /// Feed one snapshot of live points.
    pub fn on_touches<P: HasPosition>(&mut self, points: &[P]) -> Option<RecorderOutput> {
        self.touches_down = points.len();
        if self.awaiting_release {
            if points.is_empty() {
                self.awaiting_release = false;
            }
            return None;
        }
        if self.phase != CalibrationPhase::Touch {
            return None;
        }

        if let Some(sampling) = self.sampling.as_mut() {
            if points.len() == 3 {
                sampling.samples.push(sorted_sides(points));
                return None;
            }
            debug!(
                "sampling interrupted ({} points), samples dropped",
                points.len()
            );
            self.sampling = None;
            return Some(RecorderOutput::Aborted);
        }
        if points.len() != 3 {
            return None;
        }

        let ticket = SamplingTicket(self.next_ticket);
        self.next_ticket += 1;
        self.sampling = Some(Sampling {
            ticket,
            samples: vec![sorted_sides(points)],
        });
        Some(RecorderOutput::StartWindow {
            ticket,
            duration_ms: self.config.sample_window_ms,
        })
    }

    /// The timer for `ticket` fired.
    pub fn window_elapsed(&mut self, ticket: SamplingTicket) -> Option<RecorderOutput> {
        let live = self.sampling.as_ref().is_some_and(|s| s.ticket == ticket);
        if !live {
            debug!("ignoring stale sampling window {ticket:?}");
            return None;
        }
        let sampling = self.sampling.take()?;
        let sides = mean_sides(&sampling.samples);
        info!(
            "sampled {} frames for '{}': {:?}",
            sampling.samples.len(),
            self.objects[self.index].id,
            sides
        );
        match self.config.mode {
            CalibrationMode::PreviewFirst => Some(self.record(sides, self.box_config)),
            CalibrationMode::BoxAfterSampling => {
                self.pending_sides = Some(sides);
                self.phase = CalibrationPhase::BoundingBox;
                self.awaiting_release = true;
                Some(RecorderOutput::AwaitingBox { sides })
            }
        }
    }

    /// Legacy flow: keep the edited box.
    pub fn confirm_box(&mut self) -> Option<RecorderOutput> {
        let sides = self.take_pending()?;
        Some(self.record(sides, self.box_config))
    }

    /// Legacy flow: fall back to the default box dimensions.
    pub fn skip_box(&mut self) -> Option<RecorderOutput> {
        let sides = self.take_pending()?;
        Some(self.record(sides, BoxConfig::default()))
    }

    /// Keep the current signature for this object and move on. Returns true
    /// when that was the last object.
    pub fn skip_object(&mut self) -> bool {
        if self.current_object().is_none() {
            return false;
        }
        info!("kept existing signature for '{}'", self.objects[self.index].id);
        self.advance();
        self.awaiting_release = self.touches_down > 0;
        self.phase == CalibrationPhase::Complete
    }

    pub fn cancel(&mut self) {
        if self.phase != CalibrationPhase::Complete {
            info!("calibration canceled");
            self.sampling = None;
            self.pending_sides = None;
            self.phase = CalibrationPhase::Canceled;
        }
    }

    /// Box overlay for the live triangle, with the current edits applied.
    /// `None` unless exactly three points are down.
    pub fn preview_footprint<P: HasPosition>(&self, points: &[P]) -> Option<Footprint> {
        if points.len() != 3 {
            return None;
        }
        let center = centroid(points);
        let rotation = canonical_rotation(points, None);
        Some(Footprint::place(
            center,
            rotation,
            &self.box_config.to_bounding_box(),
        ))
    }

    fn take_pending(&mut self) -> Option<[f64; 3]> {
        if self.phase != CalibrationPhase::BoundingBox {
            return None;
        }
        self.pending_sides.take()
    }

    fn record(&mut self, sides: [f64; 3], cfg: BoxConfig) -> RecorderOutput {
        let id = self.objects[self.index].id.clone();
        let signature = KnownObjectSignature::new(id, sides, Some(cfg.to_bounding_box()));
        self.objects[self.index] = signature.clone();
        self.recorded.push(signature.clone());
        self.advance();
        self.awaiting_release = true;
        RecorderOutput::Recorded {
            signature,
            finished: self.phase == CalibrationPhase::Complete,
        }
    }

    fn advance(&mut self) {
        self.index += 1;
        self.enter_object();
    }

    fn enter_object(&mut self) {
        self.sampling = None;
        self.pending_sides = None;
        match self.objects.get(self.index) {
            Some(obj) => {
                self.box_config = obj
                    .bounding_box
                    .as_ref()
                    .map(BoxConfig::from_bounding_box)
                    .unwrap_or_default();
                self.phase = match self.config.mode {
                    CalibrationMode::PreviewFirst => CalibrationPhase::Preview,
                    CalibrationMode::BoxAfterSampling => CalibrationPhase::Touch,
                };
            }
            None => self.phase = CalibrationPhase::Complete,
        }
    }
}

/// Per-side arithmetic mean.
pub fn mean_sides(samples: &[[f64; 3]]) -> [f64; 3] {
    if samples.is_empty() {
        return [0.0; 3];
    }
    let n = samples.len() as f64;
    let mut sum = [0.0; 3];
    for s in samples {
        for (acc, v) in sum.iter_mut().zip(s) {
            *acc += v;
        }
    }
    sum.map(|v| v / n)
}

/// Scaled diagram of a signature for the legacy box step: the triangle
/// rebuilt from its sides plus the box placed on it, fitted into a
/// `size`-by-`size` square.
#[derive(Clone, Debug, PartialEq)]
pub struct Schematic {
    pub triangle: [Point; 3],
    pub rect: [Point; 4],
}

pub fn schematic(sides: [f64; 3], cfg: &BoxConfig, size: f64) -> Schematic {
    let [s0, s1, s2] = sides;
    let a = Point::new(0.0, 0.0);
    let b = Point::new(s2, 0.0);
    let cx = if s2 > 0.0 {
        (s1 * s1 - s0 * s0 + s2 * s2) / (2.0 * s2)
    } else {
        0.0
    };
    let c = Point::new(cx, (s1 * s1 - cx * cx).max(0.0).sqrt());
    let triangle = [a, b, c];

    let rect = Footprint::place(
        centroid(&triangle),
        canonical_rotation(&triangle, None),
        &cfg.to_bounding_box(),
    )
    .corners();

    let all: Vec<Point> = triangle.iter().chain(rect.iter()).copied().collect();
    let (min_x, max_x) = bounds(all.iter().map(|p| p.x));
    let (min_y, max_y) = bounds(all.iter().map(|p| p.y));
    let extent = (max_x - min_x).max(max_y - min_y).max(1e-9);
    let scale = size * 0.9 / extent;
    let off_x = (size - (max_x - min_x) * scale) / 2.0;
    let off_y = (size - (max_y - min_y) * scale) / 2.0;
    let fit = |p: Point| Point::new((p.x - min_x) * scale + off_x, (p.y - min_y) * scale + off_y);

    Schematic {
        triangle: triangle.map(fit),
        rect: rect.map(fit),
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance;

    fn sig(id: &str) -> KnownObjectSignature {
        KnownObjectSignature::new(id, [10.0, 20.0, 25.0], None)
    }

    fn tri(scale: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(30.0 * scale, 0.0),
            Point::new(0.0, 40.0 * scale),
        ]
    }

    fn open_window(rec: &mut CalibrationRecorder, pts: &[Point]) -> SamplingTicket {
        match rec.on_touches(pts) {
            Some(RecorderOutput::StartWindow { ticket, duration_ms }) => {
                assert_eq!(duration_ms, SAMPLE_WINDOW_MS);
                ticket
            }
            other => panic!("expected a window, got {other:?}"),
        }
    }

    #[test]
    fn preview_then_sample_then_record() {
        let mut rec = CalibrationRecorder::new(vec![sig("box")], CalibrationConfig::default());
        assert_eq!(rec.phase(), CalibrationPhase::Preview);
        // No sampling during preview.
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert!(rec.preview_footprint(&tri(1.0)).is_some());
        assert!(rec.preview_footprint(&tri(1.0)[..2]).is_none());

        rec.set_box_config(BoxConfig {
            width: 90.0,
            height: 60.0,
            x_offset: 5.0,
            y_offset: -5.0,
            rotation_deg: 90.0,
        });
        rec.begin_sampling();
        assert_eq!(rec.phase(), CalibrationPhase::Touch);

        let ticket = open_window(&mut rec, &tri(1.0));
        assert!(rec.on_touches(&tri(1.02)).is_none());
        assert!(rec.on_touches(&tri(0.98)).is_none());
        assert_eq!(rec.samples_collected(), 3);

        let Some(RecorderOutput::Recorded { signature, finished }) = rec.window_elapsed(ticket)
        else {
            panic!("expected a record");
        };
        assert!(finished);
        assert_eq!(signature.id, "box");
        for (got, want) in signature.sides.iter().zip([30.0, 40.0, 50.0]) {
            assert!((got - want).abs() < 1e-9);
        }
        let bb = signature.bounding_box.unwrap();
        assert_eq!(bb.orientation_offset, 90.0 * PI / 180.0);
        assert_eq!(bb.width, 90.0);
        assert_eq!(rec.phase(), CalibrationPhase::Complete);
    }

    #[test]
    fn mean_is_per_side() {
        let samples = [[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 6.0, 10.0]];
        assert_eq!(mean_sides(&samples), [2.0, 4.0, 6.0]);
    }

    #[test]
    fn count_change_aborts_and_stale_timer_is_ignored() {
        let mut rec = CalibrationRecorder::new(vec![sig("tape")], CalibrationConfig::default());
        rec.begin_sampling();
        let stale = open_window(&mut rec, &tri(1.0));
        assert_eq!(rec.on_touches(&tri(1.0)[..2]), Some(RecorderOutput::Aborted));
        assert!(!rec.is_sampling());
        assert!(rec.window_elapsed(stale).is_none());

        let fresh = open_window(&mut rec, &tri(1.0));
        assert_ne!(fresh, stale);
        assert!(matches!(
            rec.window_elapsed(fresh),
            Some(RecorderOutput::Recorded { .. })
        ));
    }

    #[test]
    fn extra_finger_aborts_window() {
        let mut rec = CalibrationRecorder::new(vec![sig("tape")], CalibrationConfig::default());
        rec.begin_sampling();
        let stale = open_window(&mut rec, &tri(1.0));
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert_eq!(rec.samples_collected(), 2);

        let mut four = tri(1.0);
        four.push(Point::new(200.0, 200.0));
        assert_eq!(rec.on_touches(&four), Some(RecorderOutput::Aborted));
        assert!(!rec.is_sampling());
        assert!(rec.window_elapsed(stale).is_none());
        assert_eq!(rec.phase(), CalibrationPhase::Touch);
        assert!(rec.recorded().is_empty());

        // Four points never open a window; back to three does.
        assert!(rec.on_touches(&four).is_none());
        let fresh = open_window(&mut rec, &tri(1.0));
        assert_ne!(fresh, stale);
    }

    #[test]
    fn skipping_mid_window_waits_for_release() {
        let config = CalibrationConfig {
            mode: CalibrationMode::BoxAfterSampling,
            ..CalibrationConfig::default()
        };
        let mut rec = CalibrationRecorder::new(vec![sig("box"), sig("tape")], config);
        let stale = open_window(&mut rec, &tri(1.0));
        assert!(!rec.skip_object());
        assert_eq!(rec.current_object(), Some("tape"));
        assert_eq!(rec.phase(), CalibrationPhase::Touch);
        assert!(rec.awaiting_release());
        assert!(rec.window_elapsed(stale).is_none());

        // The skipped object is still resting on the surface.
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert!(rec.on_touches::<Point>(&[]).is_none());
        open_window(&mut rec, &tri(2.0));
    }

    #[test]
    fn skipping_with_nothing_down_needs_no_release() {
        let config = CalibrationConfig {
            mode: CalibrationMode::BoxAfterSampling,
            ..CalibrationConfig::default()
        };
        let mut rec = CalibrationRecorder::new(vec![sig("box"), sig("tape")], config);
        assert!(rec.on_touches::<Point>(&[]).is_none());
        assert!(!rec.skip_object());
        assert!(!rec.awaiting_release());
        open_window(&mut rec, &tri(1.0));
    }

    #[test]
    fn next_object_waits_for_full_release() {
        let mut rec = CalibrationRecorder::new(
            vec![sig("box"), sig("tape")],
            CalibrationConfig::default(),
        );
        rec.begin_sampling();
        let t = open_window(&mut rec, &tri(1.0));
        let out = rec.window_elapsed(t);
        assert!(matches!(
            out,
            Some(RecorderOutput::Recorded { finished: false, .. })
        ));
        assert_eq!(rec.current_object(), Some("tape"));
        assert_eq!(rec.progress(), (1, 2));
        rec.begin_sampling();

        // Still holding the first object: ignored.
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert!(rec.on_touches(&tri(1.0)[..1]).is_none());
        assert!(rec.awaiting_release());
        assert!(rec.on_touches::<Point>(&[]).is_none());
        assert!(!rec.awaiting_release());
        open_window(&mut rec, &tri(2.0));
    }

    #[test]
    fn box_fields_seed_from_existing_signature() {
        let existing = KnownObjectSignature::new(
            "iron",
            [1.0, 2.0, 2.5],
            Some(BoundingBox {
                width: 200.0,
                height: 100.0,
                x_offset: 3.0,
                y_offset: 4.0,
                orientation_offset: PI / 2.0,
            }),
        );
        let rec = CalibrationRecorder::new(vec![existing], CalibrationConfig::default());
        assert_eq!(rec.box_config().width, 200.0);
        assert!((rec.box_config().rotation_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn legacy_flow_confirms_or_skips_box() {
        let config = CalibrationConfig {
            mode: CalibrationMode::BoxAfterSampling,
            ..CalibrationConfig::default()
        };
        let mut rec = CalibrationRecorder::new(vec![sig("box"), sig("tape")], config);
        assert_eq!(rec.phase(), CalibrationPhase::Touch);

        let t = open_window(&mut rec, &tri(1.0));
        assert!(matches!(
            rec.window_elapsed(t),
            Some(RecorderOutput::AwaitingBox { .. })
        ));
        assert_eq!(rec.phase(), CalibrationPhase::BoundingBox);
        rec.set_box_config(BoxConfig {
            rotation_deg: 45.0,
            ..BoxConfig::default()
        });
        let Some(RecorderOutput::Recorded { signature, .. }) = rec.confirm_box() else {
            panic!("expected a record");
        };
        assert_eq!(
            signature.bounding_box.unwrap().orientation_offset,
            45.0 * PI / 180.0
        );

        rec.on_touches::<Point>(&[]);
        let t = open_window(&mut rec, &tri(1.0));
        rec.window_elapsed(t);
        let Some(RecorderOutput::Recorded { signature, finished }) = rec.skip_box() else {
            panic!("expected a record");
        };
        assert!(finished);
        assert_eq!(signature.bounding_box, Some(BoundingBox::default()));
        assert_eq!(rec.recorded().len(), 2);
    }

    #[test]
    fn skip_and_cancel() {
        let mut rec = CalibrationRecorder::new(
            vec![sig("box"), sig("tape")],
            CalibrationConfig::default(),
        );
        assert!(!rec.skip_object());
        assert_eq!(rec.current_object(), Some("tape"));
        rec.cancel();
        assert_eq!(rec.phase(), CalibrationPhase::Canceled);
        assert!(rec.current_object().is_none());
        assert!(rec.on_touches(&tri(1.0)).is_none());
        assert!(rec.recorded().is_empty());
    }

    #[test]
    fn empty_session_is_complete() {
        let rec = CalibrationRecorder::new(Vec::new(), CalibrationConfig::default());
        assert_eq!(rec.phase(), CalibrationPhase::Complete);
    }

    #[test]
    fn schematic_keeps_triangle_shape() {
        let s = schematic([30.0, 40.0, 50.0], &BoxConfig::default(), 200.0);
        let sides = sorted_sides(&s.triangle);
        let k = sides[0] / 30.0;
        assert!((sides[1] / k - 40.0).abs() < 1e-9);
        assert!((sides[2] / k - 50.0).abs() < 1e-9);
        for p in s.triangle.iter().chain(s.rect.iter()) {
            assert!(p.x >= -1e-9 && p.x <= 200.0 + 1e-9);
            assert!(p.y >= -1e-9 && p.y <= 200.0 + 1e-9);
        }
        assert!(distance(s.rect[0], s.rect[2]) > 0.0);
    }
}
