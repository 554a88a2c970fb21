//! Tuning constants for matching and calibration.
//! Lengths are in tracking-surface pixels unless noted otherwise.

/// Largest accepted relative signature error (sum of side differences over
/// the sum of registered sides).
pub const MATCH_TOLERANCE: f64 = 0.15;
/// Score discount applied per touch id a candidate shares with the object's
/// previous-frame triad.
pub const CONTINUITY_DISCOUNT_PER_ID: f64 = 0.10;
/// Confidence reported for a matched object.
pub const MATCHED_CONFIDENCE: f64 = 1.0;
/// Confidence reported when an object stops matching.
pub const LOST_CONFIDENCE: f64 = 0.0;
/// Length of one signature sampling window (ms).
pub const SAMPLE_WINDOW_MS: u32 = 2_000;
/// Storage key prefix for persisted signatures.
pub const SIGNATURE_KEY_PREFIX: &str = "object-signature-";
/// Box dimensions used when the operator skips the bounding-box step.
pub const DEFAULT_BOX_WIDTH: f64 = 120.0;
pub const DEFAULT_BOX_HEIGHT: f64 = 80.0;
