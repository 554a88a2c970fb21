//! Physical-object tracking on a touch surface.
//!
//! Known objects touch the surface with three contact points. Their
//! triangle (sorted side lengths) identifies them; its centroid and facing
//! give the pose. [`tracker::ObjectTracker`] turns live touch snapshots
//! into down/move/up updates, [`calibration::CalibrationRecorder`] records
//! the signatures it matches against, and [`store::SignatureStore`] keeps
//! them between sessions.

pub mod calibration;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod input;
pub mod signature;
pub mod store;
pub mod tracker;

pub use calibration::{
    BoxConfig, CalibrationConfig, CalibrationMode, CalibrationPhase, CalibrationRecorder,
    RecorderOutput, SamplingTicket,
};
pub use error::{ConfigError, SignatureError, StoreError};
pub use geometry::{HasPosition, Point};
pub use input::{TouchFrame, TouchInputAdapter, TouchPhase, TouchPoint};
pub use signature::{BoundingBox, Footprint, KnownObjectSignature};
pub use store::{KeyValueStore, MemoryStore, SignatureStore};
pub use tracker::{ObjectTracker, ObjectUpdate, TrackedObjectState, TrackerConfig, UpdateKind};
