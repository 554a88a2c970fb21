/// Browser-side constants. Lengths are CSS pixels.
pub const TOUCH_EVENTS: [&str; 4] = ["touchstart", "touchmove", "touchend", "touchcancel"];

/// Events dispatched on the calibration host element.
pub const EVENT_CALIBRATION_COMPLETE: &str = "calibration-complete";
pub const EVENT_CALIBRATION_CANCELED: &str = "calibration-canceled";

/// Element ids looked up at start-up.
pub const SURFACE_CANVAS_ID: &str = "cv";
pub const CALIBRATION_HOST_ID: &str = "calibration";

/// Radius of the ring drawn around each live touch.
pub const TOUCH_RING_RADIUS: f64 = 22.0;
/// Half-length of a calibration crosshair arm.
pub const CROSSHAIR_ARM: f64 = 30.0;
/// Side of the square the legacy box schematic is fitted into.
pub const SCHEMATIC_SIZE: f64 = 180.0;

/// Footprint colours, cycled by registration order.
pub const OBJECT_COLORS: [&str; 6] = [
    "rgba(230, 126, 34, 0.35)",
    "rgba(52, 152, 219, 0.35)",
    "rgba(46, 204, 113, 0.35)",
    "rgba(155, 89, 182, 0.35)",
    "rgba(241, 196, 15, 0.35)",
    "rgba(231, 76, 60, 0.35)",
];
