use std::str::FromStr;

use log::warn;
use web_sys::Window;

use tangible_core::{CalibrationConfig, CalibrationMode, TrackerConfig};

use crate::utils::get_query_param;

/// Start-up options read from the page URL.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub tracker: TrackerConfig,
    pub calibration: CalibrationConfig,
    /// `?calibrate=1` mounts the calibration flow instead of the surface.
    pub calibrate: bool,
    /// Name or path of a presets JSON file (a list of signatures).
    pub presets: Option<String>,
}

impl Settings {
    pub fn from_window(window: &Window) -> Self {
        let search = window.location().search().unwrap_or_default();
        Self::from_search(&search)
    }

    pub fn from_search(search: &str) -> Self {
        let mut s = Settings::default();
        if let Some(v) = number(search, "tolerance") {
            s.tracker.match_tolerance = v;
        }
        if let Some(v) = number(search, "continuity") {
            s.tracker.continuity_discount = v;
        }
        if let Err(e) = s.tracker.validate() {
            warn!("{e}; using default tracker settings");
            s.tracker = TrackerConfig::default();
        }
        if let Some(ms) = number::<u32>(search, "window_ms") {
            if ms > 0 {
                s.calibration.sample_window_ms = ms;
            } else {
                warn!("window_ms must be positive, keeping default");
            }
        }
        match get_query_param(search, "mode").as_deref() {
            None => {}
            Some("box-after-sampling" | "legacy") => {
                s.calibration.mode = CalibrationMode::BoxAfterSampling;
            }
            Some("preview-first") => s.calibration.mode = CalibrationMode::PreviewFirst,
            Some(other) => warn!("unknown calibration mode '{other}'"),
        }
        s.calibrate = get_query_param(search, "calibrate")
            .is_some_and(|v| matches!(v.as_str(), "" | "1" | "true" | "yes"));
        s.presets = get_query_param(search, "presets").filter(|v| !v.is_empty());
        s
    }
}

fn number<T: FromStr>(search: &str, key: &str) -> Option<T> {
    let raw = get_query_param(search, key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw}: not a number");
            None
        }
    }
}
