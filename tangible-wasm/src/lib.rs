//! Browser frontend: touch capture, the `attachObjectTracker` API, the
//! stand-alone tracking surface and the calibration element.

use std::cell::RefCell;

use log::{error, info};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

mod calibration;
mod canvas;
mod constants;
mod logging;
mod settings;
mod storage;
mod surface;
mod touch;
mod tracking;
mod utils;

pub use calibration::{CalibrationHandle, mount_calibration};
pub use tracking::{TrackerHandle, attach_object_tracker};

use constants::{CALIBRATION_HOST_ID, EVENT_CALIBRATION_COMPLETE, SURFACE_CANVAS_ID};
use settings::Settings;
use utils::get_query_param;

thread_local! {
    /// Calibration mounted by the page itself (`?calibrate=1`).
    static PAGE_CALIBRATION: RefCell<Option<CalibrationHandle>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let search = window.location().search().unwrap_or_default();
    logging::init(logging::level_from_param(
        get_query_param(&search, "log").as_deref(),
    ));
    let settings = Settings::from_search(&search);
    let document = window.document().ok_or("no document")?;

    if settings.calibrate {
        let host: HtmlElement = match document.get_element_by_id(CALIBRATION_HOST_ID) {
            Some(el) => el.dyn_into()?,
            None => document.body().ok_or("no body")?,
        };
        reload_when_complete(&host)?;
        wasm_bindgen_futures::spawn_local(async move {
            match calibration::mount(window, host, &settings).await {
                Ok(handle) => {
                    PAGE_CALIBRATION.with(|c| c.replace(Some(handle)));
                }
                Err(e) => error!("calibration failed to start: {e:?}"),
            }
        });
    } else if document.get_element_by_id(SURFACE_CANVAS_ID).is_some() {
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = surface::run(window, document, settings).await {
                error!("tracking surface failed to start: {e:?}");
            }
        });
    } else {
        info!("no #{SURFACE_CANVAS_ID} canvas; library mode");
    }
    Ok(())
}

/// After a page-level calibration, drop `calibrate` from the URL so the
/// surface comes back with the new signatures.
fn reload_when_complete(host: &HtmlElement) -> Result<(), JsValue> {
    let on_complete = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };
        let location = window.location();
        let search = location.search().unwrap_or_default();
        let kept: Vec<&str> = search
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty() && !pair.starts_with("calibrate"))
            .collect();
        let next = if kept.is_empty() {
            String::new()
        } else {
            format!("?{}", kept.join("&"))
        };
        if let Err(e) = location.set_search(&next) {
            error!("could not leave calibration: {e:?}");
        }
    }));
    host.add_event_listener_with_callback(
        EVENT_CALIBRATION_COMPLETE,
        on_complete.as_ref().unchecked_ref(),
    )?;
    on_complete.forget();
    Ok(())
}
