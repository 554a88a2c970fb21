//! `attachObjectTracker`: the JS-facing tracking API.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function};
use log::{error, info};
use wasm_bindgen::prelude::*;
use web_sys::Element;

use tangible_core::{ObjectTracker, ObjectUpdate};

use crate::settings::Settings;
use crate::storage::{load_signatures, open_store};
use crate::touch::TouchSubscription;
use crate::utils::js_error;

/// Returned to JS; call `unsubscribe()` to stop tracking.
#[wasm_bindgen]
pub struct TrackerHandle {
    subscription: TouchSubscription,
    tracker: Rc<RefCell<ObjectTracker>>,
    callback: Function,
}

#[wasm_bindgen]
impl TrackerHandle {
    /// Stop listening. Objects still on the surface get a final `up`.
    pub fn unsubscribe(&mut self) {
        if !self.subscription.is_active() {
            return;
        }
        self.subscription.unsubscribe();
        let released = self.tracker.borrow_mut().reset();
        report_all(&self.callback, &released);
        info!("object tracking stopped");
    }

    /// Ids of the objects currently on the surface.
    #[wasm_bindgen(js_name = activeObjects)]
    pub fn active_objects(&self) -> Array {
        self.tracker
            .borrow()
            .states()
            .iter()
            .filter(|s| s.is_active)
            .map(|s| JsValue::from_str(&s.id))
            .collect()
    }
}

/// Track known objects on `element`. Signatures are loaded once (stored
/// calibrations over presets or built-in defaults), then every update is
/// reported as
/// `callback(id, x, y, rotation, confidence, activePoints, boundingBox, eventType)`.
#[wasm_bindgen(js_name = attachObjectTracker)]
pub async fn attach_object_tracker(
    element: Element,
    callback: Function,
) -> Result<TrackerHandle, JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let settings = Settings::from_window(&window);
    let store = open_store(&window);
    let signatures = load_signatures(&window, store.as_ref(), settings.presets.as_deref()).await;
    let tracker = ObjectTracker::with_config(signatures, settings.tracker).map_err(js_error)?;
    let tracker = Rc::new(RefCell::new(tracker));

    let tr = tracker.clone();
    let cb = callback.clone();
    let subscription = TouchSubscription::new(&element, move |frame| {
        let updates = tr.borrow_mut().handle(&frame);
        report_all(&cb, &updates);
    })?;
    info!("object tracking attached");
    Ok(TrackerHandle {
        subscription,
        tracker,
        callback,
    })
}

fn report_all(callback: &Function, updates: &[ObjectUpdate]) {
    for update in updates {
        if let Err(e) = report(callback, update) {
            error!("tracking callback failed for '{}': {e:?}", update.id);
        }
    }
}

fn report(callback: &Function, update: &ObjectUpdate) -> Result<(), JsValue> {
    let bounding_box = match &update.bounding_box {
        Some(bb) => js_sys::JSON::parse(&serde_json::to_string(bb).map_err(js_error)?)?,
        None => JsValue::NULL,
    };
    let args = Array::new();
    args.push(&JsValue::from_str(&update.id));
    args.push(&JsValue::from_f64(update.position.x));
    args.push(&JsValue::from_f64(update.position.y));
    args.push(&JsValue::from_f64(update.rotation));
    args.push(&JsValue::from_f64(update.confidence));
    args.push(&JsValue::from_f64(update.active_points as f64));
    args.push(&bounding_box);
    args.push(&JsValue::from_str(update.kind.as_str()));
    callback.apply(&JsValue::NULL, &args)?;
    Ok(())
}
