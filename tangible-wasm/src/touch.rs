//! Raw touch events on one element, turned into [`TouchFrame`]s.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, DomRect, Element, TouchEvent, TouchList};

use tangible_core::{TouchFrame, TouchPhase, TouchPoint};

use crate::constants::TOUCH_EVENTS;
use crate::utils::element_local;

type TouchClosure = Closure<dyn FnMut(TouchEvent)>;

/// Live listener registration. Listeners come off on `unsubscribe` or drop;
/// nothing else stops delivery.
pub struct TouchSubscription {
    target: Element,
    listener: TouchClosure,
    active: bool,
}

impl TouchSubscription {
    /// Listen on `target` and hand every event to `on_frame`, coordinates
    /// relative to the element's top-left corner. Listeners are non-passive
    /// and cancel the browser's default gesture handling.
    pub fn new<F>(target: &Element, mut on_frame: F) -> Result<Self, JsValue>
    where
        F: FnMut(TouchFrame) + 'static,
    {
        let el = target.clone();
        let listener = TouchClosure::wrap(Box::new(move |e: TouchEvent| {
            e.prevent_default();
            let Some(phase) = phase_of(&e.type_()) else {
                return;
            };
            let rect = el.get_bounding_client_rect();
            on_frame(TouchFrame {
                phase,
                touches: local_points(&e.touches(), &rect),
                changed: local_points(&e.changed_touches(), &rect),
            });
        }));

        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        for name in TOUCH_EVENTS {
            target.add_event_listener_with_callback_and_add_event_listener_options(
                name,
                listener.as_ref().unchecked_ref(),
                &options,
            )?;
        }
        Ok(TouchSubscription {
            target: target.clone(),
            listener,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Remove the listeners. Safe to call from inside a touch callback and
    /// more than once.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        for name in TOUCH_EVENTS {
            let _ = self
                .target
                .remove_event_listener_with_callback(name, self.listener.as_ref().unchecked_ref());
        }
        log::debug!("touch listeners removed");
    }
}

impl Drop for TouchSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn phase_of(event_type: &str) -> Option<TouchPhase> {
    match event_type {
        "touchstart" => Some(TouchPhase::Start),
        "touchmove" => Some(TouchPhase::Move),
        "touchend" => Some(TouchPhase::End),
        "touchcancel" => Some(TouchPhase::Cancel),
        _ => None,
    }
}

fn local_points(list: &TouchList, rect: &DomRect) -> Vec<TouchPoint> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .map(|t| {
            let p = element_local(rect, t.client_x() as f64, t.client_y() as f64);
            TouchPoint::new(t.identifier(), p.x, p.y)
        })
        .collect()
}
