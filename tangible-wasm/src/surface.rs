//! Stand-alone tracking surface on the `#cv` canvas.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::info;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, Window};

use tangible_core::{ObjectTracker, ObjectUpdate, Point, TouchFrame, TouchPoint, UpdateKind};

use crate::canvas::{clear, draw_heading, draw_label, draw_polygon, draw_ring};
use crate::constants::{OBJECT_COLORS, SURFACE_CANVAS_ID, TOUCH_RING_RADIUS};
use crate::settings::Settings;
use crate::storage::{load_signatures, open_store};
use crate::touch::TouchSubscription;
use crate::utils::{RafClosure, init_canvas, js_error, request_frame, sync_canvas_size};

pub struct Surface {
    window: Window,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    tracker: ObjectTracker,
    /// Last update per active object.
    objects: BTreeMap<String, ObjectUpdate>,
    live: Vec<TouchPoint>,
    dirty: bool,
    _subscription: Option<TouchSubscription>,
}

thread_local! {
    static SURFACE: RefCell<Option<Rc<RefCell<Surface>>>> = const { RefCell::new(None) };
}

/// Load signatures, start listening on `#cv` and keep it redrawn.
pub async fn run(window: Window, document: Document, settings: Settings) -> Result<(), JsValue> {
    let (canvas, ctx) = init_canvas(&document, SURFACE_CANVAS_ID)?;
    let store = open_store(&window);
    let signatures = load_signatures(&window, store.as_ref(), settings.presets.as_deref()).await;
    let tracker = ObjectTracker::with_config(signatures, settings.tracker).map_err(js_error)?;

    let state = Rc::new(RefCell::new(Surface {
        window,
        canvas: canvas.clone(),
        ctx,
        tracker,
        objects: BTreeMap::new(),
        live: Vec::new(),
        dirty: true,
        _subscription: None,
    }));

    let weak = Rc::downgrade(&state);
    let subscription = TouchSubscription::new(&canvas, move |frame| {
        if let Some(st) = weak.upgrade() {
            st.borrow_mut().on_frame(frame);
        }
    })?;
    state.borrow_mut()._subscription = Some(subscription);

    SURFACE.with(|s| s.replace(Some(state.clone())));
    start_animation(state);
    info!("tracking surface ready");
    Ok(())
}

impl Surface {
    fn on_frame(&mut self, frame: TouchFrame) {
        for update in self.tracker.handle(&frame) {
            match update.kind {
                UpdateKind::Up => {
                    self.objects.remove(&update.id);
                }
                UpdateKind::Down | UpdateKind::Move => {
                    self.objects.insert(update.id.clone(), update);
                }
            }
        }
        self.live = self.tracker.live_points();
        self.dirty = true;
    }

    fn draw(&mut self) {
        let dpr = self.window.device_pixel_ratio();
        let ctx = &self.ctx;
        clear(ctx, self.canvas.width(), self.canvas.height(), dpr);

        for (i, state) in self.tracker.states().iter().enumerate() {
            let Some(update) = self.objects.get(&state.id) else {
                continue;
            };
            let color = OBJECT_COLORS[i % OBJECT_COLORS.len()];
            match update.footprint() {
                Some(fp) => {
                    draw_polygon(ctx, &fp.corners(), Some(color), "#333");
                    draw_heading(ctx, fp.center, fp.rotation, fp.width / 2.0, "#333");
                }
                None => draw_heading(ctx, update.position, update.rotation, 40.0, "#333"),
            }
            draw_label(ctx, &update.id, update.position, "#111");
        }
        for t in &self.live {
            draw_ring(ctx, Point::new(t.x, t.y), TOUCH_RING_RADIUS, "#888");
        }
        self.dirty = false;
    }
}

fn start_animation(state: Rc<RefCell<Surface>>) {
    let f: Rc<RefCell<Option<RafClosure>>> = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
        {
            let mut s = state.borrow_mut();
            if sync_canvas_size(&s.window, &s.canvas) {
                s.dirty = true;
            }
            if s.dirty {
                s.draw();
            }
        }
        request_frame(&f);
    }) as Box<dyn FnMut(f64)>));
    request_frame(&g);
}
