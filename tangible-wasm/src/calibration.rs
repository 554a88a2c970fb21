//! Embeddable calibration element.
//!
//! Builds its own canvas, box fields and buttons inside a host element,
//! drives a [`CalibrationRecorder`] from touches and timers, persists each
//! record and announces the end of the session with a `CustomEvent` on the
//! host.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{error, info, warn};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, CustomEvent, CustomEventInit, Document, HtmlCanvasElement,
    HtmlElement, HtmlInputElement, Window,
};

use tangible_core::calibration::schematic;
use tangible_core::{
    BoxConfig, CalibrationPhase, CalibrationRecorder, KnownObjectSignature, Point,
    RecorderOutput, SamplingTicket, TouchFrame, TouchInputAdapter, TouchPoint,
};

use crate::canvas::{clear, draw_crosshair, draw_heading, draw_polygon};
use crate::constants::{
    CROSSHAIR_ARM, EVENT_CALIBRATION_CANCELED, EVENT_CALIBRATION_COMPLETE, SCHEMATIC_SIZE,
};
use crate::settings::Settings;
use crate::storage::{BrowserSignatureStore, load_signatures, open_store};
use crate::touch::TouchSubscription;
use crate::utils::{RafClosure, context_2d, js_error, request_frame, sync_canvas_size};

struct BoxInputs {
    width: HtmlInputElement,
    height: HtmlInputElement,
    x_offset: HtmlInputElement,
    y_offset: HtmlInputElement,
    rotation: HtmlInputElement,
}

impl BoxInputs {
    fn all(&self) -> [&HtmlInputElement; 5] {
        [
            &self.width,
            &self.height,
            &self.x_offset,
            &self.y_offset,
            &self.rotation,
        ]
    }

    /// The edited box, or `None` while a field is blank or out of range.
    fn read(&self) -> Option<BoxConfig> {
        let [w, h, x, y, r] = self.all().map(|el| el.value().trim().parse::<f64>().ok());
        let cfg = BoxConfig {
            width: w?,
            height: h?,
            x_offset: x?,
            y_offset: y?,
            rotation_deg: r?,
        };
        let finite = [cfg.width, cfg.height, cfg.x_offset, cfg.y_offset, cfg.rotation_deg]
            .iter()
            .all(|v| v.is_finite());
        (finite && cfg.width > 0.0 && cfg.height > 0.0).then_some(cfg)
    }

    fn show(&self, cfg: &BoxConfig) {
        let values = [cfg.width, cfg.height, cfg.x_offset, cfg.y_offset, cfg.rotation_deg];
        for (el, v) in self.all().into_iter().zip(values) {
            el.set_value(&format!("{}", (v * 100.0).round() / 100.0));
        }
    }
}

struct Buttons {
    start: HtmlElement,
    confirm: HtmlElement,
    skip: HtmlElement,
    cancel: HtmlElement,
}

struct CalibrationUi {
    window: Window,
    host: HtmlElement,
    root: HtmlElement,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    status: HtmlElement,
    inputs: BoxInputs,
    buttons: Buttons,
    recorder: CalibrationRecorder,
    input: TouchInputAdapter,
    live: Vec<TouchPoint>,
    store: Option<BrowserSignatureStore>,
    /// Last outcome worth telling the operator about.
    notice: Option<String>,
    /// Object index whose box the fields currently show.
    shown_object: Option<usize>,
    announced: bool,
    dirty: bool,
    subscription: Option<TouchSubscription>,
    /// Set on teardown; the animation loop ends on its next frame.
    stopped: bool,
    handlers: Vec<Closure<dyn FnMut()>>,
}

/// Detail of the `calibration-complete` / `calibration-canceled` events.
#[derive(Serialize)]
struct Summary<'a> {
    recorded: &'a [KnownObjectSignature],
}

struct Announcement {
    host: HtmlElement,
    name: &'static str,
    detail: JsValue,
}

/// Returned to JS by `mountCalibration`.
#[wasm_bindgen]
pub struct CalibrationHandle {
    ui: Rc<RefCell<CalibrationUi>>,
}

#[wasm_bindgen]
impl CalibrationHandle {
    /// Stop listening and remove the element from its host.
    pub fn unmount(&self) {
        let mut ui = self.ui.borrow_mut();
        ui.teardown();
        ui.root.remove();
    }

    /// `preview`, `touch`, `bounding-box`, `complete` or `canceled`.
    pub fn phase(&self) -> String {
        phase_name(self.ui.borrow().recorder.phase()).to_string()
    }
}

/// Mount a calibration session inside `host`, covering every tracked object
/// in turn.
#[wasm_bindgen(js_name = mountCalibration)]
pub async fn mount_calibration(host: HtmlElement) -> Result<CalibrationHandle, JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let settings = Settings::from_window(&window);
    mount(window, host, &settings).await
}

pub async fn mount(
    window: Window,
    host: HtmlElement,
    settings: &Settings,
) -> Result<CalibrationHandle, JsValue> {
    let document = window.document().ok_or("no document")?;
    let store = open_store(&window);
    let current = load_signatures(&window, store.as_ref(), settings.presets.as_deref()).await;
    if current.is_empty() {
        return Err(JsValue::from_str("no objects to calibrate"));
    }
    let recorder = CalibrationRecorder::new(current, settings.calibration);

    let root: HtmlElement = create(&document, "div")?;
    root.set_class_name("tangible-calibration");
    let status: HtmlElement = create(&document, "p")?;
    let canvas: HtmlCanvasElement = create(&document, "canvas")?;
    canvas.set_attribute(
        "style",
        "display:block;width:100%;height:360px;touch-action:none;border:1px solid #ccc",
    )?;
    let ctx = context_2d(&canvas)?;

    let fields: HtmlElement = create(&document, "div")?;
    let inputs = BoxInputs {
        width: number_field(&document, &fields, "Width")?,
        height: number_field(&document, &fields, "Height")?,
        x_offset: number_field(&document, &fields, "X offset")?,
        y_offset: number_field(&document, &fields, "Y offset")?,
        rotation: number_field(&document, &fields, "Rotation (deg)")?,
    };
    let controls: HtmlElement = create(&document, "div")?;
    let buttons = Buttons {
        start: button(&document, &controls, "Start sampling")?,
        confirm: button(&document, &controls, "Confirm box")?,
        skip: button(&document, &controls, "Skip")?,
        cancel: button(&document, &controls, "Cancel")?,
    };
    for part in [&status, canvas.unchecked_ref::<HtmlElement>(), &fields, &controls] {
        root.append_child(part)?;
    }
    host.append_child(&root)?;

    let ui = Rc::new(RefCell::new(CalibrationUi {
        window,
        host,
        root,
        canvas: canvas.clone(),
        ctx,
        status,
        inputs,
        buttons,
        recorder,
        input: TouchInputAdapter::new(),
        live: Vec::new(),
        store,
        notice: None,
        shown_object: None,
        announced: false,
        dirty: true,
        subscription: None,
        stopped: false,
        handlers: Vec::new(),
    }));

    let weak = Rc::downgrade(&ui);
    let subscription = TouchSubscription::new(&canvas, move |frame| {
        if let Some(ui) = weak.upgrade() {
            on_frame(&ui, frame);
        }
    })?;
    ui.borrow_mut().subscription = Some(subscription);

    attach_controls(&ui);
    start_animation(&ui);
    ui.borrow_mut().refresh();
    info!("calibration mounted");
    Ok(CalibrationHandle { ui })
}

fn create<T: JsCast>(document: &Document, tag: &str) -> Result<T, JsValue> {
    document
        .create_element(tag)?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("<{tag}> has an unexpected type")))
}

fn number_field(
    document: &Document,
    parent: &HtmlElement,
    label: &str,
) -> Result<HtmlInputElement, JsValue> {
    let wrapper: HtmlElement = create(document, "label")?;
    wrapper.set_text_content(Some(label));
    wrapper.set_attribute("style", "display:inline-block;margin:4px 8px 4px 0")?;
    let input: HtmlInputElement = create(document, "input")?;
    input.set_type("number");
    input.set_attribute("step", "any")?;
    input.set_attribute("style", "width:6em;margin-left:4px")?;
    wrapper.append_child(&input)?;
    parent.append_child(&wrapper)?;
    Ok(input)
}

fn button(document: &Document, parent: &HtmlElement, text: &str) -> Result<HtmlElement, JsValue> {
    let el: HtmlElement = create(document, "button")?;
    el.set_attribute("type", "button")?;
    el.set_text_content(Some(text));
    parent.append_child(&el)?;
    Ok(el)
}

fn attach_controls(ui: &Rc<RefCell<CalibrationUi>>) {
    let weak = Rc::downgrade(ui);
    let mut handlers = Vec::new();
    let s = ui.borrow();

    let on_click = |el: &HtmlElement, action: fn(&Rc<RefCell<CalibrationUi>>)| {
        let weak = weak.clone();
        let handler = Closure::<dyn FnMut()>::wrap(Box::new(move || {
            if let Some(ui) = weak.upgrade() {
                action(&ui);
            }
        }));
        el.set_onclick(Some(handler.as_ref().unchecked_ref()));
        handler
    };
    handlers.push(on_click(&s.buttons.start, start_sampling));
    handlers.push(on_click(&s.buttons.confirm, confirm_box));
    handlers.push(on_click(&s.buttons.skip, skip));
    handlers.push(on_click(&s.buttons.cancel, cancel));

    for input in s.inputs.all() {
        handlers.push(on_edit(weak.clone(), input));
    }
    drop(s);
    ui.borrow_mut().handlers = handlers;
}

fn on_edit(weak: Weak<RefCell<CalibrationUi>>, input: &HtmlInputElement) -> Closure<dyn FnMut()> {
    let handler = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        if let Some(ui) = weak.upgrade() {
            let mut s = ui.borrow_mut();
            if let Some(cfg) = s.inputs.read() {
                s.recorder.set_box_config(cfg);
                s.dirty = true;
            }
        }
    }));
    input.set_oninput(Some(handler.as_ref().unchecked_ref()));
    handler
}

fn start_sampling(ui: &Rc<RefCell<CalibrationUi>>) {
    {
        let mut s = ui.borrow_mut();
        if let Some(cfg) = s.inputs.read() {
            s.recorder.set_box_config(cfg);
        }
        s.recorder.begin_sampling();
        s.notice = None;
    }
    apply(ui, None);
}

fn confirm_box(ui: &Rc<RefCell<CalibrationUi>>) {
    let out = {
        let mut s = ui.borrow_mut();
        if let Some(cfg) = s.inputs.read() {
            s.recorder.set_box_config(cfg);
        }
        s.recorder.confirm_box()
    };
    apply(ui, out);
}

fn skip(ui: &Rc<RefCell<CalibrationUi>>) {
    let out = {
        let mut s = ui.borrow_mut();
        if s.recorder.phase() == CalibrationPhase::BoundingBox {
            s.recorder.skip_box()
        } else {
            if s.recorder.skip_object() {
                info!("last object skipped");
            }
            s.notice = None;
            None
        }
    };
    apply(ui, out);
}

fn cancel(ui: &Rc<RefCell<CalibrationUi>>) {
    ui.borrow_mut().recorder.cancel();
    apply(ui, None);
}

fn on_frame(ui: &Rc<RefCell<CalibrationUi>>, frame: TouchFrame) {
    let out = {
        let mut s = ui.borrow_mut();
        let snapshot = s.input.apply(&frame);
        let out = s.recorder.on_touches(&snapshot);
        s.live = snapshot;
        s.dirty = true;
        out
    };
    if let Some(RecorderOutput::StartWindow {
        ticket,
        duration_ms,
    }) = out
    {
        arm_timer(ui, ticket, duration_ms);
        apply(ui, None);
    } else {
        apply(ui, out);
    }
}

/// One-shot timer closing the sampling window for `ticket`.
fn arm_timer(ui: &Rc<RefCell<CalibrationUi>>, ticket: SamplingTicket, duration_ms: u32) {
    let weak = Rc::downgrade(ui);
    let window = ui.borrow().window.clone();
    let callback = Closure::once_into_js(move || {
        if let Some(ui) = weak.upgrade() {
            let out = ui.borrow_mut().recorder.window_elapsed(ticket);
            apply(&ui, out);
        }
    });
    let timeout = duration_ms.min(i32::MAX as u32) as i32;
    if let Err(e) = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), timeout)
    {
        error!("could not arm sampling timer: {e:?}");
    }
}

/// Act on a recorder output, refresh the view and announce the end of the
/// session if it just ended. Events are dispatched with no borrow held.
fn apply(ui: &Rc<RefCell<CalibrationUi>>, out: Option<RecorderOutput>) {
    let announcement = {
        let mut s = ui.borrow_mut();
        match out {
            Some(RecorderOutput::Recorded { signature, .. }) => s.persist(&signature),
            Some(RecorderOutput::AwaitingBox { sides }) => {
                info!("awaiting box for sides {sides:?}");
                s.notice = Some("Lift the object, adjust the box, then confirm or skip.".into());
            }
            Some(RecorderOutput::Aborted) => {
                s.notice = Some("Touch count changed; sampling restarted.".into());
            }
            Some(RecorderOutput::StartWindow { .. }) | None => {}
        }
        s.refresh();
        s.settle()
    };
    if let Some(a) = announcement {
        dispatch(&a);
    }
}

fn dispatch(a: &Announcement) {
    let init = CustomEventInit::new();
    init.set_bubbles(true);
    init.set_detail(&a.detail);
    match CustomEvent::new_with_event_init_dict(a.name, &init) {
        Ok(event) => {
            if let Err(e) = a.host.dispatch_event(&event) {
                error!("{} listener failed: {e:?}", a.name);
            }
        }
        Err(e) => error!("could not create {}: {e:?}", a.name),
    }
}

impl CalibrationUi {
    /// Save a finished record. Failures are reported but never stop the flow.
    fn persist(&mut self, sig: &KnownObjectSignature) {
        self.notice = Some(match self.store.as_mut() {
            Some(store) => match store.save(sig) {
                Ok(()) => format!("Saved {}.", sig.id),
                Err(e) => {
                    error!("could not save signature for '{}': {e}", sig.id);
                    format!("Could not save {}: {e}", sig.id)
                }
            },
            None => {
                warn!("signature for '{}' not saved: no storage", sig.id);
                format!("{} recorded but not saved (storage unavailable).", sig.id)
            }
        });
    }

    /// Once the session is over: stop listening, stop drawing, and build the
    /// event to dispatch. Only ever returns `Some` once.
    fn settle(&mut self) -> Option<Announcement> {
        let name = match self.recorder.phase() {
            CalibrationPhase::Complete => EVENT_CALIBRATION_COMPLETE,
            CalibrationPhase::Canceled => EVENT_CALIBRATION_CANCELED,
            _ => return None,
        };
        if self.announced {
            return None;
        }
        self.announced = true;
        self.draw();
        self.teardown();
        info!(
            "calibration {}: {} record(s)",
            phase_name(self.recorder.phase()),
            self.recorder.recorded().len()
        );

        let summary = Summary {
            recorded: self.recorder.recorded(),
        };
        let detail = serde_json::to_string(&summary)
            .map_err(js_error)
            .and_then(|text| js_sys::JSON::parse(&text))
            .unwrap_or_else(|e| {
                error!("could not encode calibration summary: {e:?}");
                JsValue::NULL
            });
        Some(Announcement {
            host: self.host.clone(),
            name,
            detail,
        })
    }

    fn teardown(&mut self) {
        if let Some(sub) = self.subscription.as_mut() {
            sub.unsubscribe();
        }
        self.stopped = true;
    }

    /// Sync status text, button states and box fields with the recorder.
    fn refresh(&mut self) {
        let phase = self.recorder.phase();
        let (index, total) = self.recorder.progress();
        if self.recorder.current_object().is_some() && self.shown_object != Some(index) {
            self.inputs.show(self.recorder.box_config());
            self.shown_object = Some(index);
        }

        let object = self.recorder.current_object().unwrap_or_default();
        let step = format!("{object} ({}/{total})", index + 1);
        let mut text = match phase {
            CalibrationPhase::Preview => {
                format!("{step}: place the object, adjust the box, then start sampling.")
            }
            CalibrationPhase::Touch if self.recorder.awaiting_release() => {
                "Lift everything off the surface to continue.".to_string()
            }
            CalibrationPhase::Touch if self.recorder.is_sampling() => format!(
                "{step}: hold still, {} frame(s) sampled.",
                self.recorder.samples_collected()
            ),
            CalibrationPhase::Touch => format!("{step}: touch the surface with the object."),
            CalibrationPhase::BoundingBox => {
                format!("{step}: adjust the box, then confirm or skip.")
            }
            CalibrationPhase::Complete => format!(
                "Calibration complete: {} object(s) recorded.",
                self.recorder.recorded().len()
            ),
            CalibrationPhase::Canceled => "Calibration canceled.".to_string(),
        };
        if let Some(notice) = &self.notice {
            text.push(' ');
            text.push_str(notice);
        }
        self.status.set_text_content(Some(&text));

        let open = !matches!(phase, CalibrationPhase::Complete | CalibrationPhase::Canceled);
        enable(&self.buttons.start, phase == CalibrationPhase::Preview);
        enable(&self.buttons.confirm, phase == CalibrationPhase::BoundingBox);
        enable(&self.buttons.skip, open);
        enable(&self.buttons.cancel, open);
        self.dirty = true;
    }

    fn draw(&mut self) {
        let dpr = self.window.device_pixel_ratio();
        let ctx = &self.ctx;
        clear(ctx, self.canvas.width(), self.canvas.height(), dpr);

        for t in &self.live {
            draw_crosshair(ctx, Point::new(t.x, t.y), CROSSHAIR_ARM, "#c0392b");
        }
        if self.live.len() == 3 {
            let tri: Vec<Point> = self.live.iter().map(|t| Point::new(t.x, t.y)).collect();
            draw_polygon(ctx, &tri, None, "#c0392b");
        }
        match self.recorder.phase() {
            CalibrationPhase::Preview | CalibrationPhase::Touch => {
                if let Some(fp) = self.recorder.preview_footprint(&self.live) {
                    draw_polygon(ctx, &fp.corners(), Some("rgba(52, 152, 219, 0.25)"), "#2980b9");
                    draw_heading(ctx, fp.center, fp.rotation, fp.width / 2.0, "#2980b9");
                }
            }
            CalibrationPhase::BoundingBox => {
                if let Some(sides) = self.recorder.pending_sides() {
                    let diagram = schematic(sides, self.recorder.box_config(), SCHEMATIC_SIZE);
                    draw_polygon(ctx, &diagram.triangle, None, "#c0392b");
                    draw_polygon(ctx, &diagram.rect, Some("rgba(52, 152, 219, 0.25)"), "#2980b9");
                }
            }
            CalibrationPhase::Complete | CalibrationPhase::Canceled => {}
        }
        self.dirty = false;
    }
}

fn enable(el: &HtmlElement, on: bool) {
    let _ = if on {
        el.remove_attribute("disabled")
    } else {
        el.set_attribute("disabled", "")
    };
}

fn phase_name(phase: CalibrationPhase) -> &'static str {
    match phase {
        CalibrationPhase::Preview => "preview",
        CalibrationPhase::Touch => "touch",
        CalibrationPhase::BoundingBox => "bounding-box",
        CalibrationPhase::Complete => "complete",
        CalibrationPhase::Canceled => "canceled",
    }
}

fn start_animation(ui: &Rc<RefCell<CalibrationUi>>) {
    let weak = Rc::downgrade(ui);
    let f: Rc<RefCell<Option<RafClosure>>> = Rc::new(RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
        let running = weak.upgrade().is_some_and(|ui| {
            let mut s = ui.borrow_mut();
            if s.stopped {
                return false;
            }
            if sync_canvas_size(&s.window, &s.canvas) {
                s.dirty = true;
            }
            if s.dirty {
                s.draw();
            }
            true
        });
        if running {
            request_frame(&f);
        } else {
            // No frame is pending any more, so the loop can release itself.
            f.borrow_mut().take();
        }
    }) as Box<dyn FnMut(f64)>));
    request_frame(&g);
}
