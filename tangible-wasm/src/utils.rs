use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, DomRect, HtmlCanvasElement, Window};

use tangible_core::Point;

/// Look up a canvas by id and take its 2D context.
pub fn init_canvas(
    document: &Document,
    id: &str,
) -> Result<(HtmlCanvasElement, CanvasRenderingContext2d), JsValue> {
    let cv = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("canvas #{id} not found")))?
        .dyn_into::<HtmlCanvasElement>()?;
    let ctx = context_2d(&cv)?;
    Ok((cv, ctx))
}

pub fn context_2d(cv: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    cv.get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2D context not available"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

/// Match the canvas backing store to its CSS size times the device pixel
/// ratio. Returns true when the size changed.
pub fn sync_canvas_size(window: &Window, canvas: &HtmlCanvasElement) -> bool {
    let dpr = window.device_pixel_ratio();
    let rect = canvas.get_bounding_client_rect();
    let css_w = rect.width().max(1.0);
    let css_h = rect.height().max(1.0);
    let target_w = (css_w * dpr).round().clamp(1.0, 10000.0) as u32;
    let target_h = (css_h * dpr).round().clamp(1.0, 10000.0) as u32;
    let mut changed = false;
    if canvas.width() != target_w {
        canvas.set_width(target_w);
        changed = true;
    }
    if canvas.height() != target_h {
        canvas.set_height(target_h);
        changed = true;
    }
    changed
}

/// Client coordinates relative to the top-left corner of `rect`.
pub fn element_local(rect: &DomRect, client_x: f64, client_y: f64) -> Point {
    Point::new(client_x - rect.left(), client_y - rect.top())
}

/// Fetch a text resource trying a list of fallback URLs in order.
pub async fn fetch_text_with_fallbacks(window: &Window, urls: &[&str]) -> Option<String> {
    for url in urls {
        let resp_value =
            match wasm_bindgen_futures::JsFuture::from(window.fetch_with_str(url)).await {
                Ok(v) => v,
                Err(_) => continue,
            };
        let resp: web_sys::Response = match resp_value.dyn_into() {
            Ok(r) => r,
            Err(_) => continue,
        };
        if !resp.ok() {
            log::debug!("{url}: HTTP {}", resp.status());
            continue;
        }
        if let Ok(text_promise) = resp.text()
            && let Ok(text_js) = wasm_bindgen_futures::JsFuture::from(text_promise).await
            && let Some(s) = text_js.as_string()
        {
            return Some(s);
        }
    }
    None
}

/// Simple query string parser used at start-up.
pub fn get_query_param(search: &str, key: &str) -> Option<String> {
    let s = search.trim_start_matches('?');
    for pair in s.split('&') {
        let mut it = pair.splitn(2, '=');
        let k = it.next()?;
        let v = it.next().unwrap_or("");
        if k == key {
            return Some(url_decode(v));
        }
    }
    None
}

fn url_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8()
        .unwrap_or_else(|_| s.into())
        .to_string()
}

/// Asset URL candidates for `path`, relative first.
pub fn asset_candidates(path: &str) -> Vec<String> {
    let p = path.trim().trim_start_matches("./").trim_start_matches('/');
    if path.starts_with("http://") || path.starts_with("https://") {
        return vec![path.to_string()];
    }
    vec![p.to_string(), format!("./{p}"), format!("/{p}")]
}

pub fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

pub type RafClosure = Closure<dyn FnMut(f64)>;

/// Schedule the animation-frame callback held in `f`, if it is still set.
/// Clearing the slot ends the loop.
pub fn request_frame(f: &Rc<RefCell<Option<RafClosure>>>) {
    if let Some(window) = web_sys::window()
        && let Some(cb) = f.borrow().as_ref()
    {
        let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
    }
}
