use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

use tangible_core::Point;

// Style setters via property assignment; the typed setters are deprecated.
pub fn set_fill_style(ctx: &CanvasRenderingContext2d, color: &str) {
    let _ = js_sys::Reflect::set(
        ctx.as_ref(),
        &JsValue::from_str("fillStyle"),
        &JsValue::from_str(color),
    );
}

pub fn set_stroke_style(ctx: &CanvasRenderingContext2d, color: &str) {
    let _ = js_sys::Reflect::set(
        ctx.as_ref(),
        &JsValue::from_str("strokeStyle"),
        &JsValue::from_str(color),
    );
}

/// Closed polygon, filled when `fill` is given.
pub fn draw_polygon(
    ctx: &CanvasRenderingContext2d,
    pts: &[Point],
    fill: Option<&str>,
    stroke: &str,
) {
    let Some((first, rest)) = pts.split_first() else {
        return;
    };
    ctx.begin_path();
    ctx.move_to(first.x, first.y);
    for p in rest {
        ctx.line_to(p.x, p.y);
    }
    ctx.close_path();
    if let Some(color) = fill {
        set_fill_style(ctx, color);
        ctx.fill();
    }
    ctx.set_line_width(2.0);
    set_stroke_style(ctx, stroke);
    ctx.stroke();
}

pub fn draw_ring(ctx: &CanvasRenderingContext2d, center: Point, radius: f64, color: &str) {
    ctx.begin_path();
    let _ = ctx.arc(center.x, center.y, radius, 0.0, std::f64::consts::TAU);
    ctx.set_line_width(3.0);
    set_stroke_style(ctx, color);
    ctx.stroke();
}

pub fn draw_crosshair(ctx: &CanvasRenderingContext2d, center: Point, arm: f64, color: &str) {
    ctx.begin_path();
    ctx.move_to(center.x - arm, center.y);
    ctx.line_to(center.x + arm, center.y);
    ctx.move_to(center.x, center.y - arm);
    ctx.line_to(center.x, center.y + arm);
    ctx.set_line_width(1.5);
    set_stroke_style(ctx, color);
    ctx.stroke();
}

/// Short line from `center` along `angle`, marking which way an object faces.
pub fn draw_heading(
    ctx: &CanvasRenderingContext2d,
    center: Point,
    angle: f64,
    len: f64,
    color: &str,
) {
    ctx.begin_path();
    ctx.move_to(center.x, center.y);
    ctx.line_to(center.x + len * angle.cos(), center.y + len * angle.sin());
    ctx.set_line_width(2.0);
    set_stroke_style(ctx, color);
    ctx.stroke();
}

pub fn draw_label(ctx: &CanvasRenderingContext2d, text: &str, at: Point, color: &str) {
    ctx.set_font("14px sans-serif");
    set_fill_style(ctx, color);
    let _ = ctx.fill_text(text, at.x, at.y);
}

/// Wipe the canvas and scale drawing to CSS pixels.
pub fn clear(ctx: &CanvasRenderingContext2d, width: u32, height: u32, dpr: f64) {
    let _ = ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
    ctx.clear_rect(0.0, 0.0, width as f64, height as f64);
    let _ = ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
}
