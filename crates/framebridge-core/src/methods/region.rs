//! `ScriptRegion` (visibility, size, anchors, parent) and `Region`
//! (alpha, draw layer, vertex color).

use super::{LuaResult, MethodCtx};
use crate::class::NativeMethod;
use crate::handle::Handle;
use crate::widget::{self, Color, Point};
use mlua::{MultiValue, Value};

pub const SCRIPT_REGION_METHODS: &[(&str, NativeMethod)] = &[
    ("Show", show),
    ("Hide", hide),
    ("SetShown", set_shown),
    ("IsShown", is_shown),
    ("IsVisible", is_visible),
    ("SetSize", set_size),
    ("GetSize", get_size),
    ("SetWidth", set_width),
    ("GetWidth", get_width),
    ("SetHeight", set_height),
    ("GetHeight", get_height),
    ("SetPoint", set_point),
    ("GetPoint", get_point),
    ("GetNumPoints", get_num_points),
    ("ClearAllPoints", clear_all_points),
    ("SetAllPoints", set_all_points),
    ("SetParent", set_parent),
];

pub const REGION_METHODS: &[(&str, NativeMethod)] = &[
    ("SetAlpha", set_alpha),
    ("GetAlpha", get_alpha),
    ("SetDrawLayer", set_draw_layer),
    ("GetDrawLayer", get_draw_layer),
    ("SetVertexColor", set_vertex_color),
    ("GetVertexColor", get_vertex_color),
];

fn show<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.with_core(|core| core.shown = true)?;
    ctx.none()
}

fn hide<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.with_core(|core| core.shown = false)?;
    ctx.none()
}

fn set_shown<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let shown = ctx.truthy(0);
    ctx.with_core(|core| core.shown = shown)?;
    ctx.none()
}

fn is_shown<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let shown = ctx.with_core(|core| core.shown)?;
    ctx.ret(shown)
}

fn is_visible<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.bridge.is_visible(ctx.this))
}

fn dimension(ctx: &MethodCtx<'_, '_>, idx: usize) -> LuaResult<f64> {
    let value = ctx.number(idx)?;
    if !value.is_finite() {
        return Err(ctx.bad_argument(idx, "size must be finite"));
    }
    Ok(value.max(0.0))
}

fn set_size<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let width = dimension(&ctx, 0)?;
    let height = match ctx.opt_number(1)? {
        Some(_) => dimension(&ctx, 1)?,
        None => width,
    };
    ctx.with_core(|core| {
        core.width = width;
        core.height = height;
    })?;
    ctx.none()
}

fn get_size<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let size = ctx.with_core(|core| (core.width, core.height))?;
    ctx.ret(size)
}

fn set_width<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let width = dimension(&ctx, 0)?;
    ctx.with_core(|core| core.width = width)?;
    ctx.none()
}

fn get_width<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let width = ctx.with_core(|core| core.width)?;
    ctx.ret(width)
}

fn set_height<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let height = dimension(&ctx, 0)?;
    ctx.with_core(|core| core.height = height)?;
    ctx.none()
}

fn get_height<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let height = ctx.with_core(|core| core.height)?;
    ctx.ret(height)
}

pub(super) fn anchor(ctx: &MethodCtx<'_, '_>, idx: usize) -> LuaResult<&'static str> {
    let name = ctx.string(idx)?;
    widget::anchor_point(&name)
        .ok_or_else(|| ctx.bad_argument(idx, &format!("unknown anchor point '{name}'")))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::Number(_))
}

/// `SetPoint(point [, relativeTo [, relativePoint]] [, x, y])`
///
/// An omitted `relativeTo` anchors to the parent; an explicit nil anchors
/// to the screen.
fn set_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let point = anchor(&ctx, 0)?;
    let parent = ctx.with_core(|core| core.parent)?;
    let (relative_to, next) = if ctx.len() <= 1 || is_number(&ctx.value(1)) {
        (parent, 1)
    } else {
        (ctx.opt_object(1)?, 2)
    };
    if relative_to == Some(ctx.this) {
        return Err(ctx.bad_argument(1, "cannot anchor to itself"));
    }
    let (relative_point, next) = match ctx.value(next) {
        Value::String(_) => (anchor(&ctx, next)?, next + 1),
        _ => (point, next),
    };
    let x = ctx.number_or(next, 0.0)?;
    let y = ctx.number_or(next + 1, 0.0)?;

    let new_point = Point {
        point,
        relative_to,
        relative_point,
        x,
        y,
    };
    ctx.with_core(|core| {
        match core.points.iter_mut().find(|p| p.point == point) {
            Some(existing) => *existing = new_point,
            None => core.points.push(new_point),
        }
    })?;
    ctx.none()
}

fn get_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let position = match ctx.opt_number(0)? {
        Some(_) => ctx.position(0)?,
        None => Some(0),
    };
    let Some(point) = ctx.with_core(|core| position.and_then(|idx| core.points.get(idx).cloned()))?
    else {
        return ctx.none();
    };
    let relative = match point.relative_to {
        Some(handle) => ctx.bridge.wrapper_of(ctx.lua, handle)?,
        None => Value::Nil,
    };
    ctx.ret((
        point.point,
        relative,
        point.relative_point,
        point.x,
        point.y,
    ))
}

fn get_num_points<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let count = ctx.with_core(|core| core.points.len())?;
    ctx.ret(count)
}

fn clear_all_points<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.with_core(|core| core.points.clear())?;
    ctx.none()
}

fn set_all_points<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let relative_to: Option<Handle> = match ctx.opt_object(0)? {
        Some(handle) => Some(handle),
        None => ctx.with_core(|core| core.parent)?,
    };
    ctx.with_core(|core| {
        core.points = ["TOPLEFT", "BOTTOMRIGHT"]
            .into_iter()
            .map(|point| Point {
                point,
                relative_to,
                relative_point: point,
                x: 0.0,
                y: 0.0,
            })
            .collect();
    })?;
    ctx.none()
}

fn set_parent<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let parent = ctx.opt_object(0)?;
    ctx.bridge
        .set_parent(ctx.this, parent)
        .map_err(|err| ctx.bad_argument(0, &err.to_string()))?;
    ctx.none()
}

fn set_alpha<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let alpha = ctx.number(0)?.clamp(0.0, 1.0);
    ctx.with_core(|core| core.alpha = alpha)?;
    ctx.none()
}

fn get_alpha<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let alpha = ctx.with_core(|core| core.alpha)?;
    ctx.ret(alpha)
}

fn set_draw_layer<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    let layer = widget::draw_layer(&name)
        .ok_or_else(|| ctx.bad_argument(0, &format!("unknown draw layer '{name}'")))?;
    let sublevel = match ctx.opt_number(1)? {
        Some(_) => ctx.integer(1)?,
        None => 0,
    };
    if !(-8..=7).contains(&sublevel) {
        return Err(ctx.bad_argument(1, "sublevel must be between -8 and 7"));
    }
    ctx.with_core(|core| {
        core.draw_layer = layer;
        core.sublevel = sublevel;
    })?;
    ctx.none()
}

fn get_draw_layer<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let layer = ctx.with_core(|core| (core.draw_layer, core.sublevel))?;
    ctx.ret(layer)
}

pub(super) fn color_args(ctx: &MethodCtx<'_, '_>, first: usize) -> LuaResult<Color> {
    Ok(Color::new(
        ctx.number(first)?,
        ctx.number(first + 1)?,
        ctx.number(first + 2)?,
        ctx.number_or(first + 3, 1.0)?,
    ))
}

fn set_vertex_color<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let color = color_args(&ctx, 0)?;
    ctx.with_core(|core| core.vertex_color = color)?;
    ctx.none()
}

fn get_vertex_color<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let color = ctx.with_core(|core| core.vertex_color)?;
    ctx.ret((color.r, color.g, color.b, color.a))
}
