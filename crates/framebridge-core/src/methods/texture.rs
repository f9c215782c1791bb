//! `Texture`, `Line` and `FontString`.

use super::region::{anchor, color_args};
use super::{LuaResult, MethodCtx};
use crate::class::NativeMethod;
use crate::widget::{self, FontString, Line, LineEnd};
use mlua::{Function, MultiValue, Table, Value};

pub const TEXTURE_METHODS: &[(&str, NativeMethod)] = &[
    ("SetTexture", set_texture),
    ("GetTexture", get_texture),
    ("SetAtlas", set_atlas),
    ("GetAtlas", get_atlas),
    ("SetColorTexture", set_color_texture),
    ("SetTexCoord", set_tex_coord),
    ("GetTexCoord", get_tex_coord),
    ("SetDesaturated", set_desaturated),
    ("IsDesaturated", is_desaturated),
];

pub const LINE_METHODS: &[(&str, NativeMethod)] = &[
    ("SetStartPoint", set_start_point),
    ("SetEndPoint", set_end_point),
    ("GetStartPoint", get_start_point),
    ("GetEndPoint", get_end_point),
    ("SetThickness", set_thickness),
    ("GetThickness", get_thickness),
];

pub const FONT_STRING_METHODS: &[(&str, NativeMethod)] = &[
    ("SetText", set_text),
    ("GetText", get_text),
    ("SetFormattedText", set_formatted_text),
    ("SetFont", set_font),
    ("GetFont", get_font),
    ("SetJustifyH", set_justify_h),
    ("GetJustifyH", get_justify_h),
    ("SetTextColor", set_text_color),
    ("GetTextColor", get_text_color),
    ("GetStringWidth", get_string_width),
];

// ── Texture ───────────────────────────────────────────────────

/// `SetTexture(file | fileID | nil)`; returns true.
fn set_texture<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let file = ctx.opt_string(0)?;
    ctx.with_texture(|texture| {
        texture.file = file;
        texture.atlas = None;
        texture.color = None;
    })?;
    ctx.ret(true)
}

fn get_texture<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let file = ctx.with_texture(|texture| texture.file.clone().or_else(|| texture.atlas.clone()))?;
    ctx.ret(file)
}

fn set_atlas<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let atlas = ctx.string(0)?;
    if atlas.is_empty() {
        return Err(ctx.bad_argument(0, "atlas name must not be empty"));
    }
    ctx.with_texture(|texture| {
        texture.atlas = Some(atlas);
        texture.file = None;
        texture.color = None;
    })?;
    ctx.ret(true)
}

fn get_atlas<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_texture(|texture| texture.atlas.clone())?)
}

fn set_color_texture<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let color = color_args(&ctx, 0)?;
    ctx.with_texture(|texture| {
        texture.color = Some(color);
        texture.file = None;
        texture.atlas = None;
    })?;
    ctx.none()
}

/// `SetTexCoord(left, right, top, bottom)`
fn set_tex_coord<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let coords = [
        ctx.number(0)?,
        ctx.number(1)?,
        ctx.number(2)?,
        ctx.number(3)?,
    ];
    ctx.with_texture(|texture| texture.tex_coords = coords)?;
    ctx.none()
}

/// Corner coordinates: upper-left, lower-left, upper-right, lower-right.
fn get_tex_coord<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let [left, right, top, bottom] = ctx.with_texture(|texture| texture.tex_coords)?;
    ctx.ret((left, top, left, bottom, right, top, right, bottom))
}

fn set_desaturated<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let desaturated = ctx.truthy(0);
    ctx.with_texture(|texture| texture.desaturated = desaturated)?;
    ctx.none()
}

fn is_desaturated<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_texture(|texture| texture.desaturated)?)
}

// ── Line ──────────────────────────────────────────────────────

fn with_line<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut Line) -> R) -> LuaResult<R> {
    let line = ctx.line()?;
    let mut guard = widget::lock(&line);
    Ok(f(&mut guard))
}

/// `(point [, relativeTo] [, x, y])`; an omitted `relativeTo` means the
/// parent, an explicit nil the screen.
fn line_end(ctx: &MethodCtx<'_, '_>) -> LuaResult<LineEnd> {
    let point = anchor(ctx, 0)?;
    let (relative_to, next) = if ctx.len() <= 1 || matches!(ctx.value(1), Value::Integer(_) | Value::Number(_)) {
        (ctx.with_core(|core| core.parent)?, 1)
    } else {
        (ctx.opt_object(1)?, 2)
    };
    Ok(LineEnd {
        point,
        relative_to,
        x: ctx.number_or(next, 0.0)?,
        y: ctx.number_or(next + 1, 0.0)?,
    })
}

fn set_start_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let end = line_end(&ctx)?;
    with_line(&ctx, |line| line.start = Some(end))?;
    ctx.none()
}

fn set_end_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let end = line_end(&ctx)?;
    with_line(&ctx, |line| line.end = Some(end))?;
    ctx.none()
}

fn ret_line_end<'lua>(ctx: &MethodCtx<'lua, '_>, end: Option<LineEnd>) -> LuaResult<MultiValue<'lua>> {
    let Some(end) = end else {
        return ctx.none();
    };
    let relative = match end.relative_to {
        Some(handle) => ctx.bridge.wrapper_of(ctx.lua, handle)?,
        None => Value::Nil,
    };
    ctx.ret((end.point, relative, end.x, end.y))
}

fn get_start_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let end = with_line(&ctx, |line| line.start.clone())?;
    ret_line_end(&ctx, end)
}

fn get_end_point<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let end = with_line(&ctx, |line| line.end.clone())?;
    ret_line_end(&ctx, end)
}

fn set_thickness<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let thickness = ctx.number(0)?;
    if thickness < 0.0 {
        return Err(ctx.bad_argument(0, "thickness must not be negative"));
    }
    with_line(&ctx, |line| line.thickness = thickness)?;
    ctx.none()
}

fn get_thickness<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_line(&ctx, |line| line.thickness)?)
}

// ── FontString ────────────────────────────────────────────────

fn with_font_string<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut FontString) -> R) -> LuaResult<R> {
    let font_string = ctx.font_string()?;
    let mut guard = widget::lock(&font_string);
    Ok(f(&mut guard))
}

fn set_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let text = ctx.opt_string(0)?;
    with_font_string(&ctx, |fs| fs.text = text)?;
    ctx.none()
}

fn get_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_font_string(&ctx, |fs| fs.text.clone())?)
}

/// Formats with the script's own `string.format`.
fn set_formatted_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.string(0)?;
    let string: Table = ctx.lua.globals().get("string")?;
    let format: Function = string.get("format")?;
    let text: String = format.call(MultiValue::from_vec(ctx.rest(0)))?;
    with_font_string(&ctx, |fs| fs.text = Some(text))?;
    ctx.none()
}

/// `SetFont(path, size [, flags])`; returns true.
fn set_font<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let path = ctx.string(0)?;
    let size = ctx.number(1)?;
    if size <= 0.0 {
        return Err(ctx.bad_argument(1, "font size must be positive"));
    }
    let flags = ctx.opt_string(2)?.unwrap_or_default();
    with_font_string(&ctx, |fs| {
        fs.font.path = Some(path);
        fs.font.size = size;
        fs.font.flags = flags;
    })?;
    ctx.ret(true)
}

fn get_font<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let font = with_font_string(&ctx, |fs| fs.font.clone())?;
    ctx.ret((font.path, font.size, font.flags))
}

fn set_justify_h<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    let justify = ["LEFT", "CENTER", "RIGHT"]
        .into_iter()
        .find(|j| j.eq_ignore_ascii_case(&name))
        .ok_or_else(|| ctx.bad_argument(0, &format!("unknown justification '{name}'")))?;
    with_font_string(&ctx, |fs| fs.justify_h = justify)?;
    ctx.none()
}

fn get_justify_h<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_font_string(&ctx, |fs| fs.justify_h)?)
}

fn set_text_color<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let color = color_args(&ctx, 0)?;
    with_font_string(&ctx, |fs| fs.text_color = color)?;
    ctx.none()
}

fn get_text_color<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let color = with_font_string(&ctx, |fs| fs.text_color)?;
    ctx.ret((color.r, color.g, color.b, color.a))
}

fn get_string_width<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_font_string(&ctx, |fs| fs.string_width())?)
}
