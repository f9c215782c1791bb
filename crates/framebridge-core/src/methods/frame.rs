//! `Frame`: scripts, events, child regions, strata and attributes.

use super::{LuaResult, MethodCtx};
use crate::bridge::CreateRequest;
use crate::callbacks::{CallbackArgs, ScriptSlot};
use crate::class::NativeMethod;
use crate::handle::Handle;
use crate::widget::{self, STRATA, WidgetKind};
use mlua::{MultiValue, Value};

pub const METHODS: &[(&str, NativeMethod)] = &[
    ("Show", show),
    ("Hide", hide),
    ("SetShown", set_shown),
    ("SetScript", set_script),
    ("GetScript", get_script),
    ("HookScript", hook_script),
    ("HasScript", has_script),
    ("RegisterEvent", register_event),
    ("UnregisterEvent", unregister_event),
    ("UnregisterAllEvents", unregister_all_events),
    ("IsEventRegistered", is_event_registered),
    ("GetChildren", get_children),
    ("GetNumChildren", get_num_children),
    ("GetRegions", get_regions),
    ("GetNumRegions", get_num_regions),
    ("CreateTexture", create_texture),
    ("CreateFontString", create_font_string),
    ("CreateLine", create_line),
    ("SetFrameStrata", set_frame_strata),
    ("GetFrameStrata", get_frame_strata),
    ("SetFrameLevel", set_frame_level),
    ("GetFrameLevel", get_frame_level),
    ("EnableMouse", enable_mouse),
    ("IsMouseEnabled", is_mouse_enabled),
    ("EnableKeyboard", enable_keyboard),
    ("IsKeyboardEnabled", is_keyboard_enabled),
    ("SetMovable", set_movable),
    ("IsMovable", is_movable),
    ("SetAttribute", set_attribute),
    ("GetAttribute", get_attribute),
    ("SetID", set_id),
    ("GetID", get_id),
];

/// Set the shown flag and fire `OnShow`/`OnHide` when it changed.
fn set_visibility<'lua>(ctx: &MethodCtx<'lua, '_>, shown: bool) -> LuaResult<MultiValue<'lua>> {
    let changed = ctx.with_core(|core| std::mem::replace(&mut core.shown, shown) != shown)?;
    if changed {
        let slot = if shown {
            ScriptSlot::OnShow
        } else {
            ScriptSlot::OnHide
        };
        ctx.bridge
            .invoke_handlers(ctx.lua, ctx.this, slot, &CallbackArgs::None)?;
    }
    ctx.none()
}

fn show<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    set_visibility(&ctx, true)
}

fn hide<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    set_visibility(&ctx, false)
}

fn set_shown<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let shown = ctx.truthy(0);
    set_visibility(&ctx, shown)
}

fn script_slot(ctx: &MethodCtx<'_, '_>, idx: usize) -> LuaResult<ScriptSlot> {
    let name = ctx.string(idx)?;
    name.parse()
        .map_err(|_| ctx.bad_argument(idx, &format!("unknown script '{name}'")))
}

fn set_script<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let slot = script_slot(&ctx, 0)?;
    let handler = ctx.opt_function(1)?;
    ctx.bridge.set_script(ctx.lua, ctx.this, slot, handler)?;
    ctx.none()
}

fn get_script<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let slot = script_slot(&ctx, 0)?;
    let handler = ctx.bridge.get_script(ctx.lua, ctx.this, slot)?;
    ctx.ret(handler)
}

fn hook_script<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let slot = script_slot(&ctx, 0)?;
    let handler = ctx.function(1)?;
    ctx.bridge.hook_script(ctx.lua, ctx.this, slot, handler)?;
    ctx.none()
}

fn has_script<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    ctx.ret(name.parse::<ScriptSlot>().is_ok())
}

fn event_name(ctx: &MethodCtx<'_, '_>) -> LuaResult<String> {
    let event = ctx.string(0)?;
    if event.is_empty() {
        return Err(ctx.bad_argument(0, "event name must not be empty"));
    }
    Ok(event)
}

fn register_event<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let event = event_name(&ctx)?;
    ctx.ret(ctx.bridge.register_event(ctx.this, &event))
}

fn unregister_event<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let event = event_name(&ctx)?;
    ctx.ret(ctx.bridge.unregister_event(ctx.this, &event))
}

fn unregister_all_events<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.bridge.unregister_all_events(ctx.this);
    ctx.none()
}

fn is_event_registered<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let event = event_name(&ctx)?;
    ctx.ret(ctx.bridge.events().is_subscribed(ctx.this, &event))
}

fn children_where(ctx: &MethodCtx<'_, '_>, keep: impl Fn(WidgetKind) -> bool) -> LuaResult<Vec<Handle>> {
    let children = ctx.with_core(|core| core.children.clone())?;
    Ok(children
        .into_iter()
        .filter(|child| ctx.bridge.kind_of(*child).is_some_and(&keep))
        .collect())
}

fn is_region(kind: WidgetKind) -> bool {
    matches!(
        kind,
        WidgetKind::Texture | WidgetKind::FontString | WidgetKind::Line
    )
}

fn get_children<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let children = children_where(&ctx, WidgetKind::is_frame)?;
    ctx.ret_objects(&children)
}

fn get_num_children<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(children_where(&ctx, WidgetKind::is_frame)?.len())
}

fn get_regions<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let regions = children_where(&ctx, is_region)?;
    ctx.ret_objects(&regions)
}

fn get_num_regions<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(children_where(&ctx, is_region)?.len())
}

/// `CreateTexture`, `CreateFontString` and `CreateLine` share the
/// `(name?, layer?, template?, sublevel?)` argument list.
fn create_region<'lua>(ctx: &MethodCtx<'lua, '_>, kind: WidgetKind) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.opt_string(0)?;
    let layer = match ctx.opt_string(1)? {
        Some(layer) => Some(
            widget::draw_layer(&layer)
                .ok_or_else(|| ctx.bad_argument(1, &format!("unknown draw layer '{layer}'")))?,
        ),
        None => None,
    };
    let template = ctx.opt_string(2)?;
    let sublevel = match ctx.opt_number(3)? {
        Some(_) => ctx.integer(3)?.clamp(-8, 7),
        None => 0,
    };

    let mut request = CreateRequest::new(kind).parent(ctx.this);
    if let Some(name) = name {
        request = request.named(name);
    }
    if let Some(template) = template {
        request = request.template(template);
    }
    let (handle, wrapper) = ctx.bridge.create_object(ctx.lua, request)?;
    ctx.bridge.with_core(handle, |core| {
        if let Some(layer) = layer {
            core.draw_layer = layer;
        }
        core.sublevel = sublevel;
    });
    ctx.ret(wrapper)
}

fn create_texture<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    create_region(&ctx, WidgetKind::Texture)
}

fn create_font_string<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    create_region(&ctx, WidgetKind::FontString)
}

fn create_line<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    create_region(&ctx, WidgetKind::Line)
}

fn set_frame_strata<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    let strata = STRATA
        .iter()
        .copied()
        .find(|s| s.eq_ignore_ascii_case(&name))
        .ok_or_else(|| ctx.bad_argument(0, &format!("unknown frame strata '{name}'")))?;
    ctx.with_frame(|frame| frame.strata = strata)?;
    ctx.none()
}

fn get_frame_strata<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_frame(|frame| frame.strata)?)
}

fn set_frame_level<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let level = ctx.integer(0)?;
    if level < 0 {
        return Err(ctx.bad_argument(0, "frame level must not be negative"));
    }
    ctx.with_frame(|frame| frame.level = level)?;
    ctx.none()
}

fn get_frame_level<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_frame(|frame| frame.level)?)
}

fn enable_mouse<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let enabled = ctx.truthy(0);
    ctx.with_frame(|frame| frame.mouse_enabled = enabled)?;
    ctx.none()
}

fn is_mouse_enabled<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_frame(|frame| frame.mouse_enabled)?)
}

fn enable_keyboard<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let enabled = ctx.truthy(0);
    ctx.with_frame(|frame| frame.keyboard_enabled = enabled)?;
    ctx.none()
}

fn is_keyboard_enabled<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_frame(|frame| frame.keyboard_enabled)?)
}

fn set_movable<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let movable = ctx.truthy(0);
    ctx.with_frame(|frame| frame.movable = movable)?;
    ctx.none()
}

fn is_movable<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_frame(|frame| frame.movable)?)
}

fn set_attribute<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    let value = ctx.bridge.lua_to_script(ctx.value(1))?;
    ctx.with_frame(|frame| {
        if value.is_nil() {
            frame.attributes.remove(&name);
        } else {
            frame.attributes.insert(name, value);
        }
    })?;
    ctx.none()
}

fn get_attribute<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.string(0)?;
    let value = ctx.with_frame(|frame| frame.attributes.get(&name).cloned())?;
    let value = match value {
        Some(value) => ctx.bridge.script_to_lua(ctx.lua, &value)?,
        None => Value::Nil,
    };
    ctx.ret(value)
}

fn set_id<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let id = ctx.integer(0)?;
    ctx.with_core(|core| core.id = id)?;
    ctx.none()
}

fn get_id<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_core(|core| core.id)?)
}
