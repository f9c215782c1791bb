//! `Button`, `EditBox` and `GameTooltip`.

use super::{LuaResult, MethodCtx};
use crate::callbacks::{CallbackArgs, ScriptSlot};
use crate::class::NativeMethod;
use crate::widget::{ButtonState, EditBoxState, FrameExtra, TooltipLine, TooltipState};
use mlua::MultiValue;

pub const BUTTON_METHODS: &[(&str, NativeMethod)] = &[
    ("SetText", button_set_text),
    ("GetText", button_get_text),
    ("Enable", enable),
    ("Disable", disable),
    ("SetEnabled", set_enabled),
    ("IsEnabled", is_enabled),
    ("Click", click),
];

pub const EDIT_BOX_METHODS: &[(&str, NativeMethod)] = &[
    ("SetText", edit_set_text),
    ("GetText", edit_get_text),
    ("Insert", insert),
    ("SetFocus", set_focus),
    ("ClearFocus", clear_focus),
    ("HasFocus", has_focus),
    ("SetMaxLetters", set_max_letters),
    ("GetMaxLetters", get_max_letters),
    ("SetNumeric", set_numeric),
    ("IsNumeric", is_numeric),
    ("GetNumber", get_number),
    ("GetCursorPosition", get_cursor_position),
];

pub const TOOLTIP_METHODS: &[(&str, NativeMethod)] = &[
    ("SetOwner", set_owner),
    ("GetOwner", get_owner),
    ("AddLine", add_line),
    ("AddDoubleLine", add_double_line),
    ("SetText", tooltip_set_text),
    ("ClearLines", clear_lines),
    ("NumLines", num_lines),
];

fn with_button<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut ButtonState) -> R) -> LuaResult<R> {
    ctx.with_frame(|frame| match &mut frame.extra {
        FrameExtra::Button(state) => Some(f(state)),
        _ => None,
    })?
    .ok_or_else(|| ctx.wrong_type())
}

fn with_edit_box<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut EditBoxState) -> R) -> LuaResult<R> {
    ctx.with_frame(|frame| match &mut frame.extra {
        FrameExtra::EditBox(state) => Some(f(state)),
        _ => None,
    })?
    .ok_or_else(|| ctx.wrong_type())
}

fn with_tooltip<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut TooltipState) -> R) -> LuaResult<R> {
    ctx.with_frame(|frame| match &mut frame.extra {
        FrameExtra::Tooltip(state) => Some(f(state)),
        _ => None,
    })?
    .ok_or_else(|| ctx.wrong_type())
}

// ── Button ────────────────────────────────────────────────────

fn button_set_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let text = ctx.opt_string(0)?;
    with_button(&ctx, |button| button.text = text)?;
    ctx.none()
}

fn button_get_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_button(&ctx, |button| button.text.clone())?)
}

fn enable<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    with_button(&ctx, |button| button.enabled = true)?;
    ctx.none()
}

fn disable<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    with_button(&ctx, |button| button.enabled = false)?;
    ctx.none()
}

fn set_enabled<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let enabled = ctx.truthy(0);
    with_button(&ctx, |button| button.enabled = enabled)?;
    ctx.none()
}

fn is_enabled<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_button(&ctx, |button| button.enabled)?)
}

/// `Click([button [, down]])` runs the `OnClick` handlers of an enabled button.
fn click<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let button = ctx
        .opt_string(0)?
        .unwrap_or_else(|| "LeftButton".to_string());
    let down = ctx.truthy(1);
    if with_button(&ctx, |state| state.enabled)? {
        ctx.bridge.invoke_handlers(
            ctx.lua,
            ctx.this,
            ScriptSlot::OnClick,
            &CallbackArgs::mouse(button, down),
        )?;
    }
    ctx.none()
}

// ── EditBox ───────────────────────────────────────────────────

/// Store `text` and fire `OnTextChanged` when it differs from the old text.
fn replace_text(ctx: &MethodCtx<'_, '_>, text: &str, user_input: bool) -> LuaResult<()> {
    let changed = with_edit_box(ctx, |edit| {
        let text = edit.clamp(text);
        edit.cursor = text.chars().count();
        if edit.text == text {
            false
        } else {
            edit.text = text;
            true
        }
    })?;
    if changed {
        ctx.bridge.invoke_handlers(
            ctx.lua,
            ctx.this,
            ScriptSlot::OnTextChanged,
            &CallbackArgs::UserInput(user_input),
        )?;
    }
    Ok(())
}

fn edit_set_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let text = ctx.opt_string(0)?.unwrap_or_default();
    replace_text(&ctx, &text, false)?;
    ctx.none()
}

fn edit_get_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_edit_box(&ctx, |edit| edit.text.clone())?)
}

/// Insert at the cursor, as typed input.
fn insert<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let inserted = ctx.string(0)?;
    let combined = with_edit_box(&ctx, |edit| {
        let at = edit
            .text
            .char_indices()
            .nth(edit.cursor)
            .map_or(edit.text.len(), |(idx, _)| idx);
        let mut text = edit.text.clone();
        text.insert_str(at, &inserted);
        text
    })?;
    replace_text(&ctx, &combined, true)?;
    ctx.none()
}

fn set_focus_state<'lua>(ctx: &MethodCtx<'lua, '_>, focused: bool) -> LuaResult<MultiValue<'lua>> {
    let changed = with_edit_box(ctx, |edit| std::mem::replace(&mut edit.focused, focused) != focused)?;
    if changed {
        let slot = if focused {
            ScriptSlot::OnEditFocusGained
        } else {
            ScriptSlot::OnEditFocusLost
        };
        ctx.bridge
            .invoke_handlers(ctx.lua, ctx.this, slot, &CallbackArgs::None)?;
    }
    ctx.none()
}

fn set_focus<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    set_focus_state(&ctx, true)
}

fn clear_focus<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    set_focus_state(&ctx, false)
}

fn has_focus<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_edit_box(&ctx, |edit| edit.focused)?)
}

fn set_max_letters<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let max = ctx.integer(0)?;
    let max = usize::try_from(max).map_err(|_| ctx.bad_argument(0, "letter limit must not be negative"))?;
    with_edit_box(&ctx, |edit| {
        edit.max_letters = max;
        edit.text = edit.clamp(&edit.text);
        edit.cursor = edit.cursor.min(edit.text.chars().count());
    })?;
    ctx.none()
}

fn get_max_letters<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_edit_box(&ctx, |edit| edit.max_letters)?)
}

fn set_numeric<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let numeric = ctx.truthy(0);
    with_edit_box(&ctx, |edit| edit.numeric = numeric)?;
    ctx.none()
}

fn is_numeric<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_edit_box(&ctx, |edit| edit.numeric)?)
}

/// The text as a number, 0 when it does not parse.
fn get_number<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let number = with_edit_box(&ctx, |edit| edit.text.trim().parse::<f64>().unwrap_or(0.0))?;
    ctx.ret(number)
}

fn get_cursor_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_edit_box(&ctx, |edit| edit.cursor)?)
}

// ── GameTooltip ───────────────────────────────────────────────

/// `SetOwner(owner [, anchor])` clears the tooltip and takes a new owner.
fn set_owner<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let owner = ctx
        .opt_object(0)?
        .ok_or_else(|| ctx.bad_argument(0, "owner expected, got nil"))?;
    let anchor = ctx
        .opt_string(1)?
        .unwrap_or_else(|| "ANCHOR_NONE".to_string());
    with_tooltip(&ctx, |tooltip| {
        tooltip.owner = Some(owner);
        tooltip.anchor = anchor;
        tooltip.lines.clear();
    })?;
    ctx.none()
}

fn get_owner<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let owner = with_tooltip(&ctx, |tooltip| tooltip.owner)?;
    ctx.ret_object(owner.filter(|owner| ctx.bridge.is_live(*owner)))
}

fn add_line<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let left = ctx.opt_string(0)?.unwrap_or_default();
    with_tooltip(&ctx, |tooltip| tooltip.lines.push(TooltipLine { left, right: None }))?;
    ctx.none()
}

fn add_double_line<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let left = ctx.opt_string(0)?.unwrap_or_default();
    let right = ctx.opt_string(1)?;
    with_tooltip(&ctx, |tooltip| tooltip.lines.push(TooltipLine { left, right }))?;
    ctx.none()
}

fn tooltip_set_text<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let left = ctx.string(0)?;
    with_tooltip(&ctx, |tooltip| {
        tooltip.lines = vec![TooltipLine { left, right: None }];
    })?;
    ctx.none()
}

fn clear_lines<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    with_tooltip(&ctx, |tooltip| tooltip.lines.clear())?;
    ctx.none()
}

fn num_lines<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_tooltip(&ctx, |tooltip| tooltip.lines.len())?)
}
