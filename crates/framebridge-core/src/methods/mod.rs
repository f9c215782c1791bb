//! Native methods bound into the class tables, one module per class family.

mod args;
mod button;
mod frame;
mod model;
mod object;
mod region;
mod texture;

pub use args::{LuaResult, MethodCtx, bad_argument};

use crate::bridge::Bridge;
use crate::class::{ClassHierarchy, NativeMethod};
use crate::error::ClassError;
use crate::logging::targets;
use crate::wrapper::handle_of;
use mlua::{Function, Lua, MultiValue};
use std::sync::Arc;

/// Bind every native method onto the standard hierarchy.
pub fn install(classes: &mut ClassHierarchy) -> Result<(), ClassError> {
    classes.bind_all("ScriptObject", object::METHODS)?;
    classes.bind_all("ScriptRegion", region::SCRIPT_REGION_METHODS)?;
    classes.bind_all("Region", region::REGION_METHODS)?;
    classes.bind_all("Frame", frame::METHODS)?;
    classes.bind_all("Button", button::BUTTON_METHODS)?;
    classes.bind_all("EditBox", button::EDIT_BOX_METHODS)?;
    classes.bind_all("GameTooltip", button::TOOLTIP_METHODS)?;
    classes.bind_all("Model", model::MODEL_METHODS)?;
    classes.bind_all("PlayerModel", model::PLAYER_MODEL_METHODS)?;
    classes.bind_all("ModelScene", model::MODEL_SCENE_METHODS)?;
    classes.bind_all("ModelSceneActor", model::ACTOR_METHODS)?;
    classes.bind_all("Texture", texture::TEXTURE_METHODS)?;
    classes.bind_all("Line", texture::LINE_METHODS)?;
    classes.bind_all("FontString", texture::FONT_STRING_METHODS)?;
    Ok(())
}

/// Wrap `function` as a Lua function taking the receiver first.
pub fn bind<'lua>(
    lua: &'lua Lua,
    bridge: &Arc<Bridge>,
    owner: &str,
    method: &str,
    function: NativeMethod,
) -> mlua::Result<Function<'lua>> {
    let bridge = Arc::clone(bridge);
    let owner = owner.to_string();
    let method = method.to_string();
    lua.create_function(move |lua, args: MultiValue| {
        dispatch(lua, &bridge, &owner, &method, function, args)
    })
}

/// Normalize the receiver and run `function` on it.
///
/// A receiver whose object was released is a silent no-op; a live receiver
/// whose class does not derive from `owner` is an argument error.
pub fn dispatch<'lua>(
    lua: &'lua Lua,
    bridge: &Arc<Bridge>,
    owner: &str,
    method: &str,
    function: NativeMethod,
    args: MultiValue<'lua>,
) -> mlua::Result<MultiValue<'lua>> {
    let mut args = args.into_vec();
    if args.is_empty() {
        return Err(bad_argument(1, method, "object expected, got no value"));
    }
    let this_value = args.remove(0);
    let Some(this) = handle_of(&this_value) else {
        return Err(bad_argument(
            1,
            method,
            &format!("object expected, got {}", this_value.type_name()),
        ));
    };
    let Some(kind) = bridge.kind_of(this) else {
        tracing::debug!(target: targets::DISPATCH, handle = %this, method, "call on released object ignored");
        return Ok(MultiValue::new());
    };
    if !bridge.classes().is_a(kind.class_name(), owner) {
        return Err(bad_argument(1, method, "wrong object type"));
    }
    tracing::trace!(target: targets::DISPATCH, handle = %this, class = kind.class_name(), owner, method, "method call");
    function(MethodCtx::new(lua, bridge, this, this_value, method, args))
}
