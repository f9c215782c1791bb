//! Global functions installed into the script environment.

use crate::bridge::{Bridge, CreateRequest, mixin};
use crate::error::Error;
use crate::handle::Handle;
use crate::logging::targets;
use crate::methods::bad_argument;
use crate::refs::RefSlot;
use crate::widget::WidgetKind;
use crate::wrapper::handle_of;
use mlua::{Function, Lua, MultiValue, Table, Value, Variadic};
use std::sync::Arc;

/// Install every global into `lua`.
pub fn install(lua: &Lua, bridge: &Arc<Bridge>) -> mlua::Result<()> {
    let globals = lua.globals();

    let b = Arc::clone(bridge);
    globals.set(
        "CreateFrame",
        lua.create_function(move |lua, args: MultiValue| create_frame(lua, &b, args))?,
    )?;

    globals.set("print", lua.create_function(print)?)?;

    let b = Arc::clone(bridge);
    globals.set("GetTime", lua.create_function(move |_, ()| Ok(b.now()))?)?;

    let timer = lua.create_table()?;
    let b = Arc::clone(bridge);
    timer.set(
        "After",
        lua.create_function(move |lua, (delay, callback): (Value, Value)| {
            let delay = match delay {
                Value::Integer(n) => n as f64,
                Value::Number(n) => n,
                other => {
                    return Err(bad_argument(
                        1,
                        "After",
                        &format!("number expected, got {}", other.type_name()),
                    ));
                }
            };
            let Value::Function(callback) = callback else {
                return Err(bad_argument(2, "After", "function expected"));
            };
            b.schedule_timer(lua, delay, callback)?;
            Ok(())
        })?,
    )?;
    globals.set("C_Timer", timer)?;

    let b = Arc::clone(bridge);
    globals.set(
        "hooksecurefunc",
        lua.create_function(move |lua, args: MultiValue| hook_function(lua, &b, args))?,
    )?;

    globals.set(
        "Mixin",
        lua.create_function(|_, (target, sources): (Table, Variadic<Table>)| {
            for source in sources.iter() {
                mixin(&target, source)?;
            }
            Ok(target)
        })?,
    )?;

    globals.set(
        "CreateFromMixins",
        lua.create_function(|lua, sources: Variadic<Table>| {
            let target = lua.create_table()?;
            for source in sources.iter() {
                mixin(&target, source)?;
            }
            Ok(target)
        })?,
    )?;

    let b = Arc::clone(bridge);
    globals.set(
        "GetFramesRegisteredForEvent",
        lua.create_function(move |lua, event: String| {
            let mut frames = Vec::new();
            for handle in b.events().subscribers(&event) {
                frames.push(b.wrapper_of(lua, handle)?);
            }
            Ok(MultiValue::from_vec(frames))
        })?,
    )?;

    Ok(())
}

/// A widget argument given as a wrapper, a token or a global name.
fn object_arg(bridge: &Bridge, value: &Value, position: usize, function: &str) -> mlua::Result<Option<Handle>> {
    match value {
        Value::Nil => Ok(None),
        Value::String(name) => {
            let name = name.to_str()?;
            bridge
                .lookup_name(name)
                .map(Some)
                .ok_or_else(|| bad_argument(position, function, &format!("no object named '{name}'")))
        }
        other => handle_of(other)
            .map(Some)
            .ok_or_else(|| bad_argument(position, function, "object expected")),
    }
}

fn opt_string_arg(value: &Value, position: usize, function: &str) -> mlua::Result<Option<String>> {
    match value {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(s.to_str()?.to_string())),
        other => Err(bad_argument(
            position,
            function,
            &format!("string expected, got {}", other.type_name()),
        )),
    }
}

/// `CreateFrame(kind [, name [, parent [, template [, id]]]])`
fn create_frame<'lua>(lua: &'lua Lua, bridge: &Arc<Bridge>, args: MultiValue<'lua>) -> mlua::Result<Table<'lua>> {
    let args = args.into_vec();
    let arg = |idx: usize| args.get(idx).cloned().unwrap_or(Value::Nil);

    let kind = opt_string_arg(&arg(0), 1, "CreateFrame")?
        .ok_or_else(|| bad_argument(1, "CreateFrame", "string expected, got nil"))?;
    let kind: WidgetKind = kind.parse().map_err(Error::from)?;

    let mut request = CreateRequest::new(kind);
    request.name = opt_string_arg(&arg(1), 2, "CreateFrame")?;
    request.parent = object_arg(bridge, &arg(2), 3, "CreateFrame")?;
    request.template = opt_string_arg(&arg(3), 4, "CreateFrame")?;
    request.id = match arg(4) {
        Value::Nil => None,
        Value::Integer(n) => Some(n),
        Value::Number(n) => Some(n as i64),
        other => {
            return Err(bad_argument(
                5,
                "CreateFrame",
                &format!("number expected, got {}", other.type_name()),
            ));
        }
    };

    let (_, wrapper) = bridge.create_object(lua, request)?;
    Ok(wrapper)
}

fn print(lua: &Lua, args: MultiValue) -> mlua::Result<()> {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(tostring.call::<_, String>(value)?);
    }
    tracing::info!(target: targets::SCRIPT, "{}", parts.join("\t"));
    Ok(())
}

/// `hooksecurefunc([table,] name, hook)`
///
/// Replaces `table[name]` (default: the globals) with a function that calls
/// the original, then `hook` with the same arguments, and returns what the
/// original returned. On a widget the replacement is stored on that
/// instance only.
fn hook_function<'lua>(lua: &'lua Lua, bridge: &Arc<Bridge>, args: MultiValue<'lua>) -> mlua::Result<()> {
    let mut args = args.into_vec();
    let target = match args.first() {
        Some(Value::Table(table)) => {
            let table = table.clone();
            args.remove(0);
            table
        }
        _ => lua.globals(),
    };
    let name = match args.first() {
        Some(Value::String(name)) => name.to_str()?.to_string(),
        _ => return Err(bad_argument(1, "hooksecurefunc", "function name expected")),
    };
    let Some(Value::Function(hook)) = args.get(1).cloned() else {
        return Err(bad_argument(2, "hooksecurefunc", "hook function expected"));
    };
    let original = match target.get::<_, Value>(name.as_str())? {
        Value::Function(original) => original,
        _ => {
            return Err(mlua::Error::RuntimeError(format!(
                "hooksecurefunc: '{name}' is not a function"
            )));
        }
    };

    let instance = handle_of(&Value::Table(target.clone()));
    let (original, hook) = bridge.pin_function_hook(lua, instance, original, hook)?;
    let b = Arc::clone(bridge);
    let hooked_name = name.clone();
    let wrapped = lua.create_function(move |lua, args: MultiValue| {
        call_hooked(lua, &b, original, hook, &hooked_name, args)
    })?;
    target.raw_set(name.as_str(), wrapped)?;

    tracing::debug!(
        target: targets::CALLBACKS,
        function = %name,
        instance = ?instance.map(|h| h.to_string()),
        "function hooked"
    );
    Ok(())
}

fn call_hooked<'lua>(
    lua: &'lua Lua,
    bridge: &Bridge,
    original: RefSlot,
    hook: RefSlot,
    name: &str,
    args: MultiValue<'lua>,
) -> mlua::Result<MultiValue<'lua>> {
    let (original, hook) = {
        let refs = bridge.refs();
        (
            refs.get_as::<Function>(lua, original)?,
            refs.get_as::<Function>(lua, hook)?,
        )
    };
    let Some(original) = original else {
        return Ok(MultiValue::new());
    };
    let results: MultiValue = original.call(args.clone())?;
    if let Some(hook) = hook {
        if let Err(err) = hook.call::<_, ()>(args) {
            tracing::error!(target: targets::CALLBACKS, function = name, error = %err, "function hook failed");
        }
    }
    Ok(results)
}
