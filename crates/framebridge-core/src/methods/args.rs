//! Argument access for native methods.
//!
//! Errors follow the Lua convention `bad argument #n to 'Method' (...)`,
//! counting `self` as argument #1, so scripts can `pcall` them and read a
//! familiar message.

use crate::bridge::Bridge;
use crate::handle::Handle;
use crate::widget::{self, FontString, Frame, Line, ModelSceneActor, Texture, TextureState};
use crate::wrapper::handle_of;
use mlua::{Function, IntoLuaMulti, Lua, MultiValue, Value};
use std::sync::{Arc, Mutex};

pub type LuaResult<T> = mlua::Result<T>;

/// One native method invocation: the receiver plus the remaining arguments.
pub struct MethodCtx<'lua, 'a> {
    pub lua: &'lua Lua,
    pub bridge: &'a Arc<Bridge>,
    pub this: Handle,
    /// The receiver as the script passed it.
    pub this_value: Value<'lua>,
    pub method: &'a str,
    args: Vec<Value<'lua>>,
}

impl<'lua, 'a> MethodCtx<'lua, 'a> {
    pub fn new(
        lua: &'lua Lua,
        bridge: &'a Arc<Bridge>,
        this: Handle,
        this_value: Value<'lua>,
        method: &'a str,
        args: Vec<Value<'lua>>,
    ) -> Self {
        Self {
            lua,
            bridge,
            this,
            this_value,
            method,
            args,
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Argument `idx` (0-based, after `self`); missing arguments are nil.
    pub fn value(&self, idx: usize) -> Value<'lua> {
        self.args.get(idx).cloned().unwrap_or(Value::Nil)
    }

    pub fn is_nil(&self, idx: usize) -> bool {
        matches!(self.args.get(idx), None | Some(Value::Nil))
    }

    pub fn bad_argument(&self, idx: usize, msg: &str) -> mlua::Error {
        bad_argument(idx + 2, self.method, msg)
    }

    fn expected(&self, idx: usize, what: &str) -> mlua::Error {
        self.bad_argument(
            idx,
            &format!("{what} expected, got {}", self.value(idx).type_name()),
        )
    }

    /// The receiver is live but not of a kind this method handles.
    pub fn wrong_type(&self) -> mlua::Error {
        bad_argument(1, self.method, "wrong object type")
    }

    pub fn opt_string(&self, idx: usize) -> LuaResult<Option<String>> {
        match self.value(idx) {
            Value::Nil => Ok(None),
            Value::String(s) => Ok(Some(s.to_str()?.to_string())),
            Value::Integer(n) => Ok(Some(n.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(self.expected(idx, "string")),
        }
    }

    pub fn string(&self, idx: usize) -> LuaResult<String> {
        self.opt_string(idx)?
            .ok_or_else(|| self.expected(idx, "string"))
    }

    pub fn opt_number(&self, idx: usize) -> LuaResult<Option<f64>> {
        match self.value(idx) {
            Value::Nil => Ok(None),
            Value::Integer(n) => Ok(Some(n as f64)),
            Value::Number(n) => Ok(Some(n)),
            Value::String(s) => match s.to_str().ok().and_then(|s| s.trim().parse().ok()) {
                Some(n) => Ok(Some(n)),
                None => Err(self.expected(idx, "number")),
            },
            _ => Err(self.expected(idx, "number")),
        }
    }

    pub fn number(&self, idx: usize) -> LuaResult<f64> {
        self.opt_number(idx)?
            .ok_or_else(|| self.expected(idx, "number"))
    }

    pub fn number_or(&self, idx: usize, default: f64) -> LuaResult<f64> {
        Ok(self.opt_number(idx)?.unwrap_or(default))
    }

    pub fn integer(&self, idx: usize) -> LuaResult<i64> {
        let n = self.number(idx)?;
        if n.fract() != 0.0 {
            return Err(self.bad_argument(idx, "number has no integer representation"));
        }
        Ok(n as i64)
    }

    /// A 1-based list position as a 0-based index; `None` below 1.
    pub fn position(&self, idx: usize) -> LuaResult<Option<usize>> {
        let index = self.integer(idx)?;
        Ok(index.checked_sub(1).and_then(|i| usize::try_from(i).ok()))
    }

    /// Lua truthiness: only nil and false are false.
    pub fn truthy(&self, idx: usize) -> bool {
        !matches!(self.value(idx), Value::Nil | Value::Boolean(false))
    }

    /// A widget argument given as a wrapper, a handle token or a global name.
    pub fn opt_object(&self, idx: usize) -> LuaResult<Option<Handle>> {
        match self.value(idx) {
            Value::Nil => Ok(None),
            Value::String(s) => {
                let name = s.to_str()?;
                self.bridge
                    .lookup_name(name)
                    .map(Some)
                    .ok_or_else(|| self.bad_argument(idx, &format!("no object named '{name}'")))
            }
            other => handle_of(&other)
                .map(Some)
                .ok_or_else(|| self.expected(idx, "object")),
        }
    }

    pub fn opt_function(&self, idx: usize) -> LuaResult<Option<Function<'lua>>> {
        match self.value(idx) {
            Value::Nil => Ok(None),
            Value::Function(f) => Ok(Some(f)),
            _ => Err(self.expected(idx, "function")),
        }
    }

    pub fn function(&self, idx: usize) -> LuaResult<Function<'lua>> {
        self.opt_function(idx)?
            .ok_or_else(|| self.expected(idx, "function"))
    }

    /// Arguments from `idx` on.
    pub fn rest(&self, idx: usize) -> Vec<Value<'lua>> {
        self.args.iter().skip(idx).cloned().collect()
    }

    pub fn ret<T: IntoLuaMulti<'lua>>(&self, values: T) -> LuaResult<MultiValue<'lua>> {
        values.into_lua_multi(self.lua)
    }

    pub fn none(&self) -> LuaResult<MultiValue<'lua>> {
        Ok(MultiValue::new())
    }

    /// Return the wrapper of `handle`, or nil.
    pub fn ret_object(&self, handle: Option<Handle>) -> LuaResult<MultiValue<'lua>> {
        let value = match handle {
            Some(handle) => self.bridge.wrapper_of(self.lua, handle)?,
            None => Value::Nil,
        };
        self.ret(value)
    }

    pub fn ret_objects(&self, handles: &[Handle]) -> LuaResult<MultiValue<'lua>> {
        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            values.push(self.bridge.wrapper_of(self.lua, *handle)?);
        }
        Ok(MultiValue::from_vec(values))
    }

    pub fn frame(&self) -> LuaResult<Arc<Mutex<Frame>>> {
        self.bridge
            .registry()
            .frame(self.this)
            .ok_or_else(|| self.wrong_type())
    }

    pub fn font_string(&self) -> LuaResult<Arc<Mutex<FontString>>> {
        self.bridge
            .registry()
            .font_string(self.this)
            .ok_or_else(|| self.wrong_type())
    }

    pub fn line(&self) -> LuaResult<Arc<Mutex<Line>>> {
        self.bridge
            .registry()
            .line(self.this)
            .ok_or_else(|| self.wrong_type())
    }

    pub fn actor(&self) -> LuaResult<Arc<Mutex<ModelSceneActor>>> {
        self.bridge
            .registry()
            .actor(self.this)
            .ok_or_else(|| self.wrong_type())
    }

    /// Run `f` on the frame under its lock.
    pub fn with_frame<R>(&self, f: impl FnOnce(&mut Frame) -> R) -> LuaResult<R> {
        let frame = self.frame()?;
        let mut guard = widget::lock(&frame);
        Ok(f(&mut guard))
    }

    /// Run `f` on the image state of a texture or line.
    pub fn with_texture<R>(&self, f: impl FnOnce(&mut TextureState) -> R) -> LuaResult<R> {
        let (texture, line): (Option<Arc<Mutex<Texture>>>, Option<Arc<Mutex<Line>>>) = {
            let registry = self.bridge.registry();
            (registry.texture(self.this), registry.line(self.this))
        };
        if let Some(texture) = texture {
            return Ok(f(&mut widget::lock(&texture).texture));
        }
        if let Some(line) = line {
            return Ok(f(&mut widget::lock(&line).texture));
        }
        Err(self.wrong_type())
    }

    /// Run `f` on the receiver's shared core.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut widget::WidgetCore) -> R) -> LuaResult<R> {
        self.bridge
            .with_core(self.this, f)
            .ok_or_else(|| self.wrong_type())
    }
}

pub fn bad_argument(position: usize, method: &str, msg: &str) -> mlua::Error {
    mlua::Error::RuntimeError(format!("bad argument #{position} to '{method}' ({msg})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_argument_message_shape() {
        let err = bad_argument(2, "SetPoint", "string expected, got nil");
        assert_eq!(
            err.to_string(),
            "runtime error: bad argument #2 to 'SetPoint' (string expected, got nil)"
        );
    }
}
