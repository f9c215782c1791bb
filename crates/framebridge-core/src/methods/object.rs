//! `ScriptObject`: identity and release, available on every widget.

use super::{LuaResult, MethodCtx};
use crate::class::NativeMethod;
use mlua::MultiValue;

pub const METHODS: &[(&str, NativeMethod)] = &[
    ("GetName", get_name),
    ("GetDebugName", get_debug_name),
    ("GetObjectType", get_object_type),
    ("IsObjectType", is_object_type),
    ("GetParent", get_parent),
    ("IsForbidden", is_forbidden),
    ("Destroy", destroy),
];

fn get_name<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.with_core(|core| core.name.clone())?;
    ctx.ret(name)
}

fn get_debug_name<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let name = ctx.with_core(|core| core.debug_name())?;
    ctx.ret(name)
}

fn get_object_type<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let kind = ctx.with_core(|core| core.kind)?;
    ctx.ret(kind.name())
}

fn is_object_type<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let ancestor = ctx.string(0)?;
    let kind = ctx.with_core(|core| core.kind)?;
    let classes = ctx.bridge.classes();
    let is_a = classes
        .chain(kind.class_name())
        .map(|chain| chain.iter().any(|class| class.eq_ignore_ascii_case(&ancestor)))
        .unwrap_or(false);
    ctx.ret(is_a)
}

fn get_parent<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let parent = ctx.with_core(|core| core.parent)?;
    ctx.ret_object(parent)
}

fn is_forbidden<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(false)
}

fn destroy<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.bridge.destroy(ctx.lua, ctx.this)?;
    ctx.none()
}
