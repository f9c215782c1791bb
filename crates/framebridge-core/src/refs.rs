//! Script reference registry.
//!
//! Native code cannot hold a Lua value past the call that produced it, so
//! anything the bridge needs later (a wrapper it hands back to scripts, a
//! callback function, a timer, an addon table) is pinned in the Lua
//! registry and addressed by a [`RefSlot`]. Slot numbers are never reused,
//! so a released slot can not resolve to a newer value.

use crate::error::LifecycleError;
use crate::logging::targets;
use mlua::{FromLua, IntoLua, Lua, RegistryKey, Value};
use std::collections::HashMap;
use std::fmt;

/// Stable key for a pinned script value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefSlot(u64);

impl RefSlot {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Slots pinning script values in the Lua registry.
#[derive(Debug)]
pub struct ScriptRefs {
    slots: HashMap<RefSlot, RegistryKey>,
    next: u64,
}

impl Default for ScriptRefs {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            next: 1,
        }
    }
}

impl ScriptRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `value` and return its slot.
    pub fn pin<'lua, V: IntoLua<'lua>>(&mut self, lua: &'lua Lua, value: V) -> mlua::Result<RefSlot> {
        let key = lua.create_registry_value(value)?;
        let slot = RefSlot(self.next);
        self.next += 1;
        self.slots.insert(slot, key);
        tracing::trace!(target: targets::LIFECYCLE, slot = %slot, pinned = self.slots.len(), "script value pinned");
        Ok(slot)
    }

    /// Fetch the pinned value, or `None` if the slot has been released.
    pub fn get<'lua>(&self, lua: &'lua Lua, slot: RefSlot) -> mlua::Result<Option<Value<'lua>>> {
        self.get_as(lua, slot)
    }

    /// Fetch the pinned value converted to `T`.
    pub fn get_as<'lua, T: FromLua<'lua>>(
        &self,
        lua: &'lua Lua,
        slot: RefSlot,
    ) -> mlua::Result<Option<T>> {
        match self.slots.get(&slot) {
            Some(key) => lua.registry_value::<T>(key).map(Some),
            None => Ok(None),
        }
    }

    /// Release a slot. Each pin must be released exactly once.
    pub fn unpin(&mut self, lua: &Lua, slot: RefSlot) -> Result<(), LifecycleError> {
        let Some(key) = self.slots.remove(&slot) else {
            let err = if slot.0 != 0 && slot.0 < self.next {
                LifecycleError::DoubleUnpin(slot)
            } else {
                LifecycleError::UnknownSlot(slot)
            };
            tracing::error!(target: targets::LIFECYCLE, slot = %slot, error = %err, "invalid unpin");
            return Err(err);
        };
        if let Err(err) = lua.remove_registry_value(key) {
            // the key belonged to another state; the value is unreachable either way
            tracing::warn!(target: targets::LIFECYCLE, slot = %slot, error = %err, "registry value removal failed");
        }
        tracing::trace!(target: targets::LIFECYCLE, slot = %slot, pinned = self.slots.len(), "script value unpinned");
        Ok(())
    }

    pub fn contains(&self, slot: RefSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Number of slots currently pinned.
    pub fn pinned(&self) -> usize {
        self.slots.len()
    }

    /// Release every slot, e.g. at engine shutdown.
    pub fn clear(&mut self, lua: &Lua) -> usize {
        let count = self.slots.len();
        for (_, key) in self.slots.drain() {
            let _ = lua.remove_registry_value(key);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Function;

    #[test]
    fn pin_get_unpin() {
        let lua = Lua::new();
        let mut refs = ScriptRefs::new();
        let slot = refs.pin(&lua, "hello").unwrap();
        assert_eq!(
            refs.get_as::<String>(&lua, slot).unwrap().as_deref(),
            Some("hello")
        );
        refs.unpin(&lua, slot).unwrap();
        assert!(refs.get(&lua, slot).unwrap().is_none());
        assert_eq!(refs.pinned(), 0);
    }

    #[test]
    fn double_unpin_is_reported() {
        let lua = Lua::new();
        let mut refs = ScriptRefs::new();
        let slot = refs.pin(&lua, 1).unwrap();
        refs.unpin(&lua, slot).unwrap();
        assert_eq!(
            refs.unpin(&lua, slot),
            Err(LifecycleError::DoubleUnpin(slot))
        );
        assert_eq!(
            refs.unpin(&lua, RefSlot::from_raw(99)),
            Err(LifecycleError::UnknownSlot(RefSlot::from_raw(99)))
        );
    }

    #[test]
    fn slots_are_not_reused() {
        let lua = Lua::new();
        let mut refs = ScriptRefs::new();
        let first = refs.pin(&lua, "old").unwrap();
        refs.unpin(&lua, first).unwrap();
        let second = refs.pin(&lua, "new").unwrap();
        assert_ne!(first, second);
        assert!(refs.get(&lua, first).unwrap().is_none());
        assert_eq!(
            refs.get_as::<String>(&lua, second).unwrap().as_deref(),
            Some("new")
        );
    }

    #[test]
    fn pinned_function_survives_collection() {
        let lua = Lua::new();
        let mut refs = ScriptRefs::new();
        let slot = {
            let func: Function = lua.load("return function(x) return x * 2 end").eval().unwrap();
            refs.pin(&lua, func).unwrap()
        };
        lua.gc_collect().unwrap();
        let func: Function = refs.get_as(&lua, slot).unwrap().unwrap();
        assert_eq!(func.call::<_, i64>(21).unwrap(), 42);
    }

    #[test]
    fn clear_releases_everything() {
        let lua = Lua::new();
        let mut refs = ScriptRefs::new();
        refs.pin(&lua, 1).unwrap();
        refs.pin(&lua, 2).unwrap();
        assert_eq!(refs.clear(&lua), 2);
        assert_eq!(refs.pinned(), 0);
    }
}
