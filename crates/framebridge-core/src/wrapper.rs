//! Script-visible wrappers around native objects.
//!
//! A wrapper is a plain Lua table `{ [0] = <HandleToken> }` whose metatable
//! points its `__index` at the class table of the object's kind. Scripts
//! may also hand the token itself to the bridge; [`handle_of`] accepts
//! either shape so nothing past the boundary needs to care which one it got.

use crate::handle::Handle;
use mlua::{AnyUserData, Lua, Table, UserData, UserDataMethods, Value};
use std::sync::{Mutex, Weak};

/// Handles whose tokens were collected by the Lua GC.
pub type FinalizeQueue = Mutex<Vec<Handle>>;

/// Userdata stored at index `0` of every wrapper table.
pub struct HandleToken {
    handle: Handle,
    finalized: Weak<FinalizeQueue>,
}

impl HandleToken {
    pub fn new(handle: Handle, finalized: Weak<FinalizeQueue>) -> Self {
        Self { handle, finalized }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for HandleToken {
    fn drop(&mut self) {
        // The GC can run at any point inside a call into Lua, so only enqueue
        // here; the bridge reaps the queue outside of script execution.
        if let Some(queue) = self.finalized.upgrade() {
            if let Ok(mut queue) = queue.lock() {
                queue.push(self.handle);
            }
        }
    }
}

impl UserData for HandleToken {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(format!("handle: {}", this.handle))
        });
    }
}

/// Normalize a wrapper table or bare handle token into a [`Handle`].
///
/// Anything else (including tables without a token) yields `None`.
pub fn handle_of(value: &Value) -> Option<Handle> {
    match value {
        Value::Table(table) => token_of_table(table),
        Value::UserData(ud) => token_handle(ud),
        _ => None,
    }
}

fn token_of_table(table: &Table) -> Option<Handle> {
    match table.raw_get::<_, Value>(0) {
        Ok(Value::UserData(ud)) => token_handle(&ud),
        _ => None,
    }
}

fn token_handle(ud: &AnyUserData) -> Option<Handle> {
    ud.borrow::<HandleToken>().ok().map(|token| token.handle())
}

/// Build a fresh wrapper table for `handle` tagged with `metatable`.
pub fn create_wrapper<'lua>(
    lua: &'lua Lua,
    handle: Handle,
    metatable: Table<'lua>,
    finalized: Weak<FinalizeQueue>,
) -> mlua::Result<Table<'lua>> {
    let wrapper = lua.create_table()?;
    wrapper.raw_set(0, lua.create_userdata(HandleToken::new(handle, finalized))?)?;
    wrapper.set_metatable(Some(metatable));
    Ok(wrapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn handle_of_accepts_wrapper_and_token() {
        let lua = Lua::new();
        let queue: Arc<FinalizeQueue> = Arc::new(Mutex::new(Vec::new()));
        let mt = lua.create_table().unwrap();
        let wrapper =
            create_wrapper(&lua, Handle::from_raw(5), mt, Arc::downgrade(&queue)).unwrap();

        assert_eq!(
            handle_of(&Value::Table(wrapper.clone())),
            Some(Handle::from_raw(5))
        );
        let token: Value = wrapper.raw_get(0).unwrap();
        assert_eq!(handle_of(&token), Some(Handle::from_raw(5)));
    }

    #[test]
    fn handle_of_rejects_other_shapes() {
        let lua = Lua::new();
        let plain = lua.create_table().unwrap();
        plain.raw_set(0, 5).unwrap();
        assert_eq!(handle_of(&Value::Table(plain)), None);
        assert_eq!(handle_of(&Value::Integer(5)), None);
        assert_eq!(handle_of(&Value::Nil), None);
    }

    #[test]
    fn collected_token_is_queued() {
        let lua = Lua::new();
        let queue: Arc<FinalizeQueue> = Arc::new(Mutex::new(Vec::new()));
        {
            let mt = lua.create_table().unwrap();
            let _wrapper =
                create_wrapper(&lua, Handle::from_raw(9), mt, Arc::downgrade(&queue)).unwrap();
        }
        lua.gc_collect().unwrap();
        lua.gc_collect().unwrap();
        assert_eq!(*queue.lock().unwrap(), vec![Handle::from_raw(9)]);
    }

    #[test]
    fn token_tostring_shows_handle() {
        let lua = Lua::new();
        let queue: Arc<FinalizeQueue> = Arc::new(Mutex::new(Vec::new()));
        let mt = lua.create_table().unwrap();
        let wrapper =
            create_wrapper(&lua, Handle::from_raw(16), mt, Arc::downgrade(&queue)).unwrap();
        lua.globals().set("w", wrapper).unwrap();
        let text: String = lua.load("return tostring(w[0])").eval().unwrap();
        assert_eq!(text, "handle: 0x10");
    }
}
