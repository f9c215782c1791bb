//! Host-side representation of script values and the conversion rules
//! between it and Lua.
//!
//! The same rules apply to method arguments marshaled by the host, to
//! event parameters and to saved variables: nil, booleans, numbers,
//! strings (as raw bytes, which need not be UTF-8) and nested tables
//! convert losslessly; widget wrappers become
//! [`ScriptValue::Object`]; functions, threads and foreign userdata have
//! no host form and are dropped. Tables that (directly or indirectly)
//! contain themselves are truncated at the back edge instead of recursing.

use crate::handle::Handle;
use crate::logging::targets;
use crate::wrapper::handle_of;
use bstr::{BString, ByteSlice};
use mlua::{Lua, Value};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashSet};

/// Nesting depth past which tables are truncated.
pub const MAX_DEPTH: usize = 64;

/// Key of a converted table entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKey {
    Boolean(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(BString),
}

impl From<&str> for TableKey {
    fn from(key: &str) -> Self {
        Self::String(BString::from(key))
    }
}

impl From<i64> for TableKey {
    fn from(key: i64) -> Self {
        Self::Integer(key)
    }
}

/// A script value detached from any Lua state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(BString),
    Table(BTreeMap<TableKey, ScriptValue>),
    Object(Handle),
}

impl ScriptValue {
    /// Build a table from key/value pairs, dropping nil values as Lua would.
    pub fn table<K, I>(entries: I) -> Self
    where
        K: Into<TableKey>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Table(
            entries
                .into_iter()
                .filter(|(_, value)| !value.is_nil())
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Build a 1-based sequence.
    pub fn array<I: IntoIterator<Item = ScriptValue>>(values: I) -> Self {
        Self::table(
            values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| (idx as i64 + 1, value)),
        )
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// The string as UTF-8; `None` for other types and for byte strings
    /// that are not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => s.to_str().ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Handle> {
        match self {
            Self::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Look up a string-keyed field of a table value.
    pub fn field(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            Self::Table(entries) => entries.get(&TableKey::from(key)),
            _ => None,
        }
    }

    /// Lua type name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) | Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Table(_) | Self::Object(_) => "table",
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::String(BString::from(value))
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::String(BString::from(value))
    }
}

impl From<&[u8]> for ScriptValue {
    fn from(value: &[u8]) -> Self {
        Self::String(BString::from(value))
    }
}

impl From<Handle> for ScriptValue {
    fn from(value: Handle) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

/// Convert a Lua value into a [`ScriptValue`].
pub fn lua_value_to_script(value: Value) -> mlua::Result<ScriptValue> {
    let mut path = HashSet::new();
    convert_from_lua(value, &mut path, 0)
}

fn convert_from_lua(
    value: Value,
    path: &mut HashSet<usize>,
    depth: usize,
) -> mlua::Result<ScriptValue> {
    Ok(match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Boolean(b),
        Value::Integer(n) => ScriptValue::Integer(n),
        Value::Number(n) => ScriptValue::Number(n),
        Value::String(s) => ScriptValue::String(BString::from(s.as_bytes())),
        Value::UserData(ud) => match handle_of(&Value::UserData(ud)) {
            Some(handle) => ScriptValue::Object(handle),
            None => ScriptValue::Nil,
        },
        Value::Table(table) => {
            if let Some(handle) = handle_of(&Value::Table(table.clone())) {
                return Ok(ScriptValue::Object(handle));
            }

            let id = table.to_pointer() as usize;
            if !path.insert(id) {
                tracing::warn!(target: targets::SCRIPT, depth, "cyclic table reference truncated");
                return Ok(ScriptValue::Nil);
            }
            if depth >= MAX_DEPTH {
                tracing::warn!(target: targets::SCRIPT, depth, "table nesting too deep; truncated");
                path.remove(&id);
                return Ok(ScriptValue::Nil);
            }

            let mut entries = BTreeMap::new();
            for pair in table.pairs::<Value, Value>() {
                let (key, value) = pair?;
                let Some(key) = convert_key(key) else {
                    continue;
                };
                let value = convert_from_lua(value, path, depth + 1)?;
                if !value.is_nil() {
                    entries.insert(key, value);
                }
            }
            path.remove(&id);
            ScriptValue::Table(entries)
        }
        // functions, threads, light userdata
        _ => ScriptValue::Nil,
    })
}

fn convert_key(key: Value) -> Option<TableKey> {
    match key {
        Value::Boolean(b) => Some(TableKey::Boolean(b)),
        Value::Integer(n) => Some(TableKey::Integer(n)),
        Value::Number(n) => Some(TableKey::Number(OrderedFloat(n))),
        Value::String(s) => Some(TableKey::String(BString::from(s.as_bytes()))),
        other => {
            tracing::debug!(
                target: targets::SCRIPT,
                key_type = other.type_name(),
                "table key has no host form; entry skipped"
            );
            None
        }
    }
}

/// Convert a [`ScriptValue`] into a Lua value.
///
/// `objects` maps handles to their wrappers; returning `Value::Nil` is fine
/// for handles that no longer resolve.
pub fn script_to_lua_value<'lua>(
    lua: &'lua Lua,
    value: &ScriptValue,
    objects: &dyn Fn(Handle) -> mlua::Result<Value<'lua>>,
) -> mlua::Result<Value<'lua>> {
    Ok(match value {
        ScriptValue::Nil => Value::Nil,
        ScriptValue::Boolean(b) => Value::Boolean(*b),
        ScriptValue::Integer(n) => Value::Integer(*n),
        ScriptValue::Number(n) => Value::Number(*n),
        ScriptValue::String(s) => Value::String(lua.create_string(s.as_slice())?),
        ScriptValue::Table(entries) => {
            let table = lua.create_table()?;
            for (key, value) in entries {
                let value = script_to_lua_value(lua, value, objects)?;
                match key {
                    TableKey::Boolean(b) => table.raw_set(*b, value)?,
                    TableKey::Integer(n) => table.raw_set(*n, value)?,
                    TableKey::Number(n) => table.raw_set(n.into_inner(), value)?,
                    TableKey::String(s) => table.raw_set(lua.create_string(s.as_slice())?, value)?,
                }
            }
            Value::Table(table)
        }
        ScriptValue::Object(handle) => objects(*handle)?,
    })
}

/// Convert a [`ScriptValue`] that must not contain objects.
pub fn script_to_lua_plain<'lua>(lua: &'lua Lua, value: &ScriptValue) -> mlua::Result<Value<'lua>> {
    script_to_lua_value(lua, value, &|_| Ok(Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua() -> Lua {
        Lua::new()
    }

    // ── script → lua ──────────────────────────────────────────

    #[test]
    fn scalars_to_lua() {
        let l = lua();
        assert!(matches!(
            script_to_lua_plain(&l, &ScriptValue::Nil).unwrap(),
            Value::Nil
        ));
        assert_eq!(
            script_to_lua_plain(&l, &ScriptValue::Boolean(true)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            script_to_lua_plain(&l, &ScriptValue::Integer(-7)).unwrap(),
            Value::Integer(-7)
        );
        match script_to_lua_plain(&l, &ScriptValue::Number(2.5)).unwrap() {
            Value::Number(n) => assert!((n - 2.5).abs() < 1e-12),
            other => panic!("expected Number, got {other:?}"),
        }
        match script_to_lua_plain(&l, &ScriptValue::from("hello")).unwrap() {
            Value::String(s) => assert_eq!(s.to_str().unwrap(), "hello"),
            other => panic!("expected String, got {other:?}"),
        }
    }

    #[test]
    fn array_to_lua_is_one_based() {
        let l = lua();
        let value = ScriptValue::array([10_i64.into(), 20_i64.into(), 30_i64.into()]);
        match script_to_lua_plain(&l, &value).unwrap() {
            Value::Table(t) => {
                assert_eq!(t.get::<_, i64>(1).unwrap(), 10);
                assert_eq!(t.get::<_, i64>(3).unwrap(), 30);
                assert_eq!(t.raw_len(), 3);
            }
            other => panic!("expected Table, got {other:?}"),
        }
    }

    #[test]
    fn objects_use_resolver() {
        let l = lua();
        let value = ScriptValue::table([("owner", ScriptValue::Object(Handle::from_raw(4)))]);
        let converted = script_to_lua_value(&l, &value, &|handle| {
            Ok(Value::Integer(handle.as_raw() as i64 * 10))
        })
        .unwrap();
        match converted {
            Value::Table(t) => assert_eq!(t.get::<_, i64>("owner").unwrap(), 40),
            other => panic!("expected Table, got {other:?}"),
        }
    }

    // ── lua → script ──────────────────────────────────────────

    #[test]
    fn nested_table_from_lua() {
        let l = lua();
        let value: Value = l
            .load(r#"return { name = "db", list = { 1, 2.5, "x" }, flags = { [true] = false } }"#)
            .eval()
            .unwrap();
        let converted = lua_value_to_script(value).unwrap();
        assert_eq!(converted.field("name"), Some(&ScriptValue::from("db")));
        assert_eq!(
            converted.field("list"),
            Some(&ScriptValue::array([
                ScriptValue::Integer(1),
                ScriptValue::Number(2.5),
                ScriptValue::from("x"),
            ]))
        );
        let flags = converted.field("flags").unwrap();
        match flags {
            ScriptValue::Table(entries) => {
                assert_eq!(
                    entries.get(&TableKey::Boolean(true)),
                    Some(&ScriptValue::Boolean(false))
                );
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn functions_are_dropped() {
        let l = lua();
        let value: Value = l
            .load("return { keep = 1, drop = function() end }")
            .eval()
            .unwrap();
        assert_eq!(
            lua_value_to_script(value).unwrap(),
            ScriptValue::table([("keep", ScriptValue::Integer(1))])
        );
    }

    #[test]
    fn cyclic_table_is_truncated() {
        let l = lua();
        let value: Value = l
            .load("local t = { a = 1, inner = {} }; t.self = t; t.inner.back = t; return t")
            .eval()
            .unwrap();
        let converted = lua_value_to_script(value).unwrap();
        assert_eq!(
            converted,
            ScriptValue::table([
                ("a", ScriptValue::Integer(1)),
                ("inner", ScriptValue::table(Vec::<(&str, ScriptValue)>::new())),
            ])
        );
    }

    #[test]
    fn shared_subtable_is_not_a_cycle() {
        let l = lua();
        let value: Value = l
            .load("local shared = { 1 }; return { a = shared, b = shared }")
            .eval()
            .unwrap();
        let converted = lua_value_to_script(value).unwrap();
        let expected = ScriptValue::array([ScriptValue::Integer(1)]);
        assert_eq!(converted.field("a"), Some(&expected));
        assert_eq!(converted.field("b"), Some(&expected));
    }

    #[test]
    fn byte_strings_keep_every_byte() {
        let l = lua();
        let value: Value = l
            .load(r#"return { name = "\255\254abc", ["\255"] = 1, ["\254"] = 2 }"#)
            .eval()
            .unwrap();
        let converted = lua_value_to_script(value).unwrap();
        let name = converted.field("name").unwrap();
        assert_eq!(name.as_bytes(), Some(&b"\xff\xfeabc"[..]));
        assert_eq!(name.as_str(), None);
        match &converted {
            ScriptValue::Table(entries) => assert_eq!(entries.len(), 3),
            other => panic!("expected table, got {other:?}"),
        }

        let back = script_to_lua_plain(&l, &converted).unwrap();
        l.globals().set("back", back).unwrap();
        let ok: bool = l
            .load(r#"return back.name == "\255\254abc" and back["\255"] == 1 and back["\254"] == 2"#)
            .eval()
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(ScriptValue::from(None::<i64>), ScriptValue::Nil);
        assert_eq!(ScriptValue::from(Some("x")), ScriptValue::from("x"));
    }
}
