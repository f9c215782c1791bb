//! Saved variables persisted as Lua source.
//!
//! Each addon's file is a sequence of `Name = <literal>` assignments.
//! Loading runs the file in a scratch Lua state that only has the `math`
//! library, then reads the named globals back.

use crate::error::{AddonError, Result};
use crate::logging::targets;
use crate::value::{ScriptValue, TableKey, lua_value_to_script};
use bstr::ByteSlice;
use mlua::{Lua, LuaOptions, StdLib, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Render `vars` as Lua assignments, one per variable, in name order.
///
/// Nil variables and widget references are omitted; they have no
/// persistent form.
pub fn serialize(addon: &str, vars: &BTreeMap<String, ScriptValue>) -> String {
    let mut out = format!("-- saved variables for {addon}\n");
    for (name, value) in vars {
        if !is_persistable(value) {
            continue;
        }
        out.push_str(name);
        out.push_str(" = ");
        write_literal(&mut out, value, 0);
        out.push('\n');
    }
    out
}

fn is_persistable(value: &ScriptValue) -> bool {
    !matches!(value, ScriptValue::Nil | ScriptValue::Object(_))
}

/// Append the Lua literal for `value`.
pub fn write_literal(out: &mut String, value: &ScriptValue, indent: usize) {
    match value {
        ScriptValue::Nil | ScriptValue::Object(_) => out.push_str("nil"),
        ScriptValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        ScriptValue::Integer(n) => write_integer(out, *n),
        ScriptValue::Number(n) => write_number(out, *n),
        ScriptValue::String(s) => write_string(out, s),
        ScriptValue::Table(entries) => {
            let entries: Vec<_> = entries.iter().filter(|(_, v)| is_persistable(v)).collect();
            if entries.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            for (key, value) in entries {
                push_indent(out, indent + 1);
                out.push('[');
                write_key(out, key);
                out.push_str("] = ");
                write_literal(out, value, indent + 1);
                out.push_str(",\n");
            }
            push_indent(out, indent);
            out.push('}');
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_key(out: &mut String, key: &TableKey) {
    match key {
        TableKey::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        TableKey::Integer(n) => write_integer(out, *n),
        TableKey::Number(n) => write_number(out, n.into_inner()),
        TableKey::String(s) => write_string(out, s),
    }
}

fn write_integer(out: &mut String, n: i64) {
    // the literal 9223372036854775808 would read back as a float
    if n == i64::MIN {
        out.push_str("math.mininteger");
    } else {
        let _ = write!(out, "{n}");
    }
}

fn write_number(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("(0/0)");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "math.huge" } else { "-math.huge" });
    } else {
        // Debug keeps a fractional part so the value reloads as a float
        let _ = write!(out, "{n:?}");
    }
}

/// Quote a byte string. Bytes outside valid UTF-8 sequences become
/// decimal escapes so the file itself stays UTF-8.
fn write_string(out: &mut String, s: &[u8]) {
    out.push('"');
    for chunk in s.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_ascii_control() => {
                    let _ = write!(out, "\\{:03}", c as u32);
                }
                c => out.push(c),
            }
        }
        for byte in chunk.invalid() {
            let _ = write!(out, "\\{byte:03}");
        }
    }
    out.push('"');
}

/// Evaluate saved-variable source and read back `names`.
///
/// Names the file does not assign are absent from the result.
pub fn parse(addon: &str, source: &str, names: &[String]) -> Result<BTreeMap<String, ScriptValue>> {
    let unreadable = |err: mlua::Error| AddonError::SavedVariables {
        addon: addon.to_string(),
        message: err.to_string(),
    };
    let lua = Lua::new_with(StdLib::MATH, LuaOptions::default()).map_err(unreadable)?;
    lua.load(source)
        .set_name(format!("SavedVariables/{addon}"))
        .exec()
        .map_err(unreadable)?;

    let globals = lua.globals();
    let mut vars = BTreeMap::new();
    for name in names {
        let value: Value = globals.get(name.as_str()).map_err(unreadable)?;
        let value = lua_value_to_script(value).map_err(unreadable)?;
        if !value.is_nil() {
            vars.insert(name.clone(), value);
        }
    }
    Ok(vars)
}

/// Read `<dir>/<addon>.lua`; a missing file yields no variables.
pub fn load(dir: &Path, addon: &str, names: &[String]) -> Result<BTreeMap<String, ScriptValue>> {
    let path = dir.join(format!("{addon}.lua"));
    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(target: targets::ADDONS, addon, path = %path.display(), "no saved variables yet");
            return Ok(BTreeMap::new());
        }
        Err(err) => return Err(err.into()),
    };
    let vars = parse(addon, &source, names)?;
    tracing::debug!(target: targets::ADDONS, addon, loaded = vars.len(), "saved variables loaded");
    Ok(vars)
}

/// Write `<dir>/<addon>.lua`, creating `dir` if needed.
pub fn store(dir: &Path, addon: &str, vars: &BTreeMap<String, ScriptValue>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{addon}.lua"));
    std::fs::write(&path, serialize(addon, vars))?;
    tracing::debug!(target: targets::ADDONS, addon, path = %path.display(), saved = vars.len(), "saved variables written");
    Ok(())
}
