//! Property-based and engine-level tests for saved-variable persistence.
//!
//! Validates:
//! 1. serialize then parse reproduces nil-free values, byte strings included
//! 2. serialization is deterministic
//! 3. cyclic tables are truncated on save instead of looping
//! 4. an addon's globals survive a save and a reload in a fresh engine

use framebridge_core::addon::AddonManifest;
use framebridge_core::saved::{parse, serialize};
use framebridge_core::value::TableKey;
use framebridge_core::{Config, Engine, ScriptValue};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// Strategies
// =============================================================================

fn arb_key() -> impl Strategy<Value = TableKey> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_ ]{0,8}".prop_map(|key| TableKey::from(key.as_str())),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(|key| TableKey::String(key.into())),
        any::<i64>().prop_map(TableKey::Integer),
        any::<bool>().prop_map(TableKey::Boolean),
    ]
}

fn arb_leaf() -> impl Strategy<Value = ScriptValue> {
    prop_oneof![
        any::<bool>().prop_map(ScriptValue::Boolean),
        any::<i64>().prop_map(ScriptValue::Integer),
        any::<f64>()
            .prop_filter("finite", |n| n.is_finite())
            .prop_map(ScriptValue::Number),
        any::<String>().prop_map(ScriptValue::from),
        prop::collection::vec(any::<u8>(), 0..12).prop_map(|bytes| ScriptValue::from(bytes.as_slice())),
    ]
}

fn arb_value() -> impl Strategy<Value = ScriptValue> {
    arb_leaf().prop_recursive(4, 48, 6, |inner| {
        prop::collection::btree_map(arb_key(), inner, 0..6).prop_map(ScriptValue::Table)
    })
}

fn arb_vars() -> impl Strategy<Value = BTreeMap<String, ScriptValue>> {
    prop::collection::btree_map("[A-Z][A-Za-z0-9]{0,10}DB", arb_value(), 0..4)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn serialized_values_reload_unchanged(vars in arb_vars()) {
        let names: Vec<String> = vars.keys().cloned().collect();
        let text = serialize("Prop", &vars);
        let back = parse("Prop", &text, &names).unwrap();
        prop_assert_eq!(back, vars);
    }

    #[test]
    fn serialization_is_deterministic(vars in arb_vars()) {
        prop_assert_eq!(serialize("Prop", &vars), serialize("Prop", &vars.clone()));
    }
}

// =============================================================================
// Engine round trip
// =============================================================================

fn write_addon(root: &Path, name: &str, toc: &str, files: &[(&str, &str)]) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{name}.toc")), toc).unwrap();
    for (file, source) in files {
        std::fs::write(dir.join(file), source).unwrap();
    }
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.addons.dir = root.join("AddOns");
    config.addons.saved_variables_dir = root.join("SavedVariables");
    config
}

#[test]
fn cyclic_tables_are_truncated_on_save() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        &root.path().join("AddOns"),
        "Loop",
        "## SavedVariables: LoopDB\nLoop.lua\n",
        &[(
            "Loop.lua",
            "LoopDB = { name = 'loop', inner = { n = 1 } }\nLoopDB.self = LoopDB\nLoopDB.inner.up = LoopDB\n",
        )],
    );

    let engine = Engine::new(config(root.path())).unwrap();
    assert_eq!(engine.load_addons().unwrap(), vec!["Loop"]);
    assert_eq!(engine.save_variables().unwrap(), 1);

    let text = std::fs::read_to_string(root.path().join("SavedVariables/Loop.lua")).unwrap();
    assert!(!text.contains("\"self\""), "{text}");
    assert!(!text.contains("\"up\""), "{text}");

    let back = parse("Loop", &text, &["LoopDB".to_string()]).unwrap();
    assert_eq!(back["LoopDB"].field("name"), Some(&ScriptValue::from("loop")));
    assert_eq!(
        back["LoopDB"].field("inner").and_then(|inner| inner.field("n")),
        Some(&ScriptValue::Integer(1))
    );
}

#[test]
fn saved_globals_survive_a_restart() {
    let root = tempfile::tempdir().unwrap();
    let counter = "CounterDB = CounterDB or { runs = 0 }\nCounterDB.runs = CounterDB.runs + 1\n";
    write_addon(
        &root.path().join("AddOns"),
        "Counter",
        "## SavedVariables: CounterDB\n## SavedVariablesPerCharacter: CounterCharDB\nCounter.lua\n",
        &[("Counter.lua", counter)],
    );

    for expected in 1..=3_i64 {
        let engine = Engine::new(config(root.path())).unwrap();
        engine.load_addons().unwrap();
        assert_eq!(
            engine.eval("CounterDB.runs").unwrap(),
            ScriptValue::Integer(expected)
        );
        engine.save_variables().unwrap();
        engine.shutdown().unwrap();
    }
}

#[test]
fn byte_strings_survive_a_restart() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        &root.path().join("AddOns"),
        "Blob",
        "## SavedVariables: BlobDB\nBlob.lua\n",
        &[(
            "Blob.lua",
            "BlobDB = BlobDB or { raw = '\\255\\254abc', ['\\255'] = 1, ['\\254'] = 2 }\n",
        )],
    );

    for _ in 0..2 {
        let engine = Engine::new(config(root.path())).unwrap();
        engine.load_addons().unwrap();
        let raw = engine.eval("BlobDB.raw").unwrap();
        assert_eq!(raw.as_bytes(), Some(&b"\xff\xfeabc"[..]));
        assert_eq!(
            engine
                .eval("#BlobDB.raw == 5 and BlobDB['\\255'] == 1 and BlobDB['\\254'] == 2")
                .unwrap(),
            ScriptValue::Boolean(true)
        );
        engine.save_variables().unwrap();
        engine.shutdown().unwrap();
    }
}

#[test]
fn unreadable_saved_variables_are_not_overwritten() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        &root.path().join("AddOns"),
        "Fragile",
        "## SavedVariables: FragileDB\nFragile.lua\n",
        &[("Fragile.lua", "FragileDB = FragileDB or {}\n")],
    );
    let saved = root.path().join("SavedVariables");
    std::fs::create_dir_all(&saved).unwrap();
    std::fs::write(saved.join("Fragile.lua"), "FragileDB = {").unwrap();

    let engine = Engine::new(config(root.path())).unwrap();
    engine.load_addons().unwrap();
    assert_eq!(engine.save_variables().unwrap(), 0);
    assert_eq!(
        std::fs::read_to_string(saved.join("Fragile.lua")).unwrap(),
        "FragileDB = {"
    );

    let manifest = AddonManifest::from_dir(&root.path().join("AddOns/Fragile")).unwrap();
    assert_eq!(manifest.saved_variable_names(), vec!["FragileDB"]);
}
