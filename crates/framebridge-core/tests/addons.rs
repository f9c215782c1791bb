//! Addon discovery and loading through the engine.

use framebridge_core::addon::discover_addons;
use framebridge_core::engine::check_addon;
use framebridge_core::{Config, Engine, ScriptValue};
use std::path::Path;

fn write_addon(root: &Path, name: &str, toc: &str, files: &[(&str, &str)]) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{name}.toc")), toc).unwrap();
    for (file, source) in files {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, source).unwrap();
    }
}

fn engine_for(root: &Path) -> Engine {
    let mut config = Config::default();
    config.addons.dir = root.to_path_buf();
    config.addons.saved_variables_dir = root.join("_saved");
    Engine::new(config).unwrap()
}

#[test]
fn files_receive_name_and_shared_table() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        root.path(),
        "Shared",
        "## Title: Shared\nCore.lua\nModules\\Extra.lua\n",
        &[
            ("Core.lua", "local name, ns = ...\nns.core = name\n"),
            ("Modules/Extra.lua", "local name, ns = ...\nSharedSeen = ns.core .. '/' .. name\n"),
        ],
    );

    let engine = engine_for(root.path());
    assert_eq!(engine.load_addons().unwrap(), vec!["Shared"]);
    assert_eq!(engine.global("SharedSeen").unwrap(), ScriptValue::from("Shared/Shared"));
    assert_eq!(
        engine.addon_table("Shared").unwrap().field("core"),
        Some(&ScriptValue::from("Shared"))
    );
}

#[test]
fn malformed_file_is_skipped_and_loading_continues() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        root.path(),
        "Partial",
        "First.lua\nBroken.lua\nThrows.lua\nLayout.xml\nMissing.lua\nLast.lua\n",
        &[
            ("First.lua", "order = { 'first' }\n"),
            ("Broken.lua", "this is not lua\n"),
            ("Throws.lua", "table.insert(order, 'throws')\nerror('late failure')\n"),
            ("Layout.xml", "<Ui/>\n"),
            ("Last.lua", "table.insert(order, 'last')\n"),
        ],
    );

    let engine = engine_for(root.path());
    let manifest = discover_addons(root.path()).unwrap().remove(0);
    assert_eq!(engine.load_addon(&manifest).unwrap(), 2);
    assert_eq!(
        engine.eval("table.concat(order, ',')").unwrap(),
        ScriptValue::from("first,throws,last")
    );

    let issues = check_addon(&manifest);
    assert_eq!(issues.len(), 2, "{issues:?}");
    assert!(issues[0].path.ends_with("Broken.lua"));
    assert!(issues[1].path.ends_with("Missing.lua"));
}

#[test]
fn addon_loaded_fires_per_addon_in_dependency_order() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        root.path(),
        "Base",
        "Base.lua\n",
        &[(
            "Base.lua",
            r#"
            loaded = {}
            local f = CreateFrame("Frame", "LoadWatcher")
            f:RegisterEvent("ADDON_LOADED")
            f:SetScript("OnEvent", function(_, _, name) table.insert(loaded, name) end)
            "#,
        )],
    );
    write_addon(root.path(), "App", "## Dependencies: Base\nApp.lua\n", &[("App.lua", "")]);
    write_addon(root.path(), "Orphan", "## Dependencies: Nowhere\nOrphan.lua\n", &[("Orphan.lua", "")]);
    write_addon(root.path(), "Off", "Off.lua\n", &[("Off.lua", "OffRan = true\n")]);
    write_addon(
        root.path(),
        "Later",
        "## LoadOnDemand: 1\nLater.lua\n",
        &[("Later.lua", "LaterRan = true\n")],
    );

    let mut config = Config::default();
    config.addons.dir = root.path().to_path_buf();
    config.addons.saved_variables_dir = root.path().join("_saved");
    config.addons.disabled = vec!["off".to_string()];
    let engine = Engine::new(config).unwrap();

    assert_eq!(engine.load_addons().unwrap(), vec!["Base", "App"]);
    assert_eq!(engine.loaded_addons(), vec!["Base", "App"]);
    assert_eq!(
        engine.eval("table.concat(loaded, ',')").unwrap(),
        ScriptValue::from("Base,App")
    );
    assert_eq!(engine.global("OffRan").unwrap(), ScriptValue::Nil);
    assert_eq!(engine.global("LaterRan").unwrap(), ScriptValue::Nil);
}

#[test]
fn addon_frames_appear_in_the_tree() {
    let root = tempfile::tempdir().unwrap();
    write_addon(
        root.path(),
        "Panel",
        "Panel.lua\n",
        &[(
            "Panel.lua",
            r#"
            local panel = CreateFrame("Frame", "$parentPanel", UIParent)
            panel:CreateFontString(nil, "OVERLAY"):SetText("hi")
            panel:RegisterEvent("PLAYER_LOGIN")
            "#,
        )],
    );

    let engine = engine_for(root.path());
    engine.load_addons().unwrap();
    let tree = engine.tree();
    let ui_parent = tree
        .iter()
        .find(|node| node.name.as_deref() == Some("UIParent"))
        .unwrap();
    let panel = &ui_parent.children[0];
    assert_eq!(panel.name.as_deref(), Some("UIParentPanel"));
    assert_eq!(panel.events, vec!["PLAYER_LOGIN"]);
    assert_eq!(panel.children.len(), 1);

    let json = serde_json::to_value(&tree).unwrap();
    assert!(json.to_string().contains("UIParentPanel"));
}
