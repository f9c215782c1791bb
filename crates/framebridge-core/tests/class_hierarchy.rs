//! Class resolution against the standard widget hierarchy.
//!
//! Validates:
//! 1. every leaf resolves the methods its ancestors define, and only those
//! 2. every resolvable method reports the nearest owner on the chain
//! 3. overrides shadow ancestors (Frame:Show over ScriptRegion:Show)
//! 4. Lua class tables resolve like the native hierarchy and reject writes
//! 5. a method bound on an unrelated class rejects the receiver
//! 6. a fresh instance of each leaf exposes every method its class resolves

use framebridge_core::class::ClassHierarchy;
use framebridge_core::error::ClassError;
use framebridge_core::{Config, Engine, ScriptValue, WidgetKind};
use std::collections::BTreeSet;

fn standard() -> ClassHierarchy {
    ClassHierarchy::standard().expect("standard hierarchy")
}

#[test]
fn leaves_inherit_from_every_ancestor() {
    let classes = standard();
    let mut leaves = classes.leaves();
    leaves.sort_unstable();
    assert_eq!(
        leaves,
        [
            "Button",
            "EditBox",
            "FontString",
            "GameTooltip",
            "Line",
            "ModelScene",
            "ModelSceneActor",
            "PlayerModel",
        ]
    );

    let expected: &[(&str, &[&str])] = &[
        ("Button", &["GetName", "SetPoint", "RegisterEvent", "Click"]),
        ("Line", &["GetObjectType", "Show", "SetTexture", "SetStartPoint"]),
        ("FontString", &["Destroy", "GetHeight", "SetText"]),
        ("PlayerModel", &["IsForbidden", "CreateTexture", "SetFacing", "SetUnit"]),
        ("ModelScene", &["GetParent", "SetScript", "CreateActor"]),
        ("ModelSceneActor", &["GetName", "SetYaw", "Show"]),
    ];
    for (leaf, names) in expected {
        let resolved = classes.methods(leaf).unwrap();
        for name in *names {
            assert!(resolved.contains(*name), "{leaf} cannot resolve {name}");
        }
    }

    let line = classes.methods("Line").unwrap();
    let texture: BTreeSet<String> = classes.methods("Texture").unwrap();
    assert!(texture.is_subset(&line));
    assert!(!line.contains("RegisterEvent"));
    assert!(!classes.methods("ModelSceneActor").unwrap().contains("SetPoint"));
}

#[test]
fn resolution_reports_nearest_owner() {
    let classes = standard();
    for class in classes.class_names() {
        let chain = classes.chain(class).unwrap();
        for method in classes.methods(class).unwrap() {
            let (owner, _) = classes.resolve(class, &method).unwrap();
            let nearest = chain
                .iter()
                .find(|c| classes.own_methods(c).unwrap().contains(&method))
                .unwrap();
            assert_eq!(owner, *nearest, "{class}:{method}");
        }
    }
}

#[test]
fn overrides_shadow_ancestors() {
    let classes = standard();
    assert_eq!(classes.resolve("Frame", "Show").unwrap().0, "Frame");
    assert_eq!(classes.resolve("Button", "Show").unwrap().0, "Frame");
    assert_eq!(classes.resolve("Texture", "Show").unwrap().0, "ScriptRegion");
    assert_eq!(classes.resolve("ModelSceneActor", "Show").unwrap().0, "ModelSceneActor");
    assert_eq!(classes.resolve("Button", "SetText").unwrap().0, "Button");
    assert_eq!(classes.resolve("FontString", "SetText").unwrap().0, "FontString");
    assert_eq!(classes.resolve("PlayerModel", "SetFacing").unwrap().0, "Model");
}

#[test]
fn missing_methods_walk_to_the_root() {
    let classes = standard();
    assert_eq!(
        classes.resolve("Texture", "RegisterEvent").unwrap_err(),
        ClassError::NoSuchMethod {
            class: "Texture".to_string(),
            method: "RegisterEvent".to_string(),
        }
    );
    assert!(classes.resolve("ModelSceneActor", "SetPoint").is_err());
}

#[test]
fn every_kind_has_a_class() {
    let classes = standard();
    for kind in WidgetKind::ALL {
        assert!(classes.contains(kind.class_name()), "{kind}");
        assert_eq!(
            classes.partition(kind.class_name()).unwrap(),
            Some(kind.partition())
        );
    }
}

#[test]
fn lua_class_tables_follow_the_hierarchy() {
    let engine = Engine::new(Config::default()).unwrap();
    engine
        .exec(
            r#"
            local button = CreateFrame("Button")
            local frame = CreateFrame("Frame")
            hasClick = button.Click ~= nil
            frameHasClick = frame.Click ~= nil
            sharedShow = button.Show == frame.Show
            isFrame = button:IsObjectType("Frame")
            isTexture = button:IsObjectType("Texture")
            "#,
            "classes",
        )
        .unwrap();
    assert_eq!(engine.global("hasClick").unwrap(), ScriptValue::Boolean(true));
    assert_eq!(engine.global("frameHasClick").unwrap(), ScriptValue::Boolean(false));
    assert_eq!(engine.global("sharedShow").unwrap(), ScriptValue::Boolean(true));
    assert_eq!(engine.global("isFrame").unwrap(), ScriptValue::Boolean(true));
    assert_eq!(engine.global("isTexture").unwrap(), ScriptValue::Boolean(false));
}

#[test]
fn class_tables_are_read_only_and_instances_are_not() {
    let engine = Engine::new(Config::default()).unwrap();
    engine
        .exec(
            r#"
            local a = CreateFrame("Frame")
            local b = CreateFrame("Frame")
            local class = getmetatable(a).__index
            local ok, err = pcall(function() class.Shared = 1 end)
            writeOk, writeErr = ok, tostring(err)
            a.counter = 1
            siblingSees = b.counter
            "#,
            "readonly",
        )
        .unwrap();
    assert_eq!(engine.global("writeOk").unwrap(), ScriptValue::Boolean(false));
    let message = engine.global("writeErr").unwrap();
    assert!(message.as_str().unwrap().contains("read-only class table"));
    assert_eq!(engine.global("siblingSees").unwrap(), ScriptValue::Nil);
}

#[test]
fn borrowed_method_rejects_unrelated_receiver() {
    let engine = Engine::new(Config::default()).unwrap();
    engine
        .exec(
            r#"
            local frame = CreateFrame("Frame")
            local tex = frame:CreateTexture()
            local success, message = pcall(frame.RegisterEvent, tex, "PING")
            ok, err = success, tostring(message)
            "#,
            "borrowed",
        )
        .unwrap();
    assert_eq!(engine.global("ok").unwrap(), ScriptValue::Boolean(false));
    assert!(
        engine
            .global("err")
            .unwrap()
            .as_str()
            .unwrap()
            .contains("wrong object type")
    );
}

#[test]
fn fresh_leaf_instances_expose_every_resolved_method() {
    let classes = standard();
    let engine = Engine::new(Config::default()).unwrap();
    for leaf in classes.leaves() {
        let create = match leaf {
            "Line" => r#"CreateFrame("Frame"):CreateLine()"#.to_string(),
            "FontString" => r#"CreateFrame("Frame"):CreateFontString()"#.to_string(),
            "ModelSceneActor" => r#"CreateFrame("ModelScene"):CreateActor()"#.to_string(),
            frame => format!("CreateFrame({frame:?})"),
        };
        let names: Vec<String> = classes
            .methods(leaf)
            .unwrap()
            .iter()
            .map(|name| format!("{name:?}"))
            .collect();
        engine
            .exec(
                &format!(
                    r#"
                    local object = {create}
                    local absent = {{}}
                    for _, name in ipairs({{ {names} }}) do
                        if type(object[name]) ~= "function" then
                            absent[#absent + 1] = name
                        end
                    end
                    leafKind = object:GetObjectType()
                    leafAbsent = table.concat(absent, ",")
                    "#,
                    names = names.join(", "),
                ),
                leaf,
            )
            .unwrap();
        assert_eq!(engine.global("leafKind").unwrap(), ScriptValue::from(leaf));
        assert_eq!(
            engine.global("leafAbsent").unwrap(),
            ScriptValue::from(""),
            "{leaf} instance lacks resolved methods"
        );
    }
}
