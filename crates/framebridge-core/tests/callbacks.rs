//! Replace-vs-hook semantics of script slots, from both sides.

use framebridge_core::{CallbackArgs, Config, Engine, ScriptSlot, ScriptValue};

fn engine() -> Engine {
    let engine = Engine::new(Config::default()).unwrap();
    engine.exec("log = {}", "init").unwrap();
    engine
}

fn log(engine: &Engine) -> ScriptValue {
    engine.eval("table.concat(log, ',')").unwrap()
}

#[test]
fn set_script_replaces_only_the_primary() {
    let engine = engine();
    engine
        .exec(
            r#"
            f = CreateFrame("Frame")
            f:SetScript("OnShow", function() table.insert(log, "one") end)
            f:HookScript("OnShow", function() table.insert(log, "hook") end)
            f:SetScript("OnShow", function() table.insert(log, "two") end)
            f:Hide()
            f:Show()
            "#,
            "replace",
        )
        .unwrap();
    assert_eq!(log(&engine), ScriptValue::from("two,hook"));
}

#[test]
fn hook_on_empty_slot_becomes_first_entry() {
    let engine = engine();
    engine
        .exec(
            r#"
            f = CreateFrame("Frame")
            f:HookScript("OnHide", function() table.insert(log, "hook") end)
            hasScript = f:HasScript("OnHide")
            primary = f:GetScript("OnHide") ~= nil
            f:Hide()
            "#,
            "hook-first",
        )
        .unwrap();
    assert_eq!(log(&engine), ScriptValue::from("hook"));
    assert_eq!(engine.global("primary").unwrap(), ScriptValue::Boolean(true));
}

#[test]
fn clearing_releases_every_handler() {
    let engine = engine();
    engine
        .exec(
            r#"
            f = CreateFrame("Frame", "Cleared")
            f:SetScript("OnShow", function() table.insert(log, "a") end)
            f:HookScript("OnShow", function() table.insert(log, "b") end)
            "#,
            "clear",
        )
        .unwrap();
    let frame = engine.lookup_name("Cleared").unwrap();
    let before = engine.bridge().pinned_refs();
    assert_eq!(engine.bridge().handler_count(frame, ScriptSlot::OnShow), 2);

    engine.exec("f:SetScript('OnShow', nil)", "clear").unwrap();
    assert_eq!(engine.bridge().handler_count(frame, ScriptSlot::OnShow), 0);
    assert_eq!(engine.bridge().pinned_refs(), before - 2);
    assert_eq!(
        engine.fire_script(frame, ScriptSlot::OnShow, &CallbackArgs::None).unwrap(),
        0
    );
}

#[test]
fn every_handler_receives_the_same_arguments() {
    let engine = engine();
    let frame = engine.create_object("Frame", None, None, None, None).unwrap();
    engine
        .set_callback(
            frame,
            ScriptSlot::OnUpdate,
            Some("function(self, elapsed) table.insert(log, 'p' .. elapsed) end"),
        )
        .unwrap();
    engine
        .hook_callback(
            frame,
            ScriptSlot::OnUpdate,
            "function(self, elapsed) table.insert(log, 'h' .. elapsed) end",
        )
        .unwrap();
    assert_eq!(
        engine
            .fire_script(frame, ScriptSlot::OnUpdate, &CallbackArgs::Elapsed(0.5))
            .unwrap(),
        2
    );
    assert_eq!(log(&engine), ScriptValue::from("p0.5,h0.5"));
}

#[test]
fn failing_primary_does_not_stop_hooks() {
    let engine = engine();
    engine
        .exec(
            r#"
            f = CreateFrame("Button")
            f:SetScript("OnClick", function() error("primary failed") end)
            f:HookScript("OnClick", function(_, button, down)
                table.insert(log, button .. ":" .. tostring(down))
            end)
            f:Click()
            "#,
            "failing",
        )
        .unwrap();
    assert_eq!(log(&engine), ScriptValue::from("LeftButton:false"));
}

#[test]
fn unknown_slot_names_are_argument_errors() {
    let engine = engine();
    engine
        .exec(
            r#"
            local f = CreateFrame("Frame")
            local ok, err = pcall(f.SetScript, f, "OnTeleport", function() end)
            setOk, setErr = ok, tostring(err)
            "#,
            "unknown-slot",
        )
        .unwrap();
    assert_eq!(engine.global("setOk").unwrap(), ScriptValue::Boolean(false));
    let message = engine.global("setErr").unwrap();
    let message = message.as_str().unwrap();
    assert!(message.contains("bad argument #2 to 'SetScript'"), "{message}");
    assert!(message.contains("OnTeleport"), "{message}");
}

#[test]
fn function_hooks_run_after_the_original() {
    let engine = engine();
    engine
        .exec(
            r#"
            function Greet(name) table.insert(log, "hello " .. name); return "done" end
            hooksecurefunc("Greet", function(name) table.insert(log, "hooked " .. name) end)
            result = Greet("you")

            local a = CreateFrame("Frame")
            local b = CreateFrame("Frame")
            hooksecurefunc(a, "Hide", function() table.insert(log, "a hidden") end)
            b:Hide()
            a:Hide()
            "#,
            "hooksecurefunc",
        )
        .unwrap();
    assert_eq!(engine.global("result").unwrap(), ScriptValue::from("done"));
    assert_eq!(
        log(&engine),
        ScriptValue::from("hello you,hooked you,a hidden")
    );
}

#[test]
fn released_objects_refuse_new_handlers() {
    let engine = engine();
    let frame = engine.create_object("Frame", None, None, None, None).unwrap();
    engine.destroy_object(frame).unwrap();
    assert!(
        !engine
            .set_callback(frame, ScriptSlot::OnShow, Some("function() end"))
            .unwrap()
    );
    assert!(
        !engine
            .hook_callback(frame, ScriptSlot::OnShow, "function() end")
            .unwrap()
    );
}

#[test]
fn instance_function_hooks_are_released_with_their_object() {
    let engine = engine();
    let baseline = engine.bridge().pinned_refs();
    engine
        .exec(
            r#"
            local f = CreateFrame("Frame")
            hooksecurefunc(f, "Show", function() table.insert(log, "shown") end)
            f:Show()
            f:Destroy()
            f:Show()
            "#,
            "instance-hook",
        )
        .unwrap();
    assert_eq!(engine.bridge().pinned_refs(), baseline);
    assert_eq!(log(&engine), ScriptValue::from("shown"));
}

#[test]
fn global_function_hooks_stay_pinned_until_shutdown() {
    let engine = engine();
    let baseline = engine.bridge().pinned_refs();
    engine
        .exec(
            r#"
            function Ping() end
            hooksecurefunc("Ping", function() table.insert(log, "pong") end)
            Ping()
            "#,
            "global-hook",
        )
        .unwrap();
    assert_eq!(engine.bridge().pinned_refs(), baseline + 2);
    engine.shutdown().unwrap();
    assert_eq!(engine.bridge().pinned_refs(), 0);
}
