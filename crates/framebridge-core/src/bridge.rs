//! The bridge between native widget objects and the Lua state.
//!
//! [`Bridge`] owns the handle table, object registry, script reference
//! registry, event sets, class tables and timers. It is shared as
//! `Arc<Bridge>` by every native function installed into Lua; the Lua state
//! itself is owned by the engine and passed in by reference.
//!
//! No bridge lock is held while script code runs: handler functions are
//! fetched under the locks, the locks are dropped, then the handlers are
//! called. Handlers may therefore create, destroy and re-register objects
//! freely, including the one being dispatched to.

use crate::callbacks::{CallbackArgs, ScriptSlot};
use crate::class::{ClassHierarchy, ClassTables};
use crate::error::{CreateError, Error, Result};
use crate::events::EventRegistry;
use crate::handle::{Handle, HandleTable};
use crate::logging::targets;
use crate::refs::{RefSlot, ScriptRefs};
use crate::registry::ObjectRegistry;
use crate::timer::TimerQueue;
use crate::value::{ScriptValue, lua_value_to_script, script_to_lua_value};
use crate::widget::{self, FrameExtra, NativeRef, Partition, WidgetCore, WidgetKind};
use crate::wrapper::{FinalizeQueue, create_wrapper, handle_of};
use mlua::{Function, Lua, MultiValue, Table, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Parameters of an object creation request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub kind: WidgetKind,
    pub name: Option<String>,
    pub parent: Option<Handle>,
    pub template: Option<String>,
    pub id: Option<i64>,
}

impl CreateRequest {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            name: None,
            parent: None,
            template: None,
            id: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: Handle) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// One node of the live object tree.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectNode {
    pub handle: Handle,
    pub kind: WidgetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub shown: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ObjectNode>,
}

/// Handlers of one slot fetched for a later call.
struct PreparedCall<'lua> {
    handle: Handle,
    object: String,
    this: Value<'lua>,
    handlers: Vec<Function<'lua>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Bridge {
    handles: Mutex<HandleTable<NativeRef>>,
    objects: Mutex<ObjectRegistry>,
    refs: Mutex<ScriptRefs>,
    events: EventRegistry,
    classes: ClassHierarchy,
    class_tables: Mutex<HashMap<String, ClassTables>>,
    names: Mutex<HashMap<String, Handle>>,
    timers: Mutex<TimerQueue>,
    /// `hooksecurefunc` slots on plain tables, released at shutdown.
    function_hooks: Mutex<Vec<RefSlot>>,
    finalized: Arc<FinalizeQueue>,
    clock: Mutex<f64>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("live", &self.live_count())
            .field("pinned_refs", &self.pinned_refs())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Create a bridge with the standard class hierarchy and build its
    /// class tables in `lua`.
    pub fn new(lua: &Lua) -> Result<Arc<Self>> {
        let bridge = Arc::new(Self {
            handles: Mutex::new(HandleTable::new()),
            objects: Mutex::new(ObjectRegistry::new()),
            refs: Mutex::new(ScriptRefs::new()),
            events: EventRegistry::new(),
            classes: ClassHierarchy::standard()?,
            class_tables: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
            timers: Mutex::new(TimerQueue::new()),
            function_hooks: Mutex::new(Vec::new()),
            finalized: Arc::new(Mutex::new(Vec::new())),
            clock: Mutex::new(0.0),
        });
        let tables = bridge.classes.materialize(lua, &bridge)?;
        *lock(&bridge.class_tables) = tables;
        Ok(bridge)
    }

    pub fn classes(&self) -> &ClassHierarchy {
        &self.classes
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn registry(&self) -> MutexGuard<'_, ObjectRegistry> {
        lock(&self.objects)
    }

    pub(crate) fn refs(&self) -> MutexGuard<'_, ScriptRefs> {
        lock(&self.refs)
    }

    /// The native object behind `handle`, if it is live.
    pub fn native(&self, handle: Handle) -> Option<NativeRef> {
        lock(&self.handles).resolve(handle).cloned()
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        lock(&self.handles).contains(handle)
    }

    pub fn kind_of(&self, handle: Handle) -> Option<WidgetKind> {
        self.native(handle).map(|native| native.kind())
    }

    pub fn live_count(&self) -> usize {
        lock(&self.handles).pinned()
    }

    pub fn live_handles(&self) -> Vec<Handle> {
        lock(&self.handles).handles()
    }

    pub fn pinned_refs(&self) -> usize {
        lock(&self.refs).pinned()
    }

    /// Run `f` on the core of a live object.
    pub fn with_core<R>(&self, handle: Handle, f: impl FnOnce(&mut WidgetCore) -> R) -> Option<R> {
        self.native(handle).map(|native| native.with_core(f))
    }

    pub fn debug_name(&self, handle: Handle) -> String {
        self.with_core(handle, |core| core.debug_name())
            .unwrap_or_else(|| format!("<released {handle}>"))
    }

    /// Live object registered under the global `name`.
    pub fn lookup_name(&self, name: &str) -> Option<Handle> {
        let handle = lock(&self.names).get(name).copied()?;
        self.is_live(handle).then_some(handle)
    }

    /// Seconds of simulated time since the bridge was created.
    pub fn now(&self) -> f64 {
        *lock(&self.clock)
    }

    pub fn advance_clock(&self, elapsed: f64) -> f64 {
        let mut clock = lock(&self.clock);
        *clock += elapsed.max(0.0);
        *clock
    }

    /// The read-only class table scripts see for `class`.
    pub fn class_table<'lua>(&self, lua: &'lua Lua, class: &str) -> mlua::Result<Option<Table<'lua>>> {
        match lock(&self.class_tables).get(class) {
            Some(tables) => lua.registry_value(&tables.proxy).map(Some),
            None => Ok(None),
        }
    }

    // ── creation and release ──────────────────────────────────

    fn validate_parent(&self, kind: WidgetKind, parent: Option<Handle>) -> Result<Option<Handle>> {
        let Some(parent) = parent else {
            if kind.required_parent().is_some() {
                return Err(CreateError::MissingParent { kind: kind.name() }.into());
            }
            return Ok(None);
        };
        let Some(parent_kind) = self.kind_of(parent) else {
            return Err(CreateError::InvalidParent {
                kind: kind.name(),
                parent: format!("released object {parent}"),
            }
            .into());
        };
        if !kind.accepts_parent(parent_kind) {
            return Err(CreateError::InvalidParent {
                kind: kind.name(),
                parent: parent_kind.name().to_string(),
            }
            .into());
        }
        Ok(Some(parent))
    }

    /// Expand `$parent` in a requested name with the parent's name.
    fn expand_name(&self, name: &str, parent: Option<Handle>) -> String {
        const TOKEN: &str = "$parent";
        let Some(start) = name.to_ascii_lowercase().find(TOKEN) else {
            return name.to_string();
        };
        let parent_name = parent
            .and_then(|parent| self.with_core(parent, |core| core.name.clone()))
            .flatten()
            .unwrap_or_default();
        format!(
            "{}{}{}",
            &name[..start],
            parent_name,
            &name[start + TOKEN.len()..]
        )
    }

    /// Create an object, build and pin its wrapper, and return both.
    pub fn create_object<'lua>(
        self: &Arc<Self>,
        lua: &'lua Lua,
        request: CreateRequest,
    ) -> Result<(Handle, Table<'lua>)> {
        let kind = request.kind;
        let parent = self.validate_parent(kind, request.parent)?;
        let name = request
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| self.expand_name(name, parent));

        let handle = lock(&self.handles).allocate_with(|handle| NativeRef::new(handle, kind));
        let native = self.native(handle).ok_or(crate::error::LifecycleError::UnknownHandle(handle))?;
        native.with_core(|core| {
            core.name.clone_from(&name);
            core.parent = parent;
            core.id = request.id.unwrap_or(0);
            core.template.clone_from(&request.template);
        });
        if let Err(err) = self.registry().register(handle, native.clone()) {
            let _ = lock(&self.handles).release(handle);
            return Err(err.into());
        }
        if let Some(parent) = parent {
            self.attach_child(parent, handle, kind);
        }

        let wrapper = match self.build_wrapper(lua, handle, kind) {
            Ok(wrapper) => wrapper,
            Err(err) => {
                let _ = self.destroy(lua, handle);
                return Err(err.into());
            }
        };
        if let Some(name) = &name {
            lock(&self.names).insert(name.clone(), handle);
            lua.globals().set(name.as_str(), wrapper.clone())?;
        }

        tracing::debug!(
            target: targets::LIFECYCLE,
            handle = %handle,
            kind = %kind,
            object = %native.with_core(|core| core.debug_name()),
            parent = ?parent.map(|p| p.to_string()),
            "object created"
        );

        if let Some(template) = &request.template {
            self.apply_templates(lua, handle, &wrapper, template);
        }
        Ok((handle, wrapper))
    }

    fn build_wrapper<'lua>(&self, lua: &'lua Lua, handle: Handle, kind: WidgetKind) -> mlua::Result<Table<'lua>> {
        let metatable: Table = {
            let tables = lock(&self.class_tables);
            let Some(tables) = tables.get(kind.class_name()) else {
                return Err(mlua::Error::RuntimeError(format!(
                    "no class table for {kind}"
                )));
            };
            lua.registry_value(&tables.instance_mt)?
        };
        let wrapper = create_wrapper(lua, handle, metatable, Arc::downgrade(&self.finalized))?;
        let slot = self.refs().pin(lua, wrapper.clone())?;
        self.with_core(handle, |core| core.wrapper = Some(slot));
        Ok(wrapper)
    }

    /// Mix each comma-separated template table into `wrapper` and run its `OnLoad`.
    fn apply_templates(&self, lua: &Lua, handle: Handle, wrapper: &Table, templates: &str) {
        for template in templates.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let source = match lua.globals().get::<_, Value>(template) {
                Ok(Value::Table(source)) => source,
                _ => {
                    tracing::warn!(target: targets::SCRIPT, template, object = %self.debug_name(handle), "template is not a global table");
                    continue;
                }
            };
            if let Err(err) = mixin(wrapper, &source) {
                tracing::warn!(target: targets::SCRIPT, template, error = %err, "template mixin failed");
                continue;
            }
            if let Ok(Value::Function(on_load)) = source.raw_get::<_, Value>("OnLoad") {
                if let Err(err) = on_load.call::<_, ()>(wrapper.clone()) {
                    tracing::error!(
                        target: targets::CALLBACKS,
                        template,
                        object = %self.debug_name(handle),
                        error = %err,
                        "template OnLoad failed"
                    );
                }
            }
        }
    }

    fn attach_child(&self, parent: Handle, child: Handle, kind: WidgetKind) {
        let Some(native) = self.native(parent) else {
            return;
        };
        if let NativeRef::Frame(frame) = &native {
            let mut frame = widget::lock(frame);
            frame.core.children.push(child);
            if kind == WidgetKind::ModelSceneActor {
                if let FrameExtra::ModelScene(scene) = &mut frame.extra {
                    scene.actors.push(child);
                }
            }
        }
    }

    fn detach_child(&self, parent: Handle, child: Handle) {
        let Some(NativeRef::Frame(frame)) = self.native(parent) else {
            return;
        };
        let mut frame = widget::lock(&frame);
        frame.core.children.retain(|h| *h != child);
        if let FrameExtra::ModelScene(scene) = &mut frame.extra {
            scene.actors.retain(|h| *h != child);
        }
    }

    /// Move `handle` under `parent`, validating the pairing.
    pub fn set_parent(&self, handle: Handle, parent: Option<Handle>) -> Result<()> {
        let Some(kind) = self.kind_of(handle) else {
            return Ok(());
        };
        let parent = self.validate_parent(kind, parent)?;
        if let Some(parent) = parent {
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == handle {
                    return Err(CreateError::InvalidParent {
                        kind: kind.name(),
                        parent: "its own descendant".to_string(),
                    }
                    .into());
                }
                cursor = self.with_core(current, |core| core.parent).flatten();
            }
        }
        let old = self
            .with_core(handle, |core| std::mem::replace(&mut core.parent, parent))
            .flatten();
        if let Some(old) = old {
            self.detach_child(old, handle);
        }
        if let Some(parent) = parent {
            self.attach_child(parent, handle, kind);
        }
        Ok(())
    }

    /// Release an object and everything hanging off it.
    ///
    /// Children are released first, then the object's registry entry, event
    /// subscriptions, callback references, wrapper reference and global name.
    pub fn destroy(&self, lua: &Lua, handle: Handle) -> Result<()> {
        let native = lock(&self.handles).release(handle)?;
        let (children, parent, name, wrapper, callbacks, hooks) = native.with_core(|core| {
            core.events.clear();
            (
                std::mem::take(&mut core.children),
                core.parent.take(),
                core.name.clone(),
                core.wrapper.take(),
                core.callbacks.drain_all(),
                std::mem::take(&mut core.function_hooks),
            )
        });

        for child in children {
            if self.is_live(child) {
                if let Err(err) = self.destroy(lua, child) {
                    tracing::error!(target: targets::LIFECYCLE, handle = %child, error = %err, "child release failed");
                }
            }
        }

        self.registry().unregister(handle);
        self.events.unsubscribe_all(handle);
        {
            let mut refs = self.refs();
            for slot in callbacks.into_iter().chain(hooks).chain(wrapper) {
                // unpin logs its own violations
                let _ = refs.unpin(lua, slot);
            }
        }
        if let Some(name) = &name {
            self.clear_global_name(lua, name, handle);
        }
        if let Some(parent) = parent {
            self.detach_child(parent, handle);
        }

        tracing::debug!(
            target: targets::LIFECYCLE,
            handle = %handle,
            object = name.as_deref().unwrap_or(""),
            live = self.live_count(),
            "object released"
        );
        Ok(())
    }

    fn clear_global_name(&self, lua: &Lua, name: &str, handle: Handle) {
        {
            let mut names = lock(&self.names);
            if names.get(name) == Some(&handle) {
                names.remove(name);
            }
        }
        let globals = lua.globals();
        if let Ok(current) = globals.raw_get::<_, Value>(name) {
            if handle_of(&current) == Some(handle) {
                if let Err(err) = globals.raw_set(name, Value::Nil) {
                    tracing::warn!(target: targets::LIFECYCLE, name, error = %err, "failed to clear global name");
                }
            }
        }
    }

    /// Release objects whose wrapper tokens were collected by the Lua GC.
    ///
    /// Handles already released through the explicit path are skipped.
    pub fn reap_finalized(&self, lua: &Lua) -> usize {
        let queued: Vec<Handle> = std::mem::take(&mut *lock(&self.finalized));
        let mut reaped = 0;
        for handle in queued {
            if !self.is_live(handle) {
                continue;
            }
            tracing::warn!(target: targets::LIFECYCLE, handle = %handle, object = %self.debug_name(handle), "object reclaimed by wrapper finalizer");
            if self.destroy(lua, handle).is_ok() {
                reaped += 1;
            }
        }
        reaped
    }

    // ── values ────────────────────────────────────────────────

    /// The pinned wrapper of `handle`, or nil once released.
    pub fn wrapper_of<'lua>(&self, lua: &'lua Lua, handle: Handle) -> mlua::Result<Value<'lua>> {
        let Some(slot) = self.with_core(handle, |core| core.wrapper).flatten() else {
            return Ok(Value::Nil);
        };
        Ok(self.refs().get(lua, slot)?.unwrap_or(Value::Nil))
    }

    pub fn script_to_lua<'lua>(&self, lua: &'lua Lua, value: &ScriptValue) -> mlua::Result<Value<'lua>> {
        script_to_lua_value(lua, value, &|handle| self.wrapper_of(lua, handle))
    }

    pub fn lua_to_script(&self, value: Value) -> mlua::Result<ScriptValue> {
        lua_value_to_script(value)
    }

    // ── events ────────────────────────────────────────────────

    pub fn register_event(&self, handle: Handle, event: &str) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        let added = self.events.subscribe(handle, event);
        self.with_core(handle, |core| core.events.insert(event.to_string()));
        added
    }

    pub fn unregister_event(&self, handle: Handle, event: &str) -> bool {
        self.with_core(handle, |core| core.events.remove(event));
        self.events.unsubscribe(handle, event)
    }

    pub fn unregister_all_events(&self, handle: Handle) -> usize {
        self.with_core(handle, |core| core.events.clear());
        self.events.unsubscribe_all(handle)
    }

    /// Deliver `event` to every subscriber's `OnEvent` handlers.
    ///
    /// Subscribers and their handler lists are captured before the first
    /// handler runs. Returns the number of handlers invoked.
    pub fn fire_event(&self, lua: &Lua, event: &str, param: &ScriptValue) -> Result<usize> {
        let subscribers = self.events.snapshot(event);
        let prepared: Vec<PreparedCall<'_>> = subscribers
            .iter()
            .filter_map(|handle| self.prepare(lua, *handle, ScriptSlot::OnEvent))
            .collect();
        let args = self.lua_args(lua, &CallbackArgs::event(event, param.clone()))?;

        tracing::debug!(
            target: targets::EVENTS,
            event,
            subscribers = subscribers.len(),
            with_handler = prepared.len(),
            "event fired"
        );
        Ok(prepared
            .into_iter()
            .map(|call| self.run(call, ScriptSlot::OnEvent, &args))
            .sum())
    }

    // ── callbacks ─────────────────────────────────────────────

    /// Replace the primary handler of `slot`, or clear the slot with `None`.
    ///
    /// Returns false when the object is no longer live.
    pub fn set_script(&self, lua: &Lua, handle: Handle, slot: ScriptSlot, handler: Option<Function>) -> Result<bool> {
        let Some(native) = self.native(handle) else {
            return Ok(false);
        };
        let released = match handler {
            Some(handler) => {
                let pinned = self.refs().pin(lua, handler)?;
                native
                    .with_core(|core| core.callbacks.set(slot, pinned))
                    .into_iter()
                    .collect::<Vec<RefSlot>>()
            }
            None => native.with_core(|core| core.callbacks.clear(slot)),
        };
        {
            let mut refs = self.refs();
            for old in &released {
                let _ = refs.unpin(lua, *old);
            }
        }
        tracing::debug!(
            target: targets::CALLBACKS,
            handle = %handle,
            slot = %slot,
            object = %self.debug_name(handle),
            released = released.len(),
            "script set"
        );
        Ok(true)
    }

    /// Append `handler` after the existing handlers of `slot`.
    pub fn hook_script(&self, lua: &Lua, handle: Handle, slot: ScriptSlot, handler: Function) -> Result<bool> {
        let Some(native) = self.native(handle) else {
            return Ok(false);
        };
        let pinned = self.refs().pin(lua, handler)?;
        let count = native.with_core(|core| {
            core.callbacks.hook(slot, pinned);
            core.callbacks.handlers(slot).len()
        });
        tracing::debug!(target: targets::CALLBACKS, handle = %handle, slot = %slot, handlers = count, "script hooked");
        Ok(true)
    }

    /// The primary handler of `slot`.
    pub fn get_script<'lua>(&self, lua: &'lua Lua, handle: Handle, slot: ScriptSlot) -> mlua::Result<Option<Function<'lua>>> {
        let Some(primary) = self
            .with_core(handle, |core| core.callbacks.primary(slot))
            .flatten()
        else {
            return Ok(None);
        };
        self.refs().get_as(lua, primary)
    }

    pub fn handler_count(&self, handle: Handle, slot: ScriptSlot) -> usize {
        self.with_core(handle, |core| core.callbacks.handlers(slot).len())
            .unwrap_or(0)
    }

    /// Call every handler bound to `slot` on `handle`, primary first.
    ///
    /// A failing handler is logged and the remaining handlers still run.
    /// Returns the number of handlers invoked.
    pub fn invoke_handlers(&self, lua: &Lua, handle: Handle, slot: ScriptSlot, args: &CallbackArgs) -> Result<usize> {
        if !args.fits(slot) {
            return Err(Error::Lua(mlua::Error::RuntimeError(format!(
                "arguments {:?} do not fit {slot}",
                args.shape()
            ))));
        }
        let Some(call) = self.prepare(lua, handle, slot) else {
            return Ok(0);
        };
        let args = self.lua_args(lua, args)?;
        Ok(self.run(call, slot, &args))
    }

    fn lua_args<'lua>(&self, lua: &'lua Lua, args: &CallbackArgs) -> mlua::Result<Vec<Value<'lua>>> {
        args.to_values()
            .iter()
            .map(|value| self.script_to_lua(lua, value))
            .collect()
    }

    fn prepare<'lua>(&self, lua: &'lua Lua, handle: Handle, slot: ScriptSlot) -> Option<PreparedCall<'lua>> {
        let (slots, object, wrapper) = self.with_core(handle, |core| {
            (
                core.callbacks.handlers(slot).to_vec(),
                core.debug_name(),
                core.wrapper,
            )
        })?;
        if slots.is_empty() {
            return None;
        }
        let refs = self.refs();
        let this = match wrapper.map(|slot| refs.get(lua, slot)) {
            Some(Ok(Some(value))) => value,
            _ => Value::Nil,
        };
        let handlers: Vec<Function> = slots
            .iter()
            .filter_map(|slot| refs.get_as::<Function>(lua, *slot).ok().flatten())
            .collect();
        Some(PreparedCall {
            handle,
            object,
            this,
            handlers,
        })
    }

    fn run<'lua>(&self, call: PreparedCall<'lua>, slot: ScriptSlot, args: &[Value<'lua>]) -> usize {
        let mut invoked = 0;
        for handler in call.handlers {
            let mut values = Vec::with_capacity(args.len() + 1);
            values.push(call.this.clone());
            values.extend(args.iter().cloned());
            invoked += 1;
            if let Err(err) = handler.call::<_, ()>(MultiValue::from_vec(values)) {
                tracing::error!(
                    target: targets::CALLBACKS,
                    slot = %slot,
                    handle = %call.handle,
                    object = %call.object,
                    error = %err,
                    "script handler failed"
                );
            }
        }
        tracing::trace!(target: targets::CALLBACKS, slot = %slot, handle = %call.handle, invoked, "handlers invoked");
        invoked
    }

    /// Pin the original and hook of a `hooksecurefunc` call.
    ///
    /// Slots taken for a widget instance are released with that widget;
    /// any other target keeps them until shutdown.
    pub fn pin_function_hook(
        &self,
        lua: &Lua,
        owner: Option<Handle>,
        original: Function,
        hook: Function,
    ) -> Result<(RefSlot, RefSlot)> {
        let slots = {
            let mut refs = self.refs();
            (refs.pin(lua, original)?, refs.pin(lua, hook)?)
        };
        let recorded = owner
            .and_then(|owner| {
                self.with_core(owner, |core| {
                    core.function_hooks.extend([slots.0, slots.1]);
                })
            })
            .is_some();
        if !recorded {
            lock(&self.function_hooks).extend([slots.0, slots.1]);
        }
        Ok(slots)
    }

    // ── visibility, updates and timers ────────────────────────

    /// Shown, and every ancestor shown.
    pub fn is_visible(&self, handle: Handle) -> bool {
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            match self.with_core(current, |core| (core.shown, core.parent)) {
                Some((true, parent)) => cursor = parent,
                _ => return false,
            }
        }
        true
    }

    /// Advance the clock, run `OnUpdate` on visible frames, then due timers.
    pub fn update(&self, lua: &Lua, elapsed: f64) -> Result<usize> {
        self.advance_clock(elapsed);
        let frames = self.registry().frame_handles();
        let mut invoked = 0;
        for handle in frames {
            if self.handler_count(handle, ScriptSlot::OnUpdate) == 0 || !self.is_visible(handle) {
                continue;
            }
            invoked += self.invoke_handlers(lua, handle, ScriptSlot::OnUpdate, &CallbackArgs::Elapsed(elapsed))?;
        }
        invoked += self.run_timers(lua);
        self.reap_finalized(lua);
        Ok(invoked)
    }

    /// Schedule `callback` to run `delay` seconds from now.
    pub fn schedule_timer(&self, lua: &Lua, delay: f64, callback: Function) -> Result<u64> {
        let slot = self.refs().pin(lua, callback)?;
        let due = self.now() + delay.max(0.0);
        let id = lock(&self.timers).schedule(due, slot);
        tracing::trace!(target: targets::CALLBACKS, timer = id, due, "timer scheduled");
        Ok(id)
    }

    pub fn pending_timers(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Run and release every due timer. Timers scheduled by a running
    /// callback wait for the next call.
    pub fn run_timers(&self, lua: &Lua) -> usize {
        let due = lock(&self.timers).take_due(self.now());
        let mut ran = 0;
        for timer in due {
            let callback = {
                let mut refs = self.refs();
                let callback = refs.get_as::<Function>(lua, timer.callback).ok().flatten();
                let _ = refs.unpin(lua, timer.callback);
                callback
            };
            let Some(callback) = callback else {
                continue;
            };
            ran += 1;
            if let Err(err) = callback.call::<_, ()>(()) {
                tracing::error!(target: targets::CALLBACKS, timer = timer.id, error = %err, "timer callback failed");
            }
        }
        ran
    }

    // ── inspection and shutdown ───────────────────────────────

    /// Live objects as a forest rooted at parentless objects.
    pub fn tree(&self) -> Vec<ObjectNode> {
        let roots: Vec<Handle> = self
            .live_handles()
            .into_iter()
            .filter(|handle| {
                self.with_core(*handle, |core| core.parent.is_none())
                    .unwrap_or(false)
            })
            .collect();
        roots.into_iter().filter_map(|h| self.node(h)).collect()
    }

    fn node(&self, handle: Handle) -> Option<ObjectNode> {
        let (kind, name, shown, events, scripts, children) = self.with_core(handle, |core| {
            (
                core.kind,
                core.name.clone(),
                core.shown,
                core.events.iter().cloned().collect::<Vec<_>>(),
                core.callbacks
                    .bound()
                    .map(|slot| slot.name().to_string())
                    .collect::<Vec<_>>(),
                core.children.clone(),
            )
        })?;
        Some(ObjectNode {
            handle,
            kind,
            name,
            shown,
            events,
            scripts,
            children: children.into_iter().filter_map(|h| self.node(h)).collect(),
        })
    }

    /// Partition counts of the object registry.
    pub fn counts(&self) -> Vec<(Partition, usize)> {
        self.registry().counts()
    }

    /// Release every object, timer and pinned script value.
    pub fn shutdown(&self, lua: &Lua) -> usize {
        let mut released = 0;
        for handle in self.live_handles() {
            if self.is_live(handle) && self.destroy(lua, handle).is_ok() {
                released += 1;
            }
        }
        let timers = lock(&self.timers).drain_all();
        let hooks = std::mem::take(&mut *lock(&self.function_hooks));
        let mut refs = self.refs();
        for slot in timers.into_iter().chain(hooks) {
            let _ = refs.unpin(lua, slot);
        }
        let leftover = refs.clear(lua);
        tracing::info!(target: targets::LIFECYCLE, released, leftover_refs = leftover, "bridge shut down");
        released
    }
}

/// Copy every field of `source` into `target`.
pub fn mixin(target: &Table, source: &Table) -> mlua::Result<()> {
    for pair in source.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        target.set(key, value)?;
    }
    Ok(())
}
