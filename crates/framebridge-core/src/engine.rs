//! The script engine: one Lua state plus the bridge that serves it.
//!
//! [`Engine`] is the host-facing entry point. It owns the Lua state behind a
//! mutex, installs the script globals, creates `UIParent`, loads addons and
//! their saved variables, and exposes the host side of objects, events and
//! callbacks. Script errors surfacing here are returned as [`Error::Lua`];
//! errors raised inside handlers are logged by the bridge and never reach
//! the host.

use crate::addon::{AddonManifest, discover_addons};
use crate::api;
use crate::bridge::{Bridge, CreateRequest, ObjectNode};
use crate::callbacks::{CallbackArgs, ScriptSlot};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::logging::targets;
use crate::refs::RefSlot;
use crate::saved;
use crate::value::{ScriptValue, script_to_lua_plain};
use crate::widget::WidgetKind;
use mlua::{Function, Lua, MultiValue, Table, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Event fired after each addon's files have run.
pub const ADDON_LOADED: &str = "ADDON_LOADED";

/// An addon whose files have been executed.
#[derive(Debug)]
struct LoadedAddon {
    manifest: AddonManifest,
    /// The private table passed to every file as the second vararg.
    table: RefSlot,
    /// False when the saved-variables file could not be read; saving would
    /// overwrite it with defaults.
    persist: bool,
}

/// A problem found while checking an addon without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIssue {
    pub path: PathBuf,
    pub message: String,
}

pub struct Engine {
    lua: Mutex<Option<Lua>>,
    bridge: Arc<Bridge>,
    config: Config,
    addons: Mutex<Vec<LoadedAddon>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bridge", &self.bridge)
            .field("addons_dir", &self.config.addons.dir)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    /// Create a Lua state with the script API and a shown `UIParent`.
    pub fn new(config: Config) -> Result<Self> {
        let lua = Lua::new();
        let bridge = Bridge::new(&lua)?;
        api::install(&lua, &bridge)?;
        let (ui_parent, _) = bridge.create_object(&lua, CreateRequest::new(WidgetKind::Frame).named("UIParent"))?;
        bridge.with_core(ui_parent, |core| {
            core.width = 1920.0;
            core.height = 1080.0;
        });
        tracing::info!(target: targets::LIFECYCLE, "script engine started");
        Ok(Self {
            lua: Mutex::new(Some(lua)),
            bridge,
            config,
            addons: Mutex::new(Vec::new()),
        })
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` with the Lua state, failing once the engine is shut down.
    pub fn with_lua<R>(&self, f: impl FnOnce(&Lua) -> Result<R>) -> Result<R> {
        let guard = lock(&self.lua);
        let lua = guard.as_ref().ok_or(Error::ShutDown)?;
        f(lua)
    }

    // ── objects ───────────────────────────────────────────────

    /// Create an object of `kind` (case-insensitive).
    pub fn create_object(
        &self,
        kind: &str,
        name: Option<&str>,
        parent: Option<Handle>,
        template: Option<&str>,
        id: Option<i64>,
    ) -> Result<Handle> {
        let kind: WidgetKind = kind.parse()?;
        let mut request = CreateRequest::new(kind);
        request.name = name.map(String::from);
        request.parent = parent;
        request.template = template.map(String::from);
        request.id = id;
        self.with_lua(|lua| {
            let (handle, _) = self.bridge.create_object(lua, request)?;
            Ok(handle)
        })
    }

    pub fn destroy_object(&self, handle: Handle) -> Result<()> {
        self.with_lua(|lua| self.bridge.destroy(lua, handle))
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.bridge.is_live(handle)
    }

    pub fn lookup_name(&self, name: &str) -> Option<Handle> {
        self.bridge.lookup_name(name)
    }

    /// Call `method` on `handle` the way a script would.
    ///
    /// The method must exist somewhere on the object's class chain. Calls
    /// on released objects return nothing.
    pub fn call_method(&self, handle: Handle, method: &str, args: Vec<ScriptValue>) -> Result<Vec<ScriptValue>> {
        let Some(kind) = self.bridge.kind_of(handle) else {
            tracing::debug!(target: targets::DISPATCH, handle = %handle, method, "host call on released object ignored");
            return Ok(Vec::new());
        };
        self.bridge.classes().resolve(kind.class_name(), method)?;

        self.with_lua(|lua| {
            let wrapper = self.bridge.wrapper_of(lua, handle)?;
            let Value::Table(table) = &wrapper else {
                return Ok(Vec::new());
            };
            // instance fields first, so per-instance hooks run too
            let function: Function = table.get(method)?;
            let mut values = Vec::with_capacity(args.len() + 1);
            values.push(wrapper.clone());
            for arg in &args {
                values.push(self.bridge.script_to_lua(lua, arg)?);
            }
            let results: MultiValue = function.call(MultiValue::from_vec(values))?;
            let results = results
                .into_iter()
                .map(|value| self.bridge.lua_to_script(value))
                .collect::<mlua::Result<Vec<_>>>()?;
            self.bridge.reap_finalized(lua);
            Ok(results)
        })
    }

    pub fn tree(&self) -> Vec<ObjectNode> {
        self.bridge.tree()
    }

    // ── events and callbacks ──────────────────────────────────

    /// Fire `event` to every subscribed object. Returns handlers invoked.
    pub fn trigger_event(&self, event: &str, param: Option<ScriptValue>) -> Result<usize> {
        let param = param.unwrap_or_default();
        self.with_lua(|lua| {
            let invoked = self.bridge.fire_event(lua, event, &param)?;
            self.bridge.reap_finalized(lua);
            Ok(invoked)
        })
    }

    /// Compile `source` into a function. The source is either a function
    /// expression or a chunk returning one.
    fn compile<'lua>(lua: &'lua Lua, source: &str, name: &str) -> Result<Function<'lua>> {
        let value: Value = lua.load(source).set_name(name).eval()?;
        match value {
            Value::Function(function) => Ok(function),
            other => Err(Error::Lua(mlua::Error::RuntimeError(format!(
                "{name}: expected a function, got {}",
                other.type_name()
            )))),
        }
    }

    /// Replace the primary handler of `slot`, or clear the slot with `None`.
    ///
    /// Returns false when `handle` is no longer live.
    pub fn set_callback(&self, handle: Handle, slot: ScriptSlot, source: Option<&str>) -> Result<bool> {
        self.with_lua(|lua| {
            let handler = match source {
                Some(source) => Some(Self::compile(lua, source, slot.name())?),
                None => None,
            };
            self.bridge.set_script(lua, handle, slot, handler)
        })
    }

    /// Append a handler to `slot`.
    pub fn hook_callback(&self, handle: Handle, slot: ScriptSlot, source: &str) -> Result<bool> {
        self.with_lua(|lua| {
            let handler = Self::compile(lua, source, slot.name())?;
            self.bridge.hook_script(lua, handle, slot, handler)
        })
    }

    /// Run the handlers of `slot` as if the host input had happened.
    pub fn fire_script(&self, handle: Handle, slot: ScriptSlot, args: &CallbackArgs) -> Result<usize> {
        self.with_lua(|lua| self.bridge.invoke_handlers(lua, handle, slot, args))
    }

    // ── scripts ───────────────────────────────────────────────

    /// Execute a chunk of script source.
    pub fn exec(&self, source: &str, name: &str) -> Result<()> {
        self.with_lua(|lua| {
            lua.load(source).set_name(name).exec()?;
            self.bridge.reap_finalized(lua);
            Ok(())
        })
    }

    /// Evaluate an expression and convert the result.
    pub fn eval(&self, source: &str) -> Result<ScriptValue> {
        self.with_lua(|lua| {
            let value: Value = lua.load(source).set_name("eval").eval()?;
            Ok(self.bridge.lua_to_script(value)?)
        })
    }

    /// Read a global and convert it.
    pub fn global(&self, name: &str) -> Result<ScriptValue> {
        self.with_lua(|lua| {
            let value: Value = lua.globals().get(name)?;
            Ok(self.bridge.lua_to_script(value)?)
        })
    }

    /// Execute a script file outside any addon.
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.with_lua(|lua| {
            lua.load(source.trim_start_matches('\u{FEFF}'))
                .set_name(path.to_string_lossy())
                .exec()?;
            Ok(())
        })
    }

    // ── addons ────────────────────────────────────────────────

    /// Discover and load every enabled addon under the configured
    /// directory. Returns the names loaded, in load order.
    pub fn load_addons(&self) -> Result<Vec<String>> {
        let manifests = discover_addons(&self.config.addons.dir)?;
        let mut loaded = Vec::new();
        for manifest in manifests {
            if self.config.addons.is_disabled(&manifest.name) {
                tracing::info!(target: targets::ADDONS, addon = %manifest.name, "addon disabled by config");
                continue;
            }
            if manifest.load_on_demand {
                tracing::debug!(target: targets::ADDONS, addon = %manifest.name, "load-on-demand addon not loaded");
                continue;
            }
            self.load_addon(&manifest)?;
            loaded.push(manifest.name);
        }
        Ok(loaded)
    }

    /// Load one addon: saved variables, then each listed file with
    /// `(addonName, addonTable)` as varargs, then `ADDON_LOADED`.
    ///
    /// A file that fails to read, compile or run is logged and skipped.
    /// Returns the number of files that ran.
    pub fn load_addon(&self, manifest: &AddonManifest) -> Result<usize> {
        let name = manifest.name.as_str();
        let saved_dir = &self.config.addons.saved_variables_dir;
        let names = manifest.saved_variable_names();
        let (vars, persist) = match saved::load(saved_dir, name, &names) {
            Ok(vars) => (vars, true),
            Err(err) => {
                tracing::error!(target: targets::ADDONS, addon = name, error = %err, "saved variables ignored");
                (BTreeMap::new(), false)
            }
        };

        let ran = self.with_lua(|lua| {
            for (var, value) in &vars {
                lua.globals().set(var.as_str(), script_to_lua_plain(lua, value)?)?;
            }
            let table = lua.create_table()?;
            let slot = self.bridge.refs().pin(lua, table.clone())?;

            let mut ran = 0;
            for path in manifest.file_paths() {
                if self.run_addon_file(lua, name, &table, &path) {
                    ran += 1;
                }
            }
            lock(&self.addons).push(LoadedAddon {
                manifest: manifest.clone(),
                table: slot,
                persist,
            });
            Ok(ran)
        })?;

        tracing::info!(
            target: targets::ADDONS,
            addon = name,
            files = ran,
            listed = manifest.files.len(),
            saved_variables = vars.len(),
            "addon loaded"
        );
        self.trigger_event(ADDON_LOADED, Some(ScriptValue::from(name)))?;
        Ok(ran)
    }

    fn run_addon_file(&self, lua: &Lua, addon: &str, table: &Table, path: &Path) -> bool {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("lua") => {}
            Some("xml") => {
                tracing::debug!(target: targets::ADDONS, addon, path = %path.display(), "xml layout skipped");
                return false;
            }
            _ => {
                tracing::warn!(target: targets::ADDONS, addon, path = %path.display(), "unsupported file skipped");
                return false;
            }
        }
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::error!(target: targets::ADDONS, addon, path = %path.display(), error = %err, "addon file unreadable");
                return false;
            }
        };
        let result = lua
            .load(source.trim_start_matches('\u{FEFF}'))
            .set_name(path.to_string_lossy())
            .call::<_, ()>((addon, table.clone()));
        self.bridge.reap_finalized(lua);
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(target: targets::ADDONS, addon, path = %path.display(), error = %err, "addon file failed");
                false
            }
        }
    }

    /// Names of loaded addons, in load order.
    pub fn loaded_addons(&self) -> Vec<String> {
        lock(&self.addons)
            .iter()
            .map(|addon| addon.manifest.name.clone())
            .collect()
    }

    /// The private table of a loaded addon.
    pub fn addon_table(&self, addon: &str) -> Result<ScriptValue> {
        let slot = lock(&self.addons)
            .iter()
            .find(|loaded| loaded.manifest.name == addon)
            .map(|loaded| loaded.table);
        let Some(slot) = slot else {
            return Ok(ScriptValue::Nil);
        };
        self.with_lua(|lua| {
            let value = self.bridge.refs().get(lua, slot)?.unwrap_or(Value::Nil);
            Ok(self.bridge.lua_to_script(value)?)
        })
    }

    /// Write every loaded addon's saved variables. Returns files written.
    pub fn save_variables(&self) -> Result<usize> {
        let addons: Vec<(String, Vec<String>)> = lock(&self.addons)
            .iter()
            .filter(|addon| {
                if !addon.persist {
                    tracing::warn!(target: targets::ADDONS, addon = %addon.manifest.name, "saved variables not written: load failed");
                }
                addon.persist && !addon.manifest.saved_variable_names().is_empty()
            })
            .map(|addon| (addon.manifest.name.clone(), addon.manifest.saved_variable_names()))
            .collect();

        let mut written = 0;
        for (addon, names) in addons {
            let vars = self.with_lua(|lua| {
                let globals = lua.globals();
                let mut vars = BTreeMap::new();
                for name in &names {
                    let value: Value = globals.get(name.as_str())?;
                    vars.insert(name.clone(), self.bridge.lua_to_script(value)?);
                }
                Ok(vars)
            })?;
            saved::store(&self.config.addons.saved_variables_dir, &addon, &vars)?;
            written += 1;
        }
        Ok(written)
    }

    // ── host loop ─────────────────────────────────────────────

    /// Advance time by `elapsed` seconds: `OnUpdate` handlers, then timers.
    pub fn update(&self, elapsed: f64) -> Result<usize> {
        self.with_lua(|lua| self.bridge.update(lua, elapsed))
    }

    /// Release every object and script reference and close the Lua state.
    ///
    /// Later calls fail with [`Error::ShutDown`].
    pub fn shutdown(&self) -> Result<usize> {
        let lua = lock(&self.lua).take().ok_or(Error::ShutDown)?;
        let addons = std::mem::take(&mut *lock(&self.addons));
        {
            let mut refs = self.bridge.refs();
            for addon in addons {
                let _ = refs.unpin(&lua, addon.table);
            }
        }
        let released = self.bridge.shutdown(&lua);
        drop(lua);
        Ok(released)
    }
}

/// Compile every listed Lua file of `manifest` without running it.
pub fn check_addon(manifest: &AddonManifest) -> Vec<CheckIssue> {
    let lua = Lua::new();
    let mut issues = Vec::new();
    for path in manifest.file_paths() {
        let is_lua = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("lua"));
        if !is_lua {
            continue;
        }
        let result = std::fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|source| {
                lua.load(source.trim_start_matches('\u{FEFF}'))
                    .set_name(path.to_string_lossy())
                    .into_function()
                    .map(drop)
                    .map_err(|err| err.to_string())
            });
        if let Err(message) = result {
            issues.push(CheckIssue {
                path: path.clone(),
                message,
            });
        }
    }
    issues
}
