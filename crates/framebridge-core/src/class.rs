//! Class table hierarchy.
//!
//! Single inheritance expressed as a chain of per-class method tables.
//! [`ClassHierarchy`] is the native description (which class defines which
//! method) and resolves methods by walking from a class toward the root.
//! [`ClassHierarchy::materialize`] turns it into Lua tables that resolve the
//! same way through `__index`:
//!
//! ```text
//! wrapper --mt.__index--> proxy(Button) --mt.__index--> methods(Button)
//!                                                          |
//!                                             mt.__index   v
//!                                   proxy(Frame) --> methods(Frame) --> ...
//! ```
//!
//! Proxies reject writes, so an ancestor table can never be used to share
//! state between sibling classes.

use crate::bridge::Bridge;
use crate::error::ClassError;
use crate::logging::targets;
use crate::methods::{self, MethodCtx};
use crate::widget::Partition;
use mlua::{Lua, MultiValue, RegistryKey, Table, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Native implementation of a script method.
pub type NativeMethod = for<'lua, 'a> fn(MethodCtx<'lua, 'a>) -> mlua::Result<MultiValue<'lua>>;

#[derive(Debug)]
struct ClassDef {
    name: String,
    parent: Option<usize>,
    partition: Option<Partition>,
    methods: BTreeMap<String, NativeMethod>,
}

/// Class definitions in definition order, parents first.
#[derive(Debug, Default)]
pub struct ClassHierarchy {
    classes: Vec<ClassDef>,
    index: HashMap<String, usize>,
}

/// Lua tables built for one class.
#[derive(Debug)]
pub struct ClassTables {
    /// Read-only table scripts see as the class.
    pub proxy: RegistryKey,
    /// Metatable for instance wrappers.
    pub instance_mt: RegistryKey,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The widget class tree with every native method bound.
    pub fn standard() -> Result<Self, ClassError> {
        let mut classes = Self::new();
        for (name, parent, partition) in [
            ("ScriptObject", None, None),
            ("ScriptRegion", Some("ScriptObject"), None),
            ("Region", Some("ScriptRegion"), None),
            ("Frame", Some("Region"), Some(Partition::Frames)),
            ("Button", Some("Frame"), Some(Partition::Frames)),
            ("EditBox", Some("Frame"), Some(Partition::Frames)),
            ("GameTooltip", Some("Frame"), Some(Partition::Frames)),
            ("Model", Some("Frame"), Some(Partition::Frames)),
            ("PlayerModel", Some("Model"), Some(Partition::Frames)),
            ("ModelScene", Some("Frame"), Some(Partition::Frames)),
            ("Texture", Some("Region"), Some(Partition::Textures)),
            ("Line", Some("Texture"), Some(Partition::Lines)),
            ("FontString", Some("Region"), Some(Partition::FontStrings)),
            ("ModelSceneActor", Some("ScriptObject"), Some(Partition::Actors)),
        ] {
            classes.define_class(name, parent, partition)?;
        }
        methods::install(&mut classes)?;
        Ok(classes)
    }

    /// Define `name` as a subclass of `parent`, which must already exist.
    pub fn define_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
        partition: Option<Partition>,
    ) -> Result<(), ClassError> {
        if self.index.contains_key(name) {
            let err = ClassError::Duplicate(name.to_string());
            tracing::error!(target: targets::DISPATCH, class = name, error = %err, "class definition rejected");
            return Err(err);
        }
        let parent = match parent {
            Some(parent) => match self.index.get(parent) {
                Some(idx) => Some(*idx),
                None => {
                    let err = ClassError::ParentNotDefined {
                        class: name.to_string(),
                        parent: parent.to_string(),
                    };
                    tracing::error!(target: targets::DISPATCH, class = name, error = %err, "class definition rejected");
                    return Err(err);
                }
            },
            None => None,
        };
        self.index.insert(name.to_string(), self.classes.len());
        self.classes.push(ClassDef {
            name: name.to_string(),
            parent,
            partition,
            methods: BTreeMap::new(),
        });
        Ok(())
    }

    /// Bind `method` on `class`, shadowing any ancestor definition.
    pub fn bind_method(
        &mut self,
        class: &str,
        method: &str,
        function: NativeMethod,
    ) -> Result<(), ClassError> {
        let idx = self.class_index(class)?;
        self.classes[idx]
            .methods
            .insert(method.to_string(), function);
        Ok(())
    }

    /// Bind several methods on one class.
    pub fn bind_all(
        &mut self,
        class: &str,
        methods: &[(&str, NativeMethod)],
    ) -> Result<(), ClassError> {
        for (name, function) in methods {
            self.bind_method(class, name, *function)?;
        }
        Ok(())
    }

    fn class_index(&self, class: &str) -> Result<usize, ClassError> {
        self.index
            .get(class)
            .copied()
            .ok_or_else(|| ClassError::UnknownClass(class.to_string()))
    }

    fn ancestry(&self, idx: usize) -> impl Iterator<Item = &ClassDef> {
        std::iter::successors(Some(&self.classes[idx]), |def| {
            def.parent.map(|parent| &self.classes[parent])
        })
    }

    /// Find the nearest definition of `method`, returning its owning class.
    pub fn resolve(&self, class: &str, method: &str) -> Result<(&str, NativeMethod), ClassError> {
        let idx = self.class_index(class)?;
        self.ancestry(idx)
            .find_map(|def| {
                def.methods
                    .get(method)
                    .map(|function| (def.name.as_str(), *function))
            })
            .ok_or_else(|| ClassError::NoSuchMethod {
                class: class.to_string(),
                method: method.to_string(),
            })
    }

    /// Every method name resolvable on `class`.
    pub fn methods(&self, class: &str) -> Result<BTreeSet<String>, ClassError> {
        let idx = self.class_index(class)?;
        Ok(self
            .ancestry(idx)
            .flat_map(|def| def.methods.keys().cloned())
            .collect())
    }

    /// Methods defined directly on `class`.
    pub fn own_methods(&self, class: &str) -> Result<BTreeSet<String>, ClassError> {
        let idx = self.class_index(class)?;
        Ok(self.classes[idx].methods.keys().cloned().collect())
    }

    /// `class` followed by its ancestors up to the root.
    pub fn chain(&self, class: &str) -> Result<Vec<&str>, ClassError> {
        let idx = self.class_index(class)?;
        Ok(self.ancestry(idx).map(|def| def.name.as_str()).collect())
    }

    pub fn parent(&self, class: &str) -> Result<Option<&str>, ClassError> {
        let idx = self.class_index(class)?;
        Ok(self.classes[idx]
            .parent
            .map(|parent| self.classes[parent].name.as_str()))
    }

    pub fn partition(&self, class: &str) -> Result<Option<Partition>, ClassError> {
        let idx = self.class_index(class)?;
        Ok(self.classes[idx].partition)
    }

    /// Whether `class` is `ancestor` or derives from it. Unknown names are never related.
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        self.index
            .get(class)
            .is_some_and(|idx| self.ancestry(*idx).any(|def| def.name == ancestor))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.index.contains_key(class)
    }

    /// Class names in definition order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|def| def.name.as_str())
    }

    /// Classes nothing derives from.
    pub fn leaves(&self) -> Vec<&str> {
        let parents: BTreeSet<usize> = self.classes.iter().filter_map(|def| def.parent).collect();
        self.classes
            .iter()
            .enumerate()
            .filter(|(idx, _)| !parents.contains(idx))
            .map(|(_, def)| def.name.as_str())
            .collect()
    }

    /// Build the Lua tables of every class.
    pub fn materialize(
        &self,
        lua: &Lua,
        bridge: &Arc<Bridge>,
    ) -> mlua::Result<HashMap<String, ClassTables>> {
        let mut proxies: Vec<Table> = Vec::with_capacity(self.classes.len());
        let mut built = HashMap::with_capacity(self.classes.len());
        let read_only = lua.create_function(|_, (_, key): (Value, Value)| -> mlua::Result<()> {
            let key = match key {
                Value::String(s) => s.to_str().map(str::to_string).unwrap_or_default(),
                other => other.type_name().to_string(),
            };
            Err(mlua::Error::RuntimeError(format!(
                "attempt to modify read-only class table (field '{key}')"
            )))
        })?;

        for def in &self.classes {
            let methods = lua.create_table()?;
            for (method, function) in &def.methods {
                methods.raw_set(
                    method.as_str(),
                    methods::bind(lua, bridge, &def.name, method, *function)?,
                )?;
            }
            if let Some(parent) = def.parent {
                let mt = lua.create_table()?;
                mt.raw_set("__index", proxies[parent].clone())?;
                methods.set_metatable(Some(mt));
            }

            let proxy = lua.create_table()?;
            let proxy_mt = lua.create_table()?;
            proxy_mt.raw_set("__index", methods)?;
            proxy_mt.raw_set("__newindex", read_only.clone())?;
            proxy_mt.raw_set("__name", def.name.as_str())?;
            proxy.set_metatable(Some(proxy_mt));

            let instance_mt = lua.create_table()?;
            instance_mt.raw_set("__index", proxy.clone())?;
            instance_mt.raw_set("__name", def.name.as_str())?;

            tracing::debug!(
                target: targets::DISPATCH,
                class = %def.name,
                methods = def.methods.len(),
                "class table built"
            );
            built.insert(
                def.name.clone(),
                ClassTables {
                    proxy: lua.create_registry_value(proxy.clone())?,
                    instance_mt: lua.create_registry_value(instance_mt)?,
                },
            );
            proxies.push(proxy);
        }
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<'lua>(ctx: MethodCtx<'lua, '_>) -> mlua::Result<MultiValue<'lua>> {
        ctx.none()
    }

    fn other<'lua>(ctx: MethodCtx<'lua, '_>) -> mlua::Result<MultiValue<'lua>> {
        ctx.ret(1)
    }

    #[test]
    fn parent_must_exist_first() {
        let mut classes = ClassHierarchy::new();
        assert_eq!(
            classes.define_class("Button", Some("Frame"), None),
            Err(ClassError::ParentNotDefined {
                class: "Button".to_string(),
                parent: "Frame".to_string()
            })
        );
        classes.define_class("Frame", None, None).unwrap();
        classes.define_class("Button", Some("Frame"), None).unwrap();
        assert_eq!(
            classes.define_class("Button", Some("Frame"), None),
            Err(ClassError::Duplicate("Button".to_string()))
        );
    }

    #[test]
    fn resolution_prefers_nearest_definition() {
        let mut classes = ClassHierarchy::new();
        classes.define_class("Base", None, None).unwrap();
        classes.define_class("Mid", Some("Base"), None).unwrap();
        classes.define_class("Leaf", Some("Mid"), None).unwrap();
        classes.bind_method("Base", "Show", noop).unwrap();
        classes.bind_method("Base", "GetName", noop).unwrap();
        classes.bind_method("Mid", "Show", other).unwrap();

        assert_eq!(classes.resolve("Leaf", "Show").unwrap().0, "Mid");
        assert_eq!(classes.resolve("Leaf", "GetName").unwrap().0, "Base");
        assert_eq!(classes.resolve("Base", "Show").unwrap().0, "Base");
        assert_eq!(
            classes.resolve("Leaf", "Fly").unwrap_err(),
            ClassError::NoSuchMethod {
                class: "Leaf".to_string(),
                method: "Fly".to_string()
            }
        );
        assert_eq!(classes.chain("Leaf").unwrap(), vec!["Leaf", "Mid", "Base"]);
        assert_eq!(classes.leaves(), vec!["Leaf"]);
    }

    #[test]
    fn bind_on_unknown_class_fails() {
        let mut classes = ClassHierarchy::new();
        assert_eq!(
            classes.bind_method("Ghost", "Show", noop),
            Err(ClassError::UnknownClass("Ghost".to_string()))
        );
    }

    #[test]
    fn is_a_walks_the_chain() {
        let classes = ClassHierarchy::standard().unwrap();
        assert!(classes.is_a("PlayerModel", "Frame"));
        assert!(classes.is_a("Line", "Texture"));
        assert!(classes.is_a("ModelSceneActor", "ScriptObject"));
        assert!(!classes.is_a("ModelSceneActor", "Region"));
        assert!(!classes.is_a("Texture", "Frame"));
        assert!(!classes.is_a("Nope", "ScriptObject"));
    }

    #[test]
    fn standard_hierarchy_shape() {
        let classes = ClassHierarchy::standard().unwrap();
        assert_eq!(
            classes.chain("PlayerModel").unwrap(),
            vec!["PlayerModel", "Model", "Frame", "Region", "ScriptRegion", "ScriptObject"]
        );
        let mut leaves = classes.leaves();
        leaves.sort_unstable();
        assert_eq!(
            leaves,
            vec![
                "Button",
                "EditBox",
                "FontString",
                "GameTooltip",
                "Line",
                "ModelScene",
                "ModelSceneActor",
                "PlayerModel"
            ]
        );
        assert_eq!(classes.partition("Line").unwrap(), Some(Partition::Lines));
        // Frame shadows the region-level Show
        assert_eq!(classes.resolve("Button", "Show").unwrap().0, "Frame");
        assert_eq!(classes.resolve("Texture", "Show").unwrap().0, "ScriptRegion");
    }
}
