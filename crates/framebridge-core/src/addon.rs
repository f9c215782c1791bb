//! Addon manifests (`.toc` files) and load ordering.
//!
//! A manifest is line based:
//!
//! ```text
//! ## Title: My Addon
//! ## SavedVariables: MyAddonDB, MyAddonCache
//! ## Dependencies: LibStub
//! # a comment
//! Core.lua
//! Frames\Main.lua
//! ```

use crate::error::{AddonError, Result};
use crate::logging::targets;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Parsed `.toc` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddonManifest {
    pub name: String,
    /// Directory the listed files are relative to.
    pub dir: PathBuf,
    pub title: Option<String>,
    pub version: Option<String>,
    pub interface: Option<String>,
    pub author: Option<String>,
    pub notes: Option<String>,
    pub saved_variables: Vec<String>,
    pub saved_variables_per_character: Vec<String>,
    pub dependencies: Vec<String>,
    pub optional_dependencies: Vec<String>,
    pub load_on_demand: bool,
    /// Every `## Key: Value` line, keys as written.
    pub metadata: BTreeMap<String, String>,
    /// Listed files in order, with `/` separators.
    pub files: Vec<String>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

impl AddonManifest {
    /// Parse manifest text for the addon `name`.
    pub fn parse(name: &str, text: &str) -> Self {
        let mut manifest = Self {
            name: name.to_string(),
            ..Self::default()
        };
        for line in text.trim_start_matches('\u{FEFF}').lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(meta) = line.strip_prefix("##") {
                if let Some((key, value)) = meta.split_once(':') {
                    manifest.apply(key.trim(), value.trim());
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            manifest.files.push(line.replace('\\', "/"));
        }
        manifest
    }

    fn apply(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
        match key.to_ascii_lowercase().as_str() {
            "title" => self.title = Some(value.to_string()),
            "version" => self.version = Some(value.to_string()),
            "interface" => self.interface = Some(value.to_string()),
            "author" => self.author = Some(value.to_string()),
            "notes" => self.notes = Some(value.to_string()),
            "savedvariables" => self.saved_variables.extend(split_list(value)),
            "savedvariablespercharacter" => {
                self.saved_variables_per_character.extend(split_list(value));
            }
            "optionaldeps" => self.optional_dependencies.extend(split_list(value)),
            "loadondemand" => self.load_on_demand = value == "1",
            other if other == "requireddeps" || other.starts_with("dep") => {
                self.dependencies.extend(split_list(value));
            }
            _ => {}
        }
    }

    /// Read `<dir>/<dirname>.toc`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let toc = dir.join(format!("{name}.toc"));
        if !toc.is_file() {
            return Err(AddonError::MissingManifest(dir.display().to_string()).into());
        }
        let text = std::fs::read_to_string(&toc)?;
        let mut manifest = Self::parse(&name, &text);
        manifest.dir = dir.to_path_buf();
        Ok(manifest)
    }

    /// Both saved-variable lists.
    pub fn saved_variable_names(&self) -> Vec<String> {
        self.saved_variables
            .iter()
            .chain(&self.saved_variables_per_character)
            .cloned()
            .collect()
    }

    /// Listed files resolved against the addon directory.
    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|file| self.dir.join(file))
    }
}

/// Find every addon under `dir` and return them in load order.
///
/// Directories without a manifest are skipped. A missing `dir` yields no
/// addons.
pub fn discover_addons(dir: &Path) -> Result<Vec<AddonManifest>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(target: targets::ADDONS, dir = %dir.display(), "addon directory not found");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut manifests = Vec::new();
    for dir in dirs {
        match AddonManifest::from_dir(&dir) {
            Ok(manifest) => manifests.push(manifest),
            Err(err) => {
                tracing::warn!(target: targets::ADDONS, dir = %dir.display(), error = %err, "addon skipped");
            }
        }
    }
    tracing::debug!(target: targets::ADDONS, found = manifests.len(), "addons discovered");
    load_order(manifests)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order manifests so every addon follows its dependencies.
///
/// Addons whose required dependencies are absent are dropped (and so are
/// their dependents). Ties keep name order. Names compare case-insensitively.
pub fn load_order(manifests: Vec<AddonManifest>) -> Result<Vec<AddonManifest>> {
    let mut by_key: BTreeMap<String, AddonManifest> = manifests
        .into_iter()
        .map(|manifest| (manifest.name.to_ascii_lowercase(), manifest))
        .collect();

    loop {
        let unmet: Vec<String> = by_key
            .iter()
            .filter(|(_, manifest)| {
                manifest
                    .dependencies
                    .iter()
                    .any(|dep| !by_key.contains_key(&dep.to_ascii_lowercase()))
            })
            .map(|(key, _)| key.clone())
            .collect();
        if unmet.is_empty() {
            break;
        }
        for key in unmet {
            if let Some(manifest) = by_key.remove(&key) {
                tracing::warn!(
                    target: targets::ADDONS,
                    addon = %manifest.name,
                    dependencies = ?manifest.dependencies,
                    "addon skipped: missing dependency"
                );
            }
        }
    }

    let mut marks = HashMap::new();
    let mut order = Vec::with_capacity(by_key.len());
    for key in by_key.keys() {
        visit(key, &by_key, &mut marks, &mut order)?;
    }
    Ok(order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect())
}

fn visit(
    key: &str,
    by_key: &BTreeMap<String, AddonManifest>,
    marks: &mut HashMap<String, Mark>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let name = by_key.get(key).map_or(key, |m| m.name.as_str());
            return Err(AddonError::DependencyCycle(name.to_string()).into());
        }
        None => {}
    }
    let Some(manifest) = by_key.get(key) else {
        return Ok(());
    };
    marks.insert(key.to_string(), Mark::Visiting);
    for dep in manifest
        .dependencies
        .iter()
        .chain(&manifest.optional_dependencies)
    {
        let dep = dep.to_ascii_lowercase();
        if by_key.contains_key(&dep) {
            visit(&dep, by_key, marks, order)?;
        }
    }
    marks.insert(key.to_string(), Mark::Done);
    order.push(key.to_string());
    Ok(())
}
