//! Error types for framebridge-core

use crate::handle::Handle;
use crate::refs::RefSlot;
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for framebridge-core
#[derive(Error, Debug)]
pub enum Error {
    /// Handle, registry and reference lifecycle violations
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Class table construction and method resolution errors
    #[error("Class error: {0}")]
    Class(#[from] ClassError),

    /// Object creation requests the bridge cannot satisfy
    #[error("Create error: {0}")]
    Create(#[from] CreateError),

    /// Addon manifest and loading errors
    #[error("Addon error: {0}")]
    Addon(#[from] AddonError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Errors raised by the embedded Lua runtime
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The engine was used after shutdown
    #[error("script engine has been shut down")]
    ShutDown,
}

impl Error {
    /// Whether the error means host-side code driving the bridge is broken.
    ///
    /// These are logged at error severity wherever they are observed.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            Self::Lifecycle(_) => true,
            Self::Class(err) => matches!(
                err,
                ClassError::ParentNotDefined { .. } | ClassError::Duplicate(_)
            ),
            _ => false,
        }
    }

    /// Short hint for resolving the error, when one exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Lifecycle(LifecycleError::DoubleRelease(handle)) => Some(format!(
                "object {handle} was already released; check for a second Destroy on the same widget"
            )),
            Self::Class(ClassError::ParentNotDefined { parent, .. }) => {
                Some(format!("define class '{parent}' before its subclasses"))
            }
            Self::Create(CreateError::UnknownKind(_)) => Some(format!(
                "valid kinds are: {}",
                crate::widget::WidgetKind::ALL
                    .iter()
                    .map(|kind| kind.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            Self::Addon(AddonError::MissingManifest(dir)) => Some(format!(
                "add a .toc file named after the directory inside {dir}"
            )),
            Self::Config(_) | Self::Toml(_) => {
                Some("check framebridge.toml against the documented defaults".to_string())
            }
            _ => None,
        }
    }
}

impl From<Error> for mlua::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Lua(inner) => inner,
            other => mlua::Error::external(other),
        }
    }
}

/// Lifecycle invariant violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A handle was released twice
    #[error("handle {0} released twice")]
    DoubleRelease(Handle),

    /// A handle that was never issued was released
    #[error("handle {0} was never issued")]
    UnknownHandle(Handle),

    /// A handle was registered in a partition while already present in one
    #[error("handle {handle} already registered in partition {partition}")]
    DuplicateEntry { handle: Handle, partition: &'static str },

    /// A script reference slot was unpinned twice
    #[error("script reference {0} unpinned twice")]
    DoubleUnpin(RefSlot),

    /// A script reference slot was never issued
    #[error("script reference {0} was never issued")]
    UnknownSlot(RefSlot),
}

/// Class table errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    /// A class was defined before its parent
    #[error("class '{class}' defined before its parent '{parent}'")]
    ParentNotDefined { class: String, parent: String },

    /// A class name was defined twice
    #[error("class '{0}' is already defined")]
    Duplicate(String),

    /// A method was bound to an unknown class
    #[error("class '{0}' is not defined")]
    UnknownClass(String),

    /// Method resolution walked the whole chain without a match
    #[error("{class} has no method '{method}'")]
    NoSuchMethod { class: String, method: String },
}

/// Object creation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateError {
    /// The requested widget kind does not exist
    #[error("unknown widget kind '{0}'")]
    UnknownKind(String),

    /// The kind can only be created as the child of a frame
    #[error("{kind} requires a frame parent")]
    MissingParent { kind: &'static str },

    /// The supplied parent is not valid for this kind
    #[error("{kind} cannot be parented to {parent}")]
    InvalidParent { kind: &'static str, parent: String },
}

/// Addon manifest and load errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddonError {
    /// The addon directory has no manifest
    #[error("no manifest found in {0}")]
    MissingManifest(String),

    /// A dependency cycle prevents ordering addons
    #[error("dependency cycle involving addon '{0}'")]
    DependencyCycle(String),

    /// A saved-variables file failed to evaluate
    #[error("saved variables for '{addon}' are unreadable: {message}")]
    SavedVariables { addon: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violations_are_classified() {
        let handle = Handle::from_raw(7);
        assert!(Error::from(LifecycleError::DoubleRelease(handle)).is_invariant_violation());
        assert!(
            Error::from(ClassError::ParentNotDefined {
                class: "Button".to_string(),
                parent: "Frame".to_string(),
            })
            .is_invariant_violation()
        );
        assert!(
            !Error::from(ClassError::NoSuchMethod {
                class: "Frame".to_string(),
                method: "Fly".to_string(),
            })
            .is_invariant_violation()
        );
        assert!(!Error::from(CreateError::UnknownKind("Blob".to_string())).is_invariant_violation());
    }

    #[test]
    fn hints_available_for_common_errors() {
        let unknown = Error::from(CreateError::UnknownKind("Blob".to_string()));
        let hint = unknown.hint().unwrap();
        assert!(hint.contains("Frame"));
        assert!(hint.contains("FontString"));

        let double = Error::from(LifecycleError::DoubleRelease(Handle::from_raw(3)));
        assert!(double.hint().unwrap().contains("already released"));

        assert!(Error::ShutDown.hint().is_none());
    }

    #[test]
    fn converts_into_lua_error_preserving_lua_variants() {
        let lua_err: mlua::Error = Error::Lua(mlua::Error::RuntimeError("boom".into())).into();
        assert!(matches!(lua_err, mlua::Error::RuntimeError(ref msg) if msg == "boom"));

        let external: mlua::Error = Error::from(CreateError::UnknownKind("Blob".into())).into();
        assert!(external.to_string().contains("unknown widget kind 'Blob'"));
    }

    #[test]
    fn display_messages_name_the_subject() {
        let err = Error::from(LifecycleError::DuplicateEntry {
            handle: Handle::from_raw(0x10),
            partition: "frames",
        });
        let text = err.to_string();
        assert!(text.contains("0x10"));
        assert!(text.contains("frames"));
    }
}
