//! framebridge-core: Core library for framebridge
//!
//! This crate exposes host-native widget objects to Lua addon scripts.
//! Scripts see each object as a wrapper table whose metatable chains through
//! per-class method tables; the host keeps the native state behind integer
//! handles.
//!
//! # Architecture
//!
//! ```text
//! addons (.toc + .lua) → Engine → Lua state ─┐
//!                          ↓                 │ wrappers, class tables
//!                        Bridge ←────────────┘
//!       handles · registry · script refs · events · callbacks · timers
//! ```
//!
//! # Modules
//!
//! - `handle`: handle table with double-release detection
//! - `registry`: per-kind object registry partitions
//! - `refs`: pinned script values (handlers, timers, addon tables)
//! - `class`: class hierarchy, native method binding and Lua class tables
//! - `wrapper`: wrapper tables and handle tokens
//! - `events`: event subscription sets
//! - `callbacks`: script slots, handler lists and callback arguments
//! - `widget`: native object state per kind
//! - `methods`: native methods bound into the class tables
//! - `bridge`: the object, event and callback operations
//! - `api`: global functions installed into Lua
//! - `timer`: `C_Timer` queue
//! - `value`: host-side script values and conversions
//! - `addon`: `.toc` manifests and load ordering
//! - `saved`: saved-variable persistence
//! - `engine`: the host entry point
//! - `config`: configuration management
//! - `logging`: tracing setup and log categories
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod addon;
pub mod api;
pub mod bridge;
pub mod callbacks;
pub mod class;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod logging;
pub mod methods;
pub mod refs;
pub mod registry;
pub mod saved;
pub mod timer;
pub mod value;
pub mod widget;
pub mod wrapper;

pub use bridge::{Bridge, CreateRequest, ObjectNode};
pub use callbacks::{CallbackArgs, ScriptSlot};
pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use handle::Handle;
pub use value::ScriptValue;
pub use widget::WidgetKind;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
