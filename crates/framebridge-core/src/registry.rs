//! Object registry: live objects indexed by handle, one partition per kind
//! family, with typed lookups.

use crate::error::LifecycleError;
use crate::handle::Handle;
use crate::logging::targets;
use crate::widget::{FontString, Frame, Line, ModelSceneActor, NativeRef, Partition, Texture};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct ObjectRegistry {
    frames: HashMap<Handle, Arc<Mutex<Frame>>>,
    textures: HashMap<Handle, Arc<Mutex<Texture>>>,
    font_strings: HashMap<Handle, Arc<Mutex<FontString>>>,
    lines: HashMap<Handle, Arc<Mutex<Line>>>,
    actors: HashMap<Handle, Arc<Mutex<ModelSceneActor>>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition currently holding `handle`.
    pub fn partition_of(&self, handle: Handle) -> Option<Partition> {
        if self.frames.contains_key(&handle) {
            Some(Partition::Frames)
        } else if self.textures.contains_key(&handle) {
            Some(Partition::Textures)
        } else if self.font_strings.contains_key(&handle) {
            Some(Partition::FontStrings)
        } else if self.lines.contains_key(&handle) {
            Some(Partition::Lines)
        } else if self.actors.contains_key(&handle) {
            Some(Partition::Actors)
        } else {
            None
        }
    }

    /// Add `object` under `handle` in the partition matching its family.
    pub fn register(&mut self, handle: Handle, object: NativeRef) -> Result<(), LifecycleError> {
        if let Some(partition) = self.partition_of(handle) {
            let err = LifecycleError::DuplicateEntry {
                handle,
                partition: partition.name(),
            };
            tracing::error!(target: targets::LIFECYCLE, handle = %handle, error = %err, "duplicate registry entry");
            return Err(err);
        }
        let partition = object.partition();
        match object {
            NativeRef::Frame(obj) => {
                self.frames.insert(handle, obj);
            }
            NativeRef::Texture(obj) => {
                self.textures.insert(handle, obj);
            }
            NativeRef::FontString(obj) => {
                self.font_strings.insert(handle, obj);
            }
            NativeRef::Line(obj) => {
                self.lines.insert(handle, obj);
            }
            NativeRef::Actor(obj) => {
                self.actors.insert(handle, obj);
            }
        }
        tracing::trace!(target: targets::LIFECYCLE, handle = %handle, partition = partition.name(), "registered");
        Ok(())
    }

    /// Remove `handle` from whichever partition holds it. Idempotent.
    pub fn unregister(&mut self, handle: Handle) -> bool {
        let removed = self.frames.remove(&handle).is_some()
            || self.textures.remove(&handle).is_some()
            || self.font_strings.remove(&handle).is_some()
            || self.lines.remove(&handle).is_some()
            || self.actors.remove(&handle).is_some();
        if removed {
            tracing::trace!(target: targets::LIFECYCLE, handle = %handle, "unregistered");
        }
        removed
    }

    pub fn lookup(&self, handle: Handle) -> Option<NativeRef> {
        self.frames
            .get(&handle)
            .cloned()
            .map(NativeRef::Frame)
            .or_else(|| self.textures.get(&handle).cloned().map(NativeRef::Texture))
            .or_else(|| {
                self.font_strings
                    .get(&handle)
                    .cloned()
                    .map(NativeRef::FontString)
            })
            .or_else(|| self.lines.get(&handle).cloned().map(NativeRef::Line))
            .or_else(|| self.actors.get(&handle).cloned().map(NativeRef::Actor))
    }

    pub fn frame(&self, handle: Handle) -> Option<Arc<Mutex<Frame>>> {
        self.frames.get(&handle).cloned()
    }

    pub fn texture(&self, handle: Handle) -> Option<Arc<Mutex<Texture>>> {
        self.textures.get(&handle).cloned()
    }

    pub fn font_string(&self, handle: Handle) -> Option<Arc<Mutex<FontString>>> {
        self.font_strings.get(&handle).cloned()
    }

    pub fn line(&self, handle: Handle) -> Option<Arc<Mutex<Line>>> {
        self.lines.get(&handle).cloned()
    }

    pub fn actor(&self, handle: Handle) -> Option<Arc<Mutex<ModelSceneActor>>> {
        self.actors.get(&handle).cloned()
    }

    /// Entry counts per partition.
    pub fn counts(&self) -> Vec<(Partition, usize)> {
        vec![
            (Partition::Frames, self.frames.len()),
            (Partition::Textures, self.textures.len()),
            (Partition::FontStrings, self.font_strings.len()),
            (Partition::Lines, self.lines.len()),
            (Partition::Actors, self.actors.len()),
        ]
    }

    pub fn len(&self) -> usize {
        self.counts().iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live frame handles in creation order.
    pub fn frame_handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.frames.keys().copied().collect();
        handles.sort_unstable();
        handles
    }
}
