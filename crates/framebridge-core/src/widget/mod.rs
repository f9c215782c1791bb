//! Native widget objects.
//!
//! Every object shares a [`WidgetCore`] (identity, tree links, registered
//! events, callback slots, visibility and layout). The per-family structs add
//! the state of their kind: [`Frame`] (with the frame-derived kinds folded
//! into [`FrameExtra`]), [`Texture`], [`FontString`], [`Line`] and
//! [`ModelSceneActor`].

mod actor;
mod frame;
mod region;

pub use actor::ModelSceneActor;
pub use frame::{
    ButtonState, EditBoxState, Frame, FrameExtra, ModelSceneState, ModelState, STRATA,
    TooltipLine, TooltipState,
};
pub use region::{FontString, FontState, Line, LineEnd, Texture, TextureState};

use crate::callbacks::CallbackSlots;
use crate::error::CreateError;
use crate::handle::Handle;
use crate::refs::RefSlot;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Concrete widget kinds scripts can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WidgetKind {
    Frame,
    Button,
    EditBox,
    GameTooltip,
    Model,
    PlayerModel,
    ModelScene,
    Texture,
    FontString,
    Line,
    ModelSceneActor,
}

impl WidgetKind {
    pub const ALL: &'static [WidgetKind] = &[
        Self::Frame,
        Self::Button,
        Self::EditBox,
        Self::GameTooltip,
        Self::Model,
        Self::PlayerModel,
        Self::ModelScene,
        Self::Texture,
        Self::FontString,
        Self::Line,
        Self::ModelSceneActor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Frame => "Frame",
            Self::Button => "Button",
            Self::EditBox => "EditBox",
            Self::GameTooltip => "GameTooltip",
            Self::Model => "Model",
            Self::PlayerModel => "PlayerModel",
            Self::ModelScene => "ModelScene",
            Self::Texture => "Texture",
            Self::FontString => "FontString",
            Self::Line => "Line",
            Self::ModelSceneActor => "ModelSceneActor",
        }
    }

    /// Class whose table instances of this kind are tagged with.
    pub fn class_name(self) -> &'static str {
        self.name()
    }

    pub fn partition(self) -> Partition {
        match self {
            Self::Texture => Partition::Textures,
            Self::FontString => Partition::FontStrings,
            Self::Line => Partition::Lines,
            Self::ModelSceneActor => Partition::Actors,
            _ => Partition::Frames,
        }
    }

    pub fn is_frame(self) -> bool {
        self.partition() == Partition::Frames
    }

    /// Kind an object of this kind must be parented to, if any.
    pub fn required_parent(self) -> Option<ParentRequirement> {
        match self {
            Self::Texture | Self::FontString | Self::Line => Some(ParentRequirement::AnyFrame),
            Self::ModelSceneActor => Some(ParentRequirement::ModelScene),
            _ => None,
        }
    }

    /// Whether `parent` is an acceptable parent for this kind.
    pub fn accepts_parent(self, parent: WidgetKind) -> bool {
        match self.required_parent() {
            Some(ParentRequirement::ModelScene) => parent == Self::ModelScene,
            _ => parent.is_frame(),
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WidgetKind {
    type Err = CreateError;

    /// Kind names are matched case-insensitively, as `CreateFrame` does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CreateError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRequirement {
    AnyFrame,
    ModelScene,
}

/// Object registry partitions, one per kind family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Frames,
    Textures,
    FontStrings,
    Lines,
    Actors,
}

impl Partition {
    pub const ALL: &'static [Partition] = &[
        Self::Frames,
        Self::Textures,
        Self::FontStrings,
        Self::Lines,
        Self::Actors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Frames => "frames",
            Self::Textures => "textures",
            Self::FontStrings => "font_strings",
            Self::Lines => "lines",
            Self::Actors => "actors",
        }
    }
}

/// Anchor points accepted by `SetPoint` and friends.
pub const ANCHOR_POINTS: &[&str] = &[
    "TOPLEFT",
    "TOP",
    "TOPRIGHT",
    "LEFT",
    "CENTER",
    "RIGHT",
    "BOTTOMLEFT",
    "BOTTOM",
    "BOTTOMRIGHT",
];

/// Normalize an anchor name, or `None` if it is not one.
pub fn anchor_point(name: &str) -> Option<&'static str> {
    ANCHOR_POINTS
        .iter()
        .copied()
        .find(|point| point.eq_ignore_ascii_case(name))
}

/// One anchor of a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub point: &'static str,
    pub relative_to: Option<Handle>,
    pub relative_point: &'static str,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }
}

/// Draw layers in back-to-front order.
pub const DRAW_LAYERS: &[&str] = &["BACKGROUND", "BORDER", "ARTWORK", "OVERLAY", "HIGHLIGHT"];

pub fn draw_layer(name: &str) -> Option<&'static str> {
    DRAW_LAYERS
        .iter()
        .copied()
        .find(|layer| layer.eq_ignore_ascii_case(name))
}

/// State shared by every widget.
#[derive(Debug, Clone)]
pub struct WidgetCore {
    pub handle: Handle,
    pub kind: WidgetKind,
    pub name: Option<String>,
    pub parent: Option<Handle>,
    pub children: Vec<Handle>,
    pub events: BTreeSet<String>,
    pub callbacks: CallbackSlots,
    /// Pinned wrapper table handed to scripts.
    pub wrapper: Option<RefSlot>,
    /// Originals and hooks pinned by `hooksecurefunc` on this instance.
    pub function_hooks: Vec<RefSlot>,
    pub id: i64,
    pub shown: bool,
    pub alpha: f64,
    pub width: f64,
    pub height: f64,
    pub points: Vec<Point>,
    pub draw_layer: &'static str,
    pub sublevel: i64,
    pub vertex_color: Color,
    pub template: Option<String>,
}

impl WidgetCore {
    pub fn new(handle: Handle, kind: WidgetKind) -> Self {
        Self {
            handle,
            kind,
            name: None,
            parent: None,
            children: Vec::new(),
            events: BTreeSet::new(),
            callbacks: CallbackSlots::new(),
            wrapper: None,
            function_hooks: Vec::new(),
            id: 0,
            shown: true,
            alpha: 1.0,
            width: 0.0,
            height: 0.0,
            points: Vec::new(),
            draw_layer: "ARTWORK",
            sublevel: 0,
            vertex_color: Color::WHITE,
            template: None,
        }
    }

    /// `name` if the object has one, else `Kind<handle>`.
    pub fn debug_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}<{}>", self.kind, self.handle),
        }
    }
}

/// Access to the shared core of a widget struct.
pub trait Widget {
    fn core(&self) -> &WidgetCore;
    fn core_mut(&mut self) -> &mut WidgetCore;
}

macro_rules! impl_widget {
    ($($ty:ty),+) => {
        $(impl Widget for $ty {
            fn core(&self) -> &WidgetCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut WidgetCore {
                &mut self.core
            }
        })+
    };
}

impl_widget!(Frame, Texture, FontString, Line, ModelSceneActor);

pub(crate) fn lock<T>(object: &Mutex<T>) -> MutexGuard<'_, T> {
    object.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared reference to a native object of any family.
#[derive(Debug, Clone)]
pub enum NativeRef {
    Frame(Arc<Mutex<Frame>>),
    Texture(Arc<Mutex<Texture>>),
    FontString(Arc<Mutex<FontString>>),
    Line(Arc<Mutex<Line>>),
    Actor(Arc<Mutex<ModelSceneActor>>),
}

impl NativeRef {
    /// Build a fresh object of `kind`.
    pub fn new(handle: Handle, kind: WidgetKind) -> Self {
        let core = WidgetCore::new(handle, kind);
        match kind.partition() {
            Partition::Frames => Self::Frame(Arc::new(Mutex::new(Frame::new(core)))),
            Partition::Textures => Self::Texture(Arc::new(Mutex::new(Texture::new(core)))),
            Partition::FontStrings => {
                Self::FontString(Arc::new(Mutex::new(FontString::new(core))))
            }
            Partition::Lines => Self::Line(Arc::new(Mutex::new(Line::new(core)))),
            Partition::Actors => Self::Actor(Arc::new(Mutex::new(ModelSceneActor::new(core)))),
        }
    }

    pub fn partition(&self) -> Partition {
        match self {
            Self::Frame(_) => Partition::Frames,
            Self::Texture(_) => Partition::Textures,
            Self::FontString(_) => Partition::FontStrings,
            Self::Line(_) => Partition::Lines,
            Self::Actor(_) => Partition::Actors,
        }
    }

    /// Run `f` on the object's core under its lock.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut WidgetCore) -> R) -> R {
        match self {
            Self::Frame(obj) => f(lock(obj).core_mut()),
            Self::Texture(obj) => f(lock(obj).core_mut()),
            Self::FontString(obj) => f(lock(obj).core_mut()),
            Self::Line(obj) => f(lock(obj).core_mut()),
            Self::Actor(obj) => f(lock(obj).core_mut()),
        }
    }

    pub fn kind(&self) -> WidgetKind {
        self.with_core(|core| core.kind)
    }
}
