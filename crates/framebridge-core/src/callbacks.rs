//! Named script callback slots.
//!
//! Every object carries a [`CallbackSlots`] map from [`ScriptSlot`] to an
//! ordered list of pinned handler functions. Index 0 is the primary handler
//! installed by `SetScript`; `HookScript` appends. Invocation walks the list
//! in order and hands every entry the same arguments.

use crate::refs::RefSlot;
use crate::value::ScriptValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Argument shape a slot's handlers are called with (after `self`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackShape {
    NoArgs,
    /// `(event, param)`
    Event,
    /// `(elapsed)`
    Elapsed,
    /// `(button, down)`
    Mouse,
    /// `(userInput)`
    UserInput,
}

macro_rules! script_slots {
    ($($slot:ident => $shape:ident),+ $(,)?) => {
        /// Closed set of callback slot names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ScriptSlot {
            $($slot),+
        }

        impl ScriptSlot {
            pub const ALL: &'static [ScriptSlot] = &[$(ScriptSlot::$slot),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(ScriptSlot::$slot => stringify!($slot)),+
                }
            }

            pub fn shape(self) -> CallbackShape {
                match self {
                    $(ScriptSlot::$slot => CallbackShape::$shape),+
                }
            }
        }
    };
}

script_slots! {
    OnLoad => NoArgs,
    OnShow => NoArgs,
    OnHide => NoArgs,
    OnEnter => NoArgs,
    OnLeave => NoArgs,
    OnEnterPressed => NoArgs,
    OnEscapePressed => NoArgs,
    OnEditFocusGained => NoArgs,
    OnEditFocusLost => NoArgs,
    OnEvent => Event,
    OnUpdate => Elapsed,
    OnClick => Mouse,
    OnMouseDown => Mouse,
    OnMouseUp => Mouse,
    OnTextChanged => UserInput,
}

impl fmt::Display for ScriptSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScriptSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|slot| slot.name() == s)
            .ok_or_else(|| format!("unknown script handler '{s}'"))
    }
}

/// Arguments for one invocation of a slot's handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackArgs {
    None,
    Event { event: String, param: ScriptValue },
    Elapsed(f64),
    Mouse { button: String, down: bool },
    UserInput(bool),
}

impl CallbackArgs {
    pub fn event(event: impl Into<String>, param: impl Into<ScriptValue>) -> Self {
        Self::Event {
            event: event.into(),
            param: param.into(),
        }
    }

    pub fn mouse(button: impl Into<String>, down: bool) -> Self {
        Self::Mouse {
            button: button.into(),
            down,
        }
    }

    pub fn shape(&self) -> CallbackShape {
        match self {
            Self::None => CallbackShape::NoArgs,
            Self::Event { .. } => CallbackShape::Event,
            Self::Elapsed(_) => CallbackShape::Elapsed,
            Self::Mouse { .. } => CallbackShape::Mouse,
            Self::UserInput(_) => CallbackShape::UserInput,
        }
    }

    /// Whether these arguments can be passed to `slot`'s handlers.
    pub fn fits(&self, slot: ScriptSlot) -> bool {
        self.shape() == slot.shape()
    }

    /// Positional values following `self`. A nil event parameter is omitted.
    pub fn to_values(&self) -> Vec<ScriptValue> {
        match self {
            Self::None => Vec::new(),
            Self::Event { event, param } if param.is_nil() => {
                vec![ScriptValue::from(event.as_str())]
            }
            Self::Event { event, param } => vec![ScriptValue::from(event.as_str()), param.clone()],
            Self::Elapsed(elapsed) => vec![ScriptValue::Number(*elapsed)],
            Self::Mouse { button, down } => {
                vec![ScriptValue::from(button.as_str()), ScriptValue::Boolean(*down)]
            }
            Self::UserInput(user_input) => vec![ScriptValue::Boolean(*user_input)],
        }
    }
}

/// Per-object handler lists keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct CallbackSlots {
    slots: BTreeMap<ScriptSlot, Vec<RefSlot>>,
}

impl CallbackSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` as the primary, returning the entry it replaced.
    pub fn set(&mut self, slot: ScriptSlot, handler: RefSlot) -> Option<RefSlot> {
        let list = self.slots.entry(slot).or_default();
        if list.is_empty() {
            list.push(handler);
            None
        } else {
            Some(std::mem::replace(&mut list[0], handler))
        }
    }

    /// Remove every handler of `slot`. The caller unpins the returned refs.
    pub fn clear(&mut self, slot: ScriptSlot) -> Vec<RefSlot> {
        self.slots.remove(&slot).unwrap_or_default()
    }

    /// Append `handler` after the existing entries.
    pub fn hook(&mut self, slot: ScriptSlot, handler: RefSlot) {
        self.slots.entry(slot).or_default().push(handler);
    }

    /// Handlers in invocation order.
    pub fn handlers(&self, slot: ScriptSlot) -> &[RefSlot] {
        self.slots.get(&slot).map_or(&[], Vec::as_slice)
    }

    pub fn primary(&self, slot: ScriptSlot) -> Option<RefSlot> {
        self.handlers(slot).first().copied()
    }

    pub fn has(&self, slot: ScriptSlot) -> bool {
        !self.handlers(slot).is_empty()
    }

    /// Slots with at least one handler.
    pub fn bound(&self) -> impl Iterator<Item = ScriptSlot> + '_ {
        self.slots
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(slot, _)| *slot)
    }

    /// Remove every handler of every slot.
    pub fn drain_all(&mut self) -> Vec<RefSlot> {
        std::mem::take(&mut self.slots)
            .into_values()
            .flatten()
            .collect()
    }
}
