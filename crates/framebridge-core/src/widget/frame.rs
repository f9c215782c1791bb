use super::{WidgetCore, WidgetKind};
use crate::handle::Handle;
use crate::value::ScriptValue;
use std::collections::BTreeMap;

/// Frame strata in ascending order.
pub const STRATA: &[&str] = &[
    "BACKGROUND",
    "LOW",
    "MEDIUM",
    "HIGH",
    "DIALOG",
    "FULLSCREEN",
    "FULLSCREEN_DIALOG",
    "TOOLTIP",
];

#[derive(Debug, Clone)]
pub struct Frame {
    pub core: WidgetCore,
    pub strata: &'static str,
    pub level: i64,
    pub mouse_enabled: bool,
    pub keyboard_enabled: bool,
    pub movable: bool,
    pub attributes: BTreeMap<String, ScriptValue>,
    pub extra: FrameExtra,
}

impl Frame {
    pub fn new(core: WidgetCore) -> Self {
        let extra = FrameExtra::for_kind(core.kind);
        Self {
            core,
            strata: "MEDIUM",
            level: 0,
            mouse_enabled: false,
            keyboard_enabled: false,
            movable: false,
            attributes: BTreeMap::new(),
            extra,
        }
    }
}

/// State of the frame-derived kinds.
#[derive(Debug, Clone)]
pub enum FrameExtra {
    Plain,
    Button(ButtonState),
    EditBox(EditBoxState),
    Tooltip(TooltipState),
    /// Shared by `Model` and `PlayerModel`.
    Model(ModelState),
    ModelScene(ModelSceneState),
}

impl FrameExtra {
    fn for_kind(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::Button => Self::Button(ButtonState::default()),
            WidgetKind::EditBox => Self::EditBox(EditBoxState::default()),
            WidgetKind::GameTooltip => Self::Tooltip(TooltipState::default()),
            WidgetKind::Model | WidgetKind::PlayerModel => Self::Model(ModelState::default()),
            WidgetKind::ModelScene => Self::ModelScene(ModelSceneState::default()),
            _ => Self::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ButtonState {
    pub text: Option<String>,
    pub enabled: bool,
}

impl Default for ButtonState {
    fn default() -> Self {
        Self {
            text: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditBoxState {
    pub text: String,
    pub focused: bool,
    /// 0 means unlimited.
    pub max_letters: usize,
    pub numeric: bool,
    pub cursor: usize,
}

impl EditBoxState {
    /// Apply the letter limit to `text`.
    pub fn clamp(&self, text: &str) -> String {
        let text: String = if self.numeric {
            text.chars().filter(char::is_ascii_digit).collect()
        } else {
            text.to_string()
        };
        if self.max_letters == 0 {
            text
        } else {
            text.chars().take(self.max_letters).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipLine {
    pub left: String,
    pub right: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TooltipState {
    pub owner: Option<Handle>,
    pub anchor: String,
    pub lines: Vec<TooltipLine>,
}

#[derive(Debug, Clone)]
pub struct ModelState {
    pub model: Option<String>,
    pub file_id: Option<i64>,
    pub facing: f64,
    pub position: [f64; 3],
    pub cam_distance_scale: f64,
    /// Unit token bound by `PlayerModel:SetUnit`.
    pub unit: Option<String>,
    pub display_id: Option<i64>,
}

impl Default for ModelState {
    fn default() -> Self {
        Self {
            model: None,
            file_id: None,
            facing: 0.0,
            position: [0.0; 3],
            cam_distance_scale: 1.0,
            unit: None,
            display_id: None,
        }
    }
}

impl ModelState {
    pub fn clear(&mut self) {
        self.model = None;
        self.file_id = None;
        self.unit = None;
        self.display_id = None;
    }
}

#[derive(Debug, Clone)]
pub struct ModelSceneState {
    /// Actors in creation order.
    pub actors: Vec<Handle>,
    pub camera_position: [f64; 3],
    pub field_of_view: f64,
}

impl Default for ModelSceneState {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            camera_position: [0.0; 3],
            field_of_view: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_follows_kind() {
        let frame = Frame::new(WidgetCore::new(Handle::from_raw(1), WidgetKind::PlayerModel));
        assert!(matches!(frame.extra, FrameExtra::Model(_)));
        let frame = Frame::new(WidgetCore::new(Handle::from_raw(2), WidgetKind::Frame));
        assert!(matches!(frame.extra, FrameExtra::Plain));
        assert_eq!(frame.strata, "MEDIUM");
    }

    #[test]
    fn edit_box_clamp_respects_limits() {
        let mut state = EditBoxState {
            max_letters: 3,
            ..EditBoxState::default()
        };
        assert_eq!(state.clamp("hello"), "hel");
        state.numeric = true;
        state.max_letters = 0;
        assert_eq!(state.clamp("a1b2c3"), "123");
    }
}
