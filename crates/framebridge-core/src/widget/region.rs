use super::{Color, WidgetCore};
use crate::handle::Handle;
use serde::Serialize;

/// Image state shared by textures and lines.
#[derive(Debug, Clone)]
pub struct TextureState {
    pub file: Option<String>,
    pub atlas: Option<String>,
    /// Solid fill set by `SetColorTexture`.
    pub color: Option<Color>,
    /// left, right, top, bottom
    pub tex_coords: [f64; 4],
    pub desaturated: bool,
}

impl Default for TextureState {
    fn default() -> Self {
        Self {
            file: None,
            atlas: None,
            color: None,
            tex_coords: [0.0, 1.0, 0.0, 1.0],
            desaturated: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub core: WidgetCore,
    pub texture: TextureState,
}

impl Texture {
    pub fn new(core: WidgetCore) -> Self {
        Self {
            core,
            texture: TextureState::default(),
        }
    }
}

/// One end of a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineEnd {
    pub point: &'static str,
    pub relative_to: Option<Handle>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Line {
    pub core: WidgetCore,
    pub texture: TextureState,
    pub start: Option<LineEnd>,
    pub end: Option<LineEnd>,
    pub thickness: f64,
}

impl Line {
    pub fn new(core: WidgetCore) -> Self {
        Self {
            core,
            texture: TextureState::default(),
            start: None,
            end: None,
            thickness: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontState {
    pub path: Option<String>,
    pub size: f64,
    pub flags: String,
}

impl Default for FontState {
    fn default() -> Self {
        Self {
            path: None,
            size: 12.0,
            flags: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontString {
    pub core: WidgetCore,
    pub text: Option<String>,
    pub font: FontState,
    pub justify_h: &'static str,
    pub text_color: Color,
}

impl FontString {
    pub fn new(core: WidgetCore) -> Self {
        Self {
            core,
            text: None,
            font: FontState::default(),
            justify_h: "CENTER",
            text_color: Color::WHITE,
        }
    }

    /// Rendered width estimate; glyph metrics are not modeled.
    pub fn string_width(&self) -> f64 {
        let chars = self.text.as_deref().map_or(0, |text| text.chars().count());
        chars as f64 * self.font.size * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetKind;

    #[test]
    fn string_width_scales_with_font_size() {
        let mut fs = FontString::new(WidgetCore::new(Handle::from_raw(1), WidgetKind::FontString));
        assert_eq!(fs.string_width(), 0.0);
        fs.text = Some("abcd".to_string());
        assert_eq!(fs.string_width(), 24.0);
        fs.font.size = 20.0;
        assert_eq!(fs.string_width(), 40.0);
    }

    #[test]
    fn new_line_has_no_endpoints() {
        let line = Line::new(WidgetCore::new(Handle::from_raw(2), WidgetKind::Line));
        assert!(line.start.is_none() && line.end.is_none());
        assert_eq!(line.texture.tex_coords, [0.0, 1.0, 0.0, 1.0]);
    }
}
