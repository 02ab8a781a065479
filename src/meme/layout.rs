//! Image jobs: a background plus caption layers for the host to rasterise.

use std::fmt;

/// Caption typefaces shipped in the resource directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    GmarketSansBold,
    NotoSansCjkBold,
}

impl Font {
    pub fn file_name(&self) -> &'static str {
        match self {
            Font::GmarketSansBold => "GmarketSansBold.otf",
            Font::NotoSansCjkBold => "NotoSansCJK-Bold.ttc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FontSize {
    Points(u32),
    /// Largest size at which `sample` still fits the image width.
    FitWidth { sample: String, max: u32 },
}

/// Where a layer goes. Offsets are pixels; `w` is the rendered text width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Centered, bottom edge one twentieth of the height above the bottom.
    Caption,
    /// Left edge at `x`, top at the vertical middle plus `dy`.
    MiddleLeft { x: i32, dy: i32 },
    /// Right edge at the horizontal center plus `dx`, top at the middle plus `dy`.
    MiddleRightEdge { dx: i32, dy: i32 },
    /// Centered plus `dx`, top at `y`.
    TopCenter { dx: i32, y: i32 },
    /// Centered plus `dx`, top at `from_bottom` above the bottom edge.
    BottomCenter { dx: i32, from_bottom: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color(0, 0, 0);

    /// `ff0000` or `#ff0000`.
    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    pub text: String,
    pub font: Font,
    pub size: FontSize,
    pub anchor: Anchor,
    pub fill: Color,
    /// One-pixel outline drawn in the four diagonal directions.
    pub outline: Option<Color>,
    /// Extra pixels between lines.
    pub line_spacing: u32,
}

impl TextLayer {
    fn plain(text: &str, font: Font, points: u32, anchor: Anchor, fill: Color) -> Self {
        Self {
            text: text.to_string(),
            font,
            size: FontSize::Points(points),
            anchor,
            fill,
            outline: None,
            line_spacing: 4,
        }
    }
}

/// The finished job handed to [`crate::chat::Reply::reply_image`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemeImage {
    /// Encoded image bytes as downloaded or stored.
    pub background: Vec<u8>,
    pub layers: Vec<TextLayer>,
}

/// Split a trailing `::rrggbb` colour option off a caption.
pub fn split_color(text: &str) -> (String, Color) {
    match text.split_once("::") {
        Some((caption, option)) => {
            let color = Color::from_hex(option).unwrap_or_else(|| {
                tracing::debug!("Ignoring bad caption colour {:?}", option);
                Color::WHITE
            });
            (caption.to_string(), color)
        }
        None => (text.to_string(), Color::WHITE),
    }
}

impl MemeImage {
    /// Bottom caption sized to the image width, outlined in black.
    pub fn caption(background: Vec<u8>, text: &str) -> Self {
        let (text, fill) = split_color(text);
        Self {
            background,
            layers: vec![TextLayer {
                text,
                font: Font::GmarketSansBold,
                size: FontSize::FitWidth {
                    sample: "아".repeat(10),
                    max: 500,
                },
                anchor: Anchor::Caption,
                fill,
                outline: Some(Color::BLACK),
                line_spacing: 10,
            }],
        }
    }

    /// `!진행`: white text on the left.
    pub fn proceed(background: Vec<u8>, text: &str) -> Self {
        Self {
            background,
            layers: vec![TextLayer::plain(
                text,
                Font::NotoSansCjkBold,
                30,
                Anchor::MiddleLeft { x: 20, dy: -70 },
                Color::WHITE,
            )],
        }
    }

    /// `!지워`: black text ending left of the center.
    pub fn erase(background: Vec<u8>, text: &str) -> Self {
        Self {
            background,
            layers: vec![TextLayer::plain(
                text,
                Font::GmarketSansBold,
                40,
                Anchor::MiddleRightEdge { dx: -130, dy: -30 },
                Color::BLACK,
            )],
        }
    }

    /// `!말대꾸`: top and bottom lines.
    pub fn retort(background: Vec<u8>, top: &str, bottom: &str) -> Self {
        Self {
            background,
            layers: vec![
                TextLayer::plain(
                    top,
                    Font::NotoSansCjkBold,
                    60,
                    Anchor::TopCenter { dx: -5, y: 60 },
                    Color::BLACK,
                ),
                TextLayer::plain(
                    bottom,
                    Font::NotoSansCjkBold,
                    60,
                    Anchor::BottomCenter { dx: 5, from_bottom: 170 },
                    Color::BLACK,
                ),
            ],
        }
    }
}
