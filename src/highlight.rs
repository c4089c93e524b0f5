//! Cell highlight styles written by the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fill color of a highlighted cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Pink,
    Green,
}

impl HighlightColor {
    /// `RRGGBB` hex as used in pattern fills.
    pub fn rgb(self) -> &'static str {
        match self {
            Self::Yellow => "FFFF00",
            Self::Pink => "FFC0CB",
            Self::Green => "92D050",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Green => "green",
        })
    }
}

/// Horizontal alignment applied together with the fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
        }
    }
}

/// Solid fill plus alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Highlight {
    pub color: HighlightColor,
    pub align: Alignment,
}

impl Highlight {
    pub const fn new(color: HighlightColor, align: Alignment) -> Self {
        Self { color, align }
    }

    pub const fn centered(color: HighlightColor) -> Self {
        Self::new(color, Alignment::Center)
    }
}
