//! Result record handed to the renderer.
//!
//! Plot values and alert flags are positional: element `i` belongs to bar
//! `i` of the candle window (0 = newest). Markers, backgrounds and signals
//! name their bar explicitly. A set `error` invalidates everything else.

use serde::Serialize;

use crate::color::Color;

pub const DEFAULT_PLOT_COLOR: Color = Color::opaque(0x2196F3);
pub const DEFAULT_LINE_WIDTH: f64 = 1.0;
pub const DEFAULT_TITLE: &str = "Script";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptOutput {
    pub title: String,
    pub overlay: bool,
    pub error: Option<String>,
    pub plots: Vec<PlotSeries>,
    pub hlines: Vec<HorizontalLine>,
    pub shapes: Vec<ShapeMarker>,
    pub backgrounds: Vec<BackgroundColor>,
    pub alerts: Vec<AlertDefinition>,
    pub signals: Vec<StrategySignal>,
    pub inputs: Vec<InputDeclaration>,
}

impl ScriptOutput {
    pub fn new(title: impl Into<String>, overlay: bool) -> Self {
        Self {
            title: title.into(),
            overlay,
            error: None,
            plots: Vec::new(),
            hlines: Vec::new(),
            shapes: Vec::new(),
            backgrounds: Vec::new(),
            alerts: Vec::new(),
            signals: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// A record carrying only an error; nothing in it is drawable.
    pub fn failed(title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(title, false)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl Default for ScriptOutput {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub title: String,
    pub values: Vec<f64>,
    pub color: Color,
    pub line_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "solid" => Some(Self::Solid),
            "dashed" => Some(Self::Dashed),
            "dotted" => Some(Self::Dotted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizontalLine {
    pub price: f64,
    pub title: String,
    pub color: Color,
    pub style: LineStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeMarker {
    pub bar: usize,
    pub style: String,
    pub location: String,
    pub color: Color,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundColor {
    pub bar: usize,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDefinition {
    pub title: String,
    pub message: String,
    pub triggered: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Long,
    Short,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySignal {
    pub bar: usize,
    pub kind: SignalKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDeclaration {
    pub name: String,
    pub default: f64,
    pub value: f64,
}
