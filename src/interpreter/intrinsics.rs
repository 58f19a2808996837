use std::collections::{HashMap, HashSet};

use crate::color::Color;
use crate::output::{
    AlertDefinition, BackgroundColor, DEFAULT_LINE_WIDTH, DEFAULT_PLOT_COLOR, HorizontalLine,
    InputDeclaration, LineStyle, PlotSeries, ScriptOutput, ShapeMarker, SignalKind,
    StrategySignal,
};

use super::args::Args;
use super::{RuntimeError, Value};

const DEFAULT_HLINE_COLOR: Color = Color::opaque(0x787B86);

/// A `plot` call site found before the run, with its title when literal.
#[derive(Debug, Clone)]
pub(super) struct PlotSlot {
    pub(super) site: usize,
    pub(super) title: Option<String>,
}

/// Marker flavour: `plotshape` draws a shape, `plotchar` a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MarkerKind {
    Shape,
    Char,
}

/// Accumulates what output-producing calls record across all bars.
///
/// Plots, horizontal lines and alerts are keyed by call site so that the
/// same call evaluated on every bar fills one entry.
pub(super) struct OutputBuilder {
    len: usize,
    plots: Vec<PlotSeries>,
    plot_sites: HashMap<usize, usize>,
    hlines: Vec<HorizontalLine>,
    hline_sites: HashSet<usize>,
    shapes: Vec<ShapeMarker>,
    backgrounds: Vec<BackgroundColor>,
    alerts: Vec<AlertDefinition>,
    alert_sites: HashMap<usize, usize>,
    signals: Vec<StrategySignal>,
    inputs: Vec<InputDeclaration>,
}

impl OutputBuilder {
    pub(super) fn new(len: usize) -> Self {
        Self {
            len,
            plots: Vec::new(),
            plot_sites: HashMap::new(),
            hlines: Vec::new(),
            hline_sites: HashSet::new(),
            shapes: Vec::new(),
            backgrounds: Vec::new(),
            alerts: Vec::new(),
            alert_sites: HashMap::new(),
            signals: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Reserves the series for a `plot` call site so it is reported even on
    /// runs where the call never executes. Untitled plots are numbered in
    /// declaration order.
    pub(super) fn declare_plot(&mut self, site: usize, title: Option<String>) -> usize {
        if let Some(index) = self.plot_sites.get(&site) {
            return *index;
        }
        let title = title.unwrap_or_else(|| format!("Plot {}", self.plots.len() + 1));
        self.plots.push(PlotSeries {
            title,
            values: vec![f64::NAN; self.len],
            color: DEFAULT_PLOT_COLOR,
            line_width: DEFAULT_LINE_WIDTH,
        });
        self.plot_sites.insert(site, self.plots.len() - 1);
        self.plots.len() - 1
    }

    /// `plot(series, title, color, linewidth)`
    pub(super) fn plot(
        &mut self,
        site: usize,
        bar: usize,
        args: &Args<'_>,
    ) -> Result<(), RuntimeError> {
        let value = args.required_number(0, "series")?;
        let title = args.string(1, "title")?;
        let color = args.color(2, "color")?;
        let line_width = args.number(3, "linewidth")?;

        let index = self.declare_plot(site, None);
        let plot = &mut self.plots[index];
        if let Some(title) = title {
            plot.title = title;
        }
        if let Some(color) = color {
            plot.color = color;
        }
        if let Some(width) = line_width
            && width.is_finite()
        {
            plot.line_width = width;
        }
        if let Some(cell) = plot.values.get_mut(bar) {
            *cell = value;
        }
        Ok(())
    }

    /// `hline(price, title, color, linestyle)`; recorded once per call site.
    pub(super) fn hline(&mut self, site: usize, args: &Args<'_>) -> Result<(), RuntimeError> {
        if self.hline_sites.contains(&site) {
            return Ok(());
        }
        let price = args.required_number(0, "price")?;
        let title = args.string(1, "title")?.unwrap_or_default();
        let color = args.color(2, "color")?.unwrap_or(DEFAULT_HLINE_COLOR);
        let style = match args.string(3, "linestyle")? {
            None => LineStyle::Dashed,
            Some(name) => LineStyle::from_name(&name).ok_or_else(|| RuntimeError::InvalidArgument {
                function: "hline".to_string(),
                argument: "linestyle",
                message: format!("unknown line style '{name}'"),
            })?,
        };

        self.hline_sites.insert(site);
        self.hlines.push(HorizontalLine {
            price,
            title,
            color,
            style,
        });
        Ok(())
    }

    /// `plotshape(series, title, style, location, color, text=)` and
    /// `plotchar(series, title, char, location, color)`.
    pub(super) fn marker(
        &mut self,
        bar: usize,
        kind: MarkerKind,
        args: &Args<'_>,
    ) -> Result<(), RuntimeError> {
        let condition = args.required(0, "series")?;
        if !condition.truthy(&args.operation("series"))? {
            return Ok(());
        }

        let (style, text) = match kind {
            MarkerKind::Shape => (
                args.string(2, "style")?.unwrap_or_else(|| "xcross".to_string()),
                args.named_string("text")?,
            ),
            MarkerKind::Char => (
                "char".to_string(),
                Some(args.string(2, "char")?.unwrap_or_else(|| "★".to_string())),
            ),
        };
        let location = args
            .string(3, "location")?
            .unwrap_or_else(|| "abovebar".to_string());
        let color = args.color(4, "color")?.unwrap_or(DEFAULT_PLOT_COLOR);

        self.shapes.push(ShapeMarker {
            bar,
            style,
            location,
            color,
            text,
        });
        Ok(())
    }

    /// `bgcolor(color)`; an `na` color leaves the bar untouched.
    pub(super) fn background(&mut self, bar: usize, args: &Args<'_>) -> Result<(), RuntimeError> {
        args.required(0, "color")?;
        if let Some(color) = args.color(0, "color")? {
            self.backgrounds.push(BackgroundColor { bar, color });
        }
        Ok(())
    }

    /// `alert(condition, title, message)`, or `alert(message)` which fires
    /// whenever the statement runs.
    pub(super) fn alert(
        &mut self,
        site: usize,
        bar: usize,
        args: &Args<'_>,
    ) -> Result<(), RuntimeError> {
        let (triggered, title, message) = match args.required(0, "condition")? {
            Value::String(message) => (
                true,
                args.named_string("title")?.unwrap_or_else(|| message.clone()),
                message.clone(),
            ),
            condition => {
                let triggered = condition.truthy(&args.operation("condition"))?;
                let title = args
                    .string(1, "title")?
                    .unwrap_or_else(|| format!("Alert {}", self.alerts.len() + 1));
                let message = args.string(2, "message")?.unwrap_or_else(|| title.clone());
                (triggered, title, message)
            }
        };

        let index = match self.alert_sites.get(&site) {
            Some(index) => *index,
            None => {
                self.alerts.push(AlertDefinition {
                    title,
                    message,
                    triggered: vec![false; self.len],
                });
                self.alert_sites.insert(site, self.alerts.len() - 1);
                self.alerts.len() - 1
            }
        };
        if let Some(cell) = self.alerts[index].triggered.get_mut(bar) {
            *cell = triggered;
        }
        Ok(())
    }

    /// `strategy.entry(id, direction, when=)`
    pub(super) fn entry(&mut self, bar: usize, args: &Args<'_>) -> Result<(), RuntimeError> {
        let id = args.string(0, "id")?.ok_or_else(|| RuntimeError::MissingArgument {
            function: "strategy.entry".to_string(),
            argument: "id",
        })?;
        let direction = args.string(1, "direction")?.unwrap_or_default();
        let kind = match direction.as_str() {
            "long" => SignalKind::Long,
            "short" => SignalKind::Short,
            _ => {
                return Err(RuntimeError::InvalidArgument {
                    function: "strategy.entry".to_string(),
                    argument: "direction",
                    message: format!("expected strategy.long or strategy.short, got '{direction}'"),
                });
            }
        };
        if args.named_flag("when")?.unwrap_or(true) {
            self.signals.push(StrategySignal { bar, kind, id });
        }
        Ok(())
    }

    /// `strategy.long`, `strategy.short` and `strategy.close`: an optional
    /// string id and an optional condition, positional or `when=`.
    pub(super) fn signal(
        &mut self,
        bar: usize,
        kind: SignalKind,
        args: &Args<'_>,
    ) -> Result<(), RuntimeError> {
        let mut id = args.named_string("id")?;
        let mut when = args.named_flag("when")?;
        for value in args.positional() {
            match value {
                Value::String(text) if id.is_none() => id = Some(text.clone()),
                other if when.is_none() => when = Some(other.truthy(&args.operation("when"))?),
                _ => {}
            }
        }

        if when.unwrap_or(true) {
            let id = id.unwrap_or_else(|| {
                match kind {
                    SignalKind::Long => "Long",
                    SignalKind::Short => "Short",
                    SignalKind::Close => "all",
                }
                .to_string()
            });
            self.signals.push(StrategySignal { bar, kind, id });
        }
        Ok(())
    }

    /// Declares `name` once and returns its effective value.
    pub(super) fn input(
        &mut self,
        name: String,
        default: f64,
        overrides: &HashMap<String, f64>,
    ) -> f64 {
        let value = overrides.get(&name).copied().unwrap_or(default);
        if !self.inputs.iter().any(|input| input.name == name) {
            self.inputs.push(InputDeclaration {
                name,
                default,
                value,
            });
        }
        value
    }

    pub(super) fn finish(self, title: String, overlay: bool) -> ScriptOutput {
        ScriptOutput {
            title,
            overlay,
            error: None,
            plots: self.plots,
            hlines: self.hlines,
            shapes: self.shapes,
            backgrounds: self.backgrounds,
            alerts: self.alerts,
            signals: self.signals,
            inputs: self.inputs,
        }
    }
}
