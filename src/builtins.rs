//! Closed registry of callable names.
//!
//! The parser produces plain or dotted call names; `Builtin::from_name`
//! resolves each call site once before execution.

pub mod ta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // Output intrinsics
    Plot,
    Hline,
    PlotShape,
    PlotChar,
    Bgcolor,
    Alert,
    StrategyEntry,
    StrategyLong,
    StrategyShort,
    StrategyClose,
    Input,

    // Series primitives
    Sma,
    Ema,
    Rsi,
    Stdev,
    Highest,
    Lowest,
    Crossover,
    Crossunder,
    Change,

    // Scalar helpers
    Nz,
    Na,
    Abs,
    Max,
    Min,
    ColorNew,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "plot" => Self::Plot,
            "hline" => Self::Hline,
            "plotshape" => Self::PlotShape,
            "plotchar" => Self::PlotChar,
            "bgcolor" => Self::Bgcolor,
            "alert" | "alertcondition" => Self::Alert,
            "strategy.entry" => Self::StrategyEntry,
            "strategy.long" => Self::StrategyLong,
            "strategy.short" => Self::StrategyShort,
            "strategy.close" => Self::StrategyClose,
            "input" | "input.int" | "input.float" | "input.bool" => Self::Input,
            "nz" => Self::Nz,
            "na" => Self::Na,
            "color.new" => Self::ColorNew,
            _ => {
                if let Some(name) = name.strip_prefix("ta.") {
                    return Self::bare(name).filter(|builtin| builtin.is_series());
                }
                if let Some(name) = name.strip_prefix("math.") {
                    return Self::bare(name).filter(|builtin| builtin.is_math());
                }
                return Self::bare(name);
            }
        };
        Some(builtin)
    }

    /// Names usable without a namespace; `ta.` and `math.` narrow these.
    fn bare(name: &str) -> Option<Self> {
        let builtin = match name {
            "sma" => Self::Sma,
            "ema" => Self::Ema,
            "rsi" => Self::Rsi,
            "stdev" => Self::Stdev,
            "highest" => Self::Highest,
            "lowest" => Self::Lowest,
            "crossover" => Self::Crossover,
            "crossunder" => Self::Crossunder,
            "change" => Self::Change,
            "abs" => Self::Abs,
            "max" => Self::Max,
            "min" => Self::Min,
            _ => return None,
        };
        Some(builtin)
    }

    fn is_math(self) -> bool {
        matches!(self, Self::Abs | Self::Max | Self::Min)
    }

    /// Primitives that read their arguments as whole series.
    pub fn is_series(self) -> bool {
        matches!(
            self,
            Self::Sma
                | Self::Ema
                | Self::Rsi
                | Self::Stdev
                | Self::Highest
                | Self::Lowest
                | Self::Crossover
                | Self::Crossunder
                | Self::Change
        )
    }

    /// Number of leading positional arguments read as series.
    pub fn series_arity(self) -> usize {
        match self {
            Self::Crossover | Self::Crossunder => 2,
            _ if self.is_series() => 1,
            _ => 0,
        }
    }

    /// Positional arguments the call cannot do without.
    pub fn min_args(self) -> usize {
        match self {
            Self::Sma
            | Self::Ema
            | Self::Rsi
            | Self::Stdev
            | Self::Highest
            | Self::Lowest
            | Self::Crossover
            | Self::Crossunder
            | Self::Max
            | Self::Min
            | Self::ColorNew => 2,
            Self::Plot
            | Self::Hline
            | Self::PlotShape
            | Self::PlotChar
            | Self::Bgcolor
            | Self::Alert
            | Self::Input
            | Self::Change
            | Self::Nz
            | Self::Na
            | Self::Abs => 1,
            Self::StrategyEntry => 2,
            Self::StrategyLong | Self::StrategyShort | Self::StrategyClose => 0,
        }
    }
}
