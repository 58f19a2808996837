use std::collections::HashMap;

use crate::candle::CandleSource;

use super::{RuntimeError, Value};

/// Price-derived series bound for every bar; scripts cannot assign them.
const FIELDS: [&str; 10] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "time",
    "hl2",
    "hlc3",
    "ohlc4",
    "bar_index",
];

/// A user variable's storage.
#[derive(Debug)]
enum Slot {
    /// One value per bar, NaN where the variable was never assigned.
    Numeric(Vec<f64>),
    /// Strings and colors keep only their latest value.
    Scalar(Value),
}

/// Materialized inputs and results of one call or history site.
#[derive(Debug, Default)]
struct SiteSeries {
    args: Vec<Vec<f64>>,
    result: Vec<f64>,
}

/// Where a series primitive reads one of its inputs from.
#[derive(Debug, Clone, Copy)]
pub(super) enum SeriesRef<'n> {
    Named(&'n str),
    SiteArg(usize),
}

/// Every per-bar series of one run, all sized to the visible window.
pub(super) struct SeriesStore {
    len: usize,
    fields: HashMap<&'static str, Vec<f64>>,
    variables: HashMap<String, Slot>,
    sites: Vec<SiteSeries>,
}

impl SeriesStore {
    /// Binds the price fields and creates an all-NaN series for every
    /// assignable name in `variables`, so a variable can be read (as `na`)
    /// before its first assignment.
    pub(super) fn new(candles: &dyn CandleSource, site_count: usize, variables: &[&str]) -> Self {
        let len = candles.len();
        let mut fields: HashMap<&'static str, Vec<f64>> = FIELDS
            .iter()
            .map(|name| (*name, Vec::with_capacity(len)))
            .collect();

        for index in 0..len {
            let Some(candle) = candles.candle(index) else {
                break;
            };
            let values = [
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
                candle.timestamp as f64,
                (candle.high + candle.low) / 2.0,
                (candle.high + candle.low + candle.close) / 3.0,
                (candle.open + candle.high + candle.low + candle.close) / 4.0,
                (len - 1 - index) as f64,
            ];
            for (name, value) in FIELDS.iter().zip(values) {
                if let Some(series) = fields.get_mut(name) {
                    series.push(value);
                }
            }
        }

        let variables = variables
            .iter()
            .filter(|name| !fields.contains_key(**name))
            .map(|name| (name.to_string(), Slot::Numeric(vec![f64::NAN; len])))
            .collect();

        let mut sites = Vec::with_capacity(site_count);
        sites.resize_with(site_count, SiteSeries::default);

        Self {
            len,
            fields,
            variables,
            sites,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    /// The numeric series behind `name`, user variables first.
    pub(super) fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.variables.get(name) {
            Some(Slot::Numeric(values)) => Some(values),
            Some(Slot::Scalar(_)) => None,
            None => self.fields.get(name).map(Vec::as_slice),
        }
    }

    pub(super) fn is_scalar(&self, name: &str) -> bool {
        matches!(self.variables.get(name), Some(Slot::Scalar(_)))
    }

    pub(super) fn load(&self, name: &str, bar: usize) -> Option<Value> {
        match self.variables.get(name) {
            Some(Slot::Numeric(values)) => Some(Value::Number(sample(values, bar))),
            Some(Slot::Scalar(value)) => Some(value.clone()),
            None => self
                .fields
                .get(name)
                .map(|values| Value::Number(sample(values, bar))),
        }
    }

    pub(super) fn store(
        &mut self,
        name: &str,
        bar: usize,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if self.fields.contains_key(name) {
            return Err(RuntimeError::ReadOnlyVariable {
                name: name.to_string(),
            });
        }

        let len = self.len;
        let slot = self
            .variables
            .entry(name.to_string())
            .or_insert_with(|| Slot::Numeric(vec![f64::NAN; len]));

        match slot {
            Slot::Numeric(values) => {
                if value.is_numeric() {
                    if let Some(cell) = values.get_mut(bar) {
                        *cell = value.as_number("assignment")?;
                    }
                } else if values.iter().all(|cell| cell.is_nan()) {
                    *slot = Slot::Scalar(value);
                } else {
                    return Err(value.mismatch(&format!("assignment to '{name}'"), "number"));
                }
            }
            Slot::Scalar(current) => {
                if value.is_numeric() && !value.is_na() {
                    let operation = format!("assignment to '{name}'");
                    return Err(value.mismatch(&operation, current.type_name()));
                }
                *current = value;
            }
        }
        Ok(())
    }

    pub(super) fn source(&self, site: usize, source: SeriesRef<'_>) -> &[f64] {
        match source {
            SeriesRef::Named(name) => self.numeric(name).unwrap_or(&[]),
            SeriesRef::SiteArg(index) => self
                .sites
                .get(site)
                .and_then(|series| series.args.get(index))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    pub(super) fn record_site_arg(&mut self, site: usize, index: usize, bar: usize, value: f64) {
        let len = self.len;
        let Some(series) = self.sites.get_mut(site) else {
            return;
        };
        while series.args.len() <= index {
            series.args.push(vec![f64::NAN; len]);
        }
        if let Some(cell) = series.args[index].get_mut(bar) {
            *cell = value;
        }
    }

    /// This site's own result at `bar`, NaN if never computed.
    pub(super) fn site_result(&self, site: usize, bar: usize) -> f64 {
        self.sites
            .get(site)
            .map(|series| sample(&series.result, bar))
            .unwrap_or(f64::NAN)
    }

    pub(super) fn record_site_result(&mut self, site: usize, bar: usize, value: f64) {
        let len = self.len;
        let Some(series) = self.sites.get_mut(site) else {
            return;
        };
        if series.result.is_empty() {
            series.result = vec![f64::NAN; len];
        }
        if let Some(cell) = series.result.get_mut(bar) {
            *cell = value;
        }
    }
}

fn sample(values: &[f64], bar: usize) -> f64 {
    values.get(bar).copied().unwrap_or(f64::NAN)
}
