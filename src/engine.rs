//! Parse cache and the never-failing execution entry point.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::{debug, warn};

use crate::ast::Program;
use crate::candle::CandleSource;
use crate::error::ScriptError;
use crate::interpreter::Interpreter;
use crate::output::{DEFAULT_TITLE, ScriptOutput};
use crate::parser::parse;

/// The last source text seen and what parsing it produced.
///
/// Failures are cached too, so a broken script is not re-parsed on every
/// tick. Any change to the text invalidates the entry.
#[derive(Debug, Default)]
struct ParseCache {
    entry: Option<CacheEntry>,
    parses: usize,
}

#[derive(Debug)]
struct CacheEntry {
    hash: u64,
    source: String,
    program: Result<Program, ScriptError>,
}

impl ParseCache {
    fn get_or_parse(&mut self, source: &str) -> &Result<Program, ScriptError> {
        let hash = source_hash(source);
        let entry = match self.entry.take() {
            Some(entry) if entry.hash == hash && entry.source == source => {
                debug!(hash, "parse cache hit");
                entry
            }
            _ => {
                debug!(hash, "parse cache miss");
                self.parses += 1;
                CacheEntry {
                    hash,
                    source: source.to_string(),
                    program: parse(source),
                }
            }
        };
        &self.entry.insert(entry).program
    }
}

fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Runs one script's source against a candle window.
///
/// One engine serves one script; calls must not overlap.
#[derive(Debug, Default)]
pub struct ScriptEngine {
    cache: ParseCache,
    interpreter: Interpreter,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses (or reuses) `source` and evaluates it. Every failure is
    /// reported through the returned record's `error` field.
    pub fn run(
        &mut self,
        source: &str,
        candles: &dyn CandleSource,
        inputs: &HashMap<String, f64>,
    ) -> ScriptOutput {
        let program = match self.cache.get_or_parse(source) {
            Ok(program) => program,
            Err(error) => {
                warn!(kind = ?error.kind(), %error, "script failed to compile");
                return ScriptOutput::failed(DEFAULT_TITLE, error.to_string());
            }
        };

        let output = self.interpreter.execute(program, candles, inputs);
        if let Some(error) = &output.error {
            warn!(title = %output.title, %error, "script failed at runtime");
        }
        output
    }

    /// Parses `source` through the cache without running it.
    pub fn compile(&mut self, source: &str) -> Result<&Program, ScriptError> {
        self.cache.get_or_parse(source).as_ref().map_err(Clone::clone)
    }

    /// How many times source text has actually been parsed.
    pub fn parse_count(&self) -> usize {
        self.cache.parses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{Candle, CandleBuffer};
    use crate::error::ErrorKind;
    use indoc::indoc;

    fn buffer(closes: &[f64]) -> CandleBuffer {
        let mut buffer = CandleBuffer::with_capacity(16);
        for (index, close) in closes.iter().enumerate() {
            buffer.push(Candle::new(index as i64, *close, *close, *close, *close, 1.0));
        }
        buffer
    }

    #[test]
    fn reuses_the_cached_program_for_unchanged_source() {
        let mut engine = ScriptEngine::new();
        let candles = buffer(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let source = "plot(sma(close, 5))";

        let first = engine.run(source, &candles, &HashMap::new());
        let second = engine.run(source, &candles, &HashMap::new());

        assert_eq!(engine.parse_count(), 1);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );

        engine.run("plot(close)", &candles, &HashMap::new());
        assert_eq!(engine.parse_count(), 2);
    }

    #[test]
    fn one_plot_spans_the_visible_window() {
        let mut engine = ScriptEngine::new();
        let candles = buffer(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let output = engine.run("plot(sma(close,5))", &candles, &HashMap::new());
        assert!(output.is_ok(), "{:?}", output.error);
        assert_eq!(output.plots.len(), 1);
        assert_eq!(output.plots[0].values.len(), candles.len());
        assert_eq!(output.plots[0].values[0], 5.0);
    }

    #[test]
    fn syntax_errors_become_located_messages() {
        let mut engine = ScriptEngine::new();
        let output = engine.run(
            indoc! {"
                indicator('Broken')
                plot(sma(close, 5)
            "},
            &buffer(&[1.0]),
            &HashMap::new(),
        );
        assert_eq!(
            output.error.as_deref(),
            Some("[3:1] Expected ')', got end of input")
        );
        assert!(output.plots.is_empty());
    }

    #[test]
    fn failed_parses_are_cached_too() {
        let mut engine = ScriptEngine::new();
        let candles = buffer(&[1.0]);
        engine.run("plot(", &candles, &HashMap::new());
        engine.run("plot(", &candles, &HashMap::new());
        assert_eq!(engine.parse_count(), 1);
        let error = engine.compile("plot(").expect_err("still broken");
        assert_eq!(error.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn runtime_errors_are_unlocated() {
        let mut engine = ScriptEngine::new();
        let output = engine.run("plot(missing)", &buffer(&[1.0]), &HashMap::new());
        assert_eq!(
            output.error.as_deref(),
            Some("Runtime error: Undefined variable 'missing'")
        );
    }
}
