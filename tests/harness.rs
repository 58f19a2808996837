use anyhow::{Context, Result, ensure};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use pinelet::candle::{Candle, CandleBuffer};
use pinelet::engine::ScriptEngine;
use pinelet::output::ScriptOutput;

const PROGRAMS: &str = "tests/programs";

/// What a fixture expects: a rendered summary (`.out`) or an error
/// substring (`.err`).
#[derive(Debug)]
enum Expected {
    Output(String),
    Error(String),
}

#[derive(Debug)]
struct Case {
    name: String,
    program_path: PathBuf,
    expected: Expected,
}

fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("pine") {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid fixture name {}", path.display()))?;
        let out_path = path.with_extension("out");
        let err_path = path.with_extension("err");
        let expected = match (out_path.exists(), err_path.exists()) {
            (true, false) => Expected::Output(
                fs::read_to_string(&out_path)
                    .with_context(|| format!("Reading {}", out_path.display()))?,
            ),
            (false, true) => Expected::Error(
                fs::read_to_string(&err_path)
                    .with_context(|| format!("Reading {}", err_path.display()))?
                    .trim()
                    .to_string(),
            ),
            _ => anyhow::bail!("Fixture {name} needs exactly one of .out or .err"),
        };

        cases.push(Case {
            name,
            program_path: path,
            expected,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No fixtures found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

fn load_candles(programs_dir: &Path) -> Result<CandleBuffer> {
    let path = programs_dir.join("candles.json");
    let raw = fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))?;
    let candles: Vec<Candle> =
        serde_json::from_str(&raw).with_context(|| format!("Parsing {}", path.display()))?;
    let mut buffer = CandleBuffer::with_capacity(candles.len());
    buffer.extend(candles);
    Ok(buffer)
}

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

fn number(value: f64) -> String {
    if value.is_nan() {
        "na".to_string()
    } else {
        format!("{}", (value * 1e4).round() / 1e4)
    }
}

fn numbers(values: impl IntoIterator<Item = f64>) -> String {
    values.into_iter().map(number).collect::<Vec<_>>().join(" ")
}

/// Line-per-entry rendering of everything a renderer would draw.
fn summarize(output: &ScriptOutput) -> Result<String> {
    let mut text = String::new();
    writeln!(text, "title: {}", output.title)?;
    writeln!(text, "overlay: {}", output.overlay)?;
    for plot in &output.plots {
        writeln!(
            text,
            "plot {} #{:08X} {}: {}",
            plot.title,
            plot.color.argb(),
            number(plot.line_width),
            numbers(plot.values.iter().copied())
        )?;
    }
    for line in &output.hlines {
        let style = format!("{:?}", line.style).to_lowercase();
        writeln!(
            text,
            "hline {} {} #{:08X} {style}",
            line.title,
            number(line.price),
            line.color.argb()
        )?;
    }
    for shape in &output.shapes {
        writeln!(
            text,
            "shape {} {} {} #{:08X} {}",
            shape.bar,
            shape.style,
            shape.location,
            shape.color.argb(),
            shape.text.as_deref().unwrap_or("-")
        )?;
    }
    for background in &output.backgrounds {
        writeln!(text, "background {} #{:08X}", background.bar, background.color.argb())?;
    }
    for alert in &output.alerts {
        let flags = alert
            .triggered
            .iter()
            .map(|flag| if *flag { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(text, "alert {} | {}: {flags}", alert.title, alert.message)?;
    }
    for signal in &output.signals {
        let kind = format!("{:?}", signal.kind).to_lowercase();
        writeln!(text, "signal {} {kind} {}", signal.bar, signal.id)?;
    }
    for input in &output.inputs {
        writeln!(
            text,
            "input {} {} {}",
            input.name,
            number(input.default),
            number(input.value)
        )?;
    }
    Ok(text)
}

#[test]
fn runs_fixture_programs() -> Result<()> {
    let programs_dir = Path::new(PROGRAMS);
    let candles = load_candles(programs_dir)?;
    let cases = load_cases(programs_dir)?;

    for case in &cases {
        let source = fs::read_to_string(&case.program_path)
            .with_context(|| format!("Reading {}", case.program_path.display()))?;
        let mut engine = ScriptEngine::new();
        let output = engine.run(&source, &candles, &HashMap::new());

        match &case.expected {
            Expected::Output(expected) => {
                ensure!(
                    output.is_ok(),
                    "Case {} failed unexpectedly: {:?}",
                    case.name,
                    output.error
                );
                let actual = normalize_output(&summarize(&output)?);
                ensure!(
                    actual == normalize_output(expected),
                    "Case {} output mismatch\n--- expected\n{}\n--- actual\n{actual}",
                    case.name,
                    normalize_output(expected)
                );
            }
            Expected::Error(expected) => {
                let actual = output.error.as_deref().unwrap_or_default();
                ensure!(
                    actual.contains(expected.as_str()),
                    "Expected error containing '{expected}' in {}, got '{actual}'",
                    case.name
                );
                ensure!(
                    output.plots.is_empty() && output.signals.is_empty(),
                    "Case {} reported output alongside an error",
                    case.name
                );
            }
        }
    }
    Ok(())
}

#[test]
fn cached_reruns_are_deterministic() -> Result<()> {
    let programs_dir = Path::new(PROGRAMS);
    let candles = load_candles(programs_dir)?;

    for case in load_cases(programs_dir)? {
        let source = fs::read_to_string(&case.program_path)?;
        let mut engine = ScriptEngine::new();
        let first = serde_json::to_string(&engine.run(&source, &candles, &HashMap::new()))?;
        let second = serde_json::to_string(&engine.run(&source, &candles, &HashMap::new()))?;
        ensure!(first == second, "Case {} is not deterministic", case.name);
        ensure!(
            engine.parse_count() == 1,
            "Case {} was parsed {} times",
            case.name,
            engine.parse_count()
        );
    }
    Ok(())
}
