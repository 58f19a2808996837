use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinelet::candle::{Candle, CandleBuffer, CandleSource, DEFAULT_CAPACITY};
use pinelet::manager::ScriptManager;

const USAGE: &str =
    "Usage: pinelet [--candles FILE] [--input NAME=VALUE]... [--capacity N] [--pretty] SCRIPT...";

struct Options {
    candles_path: Option<String>,
    inputs: Vec<(String, f64)>,
    capacity: usize,
    pretty: bool,
    scripts: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options {
        candles_path: None,
        inputs: Vec::new(),
        capacity: DEFAULT_CAPACITY,
        pretty: false,
        scripts: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--candles" | "-c" => {
                options.candles_path = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("Missing file name after {arg}"))?,
                );
            }
            "--input" | "-i" => {
                let pair = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing NAME=VALUE after {arg}"))?;
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{pair}'"))?;
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("Input '{name}' is not a number"))?;
                options.inputs.push((name.to_string(), value));
            }
            "--capacity" => {
                let capacity = args
                    .next()
                    .ok_or_else(|| anyhow!("Missing size after {arg}"))?;
                options.capacity = capacity
                    .parse()
                    .with_context(|| format!("Invalid capacity '{capacity}'"))?;
            }
            "--pretty" => options.pretty = true,
            "--help" | "-h" => bail!(USAGE),
            _ if arg.starts_with('-') => bail!("Unknown option '{arg}'\n{USAGE}"),
            _ => options.scripts.push(arg),
        }
    }

    if options.scripts.is_empty() {
        bail!(USAGE);
    }
    Ok(options)
}

fn read_candles(path: Option<&str>) -> Result<Vec<Candle>> {
    let raw = if let Some(path) = path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };
    serde_json::from_str(&raw).context("Parsing candles (expected a JSON array, oldest first)")
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinelet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let options = parse_args(std::env::args().skip(1))?;

    let mut buffer = CandleBuffer::with_capacity(options.capacity);
    buffer.extend(read_candles(options.candles_path.as_deref())?);
    info!(
        candles = buffer.len(),
        capacity = buffer.capacity(),
        "candle window ready"
    );

    let mut manager = ScriptManager::new();
    for path in &options.scripts {
        let index = manager
            .load(path)
            .with_context(|| format!("Loading script {path}"))?;
        for (name, value) in &options.inputs {
            manager.set_input(index, name.clone(), *value)?;
        }
    }

    let outputs = manager.run_all(&buffer);
    let json = if options.pretty {
        serde_json::to_string_pretty(&outputs)?
    } else {
        serde_json::to_string(&outputs)?
    };
    println!("{json}");
    Ok(())
}
