use std::collections::HashMap;
use std::fs;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pinelet::candle::{Candle, CandleBuffer, DEFAULT_CAPACITY};
use pinelet::engine::ScriptEngine;
use pinelet::interpreter::Interpreter;
use pinelet::{lexer, parser};

const WORKLOADS: [(&str, &str); 3] = [
    ("sma_cross", "tests/programs/sma_cross.pine"),
    ("rsi_levels", "tests/programs/rsi_levels.pine"),
    ("momentum", "tests/programs/momentum_strategy.pine"),
];

fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

/// A full window of synthetic candles drifting around 100.
fn candles() -> CandleBuffer {
    let mut buffer = CandleBuffer::with_capacity(DEFAULT_CAPACITY);
    let mut close = 100.0_f64;
    for index in 0..DEFAULT_CAPACITY {
        let open = close;
        close += ((index as f64) * 0.37).sin() * 1.5;
        buffer.push(Candle::new(
            index as i64 * 60,
            open,
            open.max(close) + 0.5,
            open.min(close) - 0.5,
            close,
            1_000.0,
        ));
    }
    buffer
}

fn bench_frontend(c: &mut Criterion) {
    let buffer = candles();
    let inputs = HashMap::new();

    for (label, path) in WORKLOADS {
        let source = load_source(path);
        let tokens = lexer::tokenize(&source).expect("tokenize");
        let program = parser::parse(&source).expect("parse");

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(&source)).expect("tokenize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_parse_only_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse_tokens(black_box(tokens.clone())).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("interpreter_window_{label}"), |b| {
            let interpreter = Interpreter::new();
            b.iter(|| {
                let out = interpreter.execute(black_box(&program), &buffer, &inputs);
                black_box(out);
            })
        });

        c.bench_function(&format!("engine_cached_tick_{label}"), |b| {
            let mut engine = ScriptEngine::new();
            b.iter(|| {
                let out = engine.run(black_box(&source), &buffer, &inputs);
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
