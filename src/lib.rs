//! Pine-style indicator scripts evaluated bar by bar over a candle window.
//!
//! Source text goes through [`lexer`] and [`parser`] into an [`ast::Program`],
//! which the [`interpreter`] runs once per bar. [`engine::ScriptEngine`]
//! caches the parse and never fails; [`manager::ScriptManager`] runs a list
//! of scripts together.

pub mod ast;
pub mod builtins;
pub mod candle;
pub mod color;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod manager;
pub mod output;
pub mod parser;
pub mod token;

pub use candle::{Candle, CandleBuffer, CandleSource};
pub use engine::ScriptEngine;
pub use error::{ErrorKind, ManagerError, ScriptError};
pub use manager::ScriptManager;
pub use output::ScriptOutput;
