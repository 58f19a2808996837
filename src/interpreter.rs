//! Tree-walking evaluator.
//!
//! A program runs once per bar of the candle window, oldest bar first
//! (highest index down to 0), so recursive primitives can read the value
//! they produced one bar earlier. Every assigned variable keeps one value
//! per bar; call sites that need history keep their own buffers.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Call, Expression, ExpressionKind, Program, Statement, StatementKind};
use crate::builtins::Builtin;
use crate::candle::CandleSource;
use crate::error::ScriptError;
use crate::output::{DEFAULT_TITLE, ScriptOutput};

mod args;
mod error;
mod intrinsics;
mod runtime;
mod series;
mod value;

pub use error::RuntimeError;
use intrinsics::{OutputBuilder, PlotSlot};
use runtime::BarRuntime;
use series::SeriesStore;
use value::Value;

#[derive(Debug)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Resolves every call site against the builtin registry and collects
    /// the variables and plots the program can produce.
    pub fn prepare<'p>(&self, program: &'p Program) -> Result<PreparedScript<'p>, RuntimeError> {
        let mut resolver = Resolver {
            callables: vec![None; program.site_count],
            ..Resolver::default()
        };
        if let Some(declaration) = &program.declaration {
            resolver.arguments(&declaration.call)?;
        }
        for statement in &program.statements {
            resolver.statement(statement)?;
        }
        Ok(PreparedScript {
            program,
            callables: resolver.callables,
            variables: resolver.variables,
            plots: resolver.plots,
        })
    }

    /// Runs `program` over `candles`. Failures land in the output's
    /// `error` field instead of being returned.
    pub fn execute(
        &self,
        program: &Program,
        candles: &dyn CandleSource,
        inputs: &HashMap<String, f64>,
    ) -> ScriptOutput {
        match self
            .prepare(program)
            .and_then(|prepared| prepared.run(candles, inputs))
        {
            Ok(output) => output,
            Err(error) => {
                debug!(%error, "script evaluation failed");
                ScriptOutput::failed(declared_title(program), ScriptError::from(error).to_string())
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// A program whose call sites have all been resolved.
pub struct PreparedScript<'p> {
    program: &'p Program,
    callables: Vec<Option<Builtin>>,
    /// Assignment targets in first-seen order, branches included.
    variables: Vec<&'p str>,
    plots: Vec<PlotSlot>,
}

impl PreparedScript<'_> {
    pub fn run(
        &self,
        candles: &dyn CandleSource,
        inputs: &HashMap<String, f64>,
    ) -> Result<ScriptOutput, RuntimeError> {
        let mut store = SeriesStore::new(candles, self.program.site_count, &self.variables);
        let len = store.len();
        let mut output = OutputBuilder::new(len);
        for plot in &self.plots {
            output.declare_plot(plot.site, plot.title.clone());
        }
        let mut runtime = BarRuntime::new(&self.callables, &mut store, &mut output, inputs);

        runtime.bar = len.saturating_sub(1);
        let (title, overlay) = match &self.program.declaration {
            Some(declaration) => runtime.declaration(&declaration.call)?,
            None => (DEFAULT_TITLE.to_string(), false),
        };

        for bar in (0..len).rev() {
            runtime.bar = bar;
            for statement in &self.program.statements {
                runtime.exec_statement(statement)?;
            }
        }

        Ok(output.finish(title, overlay))
    }
}

/// The literal title of the declaration, for records of failed runs.
fn declared_title(program: &Program) -> String {
    program
        .declaration
        .as_ref()
        .and_then(|declaration| literal_title(&declaration.call, 0))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Call sites, variables and plots discovered by walking a program once.
#[derive(Default)]
struct Resolver<'p> {
    callables: Vec<Option<Builtin>>,
    variables: Vec<&'p str>,
    plots: Vec<PlotSlot>,
}

impl<'p> Resolver<'p> {
    fn statement(&mut self, statement: &'p Statement) -> Result<(), RuntimeError> {
        match &statement.kind {
            StatementKind::Assign { name, value } => {
                if !self.variables.contains(&name.as_str()) {
                    self.variables.push(name.as_str());
                }
                self.expression(value)
            }
            StatementKind::Expr(expression) => self.expression(expression),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition)?;
                self.statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch)?;
                }
                Ok(())
            }
        }
    }

    fn expression(&mut self, expression: &'p Expression) -> Result<(), RuntimeError> {
        match &expression.kind {
            ExpressionKind::Number(_)
            | ExpressionKind::String(_)
            | ExpressionKind::Boolean(_)
            | ExpressionKind::Color(_)
            | ExpressionKind::Identifier(_) => Ok(()),
            ExpressionKind::Member { object, .. } => self.expression(object),
            ExpressionKind::History { series, offset, .. } => {
                self.expression(series)?;
                self.expression(offset)
            }
            ExpressionKind::Unary { operand, .. } => self.expression(operand),
            ExpressionKind::Binary { left, right, .. } => {
                self.expression(left)?;
                self.expression(right)
            }
            ExpressionKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.expression(condition)?;
                self.expression(then_expr)?;
                self.expression(else_expr)
            }
            ExpressionKind::Call(call) => self.call(call),
        }
    }

    fn call(&mut self, call: &'p Call) -> Result<(), RuntimeError> {
        let builtin =
            Builtin::from_name(&call.name).ok_or_else(|| RuntimeError::UndefinedFunction {
                name: call.name.clone(),
            })?;
        let found = call.args.len() + call.named.len();
        if found < builtin.min_args() {
            return Err(RuntimeError::ArityMismatch {
                name: call.name.clone(),
                expected: builtin.min_args(),
                found,
            });
        }
        if let Some(slot) = self.callables.get_mut(call.site) {
            *slot = Some(builtin);
        }
        if builtin == Builtin::Plot {
            self.plots.push(PlotSlot {
                site: call.site,
                title: literal_title(call, 1),
            });
        }
        self.arguments(call)
    }

    fn arguments(&mut self, call: &'p Call) -> Result<(), RuntimeError> {
        for argument in &call.args {
            self.expression(argument)?;
        }
        for argument in &call.named {
            self.expression(&argument.value)?;
        }
        Ok(())
    }
}

/// A string literal passed as `title`, positionally at `position` or by name.
fn literal_title(call: &Call, position: usize) -> Option<String> {
    let title = call
        .args
        .get(position)
        .or_else(|| call.named_arg("title"))?;
    match &title.kind {
        ExpressionKind::String(title) => Some(title.clone()),
        _ => None,
    }
}
