use std::collections::HashMap;

use crate::ast::{
    BinaryOperator, Call, Expression, ExpressionKind, Statement, StatementKind, UnaryOperator,
};
use crate::builtins::{Builtin, ta};
use crate::color::Color;
use crate::output::{DEFAULT_TITLE, SignalKind};

use super::args::Args;
use super::intrinsics::{MarkerKind, OutputBuilder};
use super::series::{SeriesRef, SeriesStore};
use super::{RuntimeError, Value};

/// Evaluates statements for one bar at a time against shared run state.
pub(super) struct BarRuntime<'a> {
    pub(super) bar: usize,
    callables: &'a [Option<Builtin>],
    store: &'a mut SeriesStore,
    output: &'a mut OutputBuilder,
    inputs: &'a HashMap<String, f64>,
    /// Variable being assigned while its right-hand side evaluates.
    assign_target: Option<&'a str>,
}

impl<'a> BarRuntime<'a> {
    pub(super) fn new(
        callables: &'a [Option<Builtin>],
        store: &'a mut SeriesStore,
        output: &'a mut OutputBuilder,
        inputs: &'a HashMap<String, f64>,
    ) -> Self {
        Self {
            bar: 0,
            callables,
            store,
            output,
            inputs,
            assign_target: None,
        }
    }

    /// Title and overlay flag from an `indicator(...)`/`strategy(...)` header.
    pub(super) fn declaration(&mut self, call: &'a Call) -> Result<(String, bool), RuntimeError> {
        let args = self.eval_args(call, 0)?;
        let title = args
            .string(0, "title")?
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let overlay = args.flag(2, "overlay")?.unwrap_or(false);
        Ok((title, overlay))
    }

    pub(super) fn exec_statement(&mut self, statement: &'a Statement) -> Result<(), RuntimeError> {
        match &statement.kind {
            StatementKind::Assign { name, value } => {
                self.assign_target = Some(name.as_str());
                let value = self.eval_expression(value);
                self.assign_target = None;
                self.store.store(name, self.bar, value?)
            }
            StatementKind::Expr(expression) => {
                self.eval_expression(expression)?;
                Ok(())
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition)?.truthy("if")? {
                    self.exec_statement(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_statement(else_branch)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn eval_expression(&mut self, expression: &'a Expression) -> Result<Value, RuntimeError> {
        match &expression.kind {
            ExpressionKind::Number(value) => Ok(Value::Number(*value)),
            ExpressionKind::String(value) => Ok(Value::String(value.clone())),
            ExpressionKind::Boolean(value) => Ok(Value::Boolean(*value)),
            ExpressionKind::Color(argb) => Ok(Value::Color(Color(*argb))),
            ExpressionKind::Identifier(name) => self.load(name),
            ExpressionKind::Member { name, .. } => {
                Err(RuntimeError::UnsupportedMember { name: name.clone() })
            }
            ExpressionKind::History {
                series,
                offset,
                site,
            } => self.eval_history(series, offset, *site),
            ExpressionKind::Unary { op, operand } => {
                let value = self.eval_expression(operand)?;
                match op {
                    UnaryOperator::Negate => Ok(Value::Number(-value.as_number("-")?)),
                    UnaryOperator::Not => Ok(Value::Boolean(!value.truthy("not")?)),
                }
            }
            ExpressionKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
            ExpressionKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval_expression(condition)?.truthy("?:")? {
                    self.eval_expression(then_expr)
                } else {
                    self.eval_expression(else_expr)
                }
            }
            ExpressionKind::Call(call) => self.eval_call(call),
        }
    }

    fn load(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.store.load(name, self.bar) {
            return Ok(value);
        }
        Value::constant(name).ok_or_else(|| RuntimeError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    fn eval_binary(
        &mut self,
        left: &'a Expression,
        op: BinaryOperator,
        right: &'a Expression,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinaryOperator::And => {
                if !self.eval_expression(left)?.truthy("and")? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval_expression(right)?.truthy("and")?))
            }
            BinaryOperator::Or => {
                if self.eval_expression(left)?.truthy("or")? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval_expression(right)?.truthy("or")?))
            }
            _ => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                apply_binary(op, left, right)
            }
        }
    }

    /// `series[offset]`. Plain names read their stored series; any other
    /// expression is recorded per bar at this site so history exists.
    fn eval_history(
        &mut self,
        series: &'a Expression,
        offset: &'a Expression,
        site: usize,
    ) -> Result<Value, RuntimeError> {
        let offset = self.eval_expression(offset)?.as_number("[]")?;
        if !offset.is_finite() || offset < 0.0 {
            return Err(RuntimeError::InvalidArgument {
                function: "[]".to_string(),
                argument: "offset",
                message: format!("expected a non-negative bar offset, got {offset}"),
            });
        }

        if let ExpressionKind::Identifier(name) = &series.kind
            && self.store.is_scalar(name)
        {
            return Err(RuntimeError::NotSeries { name: name.clone() });
        }
        let source = self.materialize(site, 0, series)?;
        let target = self.bar.saturating_add(offset as usize);
        let value = self
            .store
            .source(site, source)
            .get(target)
            .copied()
            .unwrap_or(f64::NAN);
        Ok(Value::Number(value))
    }

    /// Resolves a series argument to stored history, evaluating it into
    /// the site's own buffer unless it names a numeric series.
    fn materialize(
        &mut self,
        site: usize,
        index: usize,
        expression: &'a Expression,
    ) -> Result<SeriesRef<'a>, RuntimeError> {
        if let ExpressionKind::Identifier(name) = &expression.kind
            && self.store.numeric(name).is_some()
        {
            return Ok(SeriesRef::Named(name));
        }
        let value = self.eval_expression(expression)?.as_number("series")?;
        self.store.record_site_arg(site, index, self.bar, value);
        Ok(SeriesRef::SiteArg(index))
    }

    fn eval_args(&mut self, call: &'a Call, skip: usize) -> Result<Args<'a>, RuntimeError> {
        let mut positional = Vec::with_capacity(call.args.len());
        for (index, argument) in call.args.iter().enumerate() {
            let value = if index < skip {
                None
            } else {
                Some(self.eval_expression(argument)?)
            };
            positional.push(value);
        }
        let mut named = Vec::with_capacity(call.named.len());
        for argument in &call.named {
            named.push((argument.name.as_str(), self.eval_expression(&argument.value)?));
        }
        Ok(Args::new(&call.name, positional, named))
    }

    fn eval_call(&mut self, call: &'a Call) -> Result<Value, RuntimeError> {
        let builtin = self
            .callables
            .get(call.site)
            .copied()
            .flatten()
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: call.name.clone(),
            })?;

        let series_arity = builtin.series_arity();
        let mut sources = Vec::with_capacity(series_arity);
        for index in 0..series_arity {
            let expression = call
                .args
                .get(index)
                .ok_or_else(|| RuntimeError::MissingArgument {
                    function: call.name.clone(),
                    argument: "source",
                })?;
            sources.push(self.materialize(call.site, index, expression)?);
        }
        let args = self.eval_args(call, series_arity)?;

        let site = call.site;
        let bar = self.bar;
        let value = match builtin {
            Builtin::Sma => {
                let length = args.length(1, "length")?;
                let value = ta::sma(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Ema => {
                let length = args.length(1, "length")?;
                let previous = self.store.site_result(site, bar + 1);
                let value = ta::ema(self.source(site, &sources, 0), bar, length, previous);
                self.series_result(site, value)
            }
            Builtin::Rsi => {
                let length = args.length(1, "length")?;
                let value = ta::rsi(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Stdev => {
                let length = args.length(1, "length")?;
                let value = ta::stdev(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Highest => {
                let length = args.length(1, "length")?;
                let value = ta::highest(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Lowest => {
                let length = args.length(1, "length")?;
                let value = ta::lowest(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Change => {
                let length = match args.get(1, "length") {
                    Some(_) => args.length(1, "length")?,
                    None => 1,
                };
                let value = ta::change(self.source(site, &sources, 0), bar, length);
                self.series_result(site, value)
            }
            Builtin::Crossover => Value::Boolean(ta::crossover(
                self.source(site, &sources, 0),
                self.source(site, &sources, 1),
                bar,
            )),
            Builtin::Crossunder => Value::Boolean(ta::crossunder(
                self.source(site, &sources, 0),
                self.source(site, &sources, 1),
                bar,
            )),

            Builtin::Plot => {
                self.output.plot(site, bar, &args)?;
                Value::na()
            }
            Builtin::Hline => {
                self.output.hline(site, &args)?;
                Value::na()
            }
            Builtin::PlotShape => {
                self.output.marker(bar, MarkerKind::Shape, &args)?;
                Value::na()
            }
            Builtin::PlotChar => {
                self.output.marker(bar, MarkerKind::Char, &args)?;
                Value::na()
            }
            Builtin::Bgcolor => {
                self.output.background(bar, &args)?;
                Value::na()
            }
            Builtin::Alert => {
                self.output.alert(site, bar, &args)?;
                Value::na()
            }
            Builtin::StrategyEntry => {
                self.output.entry(bar, &args)?;
                Value::na()
            }
            Builtin::StrategyLong => {
                self.output.signal(bar, SignalKind::Long, &args)?;
                Value::na()
            }
            Builtin::StrategyShort => {
                self.output.signal(bar, SignalKind::Short, &args)?;
                Value::na()
            }
            Builtin::StrategyClose => {
                self.output.signal(bar, SignalKind::Close, &args)?;
                Value::na()
            }
            Builtin::Input => {
                let default = args.required_number(0, "defval")?;
                let name = match args.string(1, "title")? {
                    Some(title) => title,
                    None => self
                        .assign_target
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("input{site}")),
                };
                Value::Number(self.output.input(name, default, self.inputs))
            }

            Builtin::Nz => {
                let value = args.required(0, "source")?;
                if value.is_na() {
                    Value::Number(args.number(1, "replacement")?.unwrap_or(0.0))
                } else {
                    value.clone()
                }
            }
            Builtin::Na => Value::Boolean(args.required(0, "source")?.is_na()),
            Builtin::Abs => Value::Number(args.required_number(0, "x")?.abs()),
            Builtin::Max | Builtin::Min => {
                let mut result: Option<f64> = None;
                for value in args.positional() {
                    let value = value.as_number(&args.operation("x"))?;
                    result = Some(match result {
                        _ if value.is_nan() => f64::NAN,
                        Some(current) if current.is_nan() => current,
                        Some(current) if builtin == Builtin::Max => current.max(value),
                        Some(current) => current.min(value),
                        None => value,
                    });
                }
                Value::Number(result.unwrap_or(f64::NAN))
            }
            Builtin::ColorNew => {
                let transparency = args.number(1, "transp")?.unwrap_or(0.0);
                match args.color(0, "color")? {
                    Some(color) => Value::Color(color.with_transparency(transparency)),
                    None => Value::na(),
                }
            }
        };
        Ok(value)
    }

    fn source(&self, site: usize, sources: &[SeriesRef<'_>], index: usize) -> &[f64] {
        sources
            .get(index)
            .map(|source| self.store.source(site, *source))
            .unwrap_or(&[])
    }

    fn series_result(&mut self, site: usize, value: f64) -> Value {
        self.store.record_site_result(site, self.bar, value);
        Value::Number(value)
    }
}

fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let symbol = op.symbol();
    let value = match op {
        BinaryOperator::Add => match (&left, &right) {
            (Value::String(a), Value::String(b)) => Value::String(format!("{a}{b}")),
            _ => {
                let (a, b) = numbers(symbol, &left, &right)?;
                Value::Number(a + b)
            }
        },
        BinaryOperator::Sub => {
            let (a, b) = numbers(symbol, &left, &right)?;
            Value::Number(a - b)
        }
        BinaryOperator::Mul => {
            let (a, b) = numbers(symbol, &left, &right)?;
            Value::Number(a * b)
        }
        BinaryOperator::Div | BinaryOperator::Mod => {
            let (a, b) = numbers(symbol, &left, &right)?;
            if b == 0.0 {
                Value::na()
            } else if op == BinaryOperator::Div {
                Value::Number(a / b)
            } else {
                Value::Number(a % b)
            }
        }
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let equal = match (&left, &right) {
                (a, b) if a.is_numeric() && b.is_numeric() => {
                    let (a, b) = numbers(symbol, a, b)?;
                    a == b
                }
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Color(a), Value::Color(b)) => a == b,
                _ => return Err(right.mismatch(symbol, left.type_name())),
            };
            Value::Boolean(equal == (op == BinaryOperator::Equal))
        }
        BinaryOperator::Greater
        | BinaryOperator::GreaterEq
        | BinaryOperator::Less
        | BinaryOperator::LessEq => {
            let (a, b) = numbers(symbol, &left, &right)?;
            Value::Boolean(match op {
                BinaryOperator::Greater => a > b,
                BinaryOperator::GreaterEq => a >= b,
                BinaryOperator::Less => a < b,
                _ => a <= b,
            })
        }
        BinaryOperator::And => Value::Boolean(left.truthy(symbol)? && right.truthy(symbol)?),
        BinaryOperator::Or => Value::Boolean(left.truthy(symbol)? || right.truthy(symbol)?),
    };
    Ok(value)
}

fn numbers(symbol: &str, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    Ok((left.as_number(symbol)?, right.as_number(symbol)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_is_na() {
        let value = apply_binary(BinaryOperator::Div, Value::Number(1.0), Value::Number(0.0))
            .expect("division");
        assert!(value.is_na());
    }

    #[test]
    fn strings_concatenate_and_compare() {
        let joined = apply_binary(
            BinaryOperator::Add,
            Value::String("ab".into()),
            Value::String("c".into()),
        )
        .expect("concat");
        assert_eq!(joined, Value::String("abc".into()));
        let equal = apply_binary(
            BinaryOperator::NotEqual,
            Value::String("a".into()),
            Value::String("b".into()),
        )
        .expect("compare");
        assert_eq!(equal, Value::Boolean(true));
    }

    #[test]
    fn na_never_compares_equal() {
        let equal = apply_binary(BinaryOperator::Equal, Value::na(), Value::na()).expect("compare");
        assert_eq!(equal, Value::Boolean(false));
    }

    #[test]
    fn arithmetic_rejects_colors() {
        let err = apply_binary(
            BinaryOperator::Mul,
            Value::Color(Color(0xFF00_0000)),
            Value::Number(2.0),
        )
        .expect_err("color arithmetic");
        assert_eq!(err.to_string(), "Operation '*' expected number, got color");
    }
}
