//! Syntax tree produced by the parser and walked by the interpreter.
//!
//! Every node carries the span of the token that defines it. Call and
//! history nodes also carry a program-unique `site` number; the interpreter
//! keys its per-call-site series on it.

use std::fmt;

use crate::token::Span;

#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExpressionKind {
    Number(f64),
    String(String),
    Boolean(bool),
    Color(u32),
    /// Plain or dotted name (`close`, `color.red`).
    Identifier(String),
    /// `.name` applied to something that is not a name.
    Member {
        object: Box<Expression>,
        name: String,
    },
    /// `series[offset]`: the value `offset` bars earlier.
    History {
        series: Box<Expression>,
        offset: Box<Expression>,
        site: usize,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
    Call(Call),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Call {
    /// Dotted path for member calls, e.g. `strategy.entry`.
    pub name: String,
    pub args: Vec<Expression>,
    pub named: Vec<NamedArg>,
    pub site: usize,
}

impl Call {
    pub fn named_arg(&self, name: &str) -> Option<&Expression> {
        self.named
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NamedArg {
    pub name: String,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Assign {
        name: String,
        value: Expression,
    },
    Expr(Expression),
    /// Each branch is exactly one statement.
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeclarationKind {
    Indicator,
    Strategy,
}

/// The leading `indicator(...)` or `strategy(...)` call.
#[derive(Debug, PartialEq, Clone)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub call: Call,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub version: u32,
    pub declaration: Option<Declaration>,
    pub statements: Vec<Statement>,
    /// Number of call/history sites; sites are numbered `0..site_count`.
    pub site_count: usize,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Number(value) => write!(f, "{value}"),
            ExpressionKind::String(value) => write!(f, "{value:?}"),
            ExpressionKind::Boolean(value) => write!(f, "{value}"),
            ExpressionKind::Color(argb) => write!(f, "#{argb:08X}"),
            ExpressionKind::Identifier(name) => f.write_str(name),
            ExpressionKind::Member { object, name } => write!(f, "{object}.{name}"),
            ExpressionKind::History { series, offset, .. } => write!(f, "{series}[{offset}]"),
            ExpressionKind::Unary { op, operand } => match op {
                UnaryOperator::Negate => write!(f, "(-{operand})"),
                UnaryOperator::Not => write!(f, "(not {operand})"),
            },
            ExpressionKind::Binary { left, op, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExpressionKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => write!(f, "({condition} ? {then_expr} : {else_expr})"),
            ExpressionKind::Call(call) => write!(f, "{call}"),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{arg}")?;
        }
        for arg in &self.named {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={}", arg.name, arg.value)?;
        }
        f.write_str(")")
    }
}
