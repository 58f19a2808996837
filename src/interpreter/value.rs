use crate::color::Color;

use super::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Value {
    /// NaN doubles as `na`.
    Number(f64),
    Boolean(bool),
    String(String),
    Color(Color),
}

impl Value {
    pub(super) fn na() -> Self {
        Value::Number(f64::NAN)
    }

    pub(super) fn is_na(&self) -> bool {
        matches!(self, Value::Number(value) if value.is_nan())
    }

    pub(super) fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "bool",
            Value::String(_) => "string",
            Value::Color(_) => "color",
        }
    }

    pub(super) fn as_number(&self, operation: &str) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(value) => Ok(*value),
            Value::Boolean(value) => Ok(if *value { 1.0 } else { 0.0 }),
            Value::String(_) | Value::Color(_) => Err(self.mismatch(operation, "number")),
        }
    }

    /// Non-zero numbers are true; `na` is false.
    pub(super) fn truthy(&self, operation: &str) -> Result<bool, RuntimeError> {
        match self {
            Value::Number(value) => Ok(*value != 0.0 && !value.is_nan()),
            Value::Boolean(value) => Ok(*value),
            Value::String(_) | Value::Color(_) => Err(self.mismatch(operation, "bool")),
        }
    }

    pub(super) fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Boolean(_))
    }

    pub(super) fn mismatch(&self, operation: &str, expected: &'static str) -> RuntimeError {
        RuntimeError::TypeMismatch {
            operation: operation.to_string(),
            expected,
            got: self.type_name(),
        }
    }

    /// Built-in named constants such as `na`, `color.red` or `shape.circle`.
    pub(super) fn constant(name: &str) -> Option<Value> {
        if name == "na" {
            return Some(Value::na());
        }
        let (namespace, member) = name.split_once('.')?;
        let value = match namespace {
            "color" => Value::Color(Color::named(member)?),
            "shape" => match member {
                "xcross" | "cross" | "circle" | "triangleup" | "triangledown" | "flag"
                | "arrowup" | "arrowdown" | "labelup" | "labeldown" | "square" | "diamond" => {
                    Value::String(member.to_string())
                }
                _ => return None,
            },
            "location" => match member {
                "abovebar" | "belowbar" | "top" | "bottom" | "absolute" => {
                    Value::String(member.to_string())
                }
                _ => return None,
            },
            "hline" => Value::String(member.strip_prefix("style_")?.to_string()),
            "strategy" => match member {
                "long" | "short" => Value::String(member.to_string()),
                _ => return None,
            },
            _ => return None,
        };
        Some(value)
    }
}
