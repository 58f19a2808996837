use crate::color::Color;

use super::{RuntimeError, Value};

/// Evaluated arguments of one call.
///
/// Lookups take a position and a name; a positional argument wins over a
/// named one for the same parameter. Positions read as whole series are
/// left unevaluated (`None`).
pub(super) struct Args<'a> {
    function: &'a str,
    positional: Vec<Option<Value>>,
    named: Vec<(&'a str, Value)>,
}

impl<'a> Args<'a> {
    pub(super) fn new(
        function: &'a str,
        positional: Vec<Option<Value>>,
        named: Vec<(&'a str, Value)>,
    ) -> Self {
        Self {
            function,
            positional,
            named,
        }
    }

    pub(super) fn operation(&self, argument: &str) -> String {
        format!("{}({argument})", self.function)
    }

    pub(super) fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional
            .get(index)
            .and_then(Option::as_ref)
            .or_else(|| self.named(name))
    }

    pub(super) fn named(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(argument, _)| *argument == name)
            .map(|(_, value)| value)
    }

    pub(super) fn positional(&self) -> impl Iterator<Item = &Value> {
        self.positional.iter().flatten()
    }

    pub(super) fn required(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<&Value, RuntimeError> {
        self.get(index, name)
            .ok_or_else(|| RuntimeError::MissingArgument {
                function: self.function.to_string(),
                argument: name,
            })
    }

    pub(super) fn required_number(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<f64, RuntimeError> {
        self.required(index, name)?.as_number(&self.operation(name))
    }

    pub(super) fn number(&self, index: usize, name: &str) -> Result<Option<f64>, RuntimeError> {
        self.get(index, name)
            .map(|value| value.as_number(&self.operation(name)))
            .transpose()
    }

    pub(super) fn flag(&self, index: usize, name: &str) -> Result<Option<bool>, RuntimeError> {
        self.read_flag(self.get(index, name), name)
    }

    pub(super) fn named_flag(&self, name: &str) -> Result<Option<bool>, RuntimeError> {
        self.read_flag(self.named(name), name)
    }

    /// A string argument; `na` reads as absent.
    pub(super) fn string(&self, index: usize, name: &str) -> Result<Option<String>, RuntimeError> {
        self.read_string(self.get(index, name), name)
    }

    pub(super) fn named_string(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.read_string(self.named(name), name)
    }

    fn read_flag(&self, value: Option<&Value>, name: &str) -> Result<Option<bool>, RuntimeError> {
        value
            .map(|value| value.truthy(&self.operation(name)))
            .transpose()
    }

    fn read_string(
        &self,
        value: Option<&Value>,
        name: &str,
    ) -> Result<Option<String>, RuntimeError> {
        match value {
            None => Ok(None),
            Some(value) if value.is_na() => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(other.mismatch(&self.operation(name), "string")),
        }
    }

    /// A color argument; `na` reads as absent.
    pub(super) fn color(&self, index: usize, name: &str) -> Result<Option<Color>, RuntimeError> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) if value.is_na() => Ok(None),
            Some(Value::Color(color)) => Ok(Some(*color)),
            Some(other) => Err(other.mismatch(&self.operation(name), "color")),
        }
    }

    /// A window length: a finite number of at least one bar.
    pub(super) fn length(&self, index: usize, name: &'static str) -> Result<usize, RuntimeError> {
        let length = self.required_number(index, name)?;
        if !length.is_finite() || length < 1.0 {
            return Err(RuntimeError::InvalidArgument {
                function: self.function.to_string(),
                argument: name,
                message: format!("expected a length of at least 1, got {length}"),
            });
        }
        Ok(length as usize)
    }
}
