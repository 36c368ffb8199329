//! Dependency predicates.
//!
//! A predicate decides whether a dependency's effect is on for a given source
//! value. Definitions written in YAML or JSON carry CEL expressions, compiled
//! once at load time. Code can pass a closure instead.
//!
//! CEL expressions see two variables:
//!
//! - `value`: the source field's current value
//! - `form`: the raw value of the whole form, built only when the expression
//!   mentions it
//!
//! Anything that is not a clean boolean is coerced the way workflow
//! conditions are: non-zero numbers and non-empty strings are true, null is
//! false. Execution errors evaluate to false.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use cel_interpreter::{Context, Program, Value as CelValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{FormsError, Result};

static FORM_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bform\b").expect("Invalid form reference regex"));

/// Name of the source value inside CEL expressions.
pub const VALUE_VARIABLE: &str = "value";

/// Name of the form's raw value inside CEL expressions.
pub const FORM_VARIABLE: &str = "form";

/// A compiled CEL expression.
#[derive(Clone)]
pub struct Expression {
    source: String,
    program: Rc<Program>,
    uses_form: bool,
}

impl Expression {
    pub fn compile(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let program = Program::compile(&source).map_err(|e| FormsError::InvalidExpression {
            expression: source.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            uses_form: FORM_REFERENCE.is_match(&source),
            source,
            program: Rc::new(program),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn uses_form(&self) -> bool {
        self.uses_form
    }

    fn evaluate(&self, value: &Value, form: Option<&Value>) -> bool {
        let mut context = Context::default();
        if let Err(e) = context.add_variable(VALUE_VARIABLE, json_to_cel_value(value)) {
            tracing::warn!(expression = %self.source, error = %e, "failed to bind predicate value");
            return false;
        }
        if let Some(form) = form {
            if let Err(e) = context.add_variable(FORM_VARIABLE, json_to_cel_value(form)) {
                tracing::warn!(expression = %self.source, error = %e, "failed to bind form value");
                return false;
            }
        }

        match self.program.execute(&context) {
            Ok(result) => cel_value_to_bool(&result, &self.source),
            Err(e) => {
                let message = e.to_string();
                if message.contains("undeclared") || message.contains("Undeclared") {
                    tracing::debug!(
                        expression = %self.source,
                        "predicate references undeclared variable, treating as false"
                    );
                } else {
                    tracing::warn!(expression = %self.source, error = %message, "predicate failed, treating as false");
                }
                false
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

/// Native predicate signature.
pub type PredicateFn = Rc<dyn Fn(&Value) -> bool>;

/// Decides whether a dependency's effect is active.
#[derive(Clone)]
pub enum Predicate {
    Expression(Expression),
    Native(PredicateFn),
}

impl Predicate {
    /// Compile a CEL predicate.
    pub fn cel(source: impl Into<String>) -> Result<Self> {
        Expression::compile(source).map(Predicate::Expression)
    }

    pub fn native(f: impl Fn(&Value) -> bool + 'static) -> Self {
        Predicate::Native(Rc::new(f))
    }

    /// True when the source value equals `expected`.
    pub fn equals(expected: Value) -> Self {
        Self::native(move |value| value == &expected)
    }

    /// Whether evaluation needs the form's raw value.
    pub fn needs_form(&self) -> bool {
        matches!(self, Predicate::Expression(e) if e.uses_form())
    }

    /// Evaluate against the source value. `form` is only consulted by CEL
    /// expressions that reference it.
    pub fn evaluate(&self, value: &Value, form: impl FnOnce() -> Value) -> bool {
        match self {
            Predicate::Native(f) => f(value),
            Predicate::Expression(expression) => {
                if expression.uses_form() {
                    let form = form();
                    expression.evaluate(value, Some(&form))
                } else {
                    expression.evaluate(value, None)
                }
            }
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Expression(e) => e.fmt(f),
            Predicate::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Expression(e) => f.write_str(&e.source),
            Predicate::Native(_) => f.write_str("<native>"),
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Predicate::Expression(a), Predicate::Expression(b)) => a.source == b.source,
            (Predicate::Native(a), Predicate::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Predicate::Expression(e) => serializer.serialize_str(&e.source),
            Predicate::Native(_) => Err(serde::ser::Error::custom(
                "native predicates cannot be serialized",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Predicate::cel(source).map_err(serde::de::Error::custom)
    }
}

/// Convert a JSON value into its CEL counterpart.
pub fn json_to_cel_value(value: &Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        Value::String(s) => CelValue::String(Arc::new(s.clone())),
        Value::Array(items) => {
            let list: Vec<CelValue> = items.iter().map(json_to_cel_value).collect();
            CelValue::List(list.into())
        }
        Value::Object(map) => {
            let cel_map: HashMap<String, CelValue> = map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cel_value(v)))
                .collect();
            CelValue::Map(cel_map.into())
        }
    }
}

fn cel_value_to_bool(value: &CelValue, expression: &str) -> bool {
    match value {
        CelValue::Bool(b) => *b,
        CelValue::Int(i) => *i != 0,
        CelValue::UInt(u) => *u != 0,
        CelValue::Float(f) => *f != 0.0,
        CelValue::String(s) => !s.is_empty(),
        CelValue::Null => false,
        other => {
            tracing::warn!(expression = %expression, result = ?other, "predicate returned non-boolean result, treating as false");
            false
        }
    }
}
