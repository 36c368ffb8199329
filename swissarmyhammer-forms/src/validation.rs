//! Field validators and per-control validator bookkeeping.
//!
//! Validators are declarative and serialize with a `kind` tag so they can be
//! written in form definitions. Everything except `required` and
//! `required-true` passes on an empty value; emptiness is the business of
//! the required checks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FormsError, Result};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("Invalid email regex")
});

thread_local! {
    static PATTERNS: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Compile `pattern` as a full-match regex, reusing earlier compilations.
fn compiled_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    if let Some(re) = PATTERNS.with(|cache| cache.borrow().get(pattern).cloned()) {
        return Ok(re);
    }
    let re = Regex::new(&format!("^(?:{pattern})$"))?;
    PATTERNS.with(|cache| cache.borrow_mut().insert(pattern.to_string(), re.clone()));
    Ok(re)
}

/// Ordered validation failures, keyed by validator key.
pub type ValidationErrors = IndexMap<String, String>;

/// Check signature for [`Validator::Custom`].
pub type CheckFn = Rc<dyn Fn(&Value) -> std::result::Result<(), String>>;

/// A user-supplied validator that lives only in code.
#[derive(Clone)]
pub struct CustomValidator {
    pub key: String,
    pub check: CheckFn,
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidator")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomValidator {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Rc::ptr_eq(&self.check, &other.check)
    }
}

/// A single validation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Validator {
    Required,
    RequiredTrue,
    MinLength {
        min: usize,
    },
    MaxLength {
        max: usize,
    },
    Min {
        min: f64,
    },
    Max {
        max: f64,
    },
    Pattern {
        pattern: String,
    },
    Email,
    #[serde(skip)]
    Custom(CustomValidator),
}

impl Validator {
    pub fn custom(
        key: impl Into<String>,
        check: impl Fn(&Value) -> std::result::Result<(), String> + 'static,
    ) -> Self {
        Validator::Custom(CustomValidator {
            key: key.into(),
            check: Rc::new(check),
        })
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Validator::Pattern {
            pattern: pattern.into(),
        }
    }

    /// Key under which a failure of this validator is reported.
    pub fn key(&self) -> &str {
        match self {
            Validator::Required => "required",
            Validator::RequiredTrue => "required",
            Validator::MinLength { .. } => "minlength",
            Validator::MaxLength { .. } => "maxlength",
            Validator::Min { .. } => "min",
            Validator::Max { .. } => "max",
            Validator::Pattern { .. } => "pattern",
            Validator::Email => "email",
            Validator::Custom(custom) => &custom.key,
        }
    }

    /// Reject configurations that can never run, such as a bad regex.
    pub fn check_config(&self) -> Result<()> {
        if let Validator::Pattern { pattern } = self {
            compiled_pattern(pattern).map_err(|e| FormsError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Run the validator, returning a failure message.
    pub fn validate(&self, value: &Value) -> Option<String> {
        match self {
            Validator::Required => is_empty(value).then(|| "This field is required".to_string()),
            Validator::RequiredTrue => {
                (value != &Value::Bool(true)).then(|| "This field must be checked".to_string())
            }
            Validator::MinLength { min } => {
                let len = length(value)?;
                (len < *min).then(|| format!("Must be at least {min} characters"))
            }
            Validator::MaxLength { max } => {
                let len = length(value)?;
                (len > *max).then(|| format!("Must be at most {max} characters"))
            }
            Validator::Min { min } => {
                let n = number(value)?;
                (n < *min).then(|| format!("Must be at least {min}"))
            }
            Validator::Max { max } => {
                let n = number(value)?;
                (n > *max).then(|| format!("Must be at most {max}"))
            }
            Validator::Pattern { pattern } => {
                let text = text(value)?;
                match compiled_pattern(pattern) {
                    Ok(re) if re.is_match(&text) => None,
                    Ok(_) => Some(format!("Must match pattern {pattern}")),
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "skipping invalid pattern validator");
                        None
                    }
                }
            }
            Validator::Email => {
                let text = text(value)?;
                (!EMAIL.is_match(&text)).then(|| "Must be a valid email address".to_string())
            }
            Validator::Custom(custom) => {
                if is_empty(value) {
                    return None;
                }
                (custom.check)(value).err()
            }
        }
    }
}

/// Null, empty string, empty array and empty object count as empty.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.chars().count()),
        Value::Array(a) if !a.is_empty() => Some(a.len()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Where a group of validators on a control came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorOrigin {
    /// Declared in the field's schema config.
    Static,
    /// Contributed by an add-validators dependency, keyed by its id.
    Dependency(u64),
    /// Added through the API at runtime.
    Manual,
}

/// The active validators of one control, grouped by origin.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    groups: IndexMap<ValidatorOrigin, Vec<Validator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every validator contributed by `origin`.
    pub fn set(&mut self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        if validators.is_empty() {
            self.groups.shift_remove(&origin);
        } else {
            self.groups.insert(origin, validators);
        }
    }

    /// Append to the validators contributed by `origin`.
    pub fn extend(&mut self, origin: ValidatorOrigin, validators: Vec<Validator>) {
        if validators.is_empty() {
            return;
        }
        self.groups.entry(origin).or_default().extend(validators);
    }

    pub fn remove(&mut self, origin: ValidatorOrigin) -> Option<Vec<Validator>> {
        self.groups.shift_remove(&origin)
    }

    pub fn contains(&self, origin: ValidatorOrigin) -> bool {
        self.groups.contains_key(&origin)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.groups.values().flatten()
    }

    /// Run every validator against `value`. The first failure per key wins.
    pub fn run(&self, value: &Value) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for validator in self.iter() {
            if errors.contains_key(validator.key()) {
                continue;
            }
            if let Some(message) = validator.validate(value) {
                errors.insert(validator.key().to_string(), message);
            }
        }
        errors
    }
}
