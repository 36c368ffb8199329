//! Error types for the forms engine
//!
//! Only configuration mistakes and API misuse surface as [`FormsError`].
//! Validation failures are ordinary state on the controls and never
//! travel through this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for forms operations
pub type Result<T> = std::result::Result<T, FormsError>;

/// Errors that can occur while building or driving a form
#[derive(Debug, Error)]
pub enum FormsError {
    /// A dependency names a source field that exists nowhere in the tree
    #[error("dependency on '{target}' references unknown source field '{source_field}'")]
    SourceNotFound {
        target: String,
        source_field: String,
    },

    /// A dependency source resolved to a group or array instead of a scalar
    #[error("dependency on '{target}' references '{source_field}', which is not a scalar field")]
    SourceNotScalar {
        target: String,
        source_field: String,
    },

    /// A field descriptor is structurally invalid
    #[error("invalid schema for field '{name}': {message}")]
    InvalidSchema { name: String, message: String },

    /// Two siblings share a name at build time
    #[error("duplicate field name: {name}")]
    DuplicateFieldName { name: String },

    /// Dependencies are only supported on scalar fields
    #[error("field '{name}' is not a scalar and cannot declare dependencies")]
    DependencyOnComposite { name: String },

    /// The schema mirror met a control it has no node for
    #[error("no schema node can mirror control '{name}'")]
    UnsupportedControl { name: String },

    /// A CEL predicate failed to compile
    #[error("invalid predicate expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    /// A pattern validator failed to compile
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Nothing lives at the requested path
    #[error("field not found: {path}")]
    FieldNotFound { path: String },

    /// The path names a composite where a scalar was required
    #[error("field '{path}' is not a scalar field")]
    NotAScalar { path: String },

    /// The path names something other than an array
    #[error("field '{path}' is not an array field")]
    NotAnArray { path: String },

    /// The path names something other than an object group
    #[error("field '{path}' is not a group")]
    NotAGroup { path: String },

    /// Array index past the end
    #[error("index {index} out of bounds for array '{path}' of length {len}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// The form has been torn down
    #[error("form has been destroyed")]
    Destroyed,

    /// Unsupported definition file extension
    #[error("unsupported definition format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormsError {
    /// True for errors caused by a malformed schema rather than a bad call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FormsError::SourceNotFound { .. }
                | FormsError::SourceNotScalar { .. }
                | FormsError::InvalidSchema { .. }
                | FormsError::DuplicateFieldName { .. }
                | FormsError::DependencyOnComposite { .. }
                | FormsError::UnsupportedControl { .. }
                | FormsError::InvalidExpression { .. }
                | FormsError::InvalidPattern { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FormsError::FieldNotFound {
            path: "address.street".into(),
        };
        assert_eq!(err.to_string(), "field not found: address.street");
    }

    #[test]
    fn test_source_not_found_names_both_fields() {
        let err = FormsError::SourceNotFound {
            target: "address".into(),
            source_field: "addressMatches".into(),
        };
        assert!(err.to_string().contains("address"));
        assert!(err.to_string().contains("addressMatches"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_misuse_is_not_configuration() {
        assert!(!FormsError::Destroyed.is_configuration());
        let err = FormsError::IndexOutOfBounds {
            path: "items".into(),
            index: 3,
            len: 2,
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("length 2"));
    }
}
