//! Dynamic form schema and cross-field dependency engine
//!
//! `swissarmyhammer-forms` turns a declarative field schema plus an optional
//! data model into a live form: a tree of value-holding controls, a mirrored
//! tree of presentation state, and a set of reactive dependencies that hide,
//! disable, lock or add validators to fields based on other fields' values.
//!
//! # Architecture
//!
//! - **Two mirrored trees**: [`ControlNode`] holds values and validation,
//!   [`SchemaNode`] holds labels, field types and the hidden/readonly flags
//! - **Push-based reactivity**: single-threaded [`Observable`] values with
//!   cancellable [`Subscription`]s
//! - **Dependencies by name**: sources are found by field name, nearest scope
//!   first, so array items depend on their own siblings
//! - **Explicit ownership**: the [`Form`] owns everything and tears it down in
//!   [`Form::destroy`] (also run on drop)
//! - **YAML/JSON definitions**: predicates are CEL expressions compiled at load

pub mod builder;
pub mod control;
pub mod dependency;
pub mod error;
pub mod form;
pub mod lifecycle;
pub mod predicate;
pub mod reactive;
pub mod resolver;
pub mod schema;
pub mod schema_builder;
pub mod types;
pub mod validation;

pub use control::{ArrayControl, ControlNode, ControlStatus, GroupControl, ScalarControl};
pub use dependency::{apply_effect, Dependency, DependencyState, Trigger};
pub use error::{FormsError, Result};
pub use form::{split_path, Form};
pub use predicate::{Expression, Predicate};
pub use reactive::{Observable, Subscription};
pub use resolver::{find_by_name, find_nearest, find_root, shape, TreeNode, TreeShape};
pub use schema::{
    ControlSchema, FieldEvent, FieldMeta, FieldState, GroupKind, GroupSchema, SchemaNode,
};
pub use schema_builder::FormSchemaBuilder;
pub use types::{
    DependencyDeclaration, EffectKind, FieldConfig, FieldKind, FieldSchema, FieldType,
    FormDefinition, SelectOption,
};
pub use validation::{ValidationErrors, Validator, ValidatorOrigin, ValidatorSet};
