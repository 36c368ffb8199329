//! Fluent construction of field schemas in code.
//!
//! ```
//! use serde_json::json;
//! use swissarmyhammer_forms::{DependencyDeclaration, FieldConfig, FormSchemaBuilder, Predicate};
//!
//! let fields = FormSchemaBuilder::new()
//!     .input("registrationAddress", FieldConfig::labeled("Registration address"))
//!     .checkbox(
//!         "addressMatches",
//!         FieldConfig::labeled("Address matches").with_dependency(DependencyDeclaration::hide(
//!             "registrationAddress",
//!             Predicate::native(|v| v != &json!("valid address")),
//!         )),
//!     )
//!     .object("address", FieldConfig::default(), |b| {
//!         b.input("street", FieldConfig::labeled("Street"))
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(fields.len(), 3);
//! ```

use crate::error::Result;
use crate::types::{validate_fields, FieldConfig, FieldSchema, FieldType, FormDefinition, SelectOption};

/// Ordered, fluent collection of [`FieldSchema`] entries.
#[derive(Debug, Clone, Default)]
pub struct FormSchemaBuilder {
    fields: Vec<FieldSchema>,
}

impl FormSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn scalar(self, name: &str, config: FieldConfig, field_type: FieldType) -> Self {
        self.field(FieldSchema::scalar(name, config.with_field_type(field_type)))
    }

    pub fn input(self, name: &str, config: FieldConfig) -> Self {
        self.scalar(name, config, FieldType::Input)
    }

    pub fn number(self, name: &str, config: FieldConfig) -> Self {
        self.scalar(name, config, FieldType::Number)
    }

    pub fn date(self, name: &str, config: FieldConfig) -> Self {
        self.scalar(name, config, FieldType::Date)
    }

    pub fn checkbox(self, name: &str, config: FieldConfig) -> Self {
        self.scalar(name, config, FieldType::Checkbox)
    }

    pub fn select(self, name: &str, config: FieldConfig, options: Vec<SelectOption>) -> Self {
        self.scalar(name, config.with_options(options), FieldType::Select)
    }

    pub fn object(
        self,
        name: &str,
        config: FieldConfig,
        nested: impl FnOnce(FormSchemaBuilder) -> FormSchemaBuilder,
    ) -> Self {
        let schema = nested(FormSchemaBuilder::new()).fields;
        self.field(FieldSchema::object(name, config, schema))
    }

    pub fn array(
        self,
        name: &str,
        config: FieldConfig,
        item: impl FnOnce(FormSchemaBuilder) -> FormSchemaBuilder,
    ) -> Self {
        let schema = item(FormSchemaBuilder::new()).fields;
        self.field(FieldSchema::array(name, config, schema))
    }

    /// Append a field. A field with the same name replaces the earlier one
    /// in place.
    pub fn field(mut self, field: FieldSchema) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(self, fields: impl IntoIterator<Item = FieldSchema>) -> Self {
        fields.into_iter().fold(self, FormSchemaBuilder::field)
    }

    /// Apply `then` only when `condition` holds.
    pub fn when(self, condition: bool, then: impl FnOnce(FormSchemaBuilder) -> FormSchemaBuilder) -> Self {
        if condition {
            then(self)
        } else {
            self
        }
    }

    /// Append every field of `other`.
    pub fn merge(self, other: FormSchemaBuilder) -> Self {
        self.fields(other.fields)
    }

    pub fn remove(mut self, name: &str) -> Self {
        self.fields.retain(|f| f.name != name);
        self
    }

    /// Edit a field in place. Unknown names are ignored.
    pub fn modify(mut self, name: &str, edit: impl FnOnce(&mut FieldSchema)) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            edit(field);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Validate and return the field list.
    pub fn build(self) -> Result<Vec<FieldSchema>> {
        validate_fields(&self.fields)?;
        Ok(self.fields)
    }

    pub fn into_definition(self, name: &str) -> Result<FormDefinition> {
        Ok(FormDefinition {
            name: name.to_string(),
            description: None,
            fields: self.build()?,
            model: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;
    use crate::validation::Validator;

    fn base() -> FormSchemaBuilder {
        FormSchemaBuilder::new()
            .input("name", FieldConfig::labeled("Name"))
            .date("born", FieldConfig::default())
            .select(
                "country",
                FieldConfig::default(),
                vec![SelectOption::new("CH", "Switzerland")],
            )
    }

    #[test]
    fn builds_in_order_with_types() {
        let fields = base().build().unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "born", "country"]);
        assert_eq!(fields[1].config.field_type, FieldType::Date);
        assert_eq!(fields[2].config.options.len(), 1);
    }

    #[test]
    fn nested_builders() {
        let fields = FormSchemaBuilder::new()
            .object("address", FieldConfig::default(), |b| {
                b.input("street", FieldConfig::default())
                    .number("zip", FieldConfig::default())
            })
            .array("phones", FieldConfig::default(), |b| {
                b.input("number", FieldConfig::default())
            })
            .build()
            .unwrap();
        assert_eq!(fields[0].kind, FieldKind::Object);
        assert_eq!(fields[0].children().len(), 2);
        assert_eq!(fields[1].kind, FieldKind::Array);
    }

    #[test]
    fn conditional_merge_remove_modify() {
        let extra = FormSchemaBuilder::new().checkbox("terms", FieldConfig::default());
        let fields = base()
            .when(false, |b| b.input("never", FieldConfig::default()))
            .when(true, |b| b.merge(extra))
            .remove("born")
            .modify("name", |f| {
                f.config.validators.push(Validator::Required);
            })
            .modify("missing", |_| unreachable!())
            .build()
            .unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "country", "terms"]);
        assert_eq!(fields[0].config.validators, vec![Validator::Required]);
    }

    #[test]
    fn same_name_replaces_in_place() {
        let fields = base()
            .number("name", FieldConfig::default())
            .build()
            .unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].config.field_type, FieldType::Number);
    }

    #[test]
    fn build_validates() {
        let mut bad = FieldSchema::scalar("x", FieldConfig::default());
        bad.kind = FieldKind::Object;
        assert!(FormSchemaBuilder::new().field(bad).build().is_err());
    }
}
