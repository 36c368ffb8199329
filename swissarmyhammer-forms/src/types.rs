//! Declarative form types.
//!
//! All types serialize to/from YAML and JSON via serde. A [`FormDefinition`]
//! is the on-disk unit: a name, an ordered list of [`FieldSchema`] entries and
//! an optional initial model.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FormsError, Result};
use crate::predicate::Predicate;
use crate::validation::Validator;

/// Structural kind of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    Scalar,
    Object,
    Array,
}

/// How a scalar field is rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Input,
    Number,
    Checkbox,
    Date,
    Select,
}

/// A single choice of a select field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// The four independent axes a dependency can drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Hide,
    Disable,
    Readonly,
    AddValidators,
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EffectKind::Hide => "hide",
            EffectKind::Disable => "disable",
            EffectKind::Readonly => "readonly",
            EffectKind::AddValidators => "add-validators",
        };
        f.write_str(name)
    }
}

/// A reactive edge: the owning field's state follows `source`'s value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyDeclaration {
    #[serde(alias = "effectKind", alias = "effect_kind")]
    pub effect: EffectKind,
    #[serde(alias = "sourceFieldName", alias = "source_field_name")]
    pub source: String,
    #[serde(alias = "predicate")]
    pub when: Predicate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl DependencyDeclaration {
    pub fn new(effect: EffectKind, source: impl Into<String>, when: Predicate) -> Self {
        Self {
            effect,
            source: source.into(),
            when,
            validators: Vec::new(),
        }
    }

    pub fn hide(source: impl Into<String>, when: Predicate) -> Self {
        Self::new(EffectKind::Hide, source, when)
    }

    pub fn disable(source: impl Into<String>, when: Predicate) -> Self {
        Self::new(EffectKind::Disable, source, when)
    }

    pub fn readonly(source: impl Into<String>, when: Predicate) -> Self {
        Self::new(EffectKind::Readonly, source, when)
    }

    pub fn add_validators(
        source: impl Into<String>,
        validators: Vec<Validator>,
        when: Predicate,
    ) -> Self {
        Self {
            validators,
            ..Self::new(EffectKind::AddValidators, source, when)
        }
    }

    fn check(&self, field: &str) -> Result<()> {
        if self.source.is_empty() {
            return Err(FormsError::InvalidSchema {
                name: field.to_string(),
                message: "dependency source name is empty".into(),
            });
        }
        if self.effect == EffectKind::AddValidators && self.validators.is_empty() {
            return Err(FormsError::InvalidSchema {
                name: field.to_string(),
                message: format!("add-validators dependency on '{}' declares no validators", self.source),
            });
        }
        for validator in &self.validators {
            validator.check_config()?;
        }
        Ok(())
    }
}

/// Per-field configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, alias = "fieldType")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDeclaration>,
}

impl FieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDeclaration) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// One node of the declarative schema tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub config: FieldConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<FieldSchema>>,
}

impl FieldSchema {
    pub fn scalar(name: impl Into<String>, config: FieldConfig) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            config,
            schema: None,
        }
    }

    pub fn object(name: impl Into<String>, config: FieldConfig, schema: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Object,
            config,
            schema: Some(schema),
        }
    }

    pub fn array(name: impl Into<String>, config: FieldConfig, schema: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Array,
            config,
            schema: Some(schema),
        }
    }

    /// Nested fields of an object or array; empty for scalars.
    pub fn children(&self) -> &[FieldSchema] {
        self.schema.as_deref().unwrap_or_default()
    }

    /// Check the structural invariants of this node and everything below it.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(FormsError::InvalidSchema {
                name: self.name.clone(),
                message: "field name is empty".into(),
            });
        }
        match (self.kind, &self.schema) {
            (FieldKind::Scalar, Some(_)) => {
                return Err(FormsError::InvalidSchema {
                    name: self.name.clone(),
                    message: "scalar fields cannot carry a nested schema".into(),
                })
            }
            (FieldKind::Object | FieldKind::Array, None) => {
                return Err(FormsError::InvalidSchema {
                    name: self.name.clone(),
                    message: format!("{:?} fields require a nested schema", self.kind).to_lowercase(),
                })
            }
            _ => {}
        }
        if self.kind != FieldKind::Scalar && !self.config.dependencies.is_empty() {
            return Err(FormsError::DependencyOnComposite {
                name: self.name.clone(),
            });
        }
        for validator in &self.config.validators {
            validator.check_config()?;
        }
        for dependency in &self.config.dependencies {
            dependency.check(&self.name)?;
        }
        validate_fields(self.children())
    }
}

/// Validate a sibling list: each node is valid and names are unique.
pub fn validate_fields(fields: &[FieldSchema]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(FormsError::DuplicateFieldName {
                name: field.name.clone(),
            });
        }
        field.validate()?;
    }
    Ok(())
}

/// A complete form as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
}

impl FormDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a definition, choosing the format by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let definition = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => {
                return Err(FormsError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        tracing::debug!(path = %path.display(), form = %definition.name, "loaded form definition");
        Ok(definition)
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS_FORM: &str = r#"
name: address
fields:
  - name: registrationAddress
    config:
      label: Registration address
      validators:
        - kind: required
  - name: addressMatches
    config:
      field_type: checkbox
      dependencies:
        - effect: hide
          source: registrationAddress
          when: value != "valid address"
  - name: contacts
    kind: array
    schema:
      - name: email
        config:
          validators:
            - kind: email
model:
  registrationAddress: somewhere
"#;

    #[test]
    fn definition_from_yaml() {
        let def = FormDefinition::from_yaml_str(ADDRESS_FORM).unwrap();
        assert_eq!(def.name, "address");
        assert_eq!(def.fields.len(), 3);
        assert_eq!(def.fields[2].kind, FieldKind::Array);
        let deps = &def.fields[1].config.dependencies;
        assert_eq!(deps[0].effect, EffectKind::Hide);
        assert_eq!(deps[0].source, "registrationAddress");
        def.validate().unwrap();
    }

    #[test]
    fn spec_style_keys_are_accepted() {
        let yaml = r#"
name: flag
config:
  fieldType: checkbox
  dependencies:
    - effectKind: disable
      sourceFieldName: other
      predicate: value == true
"#;
        let field: FieldSchema = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(field.config.field_type, FieldType::Checkbox);
        assert_eq!(field.config.dependencies[0].effect, EffectKind::Disable);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let yaml = "name: x\nkind: matrix\n";
        assert!(serde_yaml_ng::from_str::<FieldSchema>(yaml).is_err());
    }

    #[test]
    fn bad_predicate_fails_to_load() {
        let yaml = r#"
name: bad
fields:
  - name: a
    config:
      dependencies:
        - effect: hide
          source: b
          when: "value =="
"#;
        assert!(FormDefinition::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn object_without_schema_is_invalid() {
        let field = FieldSchema {
            name: "address".into(),
            kind: FieldKind::Object,
            config: FieldConfig::default(),
            schema: None,
        };
        assert!(matches!(
            field.validate(),
            Err(FormsError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn scalar_with_schema_is_invalid() {
        let mut field = FieldSchema::scalar("street", FieldConfig::default());
        field.schema = Some(Vec::new());
        assert!(field.validate().is_err());
    }

    #[test]
    fn duplicate_siblings_are_rejected() {
        let fields = vec![
            FieldSchema::scalar("a", FieldConfig::default()),
            FieldSchema::scalar("a", FieldConfig::default()),
        ];
        assert!(matches!(
            validate_fields(&fields),
            Err(FormsError::DuplicateFieldName { .. })
        ));
    }

    #[test]
    fn same_name_in_different_branches_is_allowed() {
        let fields = vec![
            FieldSchema::object(
                "home",
                FieldConfig::default(),
                vec![FieldSchema::scalar("street", FieldConfig::default())],
            ),
            FieldSchema::object(
                "work",
                FieldConfig::default(),
                vec![FieldSchema::scalar("street", FieldConfig::default())],
            ),
        ];
        validate_fields(&fields).unwrap();
    }

    #[test]
    fn dependencies_on_composites_are_rejected() {
        let field = FieldSchema::object(
            "address",
            FieldConfig::default().with_dependency(DependencyDeclaration::hide(
                "x",
                Predicate::equals(Value::Bool(true)),
            )),
            Vec::new(),
        );
        assert!(matches!(
            field.validate(),
            Err(FormsError::DependencyOnComposite { .. })
        ));
    }

    #[test]
    fn add_validators_requires_validators() {
        let field = FieldSchema::scalar(
            "a",
            FieldConfig::default().with_dependency(DependencyDeclaration::add_validators(
                "b",
                Vec::new(),
                Predicate::equals(Value::Bool(true)),
            )),
        );
        assert!(field.validate().is_err());
    }

    #[test]
    fn load_from_disk_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("address.yaml");
        std::fs::write(&yaml_path, ADDRESS_FORM).unwrap();
        let def = FormDefinition::load(&yaml_path).unwrap();
        assert_eq!(def.fields.len(), 3);

        let json_path = dir.path().join("empty.json");
        std::fs::write(&json_path, r#"{"name":"empty","fields":[]}"#).unwrap();
        assert_eq!(FormDefinition::load(&json_path).unwrap().name, "empty");

        let txt_path = dir.path().join("form.txt");
        std::fs::write(&txt_path, "").unwrap();
        assert!(matches!(
            FormDefinition::load(&txt_path),
            Err(FormsError::UnsupportedFormat { .. })
        ));
    }
}
