//! Control tree construction from a field schema and an optional model.
//!
//! Model coercion is deliberately loose: keys the schema does not know are
//! ignored, missing keys seed `null` (scalars), an empty group (objects) or
//! an empty array (arrays). An object field whose model is not a JSON object
//! builds as if no model were given; the same goes for an array field whose
//! model is not a JSON array.

use serde_json::Value;

use crate::control::{ArrayControl, ControlNode, GroupControl, ScalarControl};
use crate::error::{FormsError, Result};
use crate::types::{FieldKind, FieldSchema};
use crate::validation::ValidatorOrigin;

/// Build a group named `name` holding one control per field.
pub fn build_group(name: &str, fields: &[FieldSchema], model: Option<&Value>) -> Result<GroupControl> {
    let group = GroupControl::new(name);
    let model = model.filter(|m| m.is_object());
    for field in fields {
        let child_model = model.and_then(|m| m.get(&field.name));
        let control = build_control(field, child_model)?;
        if !group.add_control(control) {
            return Err(FormsError::DuplicateFieldName {
                name: field.name.clone(),
            });
        }
    }
    Ok(group)
}

/// Build the control for a single field.
pub fn build_control(field: &FieldSchema, model: Option<&Value>) -> Result<ControlNode> {
    let node = match (field.kind, &field.schema) {
        (FieldKind::Scalar, None) => {
            let value = model.cloned().unwrap_or(Value::Null);
            ControlNode::Scalar(ScalarControl::new(&field.name, value))
        }
        (FieldKind::Object, Some(schema)) => {
            ControlNode::Group(build_group(&field.name, schema, model)?)
        }
        (FieldKind::Array, Some(schema)) => {
            let array = ArrayControl::new(&field.name);
            if let Some(Value::Array(items)) = model {
                for item in items {
                    array.push(build_item(schema, Some(item))?);
                }
            }
            ControlNode::Array(array)
        }
        (FieldKind::Scalar, Some(_)) => {
            return Err(FormsError::InvalidSchema {
                name: field.name.clone(),
                message: "scalar fields cannot carry a nested schema".into(),
            })
        }
        (_, None) => {
            return Err(FormsError::InvalidSchema {
                name: field.name.clone(),
                message: "composite fields require a nested schema".into(),
            })
        }
    };
    if !field.config.validators.is_empty() {
        node.set_validators(ValidatorOrigin::Static, field.config.validators.clone());
    }
    Ok(node)
}

/// Build one array item. The name is assigned when it is pushed.
pub fn build_item(fields: &[FieldSchema], model: Option<&Value>) -> Result<GroupControl> {
    build_group("item", fields, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldConfig;
    use crate::validation::Validator;
    use serde_json::json;

    fn address_fields() -> Vec<FieldSchema> {
        vec![
            FieldSchema::scalar(
                "name",
                FieldConfig::default().with_validator(Validator::Required),
            ),
            FieldSchema::object(
                "address",
                FieldConfig::default(),
                vec![
                    FieldSchema::scalar("street", FieldConfig::default()),
                    FieldSchema::scalar("city", FieldConfig::default()),
                ],
            ),
            FieldSchema::array(
                "phones",
                FieldConfig::default(),
                vec![FieldSchema::scalar("number", FieldConfig::default())],
            ),
        ]
    }

    #[test]
    fn seeds_values_from_model() {
        let model = json!({
            "name": "Ada",
            "address": { "street": "Main", "zip": "ignored" },
            "phones": [{ "number": "1" }, { "number": "2" }],
            "unknown": true
        });
        let root = build_group("root", &address_fields(), Some(&model)).unwrap();
        assert_eq!(
            root.raw_value(),
            json!({
                "name": "Ada",
                "address": { "street": "Main", "city": null },
                "phones": [{ "number": "1" }, { "number": "2" }]
            })
        );
        assert!(root.is_valid());
    }

    #[test]
    fn missing_model_seeds_empty() {
        let root = build_group("root", &address_fields(), None).unwrap();
        assert_eq!(
            root.raw_value(),
            json!({
                "name": null,
                "address": { "street": null, "city": null },
                "phones": []
            })
        );
        assert!(!root.is_valid());
    }

    #[test]
    fn mistyped_submodels_are_ignored() {
        let model = json!({ "address": ["not", "an", "object"], "phones": { "number": "1" } });
        let root = build_group("root", &address_fields(), Some(&model)).unwrap();
        assert_eq!(root.raw_value()["address"], json!({ "street": null, "city": null }));
        assert_eq!(root.raw_value()["phones"], json!([]));
    }

    #[test]
    fn composite_validators_apply_to_the_composite() {
        let fields = vec![FieldSchema::array(
            "phones",
            FieldConfig::default().with_validator(Validator::Required),
            vec![FieldSchema::scalar("number", FieldConfig::default())],
        )];
        let root = build_group("root", &fields, None).unwrap();
        let phones = root.get("phones").unwrap();
        assert!(phones.errors().contains_key("required"));
        let item = phones.as_array().unwrap();
        item.push(build_item(&fields[0].schema.clone().unwrap(), None).unwrap());
        assert!(phones.errors().is_empty());
    }

    #[test]
    fn duplicate_siblings_fail() {
        let fields = vec![
            FieldSchema::scalar("a", FieldConfig::default()),
            FieldSchema::scalar("a", FieldConfig::default()),
        ];
        assert!(matches!(
            build_group("root", &fields, None),
            Err(FormsError::DuplicateFieldName { .. })
        ));
    }

    #[test]
    fn field_order_follows_schema() {
        let root = build_group("root", &address_fields(), None).unwrap();
        let names: Vec<_> = root.children().iter().map(ControlNode::name).collect();
        assert_eq!(names, vec!["name", "address", "phones"]);
    }
}
