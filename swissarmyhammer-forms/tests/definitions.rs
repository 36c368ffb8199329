//! Loading form definitions from YAML and JSON and driving them

use rstest::rstest;
use serde_json::{json, Value};
use std::io::Write;
use swissarmyhammer_forms::{
    EffectKind, FieldKind, FieldType, Form, FormDefinition, FormsError, Validator,
};
use tempfile::NamedTempFile;

const SIGNUP_YAML: &str = r#"
name: signup
description: Account sign-up
fields:
  - name: email
    config:
      label: Email
      validators:
        - kind: required
        - kind: email
  - name: age
    config:
      field_type: number
      validators:
        - kind: min
          min: 18
  - name: newsletter
    config:
      fieldType: checkbox
  - name: frequency
    config:
      field_type: select
      options:
        - value: weekly
          label: Weekly
        - value: monthly
          label: Monthly
      dependencies:
        - effect: hide
          source: newsletter
          when: "value != true"
  - name: address
    kind: object
    schema:
      - name: country
      - name: zip
        config:
          dependencies:
            - effectKind: add-validators
              sourceFieldName: country
              predicate: "value == 'CH'"
              validators:
                - kind: pattern
                  pattern: "[0-9]{4}"
model:
  email: ada@example.com
  age: 36
  address:
    country: CH
"#;

fn signup() -> Form {
    let definition = FormDefinition::from_yaml_str(SIGNUP_YAML).unwrap();
    let mut form = Form::from_definition(&definition).unwrap();
    form.start_dependency_tracking().unwrap();
    form
}

#[test]
fn yaml_definition_parses_fields_and_aliases() {
    let definition = FormDefinition::from_yaml_str(SIGNUP_YAML).unwrap();
    definition.validate().unwrap();

    assert_eq!(definition.name, "signup");
    assert_eq!(definition.fields.len(), 5);
    assert_eq!(definition.fields[1].config.field_type, FieldType::Number);
    assert_eq!(definition.fields[2].config.field_type, FieldType::Checkbox);
    assert_eq!(definition.fields[4].kind, FieldKind::Object);

    let zip = &definition.fields[4].children()[1];
    let dependency = &zip.config.dependencies[0];
    assert_eq!(dependency.effect, EffectKind::AddValidators);
    assert_eq!(dependency.source, "country");
    assert_eq!(dependency.validators, vec![Validator::pattern("[0-9]{4}")]);
}

#[test_log::test]
fn cel_dependencies_drive_the_loaded_form() {
    let form = signup();
    assert!(form.field("frequency").unwrap().is_hidden());

    form.set_value("newsletter", json!(true)).unwrap();
    assert!(!form.field("frequency").unwrap().is_hidden());

    form.set_value("address.zip", json!("80")).unwrap();
    assert!(form.errors()["address.zip"].contains_key("pattern"));

    form.set_value("address.country", json!("DE")).unwrap();
    assert!(!form.errors().contains_key("address.zip"));
    assert!(form.is_valid());
}

#[test]
fn model_seeds_values() {
    let form = signup();
    assert_eq!(form.raw_value()["email"], json!("ada@example.com"));
    assert_eq!(form.raw_value()["address"], json!({ "country": "CH", "zip": null }));
    assert_eq!(form.field("frequency").unwrap().meta().options.len(), 2);
}

#[test]
fn json_round_trip_through_serde() {
    let definition = FormDefinition::from_yaml_str(SIGNUP_YAML).unwrap();
    let text = serde_json::to_string(&definition).unwrap();
    let reloaded = FormDefinition::from_json_str(&text).unwrap();
    assert_eq!(reloaded.fields.len(), definition.fields.len());
    assert_eq!(
        reloaded.fields[3].config.dependencies[0].when.to_string(),
        "value != true"
    );
}

#[test]
fn load_picks_format_by_extension() {
    let mut yaml = NamedTempFile::with_suffix(".yaml").unwrap();
    yaml.write_all(SIGNUP_YAML.as_bytes()).unwrap();
    assert_eq!(FormDefinition::load(yaml.path()).unwrap().name, "signup");

    let mut json_file = NamedTempFile::with_suffix(".json").unwrap();
    json_file
        .write_all(br#"{ "name": "tiny", "fields": [{ "name": "a" }] }"#)
        .unwrap();
    assert_eq!(FormDefinition::load(json_file.path()).unwrap().fields.len(), 1);

    let other = NamedTempFile::with_suffix(".toml").unwrap();
    assert!(matches!(
        FormDefinition::load(other.path()),
        Err(FormsError::UnsupportedFormat { .. })
    ));
}

#[test]
fn invalid_expression_is_rejected_at_load() {
    let yaml = r#"
name: broken
fields:
  - name: a
  - name: b
    config:
      dependencies:
        - effect: hide
          source: a
          when: "value =="
"#;
    assert!(FormDefinition::from_yaml_str(yaml).is_err());
}

#[test]
fn duplicate_names_are_rejected() {
    let yaml = r#"
name: dup
fields:
  - name: a
  - name: a
"#;
    let definition = FormDefinition::from_yaml_str(yaml).unwrap();
    assert!(matches!(
        definition.validate(),
        Err(FormsError::DuplicateFieldName { .. })
    ));
    assert!(Form::from_definition(&definition).is_err());
}

#[rstest]
#[case("kind: required", json!(null), Some("required"))]
#[case("kind: required", json!("x"), None)]
#[case("kind: required-true", json!(false), Some("required"))]
#[case("kind: min-length\nmin: 3", json!("ab"), Some("minlength"))]
#[case("kind: min-length\nmin: 3", json!(""), None)]
#[case("kind: max-length\nmax: 2", json!("abc"), Some("maxlength"))]
#[case("kind: min\nmin: 10", json!(9), Some("min"))]
#[case("kind: max\nmax: 10", json!("11"), Some("max"))]
#[case("kind: pattern\npattern: '[a-z]+'", json!("abc1"), Some("pattern"))]
#[case("kind: email", json!("not-an-address"), Some("email"))]
#[case("kind: email", json!("ada@example.com"), None)]
fn validators_from_yaml(#[case] yaml: &str, #[case] value: Value, #[case] failing: Option<&str>) {
    let validator: Validator = serde_yaml_ng::from_str(yaml).unwrap();
    let result = validator.validate(&value);
    assert_eq!(result.is_some(), failing.is_some(), "{yaml} on {value}");
    if let Some(key) = failing {
        assert_eq!(validator.key(), key);
    }
}

#[rstest]
#[case("hide", EffectKind::Hide)]
#[case("disable", EffectKind::Disable)]
#[case("readonly", EffectKind::Readonly)]
#[case("add-validators", EffectKind::AddValidators)]
fn effect_names(#[case] name: &str, #[case] effect: EffectKind) {
    let parsed: EffectKind = serde_yaml_ng::from_str(name).unwrap();
    assert_eq!(parsed, effect);
    assert_eq!(effect.to_string(), name);
}
