//! Command implementations.
//!
//! Each command loads a definition, builds the form with dependency
//! tracking started and applies `--set` edits in order before reporting.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use swissarmyhammer_forms::{Form, FormDefinition};

use crate::table::field_state_table;

/// Split `PATH=VALUE`. The value is parsed as JSON, falling back to a plain
/// string, so `age=42` sets a number and `name=Ada` a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((path, value)) = raw.split_once('=') else {
        bail!("expected PATH=VALUE, got '{}'", raw);
    };
    let path = path.trim();
    if path.is_empty() {
        bail!("missing field path in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((path.to_string(), value))
}

/// Load `file`, build the form and start dependency tracking.
pub fn load_form(file: &Path) -> Result<Form> {
    let definition = FormDefinition::load(file)
        .with_context(|| format!("failed to load form definition {}", file.display()))?;
    let mut form = Form::from_definition(&definition)
        .with_context(|| format!("invalid form '{}'", definition.name))?;
    form.start_dependency_tracking()
        .with_context(|| format!("invalid dependencies in form '{}'", definition.name))?;
    Ok(form)
}

/// Apply `--set` edits as user input, in order.
pub fn apply_sets(form: &Form, sets: &[String]) -> Result<()> {
    for raw in sets {
        let (path, value) = parse_assignment(raw)?;
        tracing::debug!(field = %path, %value, "applying edit");
        form.input(&path, value)
            .with_context(|| format!("cannot set '{}'", path))?;
    }
    Ok(())
}

pub fn run_check(file: &Path) -> Result<()> {
    let form = load_form(file)?;
    let fields = form.field_states().len();
    let dependencies: usize = form
        .schema()
        .controls()
        .iter()
        .map(|field| field.dependencies().len())
        .sum();
    println!(
        "✓ {}: {} fields, {} dependencies bound",
        form.name(),
        fields,
        dependencies
    );
    Ok(())
}

pub fn run_show(file: &Path, sets: &[String], json: bool) -> Result<()> {
    let form = load_form(file)?;
    apply_sets(&form, sets)?;
    let states = form.field_states();
    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
    } else {
        println!("{}", field_state_table(&states));
        let status = if form.is_valid() { "valid" } else { "invalid" };
        println!("Form '{}' is {}", form.name(), status);
    }
    Ok(())
}

/// Print the submitted value. An invalid form still prints its value but
/// fails with the list of errors.
pub fn run_submit(file: &Path, sets: &[String]) -> Result<()> {
    let form = load_form(file)?;
    apply_sets(&form, sets)?;
    let value = form.submit();
    println!("{}", serde_json::to_string_pretty(&value)?);
    if !form.is_valid() {
        let errors = form
            .errors()
            .iter()
            .map(|(path, errors)| {
                let messages: Vec<_> = errors.values().cloned().collect();
                format!("  {}: {}", path, messages.join("; "))
            })
            .collect::<Vec<_>>()
            .join("\n");
        bail!("form '{}' is invalid:\n{}", form.name(), errors);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DEFINITION: &str = r#"
name: contact
fields:
  - name: email
    config:
      validators:
        - kind: required
  - name: phone
    config:
      dependencies:
        - effect: hide
          source: email
          when: "value != null && value != ''"
"#;

    fn definition_file() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(DEFINITION.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_assignment_json_and_string() {
        assert_eq!(parse_assignment("age=42").unwrap(), ("age".into(), json!(42)));
        assert_eq!(parse_assignment("ok=true").unwrap(), ("ok".into(), json!(true)));
        assert_eq!(
            parse_assignment("name=Ada Lovelace").unwrap(),
            ("name".into(), json!("Ada Lovelace"))
        );
        assert_eq!(
            parse_assignment("a.0.b=x=y").unwrap(),
            ("a.0.b".into(), json!("x=y"))
        );
        assert_eq!(parse_assignment("note=").unwrap(), ("note".into(), json!("")));
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_load_and_apply() {
        let file = definition_file();
        let form = load_form(file.path()).unwrap();
        assert!(!form.field("phone").unwrap().is_hidden());

        apply_sets(&form, &["email=ada@example.com".to_string()]).unwrap();
        assert!(form.field("phone").unwrap().is_hidden());
        assert!(form.field("email").unwrap().control().is_dirty());
    }

    #[test]
    fn test_apply_unknown_field_fails() {
        let file = definition_file();
        let form = load_form(file.path()).unwrap();
        let err = apply_sets(&form, &["missing=1".to_string()]).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_submit_reports_invalid_form() {
        let file = definition_file();
        assert!(run_submit(file.path(), &[]).is_err());
        assert!(run_submit(file.path(), &["email=a@b.c".to_string()]).is_ok());
    }

    #[test]
    fn test_check_missing_file() {
        let err = run_check(Path::new("/nonexistent/form.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load"));
    }
}
