//! Table rendering for field states.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::Value;
use swissarmyhammer_forms::FieldState;

const VALUE_WIDTH: usize = 40;

/// Create a table that wraps to the terminal width.
pub fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Truncate a string to `max` characters, appending "..." if truncated.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Compact rendering of a field value. Null renders as an empty cell.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => truncate_str(s, VALUE_WIDTH),
        other => truncate_str(&other.to_string(), VALUE_WIDTH),
    }
}

/// Comma-separated flags of a field: hidden, readonly, disabled, dirty, touched.
pub fn flags(state: &FieldState) -> String {
    [
        (state.is_hidden, "hidden"),
        (state.is_readonly, "readonly"),
        (state.is_disabled, "disabled"),
        (state.dirty, "dirty"),
        (state.touched, "touched"),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn field_state_table(states: &[FieldState]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Field", "Label", "Type", "Value", "Flags", "Errors"]);
    for state in states {
        let errors = state
            .validation_errors
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        table.add_row(vec![
            state.path.clone(),
            state.label.clone().unwrap_or_default(),
            format!("{:?}", state.field_type).to_lowercase(),
            display_value(&state.value),
            flags(state),
            errors,
        ]);
    }
    table
}
