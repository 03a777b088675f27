use serde_json::Value;

use crate::models::ImportRow;

pub const MISSING_CLASS: &str = "Class is required";
pub const MISSING_LEVEL: &str = "Level is required";
pub const MISSING_SUBJECT: &str = "At least one subject is required (subject or subjects)";

fn text_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `subject` first, then the comma separated `subjects`, trimmed, empties
/// dropped, first occurrence wins.
pub fn subject_list(raw: &Value) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    let single = text_field(raw, "subject").into_iter();
    let many = text_field(raw, "subjects")
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    for name in single.chain(many) {
        if !subjects.iter().any(|s| s == name) {
            subjects.push(name.to_string());
        }
    }
    subjects
}

/// Checks a raw row. Errors come back in a fixed order: class, level, subject.
pub fn validate_row(raw: &Value) -> Result<ImportRow, Vec<String>> {
    let mut errors = Vec::new();

    let class = text_field(raw, "class");
    if class.is_none() {
        errors.push(MISSING_CLASS.to_string());
    }
    let level = text_field(raw, "level");
    if level.is_none() {
        errors.push(MISSING_LEVEL.to_string());
    }
    let subjects = subject_list(raw);
    if subjects.is_empty() {
        errors.push(MISSING_SUBJECT.to_string());
    }

    match (class, level) {
        (Some(class), Some(level)) if errors.is_empty() => Ok(ImportRow {
            class: class.to_string(),
            level: level.to_string(),
            subjects,
        }),
        _ => Err(errors),
    }
}
