use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::{ValidationError, ValidationErrors};

/// One violation as rendered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

/// Flattens validator output into a stable, display-ready list.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let param = field.to_string();
            errs.iter().map(move |err| FieldError {
                param: param.clone(),
                msg: message_of(err),
            })
        })
        .collect();
    out.sort_by(|a, b| a.param.cmp(&b.param).then_with(|| a.msg.cmp(&b.msg)));
    out
}

pub fn push_error(
    errors: &mut ValidationErrors,
    field: &'static str,
    code: &'static str,
    message: impl Into<Cow<'static, str>>,
) {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    errors.add(field, err);
}

pub fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// The readers below take raw JSON so a wrongly typed field becomes one more
// entry in the error list instead of failing the whole body. `None` means the
// field was absent or invalid; an invalid field always leaves an error behind.

/// An array of strings.
pub fn string_list(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<JsonValue>,
) -> Option<Vec<String>> {
    let JsonValue::Array(items) = value? else {
        push_error(errors, field, "type", format!("{} must be an array", field));
        return None;
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            JsonValue::String(s) => out.push(s),
            _ => {
                push_error(errors, field, "type", format!("{} must contain only strings", field));
                return None;
            }
        }
    }
    Some(out)
}

/// An integer in `1..=i32::MAX`.
pub fn positive_int(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<JsonValue>,
) -> Option<i32> {
    let parsed = value?
        .as_i64()
        .filter(|n| *n >= 1)
        .and_then(|n| i32::try_from(n).ok());
    if parsed.is_none() {
        push_error(errors, field, "range", format!("{} must be a positive integer", field));
    }
    parsed
}

/// A timestamp string such as `2026-05-01T09:00:00Z`.
pub fn timestamp(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<JsonValue>,
) -> Option<DateTime<Utc>> {
    let parsed = match value? {
        JsonValue::String(s) => s.parse::<DateTime<Utc>>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        push_error(errors, field, "type", format!("{} must be an RFC 3339 timestamp", field));
    }
    parsed
}

fn message_of(err: &ValidationError) -> String {
    match &err.message {
        Some(message) => message.to_string(),
        None => match err.code.as_ref() {
            "length" => "must not be empty".to_string(),
            "range" => "is out of range".to_string(),
            "email" => "must be a valid email address".to_string(),
            other => format!("is invalid ({})", other),
        },
    }
}
