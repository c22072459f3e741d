use serde_json::{Map, Value};

use crate::error::{TicketError, TicketResult};

/// A `(section, key)` candidate for a value that may live in one of several
/// sub-objects of an incident record.
pub type FieldPath = (&'static str, &'static str);

/// First value among `keys` that is present and truthy.
#[must_use]
pub fn pick_first<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_truthy(value))
}

/// [`pick_first`], rendered as text. Strings and numbers qualify; when the
/// first truthy value has another shape the lookup yields nothing.
#[must_use]
pub fn pick_first_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick_first(record, keys).and_then(value_text)
}

/// Ordered lookup across sub-objects of the record root.
#[must_use]
pub fn pick_first_path(record: &Map<String, Value>, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|(section, key)| {
        record
            .get(*section)
            .and_then(Value::as_object)
            .and_then(|object| pick_first_text(object, &[*key]))
    })
}

pub fn require_value(value: Option<String>, label: &str) -> TicketResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(TicketError::MissingField(label.to_string())),
    }
}

/// Optional sub-object of `record`. Falsy values read as absent; any other
/// non-object is a shape error.
pub fn optional_object<'a>(
    record: &'a Map<String, Value>,
    key: &str,
) -> TicketResult<Option<&'a Map<String, Value>>> {
    match record.get(key) {
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(value) if is_truthy(value) => {
            Err(TicketError::shape(format!("`{key}` must be an object")))
        }
        _ => Ok(None),
    }
}

/// Optional array under `key`, with the same falsy handling as
/// [`optional_object`].
pub fn optional_array<'a>(record: &'a Map<String, Value>, key: &str) -> TicketResult<&'a [Value]> {
    match record.get(key) {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(value) if is_truthy(value) => {
            Err(TicketError::shape(format!("`{key}` must be a list")))
        }
        _ => Ok(&[]),
    }
}

#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
