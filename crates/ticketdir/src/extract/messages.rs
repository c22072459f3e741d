use serde_json::{Map, Value};

use crate::clean::{CleanerRules, clean_message_text_with};
use crate::error::{TicketError, TicketResult};
use crate::models::ExtractedMessage;
use crate::utils::fields::{optional_array, optional_object, pick_first_text, require_value};

pub const MESSAGE_TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "sys_created_on",
    "created_on",
    "created_at",
    "created",
];

const STAFF_WORK_NOTES_MARKER: &str = " (staff work notes";

/// Customer comments then internal notes, cleaned, with adjacent repeats
/// removed.
pub fn extract_messages(
    record: &Map<String, Value>,
    rules: &CleanerRules,
) -> TicketResult<Vec<ExtractedMessage>> {
    let Some(discussions) = optional_object(record, "discussions")? else {
        return Ok(Vec::new());
    };

    let mut messages = Vec::new();
    for (list_key, internal) in [
        ("customer_facing_comments", false),
        ("internal_work_notes", true),
    ] {
        for entry in optional_array(discussions, list_key)? {
            let entry = entry.as_object().ok_or_else(|| {
                TicketError::shape(format!("`{list_key}` entries must be objects"))
            })?;
            if let Some(message) = extract_entry(entry, internal, rules)? {
                messages.push(message);
            }
        }
    }

    Ok(dedupe_adjacent(messages))
}

fn extract_entry(
    entry: &Map<String, Value>,
    internal: bool,
    rules: &CleanerRules,
) -> TicketResult<Option<ExtractedMessage>> {
    let created_by = entry.get("created_by").and_then(Value::as_str);
    if created_by.is_some_and(|author| author.trim().eq_ignore_ascii_case("system")) {
        return Ok(None);
    }

    let author = require_value(created_by.map(str::to_string), "message author")?;
    let text = entry
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Some(ExtractedMessage {
        timestamp: pick_first_text(entry, MESSAGE_TIMESTAMP_KEYS),
        text: clean_message_text_with(text, Some(&author), rules),
        author: normalize_author(author, internal),
        internal,
    }))
}

/// Drops the ` (Staff work notes)` qualifier ServiceNow appends to internal
/// note authors. Customer-facing authors pass through untouched.
#[must_use]
pub fn normalize_author(author: String, internal: bool) -> String {
    if !internal {
        return author;
    }
    match author.to_ascii_lowercase().find(STAFF_WORK_NOTES_MARKER) {
        Some(index) => author[..index].trim_end().to_string(),
        None => author,
    }
}

/// Removes a message when its text and internal flag equal those of the
/// previous kept message. Repeats separated by anything else survive.
#[must_use]
pub fn dedupe_adjacent(messages: Vec<ExtractedMessage>) -> Vec<ExtractedMessage> {
    let mut kept: Vec<ExtractedMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        if kept
            .last()
            .is_some_and(|last| last.text == message.text && last.internal == message.internal)
        {
            continue;
        }
        kept.push(message);
    }
    kept
}
