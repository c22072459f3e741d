use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{TicketError, TicketResult};
use crate::models::WrittenAttachment;
use crate::utils::fields::{pick_first_text, require_value};

pub const ATTACHMENT_TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "sys_created_on",
    "created_on",
    "created_at",
    "created",
];

pub const ATTACHMENT_NAME_KEYS: &[&str] = &["file_name", "filename", "name"];

pub const ATTACHMENT_CONTENT_KEYS: &[&str] = &[
    "content_base64",
    "payload_base64",
    "file_bytes",
    "content",
    "data",
    "body",
];

pub const TICKET_FILE_NAME: &str = "ticket.md";
const FALLBACK_FILE_NAME: &str = "attachment";

/// Tracks names handed out inside one ticket directory.
#[derive(Debug, Default, Clone)]
pub struct FilenameRegistry {
    used: BTreeSet<String>,
}

impl FilenameRegistry {
    /// Claims `name`, or the first free `<stem>_<n><ext>` for `n >= 2`.
    /// `ticket.md` is never handed out.
    pub fn claim(&mut self, name: &str) -> String {
        if self.is_free(name) {
            self.used.insert(name.to_string());
            return name.to_string();
        }

        let (stem, extension) = split_extension(name);
        let mut counter = 2_usize;
        loop {
            let candidate = format!("{stem}_{counter}{extension}");
            if self.is_free(&candidate) {
                self.used.insert(candidate.clone());
                return candidate;
            }
            counter += 1;
        }
    }

    fn is_free(&self, name: &str) -> bool {
        name != TICKET_FILE_NAME && !self.used.contains(name)
    }
}

/// Flattens an export filename into one safe path component.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let flattened = name.replace(['/', '\\'], "_");
    let replaced = disallowed_run_regex().replace_all(&flattened, "_");
    let trimmed = replaced.trim_matches([' ', '.']);
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Resolves every attachment entry of a record. With `dest_dir` set, the
/// payload is written under the resolved name; without it the payload is
/// still decoded so encoding problems surface the same way.
pub fn resolve_attachments(
    entries: &[Value],
    dest_dir: Option<&Path>,
) -> TicketResult<Vec<WrittenAttachment>> {
    let mut registry = FilenameRegistry::default();
    entries
        .iter()
        .map(|entry| {
            let entry = entry
                .as_object()
                .ok_or_else(|| TicketError::shape("attachment entries must be objects"))?;
            resolve_attachment(entry, dest_dir, &mut registry)
        })
        .collect()
}

fn resolve_attachment(
    entry: &Map<String, Value>,
    dest_dir: Option<&Path>,
    registry: &mut FilenameRegistry,
) -> TicketResult<WrittenAttachment> {
    let name = require_value(
        pick_first_text(entry, ATTACHMENT_NAME_KEYS),
        "attachment filename",
    )?;
    let resolved_filename = registry.claim(&sanitize_filename(&name));

    let source_file = entry
        .get("file_path")
        .and_then(Value::as_str)
        .map(Path::new)
        .filter(|path| path.is_file());

    match (source_file, dest_dir) {
        (Some(source_path), Some(dest_dir)) => {
            let dest = dest_dir.join(&resolved_filename);
            std::fs::copy(source_path, &dest).map_err(|source| TicketError::io(&dest, source))?;
        }
        (Some(_), None) => {}
        (None, dest_dir) => {
            let payload = attachment_bytes(entry)?;
            if let Some(dest_dir) = dest_dir {
                let dest = dest_dir.join(&resolved_filename);
                std::fs::write(&dest, payload).map_err(|source| TicketError::io(&dest, source))?;
            }
        }
    }

    Ok(WrittenAttachment {
        timestamp: pick_first_text(entry, ATTACHMENT_TIMESTAMP_KEYS),
        resolved_filename,
    })
}

/// Payload from the first usable content key. Strings are strict standard
/// base64; arrays of byte values are taken as raw bytes.
pub fn attachment_bytes(entry: &Map<String, Value>) -> TicketResult<Vec<u8>> {
    for key in ATTACHMENT_CONTENT_KEYS {
        match entry.get(*key) {
            Some(Value::String(encoded)) => {
                return BASE64.decode(encoded).map_err(|_| TicketError::InvalidEncoding {
                    key: (*key).to_string(),
                });
            }
            Some(Value::Array(items)) => {
                if let Some(bytes) = raw_bytes(items) {
                    return Ok(bytes);
                }
            }
            _ => {}
        }
    }
    Err(TicketError::MissingAttachmentContent)
}

fn raw_bytes(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
        .collect()
}

/// `(stem, extension)` split at the last dot, ignoring leading dots.
fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(index) => name.split_at(leading_dots + index),
        None => (name, ""),
    }
}

fn disallowed_run_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9._ -]+").expect("filename character regex should compile")
    })
}
