//! Per-incident wiring: one export file in, one ticket folder out.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::clean::CleanerRules;
use crate::error::{TicketError, TicketResult};
use crate::extract::{TICKET_FILE_NAME, extract_messages, resolve_attachments, sanitize_filename};
use crate::models::{ExtractedMessage, Ticket};
use crate::render::render_ticket_markdown;
use crate::timeline::build_timeline;
use crate::utils::fields::{
    FieldPath, optional_array, optional_object, pick_first_path, require_value,
};
use crate::utils::time::date_only;

pub const INCIDENT_NUMBER_PATHS: &[FieldPath] = &[
    ("metadata", "incident_number"),
    ("incident_fields", "number"),
];
pub const SHORT_DESCRIPTION_PATHS: &[FieldPath] = &[("incident_fields", "short_description")];
pub const STATUS_PATHS: &[FieldPath] = &[("incident_fields", "state")];
pub const OPENED_PATHS: &[FieldPath] = &[
    ("incident_fields", "opened_at"),
    ("incident_fields", "sys_created_on"),
];
pub const CLOSED_PATHS: &[FieldPath] = &[
    ("incident_fields", "closed_at"),
    ("incident_fields", "resolved_at"),
];

const IRIS_PI_ACCOUNT_REQUEST: &str = "ticket from iris: new pi account request";
const STORAGE_QUOTA_PREFIX: &str = "storage quota increase request:";

/// Why an incident produces no folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    IrisPiAccountRequest,
    StorageQuotaIncrease,
    NoMessages,
    SingleMessage,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IrisPiAccountRequest => "iris_pi_account_request",
            Self::StorageQuotaIncrease => "storage_quota_increase",
            Self::NoMessages => "no_messages",
            Self::SingleMessage => "single_message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTicket {
    pub incident_number: String,
    pub ticket_dir: PathBuf,
    pub messages: usize,
    pub attachments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    Written(WrittenTicket),
    Skipped(SkipReason),
}

/// Incident-level fields shown in the document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketHeader {
    pub incident_number: String,
    pub short_description: Option<String>,
    pub status: String,
    pub opened_date: String,
    pub closed_date: Option<String>,
}

/// A record that passed the skip policy and carries every required field.
#[derive(Debug, Clone)]
pub struct PreparedTicket<'r> {
    pub header: TicketHeader,
    pub messages: Vec<ExtractedMessage>,
    pub attachments: &'r [Value],
    /// `<year>/<month>/<incident_number>` below the output root.
    pub relative_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Preparation<'r> {
    Ready(PreparedTicket<'r>),
    Skip(SkipReason),
}

pub fn load_record(path: &Path) -> TicketResult<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).map_err(|source| TicketError::io(path, source))?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| TicketError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(TicketError::shape("incident record root must be an object")),
    }
}

#[must_use]
pub fn skip_reason_for_description(short_description: Option<&str>) -> Option<SkipReason> {
    let normalized = short_description?.trim().to_lowercase();
    if normalized == IRIS_PI_ACCOUNT_REQUEST {
        Some(SkipReason::IrisPiAccountRequest)
    } else if normalized.starts_with(STORAGE_QUOTA_PREFIX) {
        Some(SkipReason::StorageQuotaIncrease)
    } else {
        None
    }
}

/// Applies the skip policy and resolves header fields. Nothing is written.
pub fn prepare_ticket<'r>(
    record: &'r Map<String, Value>,
    rules: &CleanerRules,
) -> TicketResult<Preparation<'r>> {
    optional_object(record, "metadata")?;
    optional_object(record, "incident_fields")?;

    let short_description = pick_first_path(record, SHORT_DESCRIPTION_PATHS);
    if let Some(reason) = skip_reason_for_description(short_description.as_deref()) {
        return Ok(Preparation::Skip(reason));
    }

    let attachments = optional_array(record, "attachments")?;
    let messages = extract_messages(record, rules)?;
    match (messages.len(), attachments.len()) {
        (0, _) => return Ok(Preparation::Skip(SkipReason::NoMessages)),
        (1, 0) => return Ok(Preparation::Skip(SkipReason::SingleMessage)),
        _ => {}
    }

    let incident_number = require_value(
        pick_first_path(record, INCIDENT_NUMBER_PATHS),
        "incident number",
    )?;
    let status = require_value(pick_first_path(record, STATUS_PATHS), "status")?;
    let opened_raw = require_value(pick_first_path(record, OPENED_PATHS), "opened date")?;
    let opened_date = date_only(&opened_raw).to_string();
    let closed_date = pick_first_path(record, CLOSED_PATHS).map(|raw| date_only(&raw).to_string());

    let relative_dir = ticket_relative_dir(&opened_date, &incident_number)?;

    Ok(Preparation::Ready(PreparedTicket {
        header: TicketHeader {
            incident_number,
            short_description,
            status,
            opened_date,
            closed_date,
        },
        messages,
        attachments,
        relative_dir,
    }))
}

impl PreparedTicket<'_> {
    /// Resolves attachments (writing them when `dest_dir` is set) and
    /// assembles the ordered ticket.
    pub fn into_ticket(self, dest_dir: Option<&Path>) -> TicketResult<Ticket> {
        let attachments = resolve_attachments(self.attachments, dest_dir)?;
        let timeline = build_timeline(self.messages, attachments)?;
        let TicketHeader {
            incident_number,
            short_description,
            status,
            opened_date,
            closed_date,
        } = self.header;

        Ok(Ticket {
            incident_number,
            short_description,
            status,
            opened_date,
            closed_date,
            timeline,
        })
    }
}

/// Writes the ticket folder for `record` below `out_root`.
pub fn process_record(
    record: &Map<String, Value>,
    out_root: &Path,
    rules: &CleanerRules,
) -> TicketResult<TicketOutcome> {
    let prepared = match prepare_ticket(record, rules)? {
        Preparation::Ready(prepared) => prepared,
        Preparation::Skip(reason) => return Ok(TicketOutcome::Skipped(reason)),
    };

    let ticket_dir = out_root.join(&prepared.relative_dir);
    std::fs::create_dir_all(&ticket_dir).map_err(|source| TicketError::io(&ticket_dir, source))?;

    let messages = prepared.messages.len();
    let attachments = prepared.attachments.len();
    let ticket = prepared.into_ticket(Some(&ticket_dir))?;
    let markdown_path = ticket_dir.join(TICKET_FILE_NAME);
    std::fs::write(&markdown_path, render_ticket_markdown(&ticket))
        .map_err(|source| TicketError::io(&markdown_path, source))?;

    Ok(TicketOutcome::Written(WrittenTicket {
        incident_number: ticket.incident_number,
        ticket_dir,
        messages,
        attachments,
    }))
}

pub fn process_ticket_file(
    path: &Path,
    out_root: &Path,
    rules: &CleanerRules,
) -> TicketResult<TicketOutcome> {
    let record = load_record(path)?;
    process_record(&record, out_root, rules)
}

fn ticket_relative_dir(opened_date: &str, incident_number: &str) -> TicketResult<PathBuf> {
    let mut parts = opened_date.split('-');
    let (Some(year), Some(month)) = (parts.next(), parts.next()) else {
        return Err(TicketError::Parse {
            value: opened_date.to_string(),
            detail: "opened date is not YYYY-MM-DD".to_string(),
        });
    };

    Ok([year, month, incident_number]
        .into_iter()
        .map(sanitize_filename)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{SkipReason, skip_reason_for_description, ticket_relative_dir};

    #[test]
    fn skip_policy_matches_on_normalized_description() {
        assert_eq!(
            skip_reason_for_description(Some("  Ticket from IRIS: New PI Account Request ")),
            Some(SkipReason::IrisPiAccountRequest)
        );
        assert_eq!(
            skip_reason_for_description(Some("STORAGE QUOTA INCREASE REQUEST: /global/cfs")),
            Some(SkipReason::StorageQuotaIncrease)
        );
        assert_eq!(
            skip_reason_for_description(Some("Ticket from IRIS: New PI Account Request (resend)")),
            None
        );
        assert_eq!(skip_reason_for_description(None), None);
    }

    #[test]
    fn relative_dir_is_year_month_incident() {
        let dir = ticket_relative_dir("2023-11-05", "INC0099").expect("dir should resolve");
        assert_eq!(dir, PathBuf::from("2023").join("11").join("INC0099"));
    }

    #[test]
    fn incident_numbers_cannot_escape_the_month_folder() {
        let dir = ticket_relative_dir("2023-11-05", "../INC0099").expect("dir should resolve");
        assert_eq!(dir, PathBuf::from("2023").join("11").join("_INC0099"));
    }

    #[test]
    fn rejects_opened_dates_without_month() {
        let err = ticket_relative_dir("20231105", "INC0099").expect_err("should fail");
        assert_eq!(err.kind(), "parse");
    }
}
