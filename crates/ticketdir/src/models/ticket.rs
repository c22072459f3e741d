use serde::Serialize;
use time::PrimitiveDateTime;

/// A discussion entry after authorship normalization and cleaning. The
/// timestamp stays raw until the timeline is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub timestamp: Option<String>,
    pub author: String,
    pub internal: bool,
    pub text: String,
}

/// An attachment already written to the ticket directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenAttachment {
    pub timestamp: Option<String>,
    pub resolved_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub timestamp: String,
    #[serde(skip)]
    pub parsed_time: PrimitiveDateTime,
    pub author: String,
    pub internal: bool,
    pub text: String,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub timestamp: String,
    #[serde(skip)]
    pub parsed_time: PrimitiveDateTime,
    pub resolved_filename: String,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry {
    Message(Message),
    AttachmentGroup { files: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub incident_number: String,
    pub short_description: Option<String>,
    pub status: String,
    pub opened_date: String,
    pub closed_date: Option<String>,
    pub timeline: Vec<TimelineEntry>,
}
