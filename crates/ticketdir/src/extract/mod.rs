pub mod attachments;
pub mod messages;

pub use attachments::{
    FilenameRegistry, TICKET_FILE_NAME, attachment_bytes, resolve_attachments, sanitize_filename,
};
pub use messages::{dedupe_adjacent, extract_messages, normalize_author};
