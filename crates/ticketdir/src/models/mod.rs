pub mod ticket;

pub use ticket::{Attachment, ExtractedMessage, Message, Ticket, TimelineEntry, WrittenAttachment};
