use std::cmp::Ordering;

use time::PrimitiveDateTime;

use crate::error::TicketResult;
use crate::models::{Attachment, ExtractedMessage, Message, TimelineEntry, WrittenAttachment};
use crate::utils::fields::require_value;
use crate::utils::time::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimelineItem {
    Message(Message),
    Attachment(Attachment),
}

impl TimelineItem {
    fn sort_key(&self) -> (&PrimitiveDateTime, &str, u8, usize) {
        match self {
            Self::Message(message) => (
                &message.parsed_time,
                message.timestamp.as_str(),
                0,
                message.sequence_index,
            ),
            Self::Attachment(attachment) => (
                &attachment.parsed_time,
                attachment.timestamp.as_str(),
                1,
                attachment.sequence_index,
            ),
        }
    }
}

/// Merges messages and attachments into display order.
///
/// Order is parsed instant, then raw timestamp text, then messages before
/// attachments, then extraction order. Attachments that end up adjacent are
/// collapsed into a single group.
pub fn build_timeline(
    messages: Vec<ExtractedMessage>,
    attachments: Vec<WrittenAttachment>,
) -> TicketResult<Vec<TimelineEntry>> {
    let message_count = messages.len();
    let mut items = Vec::with_capacity(message_count + attachments.len());

    for (sequence_index, message) in messages.into_iter().enumerate() {
        let timestamp = require_value(message.timestamp, "message timestamp")?;
        items.push(TimelineItem::Message(Message {
            parsed_time: parse_timestamp(&timestamp)?,
            timestamp,
            author: require_value(Some(message.author), "message author")?,
            internal: message.internal,
            text: message.text,
            sequence_index,
        }));
    }

    for (offset, attachment) in attachments.into_iter().enumerate() {
        let timestamp = require_value(attachment.timestamp, "attachment timestamp")?;
        items.push(TimelineItem::Attachment(Attachment {
            parsed_time: parse_timestamp(&timestamp)?,
            timestamp,
            resolved_filename: attachment.resolved_filename,
            sequence_index: message_count + offset,
        }));
    }

    items.sort_by(compare_items);
    Ok(group_attachments(items))
}

fn compare_items(left: &TimelineItem, right: &TimelineItem) -> Ordering {
    left.sort_key().cmp(&right.sort_key())
}

fn group_attachments(items: Vec<TimelineItem>) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();
    let mut pending = Vec::new();

    for item in items {
        match item {
            TimelineItem::Attachment(attachment) => pending.push(attachment.resolved_filename),
            TimelineItem::Message(message) => {
                if !pending.is_empty() {
                    entries.push(TimelineEntry::AttachmentGroup {
                        files: std::mem::take(&mut pending),
                    });
                }
                entries.push(TimelineEntry::Message(message));
            }
        }
    }

    if !pending.is_empty() {
        entries.push(TimelineEntry::AttachmentGroup { files: pending });
    }
    entries
}
