use crate::models::{Ticket, TimelineEntry};

pub const INTERNAL_HEADING_SUFFIX: &str = " (staff work notes)";

/// Markdown transcript for one ticket. The output always ends with exactly
/// one newline.
#[must_use]
pub fn render_ticket_markdown(ticket: &Ticket) -> String {
    let title = match ticket.short_description.as_deref() {
        Some(description) if !description.is_empty() => {
            format!("{} - {description}", ticket.incident_number)
        }
        _ => ticket.incident_number.clone(),
    };

    let mut lines = vec![format!("# {title}"), String::new()];
    for (label, value) in [
        ("Status", Some(ticket.status.as_str())),
        ("Opened", Some(ticket.opened_date.as_str())),
        ("Closed", ticket.closed_date.as_deref()),
    ] {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            lines.push(format!("- {label}: {value}"));
        }
    }
    lines.push(String::new());

    for entry in &ticket.timeline {
        match entry {
            TimelineEntry::Message(message) => {
                let suffix = if message.internal {
                    INTERNAL_HEADING_SUFFIX
                } else {
                    ""
                };
                lines.push(format!("## {}{suffix}", message.author));
                lines.push(String::new());
                lines.push(message.text.trim_end().to_string());
                lines.push(String::new());
            }
            TimelineEntry::AttachmentGroup { files } => {
                lines.push("## Attachments".to_string());
                lines.push(String::new());
                lines.extend(files.iter().map(|name| format!("- `{name}`")));
                lines.push(String::new());
            }
        }
    }

    let mut rendered = lines.join("\n").trim_end().to_string();
    rendered.push('\n');
    rendered
}
