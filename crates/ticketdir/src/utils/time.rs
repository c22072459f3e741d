use std::borrow::Cow;

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Iso8601;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{TicketError, TicketResult};

const EXPORT_FORMATS: [&[BorrowedFormatItem<'static>]; 2] = [
    format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute padding:none]:[second padding:none]"
    ),
    format_description!(
        "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute padding:none]:[second padding:none]"
    ),
];

// The ISO 8601 parser wants minutes once the date uses the extended form.
const ISO_HOUR_ONLY: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]");

/// Date portion of an export timestamp, for display.
///
/// Splits on the first space, then on the first `T`; values with neither are
/// returned unchanged.
#[must_use]
pub fn date_only(value: &str) -> &str {
    if let Some((date, _)) = value.split_once(' ') {
        return date;
    }
    if let Some((date, _)) = value.split_once('T') {
        return date;
    }
    value
}

/// Parses an export timestamp into a naive instant used only for ordering.
///
/// Export stamps (unpadded fields allowed) are tried first, with and without a
/// trailing `Z`. Anything else goes through the ISO 8601 parser, basic or
/// extended, with a space accepted in place of `T`. Values carrying a UTC
/// offset are converted to UTC before the offset is dropped, so they compare
/// against naive values as wall-clock UTC.
pub fn parse_timestamp(value: &str) -> TicketResult<PrimitiveDateTime> {
    for candidate in std::iter::once(value).chain(value.strip_suffix('Z')) {
        for format in EXPORT_FORMATS {
            if let Ok(parsed) = PrimitiveDateTime::parse(candidate, format) {
                return Ok(parsed);
            }
        }
    }

    let iso = with_t_separator(value);
    if let Ok(parsed) = OffsetDateTime::parse(&iso, &Iso8601::DEFAULT) {
        let utc = parsed.to_offset(UtcOffset::UTC);
        return Ok(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(&iso, &Iso8601::DEFAULT) {
        return Ok(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(&iso, ISO_HOUR_ONLY) {
        return Ok(parsed);
    }
    if let Ok(date) = Date::parse(&iso, &Iso8601::DEFAULT) {
        return Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT));
    }

    Err(TicketError::Parse {
        value: value.to_string(),
        detail: "unsupported timestamp format".to_string(),
    })
}

fn with_t_separator(value: &str) -> Cow<'_, str> {
    match value.split_once(' ') {
        Some((date, time)) => Cow::Owned(format!("{date}T{time}")),
        None => Cow::Borrowed(value),
    }
}
