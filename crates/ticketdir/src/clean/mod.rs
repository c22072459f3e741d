//! Boilerplate removal for support-desk message bodies.
//!
//! Each stage deletes whole lines at an anchored position (first or last
//! non-blank line) or on an exact whole-line match. Nothing is rewritten
//! mid-paragraph.

pub mod rules;

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

pub use rules::{CleanerRules, RulesFile, default_rules};

const TRAILING_DATE_MAX_CHARS: usize = 40;

const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

const TRAILING_DATES: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month padding:none]-[day padding:none]"),
    format_description!("[month repr:short case_sensitive:false] [day padding:none], [year]"),
    format_description!("[month repr:long case_sensitive:false] [day padding:none], [year]"),
];

const TRAILING_DATE_TIMES: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute padding:none]:[second padding:none]"
    ),
    format_description!(
        "[month repr:short case_sensitive:false] [day padding:none], [year], [hour padding:none]:[minute padding:none]"
    ),
    format_description!(
        "[month repr:long case_sensitive:false] [day padding:none], [year], [hour padding:none]:[minute padding:none]"
    ),
];

struct StageContext<'r> {
    rules: &'r CleanerRules,
    author: Option<&'r str>,
}

struct CleaningStage {
    name: &'static str,
    apply: for<'a> fn(Vec<&'a str>, &StageContext<'_>) -> Vec<&'a str>,
}

const CLEANING_STAGES: &[CleaningStage] = &[
    CleaningStage {
        name: "leading_metadata",
        apply: strip_leading_metadata,
    },
    CleaningStage {
        name: "greeting",
        apply: strip_greeting,
    },
    CleaningStage {
        name: "trailing_date",
        apply: strip_trailing_date,
    },
    CleaningStage {
        name: "footer",
        apply: strip_footers,
    },
    CleaningStage {
        name: "signoff",
        apply: strip_signoff,
    },
    CleaningStage {
        name: "author_self_reference",
        apply: strip_author_lines,
    },
    CleaningStage {
        name: "blank_edges",
        apply: trim_blank_edges,
    },
];

/// Stage names in application order.
#[must_use]
pub fn cleaning_stage_names() -> Vec<&'static str> {
    CLEANING_STAGES.iter().map(|stage| stage.name).collect()
}

/// Cleans `text` with the built-in rules.
#[must_use]
pub fn clean_message_text(text: &str, author: Option<&str>) -> String {
    clean_message_text_with(text, author, default_rules())
}

#[must_use]
pub fn clean_message_text_with(text: &str, author: Option<&str>, rules: &CleanerRules) -> String {
    let context = StageContext { rules, author };
    let lines = CLEANING_STAGES
        .iter()
        .fold(split_lines(text), |lines, stage| (stage.apply)(lines, &context));
    lines.join("\n")
}

/// Splits on every line boundary in `LINE_BREAKS`, with `\r\n` counted as one
/// break. A final break does not produce a trailing empty line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some((index, ch)) = rest.char_indices().find(|(_, ch)| LINE_BREAKS.contains(ch)) {
        lines.push(&rest[..index]);
        let after = &rest[index + ch.len_utf8()..];
        rest = if ch == '\r' {
            after.strip_prefix('\n').unwrap_or(after)
        } else {
            after
        };
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

fn strip_leading_metadata<'a>(mut lines: Vec<&'a str>, _: &StageContext<'_>) -> Vec<&'a str> {
    while let Some(index) = first_non_blank(&lines) {
        let lowered = lines[index].trim().to_lowercase();
        if !rules::METADATA_PREFIXES
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
        {
            break;
        }
        lines.remove(index);
    }
    lines
}

fn strip_greeting<'a>(mut lines: Vec<&'a str>, _: &StageContext<'_>) -> Vec<&'a str> {
    if let Some(index) = first_non_blank(&lines)
        && greeting_regex().is_match(lines[index].trim())
    {
        lines.remove(index);
    }
    lines
}

fn strip_trailing_date<'a>(mut lines: Vec<&'a str>, _: &StageContext<'_>) -> Vec<&'a str> {
    let Some(index) = last_non_blank(&lines) else {
        return lines;
    };
    let tail = lines[index].trim();
    let lowered = tail.to_lowercase();
    if is_trailing_date_line(tail) || (lowered.starts_with("on ") && lowered.contains(" at ")) {
        lines.remove(index);
    }
    lines
}

fn strip_footers<'a>(lines: Vec<&'a str>, context: &StageContext<'_>) -> Vec<&'a str> {
    lines
        .into_iter()
        .filter(|line| {
            let content = strip_quote_marker(line.trim());
            content.is_empty() || !context.rules.is_footer(content)
        })
        .collect()
}

fn strip_signoff<'a>(mut lines: Vec<&'a str>, context: &StageContext<'_>) -> Vec<&'a str> {
    let Some(last) = last_non_blank(&lines) else {
        return lines;
    };
    if is_signoff_line(lines[last], context.rules) {
        lines.remove(last);
        return lines;
    }

    if let Some(signoff) = last_non_blank(&lines[..last])
        && is_signoff_line(lines[signoff], context.rules)
        && is_name_line(lines[last])
    {
        lines.drain(signoff..=last);
    }
    lines
}

fn strip_author_lines<'a>(lines: Vec<&'a str>, context: &StageContext<'_>) -> Vec<&'a str> {
    let Some(names) = context.author.and_then(author_name_variants) else {
        return lines;
    };
    lines
        .into_iter()
        .filter(|line| !is_author_name_line(line, &names))
        .collect()
}

fn trim_blank_edges<'a>(lines: Vec<&'a str>, _: &StageContext<'_>) -> Vec<&'a str> {
    let Some(start) = first_non_blank(&lines) else {
        return Vec::new();
    };
    let end = last_non_blank(&lines).unwrap_or(start);
    lines[start..=end].to_vec()
}

fn first_non_blank(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|line| !line.trim().is_empty())
}

fn last_non_blank(lines: &[&str]) -> Option<usize> {
    lines.iter().rposition(|line| !line.trim().is_empty())
}

fn strip_leading_dashes(line: &str) -> &str {
    line.trim().trim_start_matches('-').trim_start()
}

fn strip_quote_marker(line: &str) -> &str {
    line.trim_start_matches('>').trim()
}

fn is_signoff_line(line: &str, rules: &CleanerRules) -> bool {
    let content = strip_leading_dashes(line);
    !content.is_empty() && rules.is_signoff(content)
}

fn is_name_line(line: &str) -> bool {
    let content = strip_leading_dashes(line);
    !content.is_empty() && name_regex().is_match(content)
}

fn is_trailing_date_line(line: &str) -> bool {
    let stripped = line.trim();
    if stripped.is_empty() || stripped.chars().count() > TRAILING_DATE_MAX_CHARS {
        return false;
    }

    let mut parts = stripped.split_whitespace().collect::<Vec<_>>();
    if parts
        .last()
        .is_some_and(|token| rules::TIMEZONE_TOKENS.contains(token))
    {
        parts.pop();
    }
    let candidate = parts.join(" ");

    TRAILING_DATES
        .iter()
        .copied()
        .any(|format| Date::parse(&candidate, format).is_ok())
        || TRAILING_DATE_TIMES
            .iter()
            .copied()
            .any(|format| PrimitiveDateTime::parse(&candidate, format).is_ok())
}

/// Lowercased spellings of the author that count as a self-reference:
/// full name, first name, and first name plus last initial.
fn author_name_variants(author: &str) -> Option<BTreeSet<String>> {
    let base = author.split(" (").next().unwrap_or_default().trim();
    let parts = base.split_whitespace().collect::<Vec<_>>();
    let first = parts.first()?;

    let mut names = BTreeSet::from([base.to_lowercase(), first.to_lowercase()]);
    if parts.len() > 1
        && let Some(initial) = parts.last().and_then(|last| last.chars().next())
    {
        let short = format!("{first} {initial}").to_lowercase();
        names.insert(format!("{short}."));
        names.insert(short);
    }
    Some(names)
}

fn is_author_name_line(line: &str, names: &BTreeSet<String>) -> bool {
    let content = strip_leading_dashes(line);
    if content.is_empty() {
        return false;
    }
    let content = strip_leading_dashes(strip_quote_marker(content));
    names.contains(&content.to_lowercase())
}

fn greeting_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(?:hi|hello|hey)(?:\s+[^,]+)?|dear\s+[^,]+|good (?:morning|afternoon|evening)(?:\s+[^,]+)?)[,!:.]?$",
        )
        .expect("greeting regex should compile")
    })
}

fn name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z.'-]*(?:\s+[A-Za-z][A-Za-z.'-]*){0,3}$")
            .expect("name regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::{
        StageContext, author_name_variants, clean_message_text, cleaning_stage_names,
        default_rules, is_trailing_date_line, split_lines, strip_greeting,
        strip_leading_metadata, strip_signoff,
    };

    fn context() -> StageContext<'static> {
        StageContext {
            rules: default_rules(),
            author: None,
        }
    }

    #[test]
    fn stages_run_in_documented_order() {
        assert_eq!(
            cleaning_stage_names(),
            vec![
                "leading_metadata",
                "greeting",
                "trailing_date",
                "footer",
                "signoff",
                "author_self_reference",
                "blank_edges"
            ]
        );
    }

    #[test]
    fn strips_stacked_reply_metadata_above_the_body() {
        let lines = vec![
            "",
            "Reply from: someone@example.org",
            "Created by reply to comment",
            "The job still fails.",
            "Created by: later line stays",
        ];
        assert_eq!(
            strip_leading_metadata(lines, &context()),
            vec!["", "The job still fails.", "Created by: later line stays"]
        );
    }

    #[test]
    fn greeting_only_removed_from_first_non_blank_line() {
        let lines = vec!["", "Good morning Alice,", "Hi Bob,"];
        assert_eq!(strip_greeting(lines, &context()), vec!["", "Hi Bob,"]);

        let lines = vec!["Hey there, can you help?", "Thanks"];
        assert_eq!(
            strip_greeting(lines.clone(), &context()),
            lines,
            "a greeting followed by more sentence is content"
        );
    }

    #[test]
    fn recognizes_trailing_date_formats() {
        assert!(is_trailing_date_line("2024-05-01"));
        assert!(is_trailing_date_line("2024-05-01 13:22:09 PDT"));
        assert!(is_trailing_date_line("May 1, 2024"));
        assert!(is_trailing_date_line("Sep 14, 2023, 09:30"));
        assert!(is_trailing_date_line("2024-05-01 1:2:3"));
        assert!(is_trailing_date_line("Jan 5, 2024, 10:5"));
        assert!(is_trailing_date_line("September 14, 2023 GMT"));
        assert!(!is_trailing_date_line("2024-13-01"));
        assert!(!is_trailing_date_line("Version 2024-05-01 of the module"));
    }

    #[test]
    fn signoff_without_name_is_removed_alone() {
        let lines = vec!["Please retry.", "", "-- Cheers!"];
        assert_eq!(strip_signoff(lines, &context()), vec!["Please retry.", ""]);
    }

    #[test]
    fn signoff_followed_by_name_is_removed_with_the_name() {
        let lines = vec!["Please retry.", "Kind regards,", "", "Jane Q. Doe", ""];
        assert_eq!(strip_signoff(lines, &context()), vec!["Please retry.", ""]);
    }

    #[test]
    fn name_without_signoff_is_kept() {
        let lines = vec!["Please retry.", "Jane Doe"];
        assert_eq!(strip_signoff(lines.clone(), &context()), lines);
    }

    #[test]
    fn author_variants_cover_initial_forms() {
        let names = author_name_variants("Jane Doe (Staff work notes)").expect("names");
        assert!(names.contains("jane doe"));
        assert!(names.contains("jane"));
        assert!(names.contains("jane d"));
        assert!(names.contains("jane d."));
        assert!(author_name_variants("  ").is_none());
    }

    #[test]
    fn cleans_the_reference_example() {
        let cleaned = clean_message_text(
            "Hi John,\nThe disk is full.\nBest,\nJohn Smith",
            Some("John Smith"),
        );
        assert_eq!(cleaned, "The disk is full.");
    }

    #[test]
    fn quoted_author_lines_are_removed() {
        let cleaned = clean_message_text(
            "Thanks, the quota was raised.\n> -- Jane D.\nLet us know.",
            Some("Jane Doe"),
        );
        assert_eq!(cleaned, "Thanks, the quota was raised.\nLet us know.");
    }

    #[test]
    fn crlf_bodies_are_split_into_lines() {
        let cleaned = clean_message_text("Hello,\r\nLogin fails on perlmutter.\r\n", None);
        assert_eq!(cleaned, "Login fails on perlmutter.");
    }

    #[test]
    fn every_line_boundary_splits_lines() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(
            split_lines("a\u{0c}b\u{2028}c\u{85}d\n"),
            vec!["a", "b", "c", "d"]
        );
        assert_eq!(split_lines("a\n\nb\r\n\r\n"), vec!["a", "", "b", ""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn lone_carriage_return_does_not_join_a_name_to_the_signoff() {
        let cleaned = clean_message_text("Please check.\ncheers,\nx\ry", None);
        assert_eq!(cleaned, "Please check.\ncheers,\nx\ny");
    }
}
