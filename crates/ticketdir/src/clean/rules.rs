use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

/// Reply metadata prefixes, compared against the lowercased first line.
pub const METADATA_PREFIXES: &[&str] = &[
    "reply from:",
    "created by:",
    "created by reply",
    "updated by reply",
];

pub const TIMEZONE_TOKENS: &[&str] = &["PDT", "PST", "UTC", "GMT"];

/// Footer lines appended by the support desk. Each pattern must match the
/// whole line once quote markers and surrounding whitespace are removed.
pub const DEFAULT_FOOTER_PATTERNS: &[&str] = &[
    r"nersc account and allocation support\.?",
    r"nersc account & allocations support\.?",
    r"nersc consulting(\s*\|{1,2}\s*user engagement group\s*\(ueg\))?\.?",
    r"nersc account support:?\s*",
    r"nersc account support:\s*accounts@nersc\.gov\.?",
    r"accounts@nersc\.gov\.?",
];

pub const DEFAULT_SIGNOFF_PHRASES: &[&str] = &[
    "best",
    "regards",
    "cordially",
    "thanks",
    "thank you",
    "kind regards",
    "best regards",
    "warm regards",
    "best wishes",
    "many thanks",
    "sincerely",
    "cheers",
];

/// Extra cleaner rules read from a JSON file. Entries extend the built-in
/// lists; they never replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesFile {
    pub footer_patterns: Vec<String>,
    pub signoff_phrases: Vec<String>,
}

/// Pattern data driving the text cleaner.
#[derive(Debug, Clone)]
pub struct CleanerRules {
    footers: Vec<Regex>,
    signoff: Regex,
    signoff_phrases: Vec<String>,
}

impl Default for CleanerRules {
    fn default() -> Self {
        Self::with_extensions(&RulesFile::default()).expect("built-in cleaner rules should compile")
    }
}

impl CleanerRules {
    pub fn with_extensions(extra: &RulesFile) -> Result<Self> {
        let footers = DEFAULT_FOOTER_PATTERNS
            .iter()
            .copied()
            .chain(extra.footer_patterns.iter().map(String::as_str))
            .map(|pattern| {
                Regex::new(&format!("(?i)^(?:{pattern})$"))
                    .with_context(|| format!("invalid footer pattern `{pattern}`"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut signoff_phrases = DEFAULT_SIGNOFF_PHRASES
            .iter()
            .map(|phrase| (*phrase).to_string())
            .collect::<Vec<_>>();
        for phrase in &extra.signoff_phrases {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !signoff_phrases.contains(&phrase) {
                signoff_phrases.push(phrase);
            }
        }
        let alternation = signoff_phrases
            .iter()
            .map(|phrase| regex::escape(phrase))
            .collect::<Vec<_>>()
            .join("|");
        let signoff = Regex::new(&format!(r"(?i)^(?:{alternation})[,.!]?$"))
            .context("failed to compile signoff phrases")?;

        Ok(Self {
            footers,
            signoff,
            signoff_phrases,
        })
    }

    /// Built-in rules extended by the JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cleaner rules: {}", path.display()))?;
        let extra: RulesFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse cleaner rules: {}", path.display()))?;
        Self::with_extensions(&extra)
    }

    #[must_use]
    pub fn footer_count(&self) -> usize {
        self.footers.len()
    }

    #[must_use]
    pub fn signoff_phrases(&self) -> &[String] {
        &self.signoff_phrases
    }

    /// `content` is the line with quote markers and whitespace removed.
    #[must_use]
    pub fn is_footer(&self, content: &str) -> bool {
        self.footers.iter().any(|regex| regex.is_match(content))
    }

    /// `content` is the line with leading dashes and whitespace removed.
    #[must_use]
    pub fn is_signoff(&self, content: &str) -> bool {
        self.signoff.is_match(content)
    }
}

/// Process-wide built-in rules.
#[must_use]
pub fn default_rules() -> &'static CleanerRules {
    static RULES: OnceLock<CleanerRules> = OnceLock::new();
    RULES.get_or_init(CleanerRules::default)
}
