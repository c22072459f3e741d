use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning one incident record into a ticket folder.
///
/// Every variant is local to a single incident; callers decide whether to
/// abort the run or log and continue.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("missing required value: {0}")]
    MissingField(String),

    #[error("unparseable timestamp `{value}`: {detail}")]
    Parse { value: String, detail: String },

    #[error("invalid record shape: {0}")]
    InvalidShape(String),

    #[error("attachment content is not valid base64 for key `{key}`")]
    InvalidEncoding { key: String },

    #[error("attachment content is missing")]
    MissingAttachmentContent,

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TicketError {
    /// Stable identifier for log lines and run summaries.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::Parse { .. } => "parse",
            Self::InvalidShape(_) => "invalid_shape",
            Self::InvalidEncoding { .. } => "invalid_encoding",
            Self::MissingAttachmentContent => "missing_attachment_content",
            Self::Io { .. } => "io",
            Self::Json { .. } => "json",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape(detail: impl Into<String>) -> Self {
        Self::InvalidShape(detail.into())
    }
}

pub type TicketResult<T> = Result<T, TicketError>;
