/// Book status definitions used to route records between crawl passes
use std::fmt;

/// Coarse status of a stored book, derived from its error and end flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookStatus {
    /// Last probe failed; the book is picked up by re-examine passes
    Error,

    /// Book is healthy and still being published
    InProgress,

    /// Book is healthy and the story is complete
    End,
}

impl BookStatus {
    /// Returns true if the book needs to be re-examined
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Converts the status to its string form (CLI and logs)
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::InProgress => "in_progress",
            Self::End => "end",
        }
    }

    /// Parses a status from its string form
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Self::Error),
            "in_progress" => Some(Self::InProgress),
            "end" => Some(Self::End),
            _ => None,
        }
    }

    pub fn all_statuses() -> [Self; 3] {
        [Self::Error, Self::InProgress, Self::End]
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
