//! Non-fatal problems found while reading a JSONL file.

use std::fmt;

/// A line that was skipped during a resilient read.
///
/// Line numbers are 1-based and count every physical line, blank ones
/// included, so they match what an editor shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The line was not valid JSON for the expected record type.
    MalformedJson {
        /// The 1-based line number.
        line_number: usize,
        /// The decoder's message.
        error: String,
    },

    /// The line was skipped before decoding (for example, invalid UTF-8).
    SkippedLine {
        /// The 1-based line number.
        line_number: usize,
        /// Why the line was skipped.
        reason: String,
    },
}

impl Warning {
    /// Returns the line number associated with this warning.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::MalformedJson { line_number, .. } | Self::SkippedLine { line_number, .. } => {
                *line_number
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON: {error}")
            }
            Self::SkippedLine {
                line_number,
                reason,
            } => write!(f, "line {line_number}: skipped: {reason}"),
        }
    }
}

impl std::error::Error for Warning {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_number() {
        let warning = Warning::MalformedJson {
            line_number: 5,
            error: "unexpected end of input".to_string(),
        };
        let text = warning.to_string();
        assert!(text.contains("line 5"));
        assert!(text.contains("unexpected end of input"));
        assert_eq!(warning.line_number(), 5);
    }
}
