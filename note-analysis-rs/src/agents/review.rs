//! Review verdict parsing

use serde::{Deserialize, Serialize};

/// Outcome of one review call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub passed: bool,
    /// Text after the verdict line, trimmed; may be empty
    pub feedback: String,
    /// Full reviewer output as streamed
    pub raw: String,
}

/// Parse a reviewer response
///
/// The verdict passes iff the trimmed output starts with `PASS`
/// (case-sensitive). Anything else, including an empty response or a
/// lowercase `pass`, is a failure.
pub fn parse_verdict(raw: &str) -> ReviewVerdict {
    let trimmed = raw.trim();
    let passed = trimmed.starts_with("PASS");
    let feedback = trimmed
        .lines()
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    ReviewVerdict {
        passed,
        feedback,
        raw: raw.to_string(),
    }
}
