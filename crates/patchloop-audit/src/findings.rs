use serde::{Deserialize, Serialize};
use tracing::debug;

/// Exact reply a scanner gives when it finds nothing exploitable
pub const NO_ISSUES_SENTINEL: &str = "PASS";

/// The scanner's verdict on one version of the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "description", rename_all = "snake_case")]
pub enum ScanResult {
    /// Nothing to fix, stop the loop
    NoIssues,
    /// Issues found, described as returned by the scanner
    Issues(String),
}

impl ScanResult {
    /// Interpret a raw scanner reply.
    ///
    /// The reply is trimmed and compared case-sensitively against
    /// [`NO_ISSUES_SENTINEL`]. Anything else non-empty is a findings report.
    /// Returns `None` for an empty reply.
    pub fn from_response(response: &str) -> Option<Self> {
        let trimmed = response.trim();
        debug!(response_len = trimmed.len(), "Parsing scanner reply");

        if trimmed.is_empty() {
            None
        } else if trimmed == NO_ISSUES_SENTINEL {
            Some(ScanResult::NoIssues)
        } else {
            Some(ScanResult::Issues(trimmed.to_string()))
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, ScanResult::NoIssues)
    }

    pub fn issues(&self) -> Option<&str> {
        match self {
            ScanResult::NoIssues => None,
            ScanResult::Issues(description) => Some(description),
        }
    }

    /// Short description of the verdict for logging
    pub fn short_description(&self) -> String {
        match self {
            ScanResult::NoIssues => "PASS".to_string(),
            ScanResult::Issues(description) => {
                format!("ISSUES ({})", preview(description, 100))
            }
        }
    }
}

/// First `max_chars` characters of `text` on a single line, with an
/// ellipsis when shortened
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_with_surrounding_whitespace_is_clean() {
        assert_eq!(
            ScanResult::from_response("\n  PASS \n"),
            Some(ScanResult::NoIssues)
        );
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        assert_eq!(
            ScanResult::from_response("pass"),
            Some(ScanResult::Issues("pass".to_string()))
        );
    }

    #[test]
    fn test_sentinel_must_be_the_whole_reply() {
        let result = ScanResult::from_response("PASS, but line 3 has eval()").unwrap();
        assert!(!result.is_clean());
        assert_eq!(result.issues(), Some("PASS, but line 3 has eval()"));
    }

    #[test]
    fn test_empty_reply_is_not_a_verdict() {
        assert_eq!(ScanResult::from_response("   \n"), None);
    }

    #[test]
    fn test_short_description_truncates() {
        let long = "SQL injection in login(): ".repeat(10);
        let description = ScanResult::Issues(long).short_description();
        assert!(description.starts_with("ISSUES (SQL injection"));
        assert!(description.ends_with("...)"));
    }

    #[test]
    fn test_preview_flattens_whitespace() {
        assert_eq!(preview("a\n\n  b\tc", 10), "a b c");
        assert_eq!(preview("漏洞漏洞漏洞", 2), "漏洞...");
    }
}
