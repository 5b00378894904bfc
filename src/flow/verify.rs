//! Error-text verification.
//!
//! Match policy: bidirectional case-insensitive substring containment after
//! whitespace normalization. The portal truncates and re-punctuates the
//! rendered message across builds, so exact equality is deliberately not
//! required.

use crate::error::FlowError;

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when either normalized string contains the other, ignoring case.
pub fn texts_match(expected: &str, actual: &str) -> bool {
    let expected = normalize_ws(expected).to_lowercase();
    let actual = normalize_ws(actual).to_lowercase();
    if expected.is_empty() || actual.is_empty() {
        return expected == actual;
    }
    actual.contains(&expected) || expected.contains(&actual)
}

/// Check the observed error text against the expected one. An empty
/// `expected` disables the assertion.
pub fn assert_error_text(expected: &str, actual: &str) -> Result<(), FlowError> {
    if expected.is_empty() {
        return Ok(());
    }
    if texts_match(expected, actual) {
        Ok(())
    } else {
        Err(FlowError::AssertionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
