// src/runloop/markers.rs

//! Which lines are worth printing when output is not verbose.

use regex::RegexSet;

use crate::errors::{CirunError, Result};

/// Substrings that always make a line important.
pub const IMPORTANT_MARKERS: [&str; 6] = [
    "FAILED",
    "ERROR",
    "Crash",
    "Running test:",
    "Test passed",
    "Test FAILED",
];

/// Fixed marker set plus optional user-supplied regexes.
#[derive(Debug, Clone, Default)]
pub struct ImportanceFilter {
    extra: Option<RegexSet>,
}

impl ImportanceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extra patterns (regex syntax) on top of the fixed markers.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let set = RegexSet::new(&patterns)
            .map_err(|e| CirunError::Config(format!("invalid output marker pattern: {e}")))?;
        Ok(Self { extra: Some(set) })
    }

    pub fn is_important(&self, line: &str) -> bool {
        IMPORTANT_MARKERS.iter().any(|m| line.contains(m))
            || self.extra.as_ref().is_some_and(|set| set.is_match(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_markers_match_anywhere_in_line() {
        let f = ImportanceFilter::new();
        assert!(f.is_important("[  3/40] Running test: test_color"));
        assert!(f.is_important("Test FAILED: test_rgb"));
        assert!(f.is_important("fatal ERROR in linker"));
        assert!(f.is_important("Crash detected"));
        assert!(!f.is_important("compiling foo.cpp"));
        // Markers are case sensitive.
        assert!(!f.is_important("error: lowercase"));
    }

    #[test]
    fn extra_patterns_extend_the_set() {
        let f = ImportanceFilter::with_patterns(["^warning:", "panicked at"]).unwrap();
        assert!(f.is_important("warning: unused variable"));
        assert!(f.is_important("thread 'main' panicked at src/x.rs"));
        assert!(!f.is_important("note: warning: not at start"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = ImportanceFilter::with_patterns(["(unclosed"]).unwrap_err();
        assert!(matches!(err, CirunError::Config(_)));
    }
}
