use regex::Regex;

use crate::error::{MapeError, Result};

/// Compile `pattern` so that it only matches whole strings
pub fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| MapeError::invalid_pattern(pattern, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_regex_anchors_both_ends() {
        let re = full_match_regex("/host1/.*").unwrap();
        assert!(re.is_match("/host1/cpu0"));
        assert!(!re.is_match("/other/host1/cpu0"));

        let re = full_match_regex("res1").unwrap();
        assert!(re.is_match("res1"));
        assert!(!re.is_match("res10"));
    }

    #[test]
    fn test_full_match_regex_alternation_is_grouped() {
        let re = full_match_regex("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = full_match_regex("(unclosed").unwrap_err();
        assert!(matches!(err, MapeError::InvalidPattern { .. }));
    }
}
