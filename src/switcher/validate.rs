//! Thread id validation for the VALIDATING step of a switch.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SwitchError;

const MAX_THREAD_ID_LEN: usize = 128;

static THREAD_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").expect("Invalid thread id regex"));

/// Check that `thread_id` is well-formed.
///
/// Ids are 1 to 128 characters of ASCII letters, digits, `_`, `-`, `.` and
/// `:`, starting with a letter or digit.
pub fn validate_thread_id(thread_id: &str) -> Result<(), SwitchError> {
    let invalid = |reason: &str| SwitchError::InvalidThreadId {
        thread_id: thread_id.to_string(),
        reason: reason.to_string(),
    };

    if thread_id.trim().is_empty() {
        return Err(invalid("thread id is empty"));
    }
    if thread_id.len() > MAX_THREAD_ID_LEN {
        return Err(invalid("thread id is too long"));
    }
    if !THREAD_ID_REGEX.is_match(thread_id) {
        return Err(invalid("thread id contains invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_id_shapes() {
        for id in ["t1", "thread-42", "8f14e45f-ceea-467f-a8c6-7e1f1b2d0c11", "conv:2024.01_a"] {
            assert!(validate_thread_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert!(validate_thread_id("").is_err());
        assert!(validate_thread_id("   ").is_err());
    }

    #[test]
    fn test_rejects_bad_characters() {
        for id in ["-leading", "has space", "slash/inside", "ünicode"] {
            let err = validate_thread_id(id).unwrap_err();
            assert_eq!(err.error_code(), "SWITCH_INVALID_THREAD_ID");
        }
    }

    #[test]
    fn test_rejects_overlong_id() {
        let id = "a".repeat(MAX_THREAD_ID_LEN + 1);
        assert!(validate_thread_id(&id).is_err());
        assert!(validate_thread_id(&"a".repeat(MAX_THREAD_ID_LEN)).is_ok());
    }
}
