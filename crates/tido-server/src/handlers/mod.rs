//! REST handlers organized by domain.

pub mod auth;
pub mod lists;
pub mod tasks;

use crate::error::ApiError;

/// Trim a text field and enforce the 1..=max character bounds.
/// Violations are client errors; nothing oversized reaches storage.
pub(crate) fn require_text<'a>(
    value: &'a str,
    field: &'static str,
    max: usize,
) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_trims() {
        assert_eq!(require_text("  hello  ", "title", 500).unwrap(), "hello");
    }

    #[test]
    fn require_text_rejects_blank() {
        assert!(require_text("   ", "title", 500).is_err());
    }

    #[test]
    fn require_text_rejects_oversized() {
        let long = "x".repeat(501);
        assert!(require_text(&long, "title", 500).is_err());
        let ok = "x".repeat(500);
        assert!(require_text(&ok, "title", 500).is_ok());
    }
}
