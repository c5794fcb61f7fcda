//! Donor privacy rules.
//!
//! The only donor-related text that may reach a snapshot is the optional
//! public contact field. Anything ambiguous resolves to the anonymous label,
//! and the real-identity column is never read at all (see
//! [`crate::core::schema::normalize_donations`]).

/// Label shown when a donation has no usable public contact.
pub const DEFAULT_ANONYMOUS_LABEL: &str = "Donante anónimo";

/// Returns true for cells that spreadsheets and CSV exports use to mean
/// "nothing here": empty, whitespace-only, or a literal `nan`/`null`/`none`.
#[must_use]
pub fn is_blank_marker(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
}

/// Resolves the public display name for one donation row.
///
/// The contact text is used verbatim (trimmed) when present and meaningful;
/// every other case yields `anonymous_label`.
#[must_use]
pub fn public_donor(contact: Option<&str>, anonymous_label: &str) -> String {
    match contact {
        Some(text) if !is_blank_marker(text) => text.trim().to_string(),
        _ => anonymous_label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_donor_uses_trimmed_contact() {
        assert_eq!(
            public_donor(Some("  @maria_p  "), DEFAULT_ANONYMOUS_LABEL),
            "@maria_p"
        );
    }

    #[test]
    fn test_public_donor_falls_back_to_label() {
        for cell in [None, Some(""), Some("   "), Some("nan"), Some("NaN"), Some("null")] {
            assert_eq!(
                public_donor(cell, DEFAULT_ANONYMOUS_LABEL),
                DEFAULT_ANONYMOUS_LABEL,
                "cell {cell:?} should be anonymous"
            );
        }
    }

    #[test]
    fn test_public_donor_custom_label() {
        assert_eq!(public_donor(Some(""), "Anonymous"), "Anonymous");
    }

    #[test]
    fn test_blank_marker_keeps_real_text() {
        assert!(!is_blank_marker("Nancy"));
        assert!(!is_blank_marker("0"));
    }
}
