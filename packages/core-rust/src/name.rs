//! Name validation for Things and interactions.
//!
//! A safe name is non-empty and made only of ASCII letters, digits, hyphens
//! and underscores. Lookups also accept the URL-safe form produced by
//! [`url_name`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ThingError;

static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("safe-name pattern compiles"));

/// Returns `true` if `name` is a safe name.
#[must_use]
pub fn is_safe_name(name: &str) -> bool {
    SAFE_NAME.is_match(name)
}

/// Trims surrounding whitespace and validates the result.
///
/// # Errors
///
/// Returns [`ThingError::InvalidName`] if the trimmed name is empty or
/// contains characters outside the safe set.
pub fn clean_name(name: &str) -> Result<String, ThingError> {
    let trimmed = name.trim();
    if is_safe_name(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ThingError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// URL-safe form of a safe name: lower-case with `_` replaced by `-`.
#[must_use]
pub fn url_name(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn accepts_letters_digits_hyphen_underscore() {
        assert!(is_safe_name("temperature_01-a"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("has space"));
        assert!(!is_safe_name("dotted.name"));
        assert!(!is_safe_name("ünïcode"));
    }

    #[test]
    fn clean_name_trims_before_validating() {
        assert_eq!(clean_name("  lamp ").unwrap(), "lamp");
    }

    #[test]
    fn clean_name_rejects_blank() {
        let err = clean_name("   ").unwrap_err();
        assert!(matches!(err, ThingError::InvalidName { .. }));
    }

    #[test]
    fn url_name_lowercases_and_hyphenates() {
        assert_eq!(url_name("Living_Room-Lamp"), "living-room-lamp");
    }

    proptest! {
        #[test]
        fn safe_names_stay_safe_in_url_form(name in "[a-zA-Z0-9_-]{1,24}") {
            prop_assert!(is_safe_name(&name));
            let url = url_name(&name);
            prop_assert!(is_safe_name(&url));
            prop_assert_eq!(url_name(&url), url.clone());
        }

        #[test]
        fn clean_name_rejects_any_unsafe_character(
            prefix in "[a-z]{1,4}",
            bad in "[ ./:?#@!]",
            suffix in "[a-z]{1,4}",
        ) {
            let name = format!("{prefix}{bad}{suffix}");
            prop_assert!(clean_name(&name).is_err());
        }
    }
}
