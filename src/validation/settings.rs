use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::device::EmergencyContact;

/// Maximum number of emergency contacts per device.
pub const MAX_EMERGENCY_CONTACTS: usize = 3;

/// Checks a phone number against the wearable's accepted format:
/// an optional leading `+` followed by at least 10 digits, whitespace,
/// hyphens, or parentheses.
pub fn is_valid_phone(phone: &str) -> bool {
    let rest = phone.strip_prefix('+').unwrap_or(phone);
    rest.chars().count() >= 10
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '-' || c == '(' || c == ')')
}

/// Validates an emergency contact list: at most three entries, each with
/// a non-empty name and a well-formed phone number.
pub fn validate_emergency_contacts(contacts: &[EmergencyContact]) -> Result<()> {
    if contacts.len() > MAX_EMERGENCY_CONTACTS {
        return Err(AppError::Validation(
            "Maximum 3 emergency contacts allowed".to_string(),
        ));
    }

    for contact in contacts {
        if contact.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Each contact must have name and phone".to_string(),
            ));
        }
        if !is_valid_phone(&contact.phone) {
            return Err(AppError::Validation(format!(
                "Invalid phone number: {}",
                contact.phone
            )));
        }
    }

    Ok(())
}

/// Validates a trigger word list: every word non-empty, already trimmed,
/// and unique within the submitted set (case-sensitive, as entered).
pub fn validate_trigger_words(words: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for word in words {
        if word.trim().is_empty() {
            return Err(AppError::Validation(
                "Trigger word cannot be empty".to_string(),
            ));
        }
        if word.trim() != word {
            return Err(AppError::Validation(format!(
                "Trigger word has surrounding whitespace: {:?}",
                word
            )));
        }
        if !seen.insert(word.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate trigger word: {}",
                word
            )));
        }
    }
    Ok(())
}

/// Full pre-flight check for a settings submission. Runs before any
/// network call; validation failures never reach the wire.
pub fn validate_device_settings(
    contacts: &[EmergencyContact],
    words: &[String],
) -> Result<()> {
    validate_emergency_contacts(contacts)?;
    validate_trigger_words(words)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, phone: &str) -> EmergencyContact {
        EmergencyContact {
            name: name.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn accepts_international_phone_with_whitespace() {
        assert!(is_valid_phone("+91 93100 22664"));
        assert!(is_valid_phone("(011) 2345-6789"));
        assert!(is_valid_phone("+91\t93100\t22664"));
    }

    #[test]
    fn rejects_short_or_malformed_phones() {
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call-me-maybe"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn rejects_fourth_contact() {
        let contacts = vec![
            contact("A", "+91 93100 22664"),
            contact("B", "0123456789"),
            contact("C", "0123456788"),
            contact("D", "0123456787"),
        ];
        assert!(validate_emergency_contacts(&contacts).is_err());
        assert!(validate_emergency_contacts(&contacts[..3]).is_ok());
    }

    #[test]
    fn rejects_contact_without_name() {
        let contacts = vec![contact("  ", "0123456789")];
        assert!(validate_emergency_contacts(&contacts).is_err());
    }

    #[test]
    fn rejects_duplicate_trigger_words() {
        let words = vec!["help".to_string(), "sos".to_string(), "help".to_string()];
        let err = validate_trigger_words(&words).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn trigger_word_case_matters() {
        let words = vec!["help".to_string(), "Help".to_string()];
        assert!(validate_trigger_words(&words).is_ok());
    }

    #[test]
    fn rejects_empty_and_untrimmed_words() {
        assert!(validate_trigger_words(&[" ".to_string()]).is_err());
        assert!(validate_trigger_words(&[" help".to_string()]).is_err());
        assert!(validate_trigger_words(&["help".to_string()]).is_ok());
    }
}
