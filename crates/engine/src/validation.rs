//! Format validation for inline cell edits
//!
//! Rules are picked from the field key alone: a key containing "email"
//! (case-insensitive) gets the email rule, a key containing "phone" gets the
//! phone rule. A key matching both gets both, checked email first; when both
//! fail the phone message is reported. Every other field accepts anything.
//!
//! An empty candidate always passes so a value can be cleared.
//!
//! Validation is pure: no I/O, no state, and it never panics on any input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Shape of an email address: `local@domain.tld`, no whitespace, one `@`,
/// non-empty dot-separated domain labels.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").unwrap());

/// Characters a phone number may be written with.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").unwrap());

pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;

// ============================================================================
// Rules
// ============================================================================

/// A built-in format rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    Email,
    Phone,
}

impl FormatRule {
    /// Rules that apply to a field, in evaluation order.
    pub fn for_field(field_key: &str) -> Vec<FormatRule> {
        let key = field_key.to_lowercase();
        let mut rules = Vec::new();
        if key.contains("email") {
            rules.push(FormatRule::Email);
        }
        if key.contains("phone") {
            rules.push(FormatRule::Phone);
        }
        rules
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        match self {
            FormatRule::Email => is_valid_email(candidate),
            FormatRule::Phone => is_valid_phone(candidate),
        }
    }

    /// Message shown inline under the editor.
    pub fn message(&self) -> &'static str {
        match self {
            FormatRule::Email => "Invalid email",
            FormatRule::Phone => "Invalid phone",
        }
    }
}

pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub fn is_valid_phone(s: &str) -> bool {
    if !PHONE_RE.is_match(s) {
        return false;
    }
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
}

// ============================================================================
// Validation Result
// ============================================================================

/// Result of validating a candidate value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Input is valid.
    Valid,
    /// Input is invalid.
    Invalid {
        /// The rule that was violated.
        rule: FormatRule,
        /// Human-readable description of why validation failed.
        reason: String,
    },
}

impl ValidationResult {
    /// Returns true if the result is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Returns true if the result is invalid.
    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { reason, .. } => Some(reason),
        }
    }

    pub fn into_error(self) -> Option<String> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { reason, .. } => Some(reason),
        }
    }
}

/// Validate a candidate value for a field.
pub fn validate(field_key: &str, candidate: &str) -> ValidationResult {
    if candidate.is_empty() {
        return ValidationResult::Valid;
    }

    let mut result = ValidationResult::Valid;
    for rule in FormatRule::for_field(field_key) {
        if !rule.accepts(candidate) {
            // Later rules overwrite earlier ones
            result = ValidationResult::Invalid {
                rule,
                reason: rule.message().to_string(),
            };
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_for_field() {
        assert_eq!(FormatRule::for_field("email"), vec![FormatRule::Email]);
        assert_eq!(FormatRule::for_field("Work_EMAIL"), vec![FormatRule::Email]);
        assert_eq!(FormatRule::for_field("mobilePhone"), vec![FormatRule::Phone]);
        assert_eq!(
            FormatRule::for_field("email_or_phone"),
            vec![FormatRule::Email, FormatRule::Phone]
        );
        assert!(FormatRule::for_field("company").is_empty());
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("bad"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@b..com"));
        assert!(!is_valid_email("@b.com"));
    }

    #[test]
    fn test_phone_shapes() {
        assert!(is_valid_phone("+1 (555) 123-4567"));
        assert!(is_valid_phone("555-1234"));
        assert!(is_valid_phone("020.7946.0958"));
        assert!(!is_valid_phone("123"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone("12345678901234567"));
        assert!(!is_valid_phone("555+1234"));
    }

    #[test]
    fn test_validate_messages() {
        assert_eq!(validate("email", "bad").message(), Some("Invalid email"));
        assert_eq!(validate("phone", "bad").message(), Some("Invalid phone"));
        assert!(validate("email", "c@d.com").is_valid());
        assert!(validate("company", "anything at all").is_valid());
    }

    #[test]
    fn test_validate_empty_passes() {
        assert!(validate("email", "").is_valid());
        assert!(validate("phone", "").is_valid());
        assert!(validate("email", " ").is_invalid());
    }

    #[test]
    fn test_phone_message_wins_when_both_fail() {
        let result = validate("email_phone", "nope");
        assert_eq!(
            result,
            ValidationResult::Invalid {
                rule: FormatRule::Phone,
                reason: "Invalid phone".into(),
            }
        );
        // Passing one rule is not enough
        assert_eq!(validate("email_phone", "a@b.com").message(), Some("Invalid phone"));
        assert_eq!(validate("email_phone", "555-1234").message(), Some("Invalid email"));
    }
}
