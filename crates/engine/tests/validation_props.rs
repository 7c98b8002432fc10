// Property-based tests for inline cell validation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use leadgrid_engine::validation::{is_valid_email, is_valid_phone, validate};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Field key containing "email" in any case. Affixes avoid spelling "phone".
fn arb_email_key() -> impl Strategy<Value = String> {
    (
        r"[a-d_]{0,5}",
        prop_oneof![Just("email"), Just("Email"), Just("EMAIL"), Just("eMaIl")],
        r"[a-d_]{0,5}",
    )
        .prop_map(|(pre, word, post)| format!("{}{}{}", pre, word, post))
}

fn arb_phone_key() -> impl Strategy<Value = String> {
    (
        r"[a-d_]{0,5}",
        prop_oneof![Just("phone"), Just("Phone"), Just("PHONE")],
        r"[a-d_]{0,5}",
    )
        .prop_map(|(pre, word, post)| format!("{}{}{}", pre, word, post))
}

fn arb_well_formed_email() -> impl Strategy<Value = String> {
    r"[a-z0-9._%+-]{1,12}@[a-z0-9-]{1,10}(\.[a-z]{2,6}){1,2}"
}

fn arb_well_formed_phone() -> impl Strategy<Value = String> {
    prop_oneof![
        r"\+?[0-9]{7,15}",
        r"\+?[0-9]{1,3} \([0-9]{3}\) [0-9]{3}-[0-9]{4}",
        r"[0-9]{3}\.[0-9]{3}\.[0-9]{4}",
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn email_fields_accept_well_formed(key in arb_email_key(), email in arb_well_formed_email()) {
        prop_assert!(is_valid_email(&email));
        prop_assert!(validate(&key, &email).is_valid());
    }

    #[test]
    fn email_fields_reject_without_at(key in arb_email_key(), text in r"[a-z0-9. ]{1,20}") {
        let result = validate(&key, &text);
        prop_assert_eq!(result.message(), Some("Invalid email"));
    }

    #[test]
    fn email_fields_reject_missing_domain_dot(key in arb_email_key(), local in r"[a-z]{1,8}", host in r"[a-z]{1,8}") {
        let candidate = format!("{}@{}", local, host);
        prop_assert!(validate(&key, &candidate).is_invalid());
    }

    #[test]
    fn email_validation_matches_predicate(key in arb_email_key(), text in r"[a-z@. ]{1,16}") {
        prop_assert_eq!(validate(&key, &text).is_valid(), is_valid_email(&text));
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn phone_fields_accept_well_formed(key in arb_phone_key(), phone in arb_well_formed_phone()) {
        prop_assert!(is_valid_phone(&phone));
        prop_assert!(validate(&key, &phone).is_valid());
    }

    #[test]
    fn phone_fields_reject_letters(key in arb_phone_key(), head in r"[0-9]{7,10}", letter in r"[a-zA-Z]", tail in r"[0-9]{0,3}") {
        let candidate = format!("{}{}{}", head, letter, tail);
        let result = validate(&key, &candidate);
        prop_assert_eq!(result.message(), Some("Invalid phone"));
    }

    #[test]
    fn phone_fields_reject_digit_counts_out_of_range(key in arb_phone_key(), short in r"[0-9]{1,6}", long in r"[0-9]{16,24}") {
        prop_assert!(validate(&key, &short).is_invalid());
        prop_assert!(validate(&key, &long).is_invalid());
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn empty_input_is_always_valid(key in r"[a-zA-Z_]{0,16}") {
        prop_assert!(validate(&key, "").is_valid());
    }

    #[test]
    fn unrelated_fields_accept_anything(key in r"[a-d_]{1,12}", text in ".{0,40}") {
        prop_assert!(validate(&key, &text).is_valid());
    }

    #[test]
    fn validation_is_deterministic(key in r"[a-z_]{0,12}", text in ".{0,24}") {
        prop_assert_eq!(validate(&key, &text), validate(&key, &text));
    }
}

#[test]
fn phone_message_wins_when_both_rules_fail() {
    let result = validate("email_or_phone", "not valid");
    assert_eq!(result.message(), Some("Invalid phone"));
}

#[test]
fn email_rule_alone_fails_on_combined_key() {
    // Valid phone, invalid email
    let result = validate("email_or_phone", "555 123 4567");
    assert_eq!(result.message(), Some("Invalid email"));
}
