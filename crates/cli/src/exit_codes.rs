//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3-9     | edit             | Cell edit outcomes (`set`, `validate`)   |
//! | 10-19   | load / config    | Lead API load and settings codes         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use leadgrid_engine::EditRefusal;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Edit (3-9)
// =============================================================================

/// Value failed format validation (email/phone). Nothing was sent.
pub const EXIT_VALIDATION: u8 = 3;

/// Cell cannot be edited: locked, integration-sourced or read-only field.
pub const EXIT_NOT_EDITABLE: u8 = 4;

/// Server rejected the PATCH or the request failed.
pub const EXIT_SAVE_FAILED: u8 = 5;

/// PATCH did not complete in time.
pub const EXIT_SAVE_TIMEOUT: u8 = 6;

/// Lead or field does not exist on the loaded page.
pub const EXIT_UNKNOWN_CELL: u8 = 7;

// =============================================================================
// Load / config (10-19)
// =============================================================================

/// Fields or leads could not be loaded (network, HTTP error, bad payload).
pub const EXIT_LOAD: u8 = 10;

/// Settings file could not be read or parsed.
pub const EXIT_CONFIG: u8 = 11;

/// Map an edit refusal to its exit code.
pub fn refusal_exit_code(refusal: &EditRefusal) -> u8 {
    match refusal {
        EditRefusal::UnknownLead | EditRefusal::UnknownField => EXIT_UNKNOWN_CELL,
        EditRefusal::FieldReadOnly
        | EditRefusal::Locked
        | EditRefusal::IntegrationSource => EXIT_NOT_EDITABLE,
    }
}
