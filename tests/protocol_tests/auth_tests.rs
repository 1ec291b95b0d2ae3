//! Auth Tests
//!
//! Tests for challenge extraction and credential computation.

use varnish_admin::protocol::auth::{auth_command, challenge, credential, CHALLENGE_LEN};
use varnish_admin::AdminError;

const TOKEN: &[u8] = b"ixslvvxrgkjptxmcgnnsdxsvdmvfympg";

// =============================================================================
// Challenge Tests
// =============================================================================

#[test]
fn test_challenge_is_first_32_bytes() {
    let body = b"ixslvvxrgkjptxmcgnnsdxsvdmvfympg\n\nAuthentication required.\n";
    assert_eq!(challenge(body).unwrap(), TOKEN);
    assert_eq!(CHALLENGE_LEN, 32);
}

#[test]
fn test_short_challenge_rejected() {
    let err = challenge(b"too short").unwrap_err();
    assert!(matches!(err, AdminError::Protocol(_)));
}

// =============================================================================
// Credential Tests
// =============================================================================

#[test]
fn test_credential_known_value() {
    assert_eq!(
        credential(TOKEN, b"foo\n"),
        "455ce847f0073c7ab3b1465f74507b75d3dc064c1e7de3b71e00de9092fdc89a"
    );
}

#[test]
fn test_trailing_newline_in_secret_is_significant() {
    let with_newline = credential(TOKEN, b"foo\n");
    let without = credential(TOKEN, b"foo");

    assert_ne!(with_newline, without);
    assert_eq!(
        without,
        "e25ecdc848ed5672b765afd8c2dab7259b9856ea265fbc60bea2e9b6ed8d79a3"
    );
}

#[test]
fn test_credential_is_lowercase_hex() {
    let value = credential(TOKEN, b"secret");
    assert_eq!(value.len(), 64);
    assert!(value.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn test_auth_command_format() {
    assert_eq!(auth_command("abc123"), "auth abc123");
}
