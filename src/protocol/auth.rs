//! Challenge-response authentication
//!
//! When varnishd is started with a secret file (`-S`), the first frame on a
//! new admin connection carries status 107 and a challenge token. The client
//! answers with:
//!
//! ```text
//! auth hex(SHA-256(challenge ∥ "\n" ∥ secret ∥ challenge ∥ "\n"))
//! ```
//!
//! The secret is used byte-for-byte; a trailing newline in a secret file is
//! part of the secret.

use sha2::{Digest, Sha256};

use crate::error::{AdminError, Result};

/// Length of the challenge token at the start of a 107 body
pub const CHALLENGE_LEN: usize = 32;

/// Extract the challenge token from the body of a 107 response
pub fn challenge(body: &[u8]) -> Result<&[u8]> {
    body.get(..CHALLENGE_LEN).ok_or_else(|| {
        AdminError::Protocol(format!(
            "authentication challenge too short: {} bytes (need {})",
            body.len(),
            CHALLENGE_LEN
        ))
    })
}

/// Compute the lowercase hex credential for a challenge and shared secret
pub fn credential(challenge: &[u8], secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(b"\n");
    hasher.update(secret);
    hasher.update(challenge);
    hasher.update(b"\n");
    format!("{:x}", hasher.finalize())
}

/// Build the `auth` command line for a credential
pub fn auth_command(credential: &str) -> String {
    format!("auth {}", credential)
}
