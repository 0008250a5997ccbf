//! Session identifiers.
//!
//! One identifier per login. It is stored on the user row (overwriting the
//! previous one) and embedded in the bearer token as `jti`; a token is only
//! honoured while the two match.

use rand::{RngCore, rngs::OsRng};

/// Entropy of a session identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Mint a fresh session identifier: 32 bytes from the OS CSPRNG, hex-encoded.
pub fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether a stored session identifier authorizes a token carrying `jti`.
///
/// An absent stored identifier (logged out) never matches.
pub fn session_matches(stored: Option<&str>, jti: &str) -> bool {
    match stored {
        Some(current) => !current.is_empty() && current == jti,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_64_hex_chars() {
        let id = new_session_id();
        assert_eq!(id.len(), SESSION_ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<String> = (0..256).map(|_| new_session_id()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn cleared_or_overwritten_sessions_do_not_match() {
        let first = new_session_id();
        let second = new_session_id();
        assert!(session_matches(Some(&first), &first));
        assert!(!session_matches(Some(&second), &first));
        assert!(!session_matches(None, &first));
        assert!(!session_matches(Some(""), ""));
    }
}
