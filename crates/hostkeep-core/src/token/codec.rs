//! Raw token string codec: `stk_<token_id>_<secret>`

use rand::{rngs::OsRng, Rng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// Fixed prefix of every raw token
pub const TOKEN_PREFIX: &str = "stk";

const SEPARATOR: char = '_';

/// Length of a generated token ID
pub const TOKEN_ID_LEN: usize = 16;
/// Random bytes behind a generated secret
pub const SECRET_BYTES: usize = 32;

// RFC 4648 base32, lowercased
const TOKEN_ID_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// A raw token split into its public ID and its secret
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ParsedToken {
    token_id: String,
    secret: String,
}

impl ParsedToken {
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// The bearer secret (use carefully)
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ParsedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedToken")
            .field("token_id", &self.token_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Build the raw token string handed to automation
pub fn encode(token_id: &str, secret: &str) -> String {
    format!("{TOKEN_PREFIX}{SEPARATOR}{token_id}{SEPARATOR}{secret}")
}

/// Split a raw token. Anything but `stk_<id>_<secret>` with non-empty parts
/// is rejected.
pub fn parse(raw: &str) -> Result<ParsedToken> {
    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    if parts.len() != 3 || parts[0] != TOKEN_PREFIX {
        return Err(VaultError::InvalidTokenFormat);
    }

    let (token_id, secret) = (parts[1], parts[2]);
    if token_id.is_empty() || secret.is_empty() {
        return Err(VaultError::InvalidTokenFormat);
    }

    Ok(ParsedToken {
        token_id: token_id.to_string(),
        secret: secret.to_string(),
    })
}

/// Whether `token_id` can be embedded in a raw token
pub fn is_valid_token_id(token_id: &str) -> bool {
    !token_id.is_empty() && !token_id.contains(SEPARATOR)
}

/// Generate a fresh public token ID
pub fn generate_token_id() -> String {
    let mut rng = OsRng;
    (0..TOKEN_ID_LEN)
        .map(|_| TOKEN_ID_ALPHABET[rng.gen_range(0..TOKEN_ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate a fresh token secret (hex, so it never contains the separator)
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);
    bytes.zeroize();
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_parse() {
        let raw = encode("abcd2345", "deadbeef");
        assert_eq!(raw, "stk_abcd2345_deadbeef");

        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.token_id(), "abcd2345");
        assert_eq!(parsed.secret(), "deadbeef");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for raw in [
            "",
            "stk",
            "stk_id",
            "stk__secret",
            "stk_id_",
            "tok_id_secret",
            "STK_id_secret",
            "stk_id_sec_ret",
            "_stk_id_secret",
        ] {
            assert!(
                matches!(parse(raw), Err(VaultError::InvalidTokenFormat)),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn test_generated_parts_are_separator_free() {
        for _ in 0..64 {
            let id = generate_token_id();
            let secret = generate_secret();

            assert_eq!(id.len(), TOKEN_ID_LEN);
            assert!(is_valid_token_id(&id));
            assert_eq!(secret.len(), SECRET_BYTES * 2);
            assert!(!secret.contains('_'));
            assert!(parse(&encode(&id, &secret)).is_ok());
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let parsed = parse("stk_abc_topsecret").unwrap();
        let debug = format!("{:?}", parsed);
        assert!(debug.contains("abc"));
        assert!(!debug.contains("topsecret"));
    }
}
