//! Compact reversible identifiers.
//!
//! Every row key in the catalog is a 128-bit random value rendered as a
//! fixed 22-character URL-safe token: the standard base64 form of the 16
//! bytes with `+`/`/` swapped for `-`/`_` and the trailing `==` padding
//! dropped. Encoding and decoding are exact inverses for all valid input.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Length of every encoded token.
pub const TOKEN_LEN: usize = 22;

/// Errors from decoding an identifier token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortIdError {
    #[error("invalid identifier format: {0}")]
    InvalidFormat(String),
}

/// A 128-bit identifier with a 22-character textual form.
///
/// Conversions are explicit: [`ShortId::generate`] mints a fresh random
/// id, [`ShortId::encode`] produces the token, [`ShortId::decode`]
/// validates and reverses it. There are no implicit conversions to or
/// from the raw value or the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortId(Uuid);

impl ShortId {
    /// Mint a fresh random identifier.
    ///
    /// Collision probability is the birthday bound of a 128-bit space and
    /// is not checked.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing 128-bit value.
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// The underlying 128-bit value.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Encode as the 22-character URL-safe token.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    /// Decode a token back into the identifier it encodes.
    ///
    /// Fails if the token is not exactly [`TOKEN_LEN`] characters, uses
    /// characters outside `[A-Za-z0-9_-]`, or does not decode to exactly
    /// 16 bytes.
    pub fn decode(token: &str) -> Result<Self, ShortIdError> {
        if token.len() != TOKEN_LEN {
            return Err(ShortIdError::InvalidFormat(format!(
                "token must be {} characters, got {}",
                TOKEN_LEN,
                token.len()
            )));
        }

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|e| {
            ShortIdError::InvalidFormat(format!("token is not url-safe base64: {e}"))
        })?;

        let uuid = Uuid::from_slice(&bytes).map_err(|_| {
            ShortIdError::InvalidFormat(format!(
                "token decodes to {} bytes, expected 16",
                bytes.len()
            ))
        })?;

        Ok(Self(uuid))
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(token: &str) -> bool {
        token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn encode_is_22_url_safe_chars() {
        for _ in 0..100 {
            let token = ShortId::generate().encode();
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(is_url_safe(&token), "bad token: {token}");
        }
    }

    #[test]
    fn round_trip_both_directions() {
        for _ in 0..100 {
            let id = ShortId::generate();
            let token = id.encode();
            let decoded = ShortId::decode(&token).unwrap();
            assert_eq!(decoded, id);
            assert_eq!(decoded.encode(), token);
        }
    }

    #[test]
    fn decode_known_value() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let token = ShortId::from_uuid(uuid).encode();
        assert_eq!(ShortId::decode(&token).unwrap().as_uuid(), uuid);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(matches!(
            ShortId::decode(""),
            Err(ShortIdError::InvalidFormat(_))
        ));
        assert!(matches!(
            ShortId::decode("AAAAAAAAAAAAAAAAAAAAA"), // 21 chars
            Err(ShortIdError::InvalidFormat(_))
        ));
        assert!(matches!(
            ShortId::decode("AAAAAAAAAAAAAAAAAAAAAAA"), // 23 chars
            Err(ShortIdError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_padded_token() {
        let padded = format!("{}==", ShortId::generate().encode());
        assert!(matches!(
            ShortId::decode(&padded),
            Err(ShortIdError::InvalidFormat(_))
        ));
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        let mut token = ShortId::generate().encode();
        token.replace_range(0..1, "+");
        assert!(matches!(
            ShortId::decode(&token),
            Err(ShortIdError::InvalidFormat(_))
        ));

        let mut token = ShortId::generate().encode();
        token.replace_range(10..11, "/");
        assert!(matches!(
            ShortId::decode(&token),
            Err(ShortIdError::InvalidFormat(_))
        ));
    }
}
