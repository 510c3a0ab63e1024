/// Single-use token utilities
///
/// Email verification and password reset links carry a random token. Only
/// its SHA-256 hash is persisted (see `models::auth_token`), so a database
/// leak does not expose usable links.
///
/// # Token Format
///
/// 48 characters from the base62 alphabet `[A-Za-z0-9]`, safe to embed in
/// a URL path segment without escaping.
///
/// # Example
///
/// ```
/// use storefront_shared::auth::token::{generate_token, hash_token, validate_token_format};
///
/// let (token, hash) = generate_token();
/// assert_eq!(token.len(), 48);
/// assert!(validate_token_format(&token));
/// assert_eq!(hash, hash_token(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated token (characters)
pub const TOKEN_LENGTH: usize = 48;

/// Generates a new single-use token
///
/// Returns `(plaintext_token, sha256_hex_hash)`. The plaintext goes into
/// the link, the hash goes into the database.
pub fn generate_token() -> (String, String) {
    let token = generate_random_string(TOKEN_LENGTH);
    let hash = hash_token(&token);

    (token, hash)
}

fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hashes a token using SHA-256
///
/// Returns the lowercase hex digest (64 characters).
///
/// ```
/// use storefront_shared::auth::token::hash_token;
///
/// let hash = hash_token("abc");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_token("abc"));
/// ```
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks that a string looks like a token this module generated
///
/// Handlers call this before touching the database so obviously bogus
/// links are rejected cheaply.
pub fn validate_token_format(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let (token1, hash1) = generate_token();
        let (token2, hash2) = generate_token();

        assert_eq!(token1.len(), TOKEN_LENGTH);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric()));

        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);

        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_token_known_value() {
        // SHA-256("abc")
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        let hash = hash_token("some-token");
        assert_eq!(hash, hash_token("some-token"));
        assert_ne!(hash, hash_token("some-token2"));
    }

    #[test]
    fn test_validate_token_format() {
        let (token, _) = generate_token();
        assert!(validate_token_format(&token));

        assert!(!validate_token_format("short"));
        assert!(!validate_token_format(&"a".repeat(TOKEN_LENGTH + 1)));
        assert!(!validate_token_format(&format!("{}!", "a".repeat(TOKEN_LENGTH - 1))));
        assert!(!validate_token_format(&"é".repeat(TOKEN_LENGTH / 2)));
    }
}
