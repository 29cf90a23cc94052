//! Identity normalization, PIN hashing, and token helpers.

use anyhow::{Context, Result};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

use super::types::Identity;

/// Normalize a phone number to a canonical digit string.
///
/// Strips formatting, drops a NANP leading 1 from eleven-digit numbers,
/// and rejects anything that does not look like a dialable number so a
/// typo cannot fall through to a different lookup key.
pub(super) fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => digits,
    };
    if (7..=15).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Normalize a phone/email pair into an identity.
///
/// Returns `None` when neither key is usable; a provided but malformed
/// key rejects the whole identity instead of silently falling back to
/// the other one.
pub(super) fn normalize_identity(phone: Option<&str>, email: Option<&str>) -> Option<Identity> {
    let phone = match phone.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Some(normalize_phone(raw)?),
        None => None,
    };
    let email = match email.map(normalize_email).filter(|value| !value.is_empty()) {
        Some(normalized) => {
            if !valid_email(&normalized) {
                return None;
            }
            Some(normalized)
        }
        None => None,
    };
    if phone.is_none() && email.is_none() {
        return None;
    }
    Some(Identity { phone, email })
}

/// PINs are 4-6 ASCII digits, nothing else.
pub(super) fn valid_pin_format(pin: &str) -> bool {
    Regex::new(r"^[0-9]{4,6}$").is_ok_and(|regex| regex.is_match(pin))
}

/// Hash a PIN with Argon2id, a per-row salt, and the server-side pepper.
/// The pepper is keyed into the hash and never stored with the credential.
pub(super) fn hash_pin(pin: &str, pepper: &[u8]) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = peppered_argon2(pepper)?;
    let hash = argon2
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash PIN"))?
        .to_string();
    Ok(hash)
}

/// Verify a candidate PIN against a stored peppered hash.
pub(super) fn verify_pin_hash(pin: &str, stored_hash: &str, pepper: &[u8]) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|_| anyhow::anyhow!("invalid stored PIN hash"))?;
    let argon2 = peppered_argon2(pepper)?;
    Ok(argon2.verify_password(pin.as_bytes(), &parsed).is_ok())
}

fn peppered_argon2(pepper: &[u8]) -> Result<Argon2<'_>> {
    Argon2::new_with_secret(
        pepper,
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::default(),
    )
    .map_err(|_| anyhow::anyhow!("failed to initialize Argon2id"))
}

/// Create a new session token.
/// The raw value is only returned to the caller; it never touches disk.
pub(super) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Compare the presented admin key against the configured one by SHA-256
/// digest so the comparison cost does not depend on where they differ.
pub(super) fn admin_key_matches(presented: &str, configured: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let configured = Sha256::digest(configured.as_bytes());
    presented == configured
}

/// Pull a bearer token out of the Authorization header.
pub(super) fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn normalize_phone_strips_formatting() {
        assert_eq!(
            normalize_phone("(555) 123-4567"),
            Some("5551234567".to_string())
        );
        assert_eq!(
            normalize_phone("+1 555 123 4567"),
            Some("5551234567".to_string())
        );
        assert_eq!(normalize_phone("5551234567"), Some("5551234567".to_string()));
    }

    #[test]
    fn normalize_phone_rejects_garbage() {
        assert_eq!(normalize_phone("123"), None);
        assert_eq!(normalize_phone("not a phone"), None);
        assert_eq!(normalize_phone("12345678901234567890"), None);
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn normalize_identity_requires_a_key() {
        assert!(normalize_identity(None, None).is_none());
        assert!(normalize_identity(Some(""), Some(" ")).is_none());
    }

    #[test]
    fn normalize_identity_rejects_bad_keys_outright() {
        // A malformed phone must not silently fall back to the email key.
        assert!(normalize_identity(Some("123"), Some("alice@example.com")).is_none());
        assert!(normalize_identity(Some("5551234567"), Some("not-an-email")).is_none());
    }

    #[test]
    fn normalize_identity_canonicalizes_both_keys() {
        let identity = normalize_identity(Some("(555) 123-4567"), Some(" Bob@Example.com "));
        assert_eq!(
            identity,
            Some(crate::api::handlers::pin::types::Identity {
                phone: Some("5551234567".to_string()),
                email: Some("bob@example.com".to_string()),
            })
        );
    }

    #[test]
    fn valid_pin_format_accepts_four_to_six_digits() {
        assert!(valid_pin_format("1234"));
        assert!(valid_pin_format("12345"));
        assert!(valid_pin_format("123456"));
    }

    #[test]
    fn valid_pin_format_rejects_out_of_range() {
        assert!(!valid_pin_format("12"));
        assert!(!valid_pin_format("123456789"));
        assert!(!valid_pin_format("12a4"));
        assert!(!valid_pin_format(""));
        assert!(!valid_pin_format("12 34"));
    }

    #[test]
    fn hash_and_verify_pin_round_trip() -> anyhow::Result<()> {
        let pepper = b"pepper";
        let hash = hash_pin("1234", pepper)?;
        assert!(verify_pin_hash("1234", &hash, pepper)?);
        assert!(!verify_pin_hash("0000", &hash, pepper)?);
        Ok(())
    }

    #[test]
    fn verify_pin_hash_requires_matching_pepper() -> anyhow::Result<()> {
        let hash = hash_pin("1234", b"pepper")?;
        assert!(!verify_pin_hash("1234", &hash, b"other-pepper")?);
        Ok(())
    }

    #[test]
    fn pin_hashes_are_salted() -> anyhow::Result<()> {
        let pepper = b"pepper";
        assert_ne!(hash_pin("1234", pepper)?, hash_pin("1234", pepper)?);
        Ok(())
    }

    #[test]
    fn generate_session_token_round_trip() -> anyhow::Result<()> {
        let token = generate_session_token()?;
        let decoded = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(anyhow::Error::msg)?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn session_tokens_are_distinct() -> anyhow::Result<()> {
        assert_ne!(generate_session_token()?, generate_session_token()?);
        Ok(())
    }

    #[test]
    fn admin_key_matches_exact_only() {
        assert!(admin_key_matches("s3cret", "s3cret"));
        assert!(!admin_key_matches("s3cret", "s3cret "));
        assert!(!admin_key_matches("", "s3cret"));
    }

    #[test]
    fn extract_bearer_token_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_bearer_token_rejects_empty_and_missing() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
