//! Provider credentials: bcrypt password hashes and bearer tokens.
//!
//! A token is `<b64(provider id)>.<b64(HMAC-SHA1(secret, provider id))>`,
//! both parts URL-safe base64 without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppError;

type HmacSha1 = Hmac<Sha1>;

fn mac_for(secret: &str, payload: &[u8]) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(mac)
}

pub fn issue_token(secret: &str, provider_id: i64) -> String {
    let payload = provider_id.to_string();
    let signature = mac_for(secret, payload.as_bytes())
        .map(|mac| URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{}.{signature}", URL_SAFE_NO_PAD.encode(payload))
}

/// Returns the provider id carried by a correctly signed token.
pub fn verify_token(secret: &str, token: &str) -> Option<i64> {
    let (payload_b64, signature_b64) = token.split_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

    mac_for(secret, &payload)?.verify_slice(&signature).ok()?;

    std::str::from_utf8(&payload).ok()?.parse().ok()
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// False for a wrong password and for a missing or malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let token = issue_token("s3cret", 42);
        assert_eq!(verify_token("s3cret", &token), Some(42));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("s3cret", 42);
        assert_eq!(verify_token("other", &token), None);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = issue_token("s3cret", 42);
        let (_, signature) = token.split_once('.').unwrap();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode("43"));
        assert_eq!(verify_token("s3cret", &forged), None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(verify_token("s3cret", ""), None);
        assert_eq!(verify_token("s3cret", "no-dot"), None);
        assert_eq!(verify_token("s3cret", "!!.??"), None);
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("hunter22", 4 /* bcrypt minimum cost */).unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_empty_stored_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("hunter22", ""));
    }
}
