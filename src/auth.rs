// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Password hashing and login redirect helpers

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::{Result, YatubeError};

/// Where anonymous users are sent to log in
pub const LOGIN_URL: &str = "/auth/login/";

/// Hash a password with Argon2id into a PHC string for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| YatubeError::PasswordHash(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| YatubeError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Login page URL that returns to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, urlencoding::encode(next))
}

/// Only local absolute paths are followed after login
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salt() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/create/"), "/auth/login/?next=%2Fcreate%2F");
    }

    #[test]
    fn test_safe_redirects() {
        assert!(is_safe_redirect("/posts/1/"));
        assert!(!is_safe_redirect("//evil.example"));
        assert!(!is_safe_redirect("https://evil.example"));
        assert!(!is_safe_redirect("/\\evil.example"));
        assert!(!is_safe_redirect(""));
    }
}
