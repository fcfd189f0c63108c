//! Access-token derivation for the exchange backend API
//!
//! The upstream expects a bearer token derived from a secret pattern salted
//! with the current UTC date, then hashed with SHA-256. The token changes at
//! UTC midnight, so it must be recomputed for every call and never cached.

use chrono::{DateTime, Datelike, Utc};
use sha2::{Digest, Sha256};

/// Generate the bearer token for the current UTC date.
pub fn generate_bearer_token(token_pattern: &str) -> String {
    token_for_date(token_pattern, Utc::now())
}

/// Generate the bearer token for a specific date (split out for tests).
pub fn token_for_date(token_pattern: &str, date: DateTime<Utc>) -> String {
    let formatted = format_token_pattern(token_pattern, date);
    hash_token(&formatted)
}

/// Interpolate {Year}/{Month}/{Day} placeholders with zero-padded fields.
fn format_token_pattern(token_pattern: &str, date: DateTime<Utc>) -> String {
    token_pattern
        .replace("{Year}", &date.year().to_string())
        .replace("{Month}", &format!("{:02}", date.month()))
        .replace("{Day}", &format!("{:02}", date.day()))
}

/// SHA-256 hex digest of the interpolated pattern.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
