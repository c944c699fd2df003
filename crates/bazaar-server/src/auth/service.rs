//! JWT token and password service

use std::sync::LazyLock;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::sync::Cache;

use super::model::JwtPayload;

/// bcrypt cost used for stored password hashes
pub const PASSWORD_HASH_COST: u32 = 10;

/// Decoded tokens, keyed by the raw token string
static TOKEN_CACHE: LazyLock<Cache<String, JwtPayload>> = LazyLock::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(300))
        .build()
});

/// Decode and validate a JWT token with caching
pub fn decode_jwt_token_cached(
    token: &str,
    secret_key: &str,
) -> jsonwebtoken::errors::Result<JwtPayload> {
    if let Some(cached) = TOKEN_CACHE.get(token) {
        if cached.exp > chrono::Utc::now().timestamp() {
            return Ok(cached);
        }
        TOKEN_CACHE.invalidate(token);
    }

    let claims = decode_jwt_token(token, secret_key)?;
    TOKEN_CACHE.insert(token.to_string(), claims.clone());

    Ok(claims)
}

/// Decode and validate a JWT token without caching
pub fn decode_jwt_token(token: &str, secret_key: &str) -> jsonwebtoken::errors::Result<JwtPayload> {
    let decoding_key = DecodingKey::from_secret(secret_key.as_bytes());
    decode::<JwtPayload>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
}

/// Encode a JWT token for a user
pub fn encode_jwt_token(
    user_id: &str,
    user_type: &str,
    secret_key: &str,
    expire_seconds: i64,
) -> jsonwebtoken::errors::Result<String> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(expire_seconds))
        .unwrap_or_else(chrono::Utc::now)
        .timestamp();

    let payload = JwtPayload {
        sub: user_id.to_string(),
        user_type: user_type.to_string(),
        exp,
    };

    let encoding_key = EncodingKey::from_secret(secret_key.as_bytes());
    encode(&Header::new(Algorithm::HS256), &payload, &encoding_key)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, PASSWORD_HASH_COST)?)
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}
