//! JWT token service

use std::sync::LazyLock;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::sync::Cache;

use crate::model::JwtPayload;

/// Cached token data containing the full payload
#[derive(Clone)]
struct CachedTokenData {
    claims: JwtPayload,
}

/// JWT Token cache to avoid repeated validation of the same token
static TOKEN_CACHE: LazyLock<Cache<String, CachedTokenData>> = LazyLock::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(300)) // 5 minutes TTL
        .build()
});

/// Decode and validate JWT token with caching
pub fn decode_jwt_token_cached(
    token: &str,
    secret_key: &str,
) -> jsonwebtoken::errors::Result<jsonwebtoken::TokenData<JwtPayload>> {
    if let Some(cached) = TOKEN_CACHE.get(token) {
        let now = chrono::Utc::now().timestamp();
        if cached.claims.exp > now {
            return Ok(jsonwebtoken::TokenData {
                header: jsonwebtoken::Header::default(),
                claims: cached.claims,
            });
        }
        // Token expired in cache, invalidate it
        TOKEN_CACHE.invalidate(token);
    }

    let result = decode_jwt_token(token, secret_key)?;

    TOKEN_CACHE.insert(
        token.to_string(),
        CachedTokenData {
            claims: result.claims.clone(),
        },
    );

    Ok(result)
}

/// Decode and validate JWT token without caching
pub fn decode_jwt_token(
    token: &str,
    secret_key: &str,
) -> jsonwebtoken::errors::Result<jsonwebtoken::TokenData<JwtPayload>> {
    let decoding_key = DecodingKey::from_secret(secret_key.as_bytes());
    decode::<JwtPayload>(token, &decoding_key, &Validation::new(Algorithm::HS256))
}

/// Invalidate a token from the cache
pub fn invalidate_token(token: &str) {
    TOKEN_CACHE.invalidate(token);
}

/// Encode an HS256 token for a user
pub fn encode_jwt_token(
    user_id: i64,
    email: &str,
    is_admin: bool,
    secret_key: &str,
    expire_seconds: i64,
) -> jsonwebtoken::errors::Result<String> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(expire_seconds))
        .unwrap_or_else(chrono::Utc::now)
        .timestamp();

    let payload = JwtPayload {
        sub: email.to_string(),
        uid: user_id,
        adm: is_admin,
        exp,
    };

    let encoding_key = EncodingKey::from_secret(secret_key.as_bytes());
    encode(&Header::new(Algorithm::HS256), &payload, &encoding_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-elite";

    #[test]
    fn test_encode_decode() {
        let token = encode_jwt_token(5, "ada@example.com", false, SECRET, 1800).unwrap();
        let data = decode_jwt_token(&token, SECRET).unwrap();
        assert_eq!(data.claims.sub, "ada@example.com");
        assert_eq!(data.claims.uid, 5);
        assert!(!data.claims.adm);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = encode_jwt_token(5, "ada@example.com", false, SECRET, 1800).unwrap();
        assert!(decode_jwt_token(&token, "another-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = encode_jwt_token(5, "ada@example.com", false, SECRET, -3600).unwrap();
        let err = decode_jwt_token(&token, SECRET).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn test_cached_decode_and_invalidate() {
        let token = encode_jwt_token(9, "admin@example.com", true, SECRET, 1800).unwrap();
        let first = decode_jwt_token_cached(&token, SECRET).unwrap();
        let second = decode_jwt_token_cached(&token, SECRET).unwrap();
        assert_eq!(first.claims, second.claims);
        assert!(second.claims.adm);

        invalidate_token(&token);
        assert!(decode_jwt_token_cached(&token, SECRET).is_ok());
    }
}
