use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{config::JwtConfig, state::AppState};

/// Token payload: the subject is the user's username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 signing and verification keys derived from the configured secret.
/// Stateless: issuing and validating share no mutable state.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig { secret, ttl_minutes } = state.config.jwt.clone();
        JwtKeys::new(&secret, ttl_minutes)
    }
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn sign(&self, subject: &str) -> anyhow::Result<String> {
        self.sign_with_ttl(subject, self.ttl)
    }

    pub fn sign_with_ttl(&self, subject: &str, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_owned(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(subject, "jwt signed");
        Ok(token)
    }

    /// Bad signature, truncated token and expired token all fail the same
    /// way; callers collapse the error into a single 401.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(subject = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new("test-secret", 15)
    }

    #[test]
    fn sign_and_verify_returns_the_subject() {
        let token = keys().sign("john@mail.com").expect("sign");
        let claims = keys().verify(&token).expect("verify");
        assert_eq!(claims.sub, "john@mail.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_fails_verification() {
        let token = keys()
            .sign_with_ttl("john@mail.com", Duration::minutes(-2))
            .expect("sign");
        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = keys().sign("john@mail.com").expect("sign");
        let other = JwtKeys::new("another-secret", 15);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn truncated_token_fails_verification() {
        let token = keys().sign("john@mail.com").expect("sign");
        assert!(keys().verify(&token[..token.len() / 2]).is_err());
        assert!(keys().verify("garbage").is_err());
    }
}
