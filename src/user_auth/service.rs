use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims structure (issued by the identity service)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub sub: String, // Subject (user_id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Caller identity injected into request extensions by `jwt_auth_middleware`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
        }
    }
}

/// HS256 token verification with the secret shared with the identity service
///
/// Issuing is only used by operator tooling and tests; real tokens come from
/// the identity service.
pub struct UserAuthService {
    jwt_secret: String,
}

impl UserAuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Issue a token valid for `ttl`
    pub fn issue_token(&self, user_id: Uuid, email: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .context("token expiry out of range")?
            .timestamp();

        let claims = Claims {
            user_id,
            email: email.to_string(),
            sub: user_id.to_string(),
            exp: expiration as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to generate token")
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify() {
        let service = UserAuthService::new("secret".to_string());
        let user_id = Uuid::new_v4();
        let token = service
            .issue_token(user_id, "alice@example.com", Duration::hours(1))
            .unwrap();

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "alice@example.com");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = UserAuthService::new("secret".to_string());
        let verifier = UserAuthService::new("other".to_string());
        let token = issuer
            .issue_token(Uuid::new_v4(), "a@example.com", Duration::hours(1))
            .unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = UserAuthService::new("secret".to_string());
        // Past the default 60s leeway
        let token = service
            .issue_token(Uuid::new_v4(), "a@example.com", Duration::minutes(-5))
            .unwrap();
        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let service = UserAuthService::new("secret".to_string());
        assert!(service.verify_token("not.a.token").is_err());
    }
}
