//! JWT token handling

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token creation failed: {0}")]
    CreationError(String),
    #[error("Token validation failed: {0}")]
    ValidationError(String),
    #[error("Token expired")]
    TokenExpired,
}

/// Claim set of an access token.
///
/// `tenant_id` is kept as the raw string: the resolver decides whether it is
/// well-formed, and a malformed value must not make the whole token invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtService {
    secret: String,
    access_token_expiry: i64,
}

impl JwtService {
    pub fn new(secret: String, access_expiry: i64) -> Self {
        Self {
            secret,
            access_token_expiry: access_expiry,
        }
    }

    pub fn generate_access_token(&self, user_id: &Uuid, tenant_id: Option<Uuid>) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.map(|id| id.to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::CreationError(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::ValidationError(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_carries_tenant_claim() {
        let service = JwtService::new("test-secret".to_string(), 3600);
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();

        let token = service.generate_access_token(&user, Some(tenant)).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user.to_string());
        assert_eq!(claims.tenant_id, Some(tenant.to_string()));
    }

    #[test]
    fn test_malformed_tenant_claim_does_not_invalidate_token() {
        let service = JwtService::new("test-secret".to_string(), 3600);
        let now = Utc::now().timestamp();
        let token = service
            .encode_claims(&Claims {
                sub: "u-1".to_string(),
                tenant_id: Some("acme".to_string()),
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert_eq!(service.validate_token(&token).unwrap().tenant_id.as_deref(), Some("acme"));
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let service = JwtService::new("test-secret".to_string(), 3600);
        let now = Utc::now().timestamp();
        let expired = service
            .encode_claims(&Claims {
                sub: "u-1".to_string(),
                tenant_id: None,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(service.validate_token(&expired), Err(JwtError::TokenExpired)));

        let other = JwtService::new("other-secret".to_string(), 3600);
        let token = other.generate_access_token(&Uuid::new_v4(), None).unwrap();
        assert!(matches!(service.validate_token(&token), Err(JwtError::ValidationError(_))));
    }
}
