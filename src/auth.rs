use crate::app::AppContext;
use crate::config::ConfigProfile;
use crate::error::ApiError;
use crate::models::Claims;
use axum::async_trait;
use axum::extract::{Extension, FromRequest, RequestParts, TypedHeader};
use headers::authorization::Bearer;
use headers::Authorization;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;

/// Issues and validates HS256 bearer tokens for the whole process.
#[derive(Clone)]
pub struct TokenManager {
    signing_key: Arc<String>,
    lifetime: Duration,
}

impl TokenManager {
    pub fn new(profile: &ConfigProfile) -> TokenManager {
        TokenManager {
            signing_key: Arc::new(profile.token_signing_key.clone()),
            lifetime: profile.token_lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token for `subject`, valid for the profile's token lifetime.
    pub fn issue(&self, subject: &str, role: Option<&str>) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: subject.to_string(),
            role: role.map(str::to_string),
            iat: now,
            exp: now + self.lifetime.as_secs() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.signing_key.as_bytes()),
        )
        .map_err(|e| {
            error!("token: failed to encode token for sub={}: {}", subject, e);
            ApiError::Internal("Failed to generate token".to_string())
        })
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.signing_key.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("token: rejected bearer token: {}", e);
            ApiError::Unauthorized(format!("Invalid or expired token: {}", e))
        })
    }
}

/// Represents a caller that presented a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub role: Option<String>,
}

impl AuthenticatedUser {
    /// Fail with 403 unless the token carries `role`.
    pub fn require_role(&self, role: &str) -> Result<(), ApiError> {
        if self.role.as_deref() == Some(role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role '{}' is required for this resource",
                role
            )))
        }
    }
}

#[async_trait]
impl<B> FromRequest<B> for AuthenticatedUser
where
    B: Send,
{
    type Rejection = ApiError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(ctx) = Extension::<AppContext>::from_request(req)
            .await
            .map_err(|_| ApiError::Internal("Token manager not configured".to_string()))?;

        // Expect "Authorization: Bearer <token>"
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = ctx.tokens.verify(bearer.token())?;

        Ok(AuthenticatedUser {
            subject: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_with, Profile};

    fn manager(indicator: &str, key: &str) -> TokenManager {
        let key = key.to_string();
        let profile = resolve_with(Some(indicator), &move |name| {
            (name == "JWT_SECRET_KEY").then(|| key.clone())
        });
        TokenManager::new(&profile)
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = manager("development", "test-secret-key-for-unit-tests");
        let token = tokens.issue("reader-42", Some("member")).expect("issue");
        let claims = tokens.verify(&token).expect("verify");

        assert_eq!(claims.sub, "reader-42");
        assert_eq!(claims.role.as_deref(), Some("member"));
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_testing_profile_lifetime() {
        let tokens = manager("testing", "k");
        assert_eq!(tokens.lifetime(), Profile::Testing.token_lifetime());
        let claims = tokens.verify(&tokens.issue("u", None).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let issuer = manager("development", "issuer-key");
        let verifier = manager("development", "other-key");
        let token = issuer.issue("reader-42", None).unwrap();

        match verifier.verify(&token) {
            Err(ApiError::Unauthorized(_)) => {}
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        let key = "expiry-key";
        let claims = Claims {
            sub: "reader-42".to_string(),
            role: None,
            iat: 1000,
            exp: 1001, // Already expired
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .expect("Failed to encode JWT");

        assert!(manager("development", key).verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(manager("development", "k").verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_require_role() {
        let user = AuthenticatedUser {
            subject: "reader-42".to_string(),
            role: Some("member".to_string()),
        };
        assert!(user.require_role("member").is_ok());
        assert!(matches!(user.require_role("librarian"), Err(ApiError::Forbidden(_))));

        let anonymous_role = AuthenticatedUser {
            subject: "reader-43".to_string(),
            role: None,
        };
        assert!(anonymous_role.require_role("member").is_err());
    }
}
