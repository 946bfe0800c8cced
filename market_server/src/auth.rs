//! Bearer token authentication.
//!
//! Access tokens are HS256 JWTs, signed with the shared `MKT_JWT_SECRET`. The claims carry the user id (`sub`) and
//! role of the caller. Tokens are issued by the account service that handles logins; this server only verifies them.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use market_engine::db_types::{Caller, Role};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id
    pub sub: i64,
    pub role: Role,
    /// Expiry (Unix timestamp, seconds)
    pub exp: usize,
}

impl JwtClaims {
    pub fn new(user_id: i64, role: Role, valid_for: Duration) -> Self {
        let exp = (Utc::now() + valid_for).timestamp().max(0) as usize;
        Self { sub: user_id, role, exp }
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.sub, self.role)
    }
}

/// Claims are placed in the request extensions by [`crate::middleware::JwtMiddlewareFactory`]. Handlers that take a
/// `JwtClaims` argument fail with 401 if the middleware did not run or did not find a valid token.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            debug!("💻️ No JWT claims found in request extensions");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Verifies access tokens.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    /// Validates the signature and expiry of `token`, returning its claims.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken => AuthError::PoorlyFormattedToken(e.to_string()),
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        Ok(data.claims)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".to_string()))
}

/// Signs access tokens with the shared secret.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key }
    }

    /// Issue a new access token for the given user. This method DOES NOT check that the user exists, or holds `role`.
    pub fn issue_token(&self, user_id: i64, role: Role, valid_for: Option<Duration>) -> Result<String, AuthError> {
        let claims = JwtClaims::new(user_id, role, valid_for.unwrap_or_else(|| Duration::hours(24)));
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| AuthError::ValidationError(format!("Could not sign token. {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("a-test-secret-that-is-long-enough")
    }

    #[test]
    fn issued_tokens_validate() {
        let token = TokenIssuer::new(&config()).issue_token(42, Role::Farmer, None).unwrap();
        let claims = TokenValidator::new(&config()).validate(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Farmer);
        assert_eq!(claims.caller(), Caller::new(42, Role::Farmer));
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let other = AuthConfig::new("some-other-secret-entirely");
        let token = TokenIssuer::new(&other).issue_token(42, Role::Admin, None).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let claims = JwtClaims::new(7, Role::Buyer, Duration::hours(-2));
        let token = TokenIssuer::new(&config()).sign(&claims).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }

    #[test]
    fn bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(bearer_token("abc.def.ghi").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }
}
