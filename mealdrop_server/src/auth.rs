//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs signed with the shared server secret. Claims carry the user id, their
//! single role and an expiry; tokens never refresh. The [`crate::middleware`] layer verifies the
//! token and parks the claims in the request extensions, where the [`JwtClaims`] extractor picks
//! them up for handlers.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use mealdrop_engine::db_types::{Identity, Role, User, UserId};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id.
    pub sub: i64,
    pub role: Role,
    /// Unix expiry timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn identity(&self) -> Identity {
        Identity::new(UserId(self.sub), self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(AuthError::MissingToken))
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    lifetime: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key, lifetime: config.token_lifetime }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let claims = JwtClaims { sub: user.id.0, role: user.role, exp: (Utc::now() + self.lifetime).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|e| {
            error!("🔑️ Could not sign an access token. {e}");
            AuthError::InvalidToken(e.to_string())
        })
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key, validation: Validation::new(Algorithm::HS256) }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("🔑️ Rejected access token. {e}");
                AuthError::InvalidToken(e.to_string())
            })
    }
}

/// Pulls the bearer token out of the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let header = req.headers().get("Authorization").ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    value.strip_prefix("Bearer ").ok_or_else(|| AuthError::InvalidToken("expected a Bearer token".into()))
}
