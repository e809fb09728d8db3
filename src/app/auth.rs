use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
}

/// Rejection from an `AuthVerifier`. The message is returned to the caller
/// unchanged, so it must not carry internal detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
}

impl AuthFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves the caller of a request to a stable user id.
#[async_trait]
pub trait AuthVerifier: Send + Sync + 'static {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthSession, AuthFailure>;
}

/// Verifies PASETO v4.local access tokens minted by the account service with
/// a shared symmetric key.
#[derive(Clone)]
pub struct PasetoVerifier {
    access_key: [u8; 32],
    issuer: String,
}

impl PasetoVerifier {
    pub fn new(access_key: [u8; 32], issuer: impl Into<String>) -> Self {
        Self {
            access_key,
            issuer: issuer.into(),
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid, ttl: std::time::Duration) -> Result<String> {
        let mut claims = Claims::new_expires_in(&ttl)?;
        claims.issuer(&self.issuer)?;
        claims.audience(&self.issuer)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;

        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };

        if !has_token_type(&claims, "access") {
            return Ok(None);
        }

        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.access_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(&self.issuer);
        rules.validate_audience_with(&self.issuer);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };

        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };

        Ok(trusted.payload_claims().cloned())
    }
}

#[async_trait]
impl AuthVerifier for PasetoVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Result<AuthSession, AuthFailure> {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AuthFailure::new("Authentication required"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthFailure::new("Invalid authorization header"))?;

        match self.authenticate_access_token(token) {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(AuthFailure::new("Invalid or expired token")),
            Err(err) => {
                tracing::warn!(error = ?err, "access token rejected");
                Err(AuthFailure::new("Invalid or expired token"))
            }
        }
    }
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
