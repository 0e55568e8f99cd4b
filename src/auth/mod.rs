use std::sync::Arc;

use thiserror::Error;

use crate::{
    cache::MemoryCache,
    config::{AuthConfig, AuthMode},
    error::AppError,
};

pub mod claims;
pub mod identity;
pub mod jwks;
pub mod token;
pub mod verifier;

pub use claims::Claims;
pub use identity::Identity;
pub use verifier::TokenVerifier;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("malformed Authorization header")]
    MalformedHeader,

    /// The issuer was unreachable or published no matching key. Kept separate
    /// from signature/claim failures to aid operational diagnosis.
    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    #[error("token verification failed: {0}")]
    Verification(String),

    /// Operator error, not client error.
    #[error("verifier misconfigured: {0}")]
    Misconfigured(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Misconfigured(msg) => AppError::Config(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

/// Select the verification strategy once at startup. There is deliberately no
/// runtime fallback between strategies; a deployment runs exactly one.
pub fn build_verifier(auth: &AuthConfig) -> Result<Arc<dyn TokenVerifier>, AuthError> {
    match auth.mode {
        AuthMode::Jwks => {
            let issuer = auth
                .issuer
                .clone()
                .ok_or_else(|| AuthError::Misconfigured("AUTH_ISSUER is not set".into()))?;
            let audience = auth
                .audience
                .clone()
                .ok_or_else(|| AuthError::Misconfigured("AUTH_AUDIENCE is not set".into()))?;
            let keys = Arc::new(MemoryCache::new(auth.jwks_cache_capacity));
            Ok(Arc::new(jwks::JwksVerifier::new(
                issuer,
                audience,
                keys,
                auth.jwks_ttl,
            )?))
        }
        AuthMode::Hmac => {
            let secret = auth
                .hmac_secret
                .clone()
                .ok_or_else(|| AuthError::Misconfigured("AUTH_HMAC_SECRET is not set".into()))?;
            Ok(Arc::new(verifier::HmacVerifier::new(
                secret,
                auth.issuer.clone(),
                auth.audience.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn jwks_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwks,
            issuer: None,
            audience: None,
            hmac_secret: None,
            jwks_ttl: Duration::from_secs(600),
            jwks_cache_capacity: 32,
            bypass: false,
        }
    }

    #[test]
    fn jwks_mode_requires_issuer() {
        let err = build_verifier(&jwks_config()).err().unwrap();
        assert!(matches!(err, AuthError::Misconfigured(_)));
    }

    #[test]
    fn hmac_mode_requires_secret() {
        let config = AuthConfig {
            mode: AuthMode::Hmac,
            ..jwks_config()
        };
        let err = build_verifier(&config).err().unwrap();
        assert!(matches!(err, AuthError::Misconfigured(_)));
    }

    #[test]
    fn misconfiguration_maps_to_operator_error() {
        let err: AppError = AuthError::Misconfigured("x".into()).into();
        assert!(matches!(err, AppError::Config(_)));

        let err: AppError = AuthError::MalformedHeader.into();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
