use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use super::{AuthError, claims::Claims};

/// One verification strategy is selected at startup; request handling only
/// ever sees this interface.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Shared-secret HS256 verification, for deployments without an external
/// issuer (and for tests, which can mint tokens locally).
pub struct HmacVerifier {
    secret: String,
    issuer: Option<String>,
    audience: Option<String>,
}

impl HmacVerifier {
    pub fn new(secret: String, issuer: Option<String>, audience: Option<String>) -> Self {
        Self {
            secret,
            issuer,
            audience,
        }
    }
}

#[async_trait]
impl TokenVerifier for HmacVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &self.audience {
            validation.set_audience(&[audience]);
        }

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::Verification(e.to_string()))?;

        data.claims.validate_token_use()?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";
    const ISSUER: &str = "https://issuer.example.com/pool";
    const AUDIENCE: &str = "admin-panel";

    fn verifier() -> HmacVerifier {
        HmacVerifier::new(SECRET.into(), Some(ISSUER.into()), Some(AUDIENCE.into()))
    }

    fn mint(claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> Claims {
        Claims {
            sub: "user-1".into(),
            username: Some("alice".into()),
            email: None,
            groups: vec!["admin".into()],
            token_use: Some("access".into()),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iss: Some(ISSUER.into()),
            aud: Some(AUDIENCE.into()),
        }
    }

    #[tokio::test]
    async fn valid_token_round_trips() {
        let claims = verifier().verify(&mint(&valid_claims())).await.unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.groups, vec!["admin"]);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut claims = valid_claims();
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        let err = verifier().verify(&mint(&claims)).await.err().unwrap();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let mut claims = valid_claims();
        claims.iss = Some("https://other.example.com".into());
        assert!(verifier().verify(&mint(&claims)).await.is_err());
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let mut claims = valid_claims();
        claims.aud = Some("other-app".into());
        assert!(verifier().verify(&mint(&claims)).await.is_err());
    }

    #[tokio::test]
    async fn refresh_token_use_is_rejected() {
        let mut claims = valid_claims();
        claims.token_use = Some("refresh".into());
        let err = verifier().verify(&mint(&claims)).await.err().unwrap();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let other_key = EncodingKey::from_secret(b"other-secret");
        let token = encode(&Header::default(), &valid_claims(), &other_key).unwrap();
        assert!(verifier().verify(&token).await.is_err());
    }
}
