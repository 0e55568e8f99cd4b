use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    jwk::{Jwk, JwkSet},
};

use crate::cache::Cache;

use super::{AuthError, claims::Claims, verifier::TokenVerifier};

const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Verifies tokens against the issuer's published key-set. Keys are held in
/// an injected TTL cache so staleness and growth stay bounded; the fetch
/// happens outside any storage transaction.
pub struct JwksVerifier {
    issuer: String,
    audience: String,
    http: reqwest::Client,
    keys: Arc<dyn Cache<Jwk>>,
    key_ttl: Duration,
}

impl JwksVerifier {
    pub fn new(
        issuer: String,
        audience: String,
        keys: Arc<dyn Cache<Jwk>>,
        key_ttl: Duration,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Misconfigured(format!("http client: {e}")))?;
        Ok(Self {
            issuer,
            audience,
            http,
            keys,
            key_ttl,
        })
    }

    fn jwks_url(&self) -> String {
        format!(
            "{}/.well-known/jwks.json",
            self.issuer.trim_end_matches('/')
        )
    }

    async fn resolve_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(jwk) = self.keys.get(kid) {
            return Ok(jwk);
        }

        let url = self.jwks_url();
        tracing::debug!(%url, %kid, "fetching key-set");
        let set: JwkSet = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::KeyResolution(format!("key-set fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| AuthError::KeyResolution(format!("key-set fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::KeyResolution(format!("key-set parse failed: {e}")))?;

        let mut matched = None;
        for jwk in set.keys {
            if let Some(id) = jwk.common.key_id.clone() {
                if id == kid {
                    matched = Some(jwk.clone());
                }
                self.keys.set(&id, jwk, self.key_ttl);
            }
        }

        matched.ok_or_else(|| AuthError::KeyResolution(format!("no key matches kid \"{kid}\"")))
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        // The header is untrusted at this point; it only tells us which key
        // and algorithm to verify with, both of which are allow-listed.
        let header =
            decode_header(token).map_err(|e| AuthError::Verification(e.to_string()))?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::Verification(format!(
                "disallowed algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Verification("token header missing kid".into()))?;

        let jwk = self.resolve_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::KeyResolution(format!("unusable key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::Verification(e.to_string()))?;

        data.claims.validate_token_use()?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn verifier() -> JwksVerifier {
        JwksVerifier::new(
            "https://issuer.example.com/pool".into(),
            "admin-panel".into(),
            Arc::new(MemoryCache::new(8)),
            Duration::from_secs(600),
        )
        .unwrap()
    }

    #[test]
    fn jwks_url_is_derived_from_issuer() {
        assert_eq!(
            verifier().jwks_url(),
            "https://issuer.example.com/pool/.well-known/jwks.json"
        );
    }

    #[tokio::test]
    async fn garbage_token_is_rejected_before_any_fetch() {
        let err = verifier().verify("not-a-token").await.err().unwrap();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[tokio::test]
    async fn hmac_signed_token_is_rejected_by_algorithm_allow_list() {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let claims = Claims {
            sub: "user-1".into(),
            username: None,
            email: None,
            groups: vec![],
            token_use: Some("access".into()),
            exp: 4_000_000_000,
            iss: Some("https://issuer.example.com/pool".into()),
            aud: Some("admin-panel".into()),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let err = verifier().verify(&token).await.err().unwrap();
        assert!(matches!(err, AuthError::Verification(_)));
    }
}
