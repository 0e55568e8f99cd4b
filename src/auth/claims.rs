use serde::{Deserialize, Serialize};

use super::AuthError;

/// Token-use classes this API accepts. Anything else (refresh tokens in
/// particular) is rejected outright.
const ACCEPTED_TOKEN_USES: [&str; 2] = ["id", "access"];

/// Decoded payload of a verified identity token. Group and username claims
/// accept both the plain names and the issuer-prefixed variants some pools
/// emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,

    #[serde(
        default,
        alias = "cognito:username",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, alias = "cognito:groups")]
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    pub fn validate_token_use(&self) -> Result<(), AuthError> {
        match self.token_use.as_deref() {
            Some(use_class) if ACCEPTED_TOKEN_USES.contains(&use_class) => Ok(()),
            Some(other) => Err(AuthError::Verification(format!(
                "unsupported token_use \"{other}\""
            ))),
            None => Err(AuthError::Verification("missing token_use claim".into())),
        }
    }
}
