use serde::Serialize;

use super::claims::Claims;

pub const ADMIN_GROUP: &str = "admin";

/// Caller identity derived from verified claims. Rebuilt on every request,
/// never persisted or cached.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub subject: String,
    pub username: String,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub is_admin: bool,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Self {
        let is_admin = claims.groups.iter().any(|g| g == ADMIN_GROUP);
        Self {
            subject: claims.sub.clone(),
            username: claims.username.unwrap_or(claims.sub),
            email: claims.email,
            groups: claims.groups,
            is_admin,
        }
    }

    /// Synthetic identity injected by the non-production auth bypass.
    pub fn local_dev() -> Self {
        Self {
            subject: "local-dev".into(),
            username: "local-dev".into(),
            email: None,
            groups: vec![ADMIN_GROUP.to_string()],
            is_admin: true,
        }
    }
}
