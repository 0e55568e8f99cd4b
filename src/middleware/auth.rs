use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::{AuthError, Identity, token::extract_token},
    error::AppError,
    state::AppState,
};

/// Admin gating runs only after successful authentication, so an
/// unauthenticated request to an admin route gets 401, never 403.
pub fn ensure_admin(identity: &Identity) -> Result<(), AppError> {
    if !identity.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Identity, AppError> {
    // Local-diagnostics escape hatch; auth_bypass_active() is always false in
    // production.
    if state.config.auth_bypass_active() {
        return Ok(Identity::local_dev());
    }

    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)
        .map_err(AppError::from)?;
    let header_str = header_value
        .to_str()
        .map_err(|_| AppError::from(AuthError::MalformedHeader))?;
    let token = extract_token(header_str)?;

    let claims = state.verifier.verify(token).await?;
    Ok(Identity::from_claims(claims))
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await
    }
}

/// Optional-auth variant: endpoints that tailor behavior for known callers
/// but never hard-require a token. No header means anonymous, and a bad
/// token also degrades to anonymous instead of rejecting.
pub struct MaybeIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.get(header::AUTHORIZATION).is_none()
            && !state.config.auth_bypass_active()
        {
            return Ok(MaybeIdentity(None));
        }
        Ok(MaybeIdentity(authenticate(parts, state).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(is_admin: bool) -> Identity {
        Identity {
            subject: "user-1".into(),
            username: "alice".into(),
            email: None,
            groups: if is_admin { vec!["admin".into()] } else { vec![] },
            is_admin,
        }
    }

    #[test]
    fn ensure_admin_rejects_non_admins() {
        assert!(matches!(
            ensure_admin(&identity(false)),
            Err(AppError::Forbidden)
        ));
        assert!(ensure_admin(&identity(true)).is_ok());
    }
}
