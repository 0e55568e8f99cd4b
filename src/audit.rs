use serde_json::Value;

use crate::{db::DbPool, error::AppResult};

/// Record an audit entry. Callers treat this as fire-and-forget: failures are
/// logged and swallowed, never propagated into the primary operation.
pub async fn log_audit(
    pool: &DbPool,
    actor: Option<&str>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (actor, action, resource, metadata)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(actor)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
