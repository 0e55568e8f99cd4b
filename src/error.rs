use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, RuntimeErr};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order not modifiable: {0}")]
    NotModifiable(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Too many requests")]
    RateLimited,

    #[error("Database error")]
    Db(sqlx::Error),

    #[error("Database error")]
    Orm(DbErr),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::NotModifiable(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Db(_) | AppError::Orm(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Classify backend failures by SQLSTATE so callers can branch on category
/// instead of string-matching messages. Foreign-key violations become
/// `InvalidReference`, unique violations become `Conflict`.
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match orm_sqlstate(&err) {
            Some(code) if code == FOREIGN_KEY_VIOLATION => {
                AppError::InvalidReference("referenced row does not exist".into())
            }
            Some(code) if code == UNIQUE_VIOLATION => {
                AppError::Conflict("value already exists".into())
            }
            _ => AppError::Orm(err),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match sqlx_sqlstate(&err) {
            Some(code) if code == FOREIGN_KEY_VIOLATION => {
                AppError::InvalidReference("referenced row does not exist".into())
            }
            Some(code) if code == UNIQUE_VIOLATION => {
                AppError::Conflict("value already exists".into())
            }
            _ => AppError::Db(err),
        }
    }
}

fn orm_sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => sqlx_sqlstate(e),
        _ => None,
    }
}

fn sqlx_sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Debug builds expose the underlying error for diagnosis; release
        // builds only return the generic message.
        let detail = if cfg!(debug_assertions) {
            format!("{:?}", self)
        } else {
            self.to_string()
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData { error: detail }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidReference("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Config("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
