use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

use crate::error::AppError;

/// JSON body extractor that reports deserialization failures through the
/// standard error envelope as 400 validation errors, instead of axum's
/// default 422 rejection.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    use crate::dto::users::CreateUserRequest;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_body_maps_to_validation() {
        let err = AppJson::<CreateUserRequest>::from_request(json_request("{"), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_field_maps_to_validation() {
        let err = AppJson::<CreateUserRequest>::from_request(
            json_request(r#"{"email": "a@example.com"}"#),
            &(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn well_formed_body_deserializes() {
        let AppJson(payload) = AppJson::<CreateUserRequest>::from_request(
            json_request(r#"{"username": "alice", "email": "a@example.com"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(payload.username, "alice");
    }
}
