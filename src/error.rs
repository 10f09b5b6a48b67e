use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the HTTP surface. Every failure a handler or guard can
/// produce maps onto one of these; `IntoResponse` turns them into the JSON
/// `{"detail": ...}` bodies the API speaks.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bearer credentials missing, malformed, expired, or resolving to no user.
    #[error("Could not validate credentials")]
    Unauthorized,
    /// Login identifier/password pair rejected. Unknown user and wrong
    /// password are deliberately indistinguishable.
    #[error("Incorrect ID or password")]
    IncorrectCredentials,
    /// The Authorization header carried unusable Basic-auth material.
    #[error("Invalid basic auth credentials")]
    InvalidBasicCredentials,
    /// Valid identity, insufficient role.
    #[error("Not having sufficient rights to modify the content")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized
            | ApiError::IncorrectCredentials
            | ApiError::InvalidBasicCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 401s on the Bearer path carry the challenge header.
    fn bearer_challenge(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::IncorrectCredentials
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (self.status(), Json(json!({ "detail": detail }))).into_response();
        if self.bearer_challenge() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn basic_failure_has_no_challenge() {
        let response = ApiError::InvalidBasicCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn forbidden_is_distinct_from_unauthorized() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_hides_the_cause() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
