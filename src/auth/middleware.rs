use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::auth::services::authenticate_user;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::model::User;

/// Outcome of the advisory Basic-auth pass, stored in request extensions.
/// `None` means Basic credentials were presented but matched no user; the
/// request still proceeds (Basic auth is advisory here, unlike Bearer).
#[derive(Debug, Clone)]
pub struct BasicUser(pub Option<User>);

/// Runs around the whole router, before routing, once per request. Only an
/// `Authorization` header triggers it; any non-`basic` scheme passes through
/// untouched, while unusable Basic material fails the request outright.
pub async fn basic_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };
    let header = header
        .to_str()
        .map_err(|_| ApiError::InvalidBasicCredentials)?;

    // Exactly scheme + credentials; any other shape is malformed.
    let mut parts = header.split_whitespace();
    let (Some(scheme), Some(credentials), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ApiError::InvalidBasicCredentials);
    };

    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(next.run(request).await);
    }

    let decoded = BASE64
        .decode(credentials)
        .map_err(|_| ApiError::InvalidBasicCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ApiError::InvalidBasicCredentials)?;
    // A missing ':' means the whole string is the identifier, empty password.
    let (username, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));

    let user = authenticate_user(state.store.as_ref(), username, password).await?;
    debug!(username, authenticated = user.is_some(), "basic auth pass");
    request.extensions_mut().insert(BasicUser(user));

    Ok(next.run(request).await)
}
