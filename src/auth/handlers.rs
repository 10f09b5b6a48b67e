use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::auth::guard::CurrentUser;
use crate::auth::jwt::JwtKeys;
use crate::auth::services::authenticate_user;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::ShowUser;
use crate::users::model::format_timestamp;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/current_user", get(current_user))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = authenticate_user(state.store.as_ref(), &form.username, &form.password)
        .await?
        .ok_or_else(|| {
            warn!(username = %form.username, "login rejected");
            ApiError::IncorrectCredentials
        })?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(&user.username)?;

    let now = format_timestamp(OffsetDateTime::now_utc())?;
    state.store.record_login(&user.username, &now).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

#[instrument(skip_all)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<ShowUser> {
    Json(ShowUser::from(user))
}
