use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::guard::{require_role, CurrentUser};
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{NewUser, UserFilter};
use crate::users::dto::{CreateUserRequest, ShowUser, UpdateUserRequest};
use crate::users::model::{format_timestamp, is_valid_email, Role};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/list_users", get(list_users))
        .route("/admin/filter_users", get(filter_users))
        .route("/admin/create_user", post(create_user))
        .route("/admin/update_user/:user_id", put(update_user))
        .route("/admin/delete_user/:user_id", delete(delete_user))
}

/// Any authenticated user may list; `is_active` is recomputed per read.
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<ShowUser>>, ApiError> {
    let users = state.store.find_many(&UserFilter::default()).await?;
    let now = OffsetDateTime::now_utc();
    Ok(Json(
        users
            .into_iter()
            .map(|u| ShowUser::from_user(u, now))
            .collect(),
    ))
}

#[instrument(skip(state, current))]
pub async fn filter_users(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<ShowUser>>, ApiError> {
    require_role(&current, &[Role::Admin])?;

    let users = state.store.find_many(&filter).await?;
    if users.is_empty() {
        return Err(ApiError::NotFound(
            "There are no users for the given criteria".into(),
        ));
    }
    let now = OffsetDateTime::now_utc();
    Ok(Json(
        users
            .into_iter()
            .map(|u| ShowUser::from_user(u, now))
            .collect(),
    ))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ShowUser>), ApiError> {
    let username = body.username.trim().to_lowercase();
    if !is_valid_email(&username) {
        warn!(username = %username, "rejected non-email username");
        return Err(ApiError::BadRequest("Invalid username".into()));
    }
    if state.store.find_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already registered".into()));
    }

    let now = OffsetDateTime::now_utc();
    let created_at = format_timestamp(now)?;
    let hashed_password = hash_password(&body.password)?;

    let user = state
        .store
        .insert(NewUser {
            username,
            first_name: body.first_name,
            last_name: body.last_name,
            role: body.role,
            created_at: created_at.clone(),
            last_login: created_at,
            hashed_password,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(ShowUser::from_user(user, now))))
}

/// Partial replacement by id. An all-absent body is a no-op that returns the
/// record unchanged, not an error.
#[instrument(skip(state, current, body))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ShowUser>, ApiError> {
    require_role(&current, &[Role::Admin])?;

    let mut patch = body.into_patch();
    // A patched username passes the same checks as creation.
    if let Some(username) = patch.username.take() {
        let username = username.trim().to_lowercase();
        if !is_valid_email(&username) {
            warn!(username = %username, "rejected non-email username");
            return Err(ApiError::BadRequest("Invalid username".into()));
        }
        if let Some(holder) = state.store.find_by_username(&username).await? {
            if holder.id != user_id {
                return Err(ApiError::Conflict("Username already registered".into()));
            }
        }
        patch.username = Some(username);
    }

    if !patch.is_empty() && state.store.update(user_id, patch).await? == 1 {
        if let Some(updated) = state.store.find_by_id(user_id).await? {
            info!(user_id = %user_id, "user updated");
            return Ok(Json(updated.into()));
        }
    }

    if let Some(existing) = state.store.find_by_id(user_id).await? {
        return Ok(Json(existing.into()));
    }

    Err(ApiError::NotFound(format!("User {user_id} not found")))
}

#[instrument(skip(state, current))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&current, &[Role::Admin])?;

    if state.store.delete(user_id).await? == 1 {
        info!(user_id = %user_id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("User {user_id} not found")))
    }
}
