use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::UserPatch;
use crate::users::model::{Role, User};

/// Body for `POST /admin/create_user`. `created_at` and `last_login` are
/// store-assigned, never client-supplied.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password: String,
}

/// Body for `PUT /admin/update_user/:user_id`; every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub last_login: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> UserPatch {
        UserPatch {
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            last_login: self.last_login,
        }
    }
}

/// Public view of a user: everything except the password hash, plus the
/// read-time derived `is_active` flag.
#[derive(Debug, Serialize)]
pub struct ShowUser {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: String,
}

impl ShowUser {
    pub fn from_user(user: User, now: OffsetDateTime) -> Self {
        let is_active = user.is_active_at(now);
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

impl From<User> for ShowUser {
    fn from(user: User) -> Self {
        Self::from_user(user, OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_user_never_contains_the_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "john@mail.com".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            role: Role::User,
            created_at: "01/01/2024 00:00:00".into(),
            last_login: "01/01/2024 00:00:00".into(),
            hashed_password: "$argon2id$fake".into(),
        };
        let json = serde_json::to_string(&ShowUser::from(user)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("is_active"));
    }
}
