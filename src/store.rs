use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::users::model::{Role, User};

/// Fields for a record about to be inserted. The id is store-assigned.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: String,
    pub hashed_password: String,
}

/// Partial update applied by id. `None` fields are left untouched; the id,
/// `created_at` and the password hash are never patched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub last_login: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.last_login.is_none()
    }
}

/// Equality filter over user fields; `None` means "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
}

/// The credential store seam. Implementations guarantee per-record atomicity
/// for single-record reads and writes; nothing here needs transactions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_many(&self, filter: &UserFilter) -> anyhow::Result<Vec<User>>;
    async fn insert(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Returns the number of rows touched (0 when the id does not exist).
    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<u64>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<u64>;
    async fn record_login(&self, username: &str, last_login: &str) -> anyhow::Result<u64>;
}

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, role, created_at, last_login, hashed_password";

/// Postgres-backed store used in production.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_many(&self, filter: &UserFilter) -> anyhow::Result<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE TRUE"
        ));
        if let Some(id) = filter.id {
            qb.push(" AND id = ").push_bind(id);
        }
        if let Some(username) = &filter.username {
            qb.push(" AND username = ").push_bind(username);
        }
        if let Some(first_name) = &filter.first_name {
            qb.push(" AND first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = &filter.last_name {
            qb.push(" AND last_name = ").push_bind(last_name);
        }
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role);
        }
        let users = qb.build_query_as::<User>().fetch_all(&self.db).await?;
        Ok(users)
    }

    async fn insert(&self, new_user: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (username, first_name, last_name, role, created_at, last_login, hashed_password)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.role)
        .bind(&new_user.created_at)
        .bind(&new_user.last_login)
        .bind(&new_user.hashed_password)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut fields = qb.separated(", ");
        if let Some(username) = patch.username {
            fields.push("username = ").push_bind_unseparated(username);
        }
        if let Some(first_name) = patch.first_name {
            fields.push("first_name = ").push_bind_unseparated(first_name);
        }
        if let Some(last_name) = patch.last_name {
            fields.push("last_name = ").push_bind_unseparated(last_name);
        }
        if let Some(role) = patch.role {
            fields.push("role = ").push_bind_unseparated(role);
        }
        if let Some(last_login) = patch.last_login {
            fields.push("last_login = ").push_bind_unseparated(last_login);
        }
        qb.push(" WHERE id = ").push_bind(id);
        let result = qb.build().execute(&self.db).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn record_login(&self, username: &str, last_login: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE users SET last_login = $2 WHERE username = $1")
            .bind(username)
            .bind(last_login)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory store with the same semantics, backing unit and end-to-end tests.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> anyhow::Result<MutexGuard<'_, HashMap<Uuid, User>>> {
        self.users
            .lock()
            .map_err(|_| anyhow::anyhow!("user store lock poisoned"))
    }
}

fn matches(user: &User, filter: &UserFilter) -> bool {
    filter.id.map_or(true, |id| user.id == id)
        && filter.username.as_deref().map_or(true, |v| user.username == v)
        && filter.first_name.as_deref().map_or(true, |v| user.first_name == v)
        && filter.last_name.as_deref().map_or(true, |v| user.last_name == v)
        && filter.role.map_or(true, |role| user.role == role)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.guard()?.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .guard()?
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_many(&self, filter: &UserFilter) -> anyhow::Result<Vec<User>> {
        Ok(self
            .guard()?
            .values()
            .filter(|u| matches(u, filter))
            .cloned()
            .collect())
    }

    async fn insert(&self, new_user: NewUser) -> anyhow::Result<User> {
        let mut users = self.guard()?;
        if users.values().any(|u| u.username == new_user.username) {
            anyhow::bail!("username already taken: {}", new_user.username);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            created_at: new_user.created_at,
            last_login: new_user.last_login,
            hashed_password: new_user.hashed_password,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut users = self.guard()?;
        let Some(user) = users.get_mut(&id) else {
            return Ok(0);
        };
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(last_login) = patch.last_login {
            user.last_login = last_login;
        }
        Ok(1)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<u64> {
        Ok(self.guard()?.remove(&id).map_or(0, |_| 1))
    }

    async fn record_login(&self, username: &str, last_login: &str) -> anyhow::Result<u64> {
        let mut users = self.guard()?;
        let Some(user) = users.values_mut().find(|u| u.username == username) else {
            return Ok(0);
        };
        user.last_login = last_login.to_string();
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            role,
            created_at: "01/01/2024 00:00:00".into(),
            last_login: "01/01/2024 00:00:00".into(),
            hashed_password: "digest".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_enforces_unique_username() {
        let store = MemoryStore::new();
        let user = store.insert(sample("a@b.co", Role::User)).await.unwrap();
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().id, user.id);
        assert!(store.insert(sample("a@b.co", Role::Admin)).await.is_err());
    }

    #[tokio::test]
    async fn filter_matches_on_every_set_field() {
        let store = MemoryStore::new();
        store.insert(sample("a@b.co", Role::Admin)).await.unwrap();
        store.insert(sample("c@d.co", Role::User)).await.unwrap();

        let admins = store
            .find_many(&UserFilter {
                role: Some(Role::Admin),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "a@b.co");

        let all = store.find_many(&UserFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn empty_patch_touches_nothing() {
        let store = MemoryStore::new();
        let user = store.insert(sample("a@b.co", Role::User)).await.unwrap();
        assert_eq!(store.update(user.id, UserPatch::default()).await.unwrap(), 0);
        let unchanged = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.first_name, "Jane");
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = MemoryStore::new();
        let patch = UserPatch {
            first_name: Some("Janet".into()),
            ..Default::default()
        };
        assert_eq!(store.update(Uuid::new_v4(), patch).await.unwrap(), 0);
        assert_eq!(store.delete(Uuid::new_v4()).await.unwrap(), 0);

        let user = store.insert(sample("a@b.co", Role::User)).await.unwrap();
        assert_eq!(store.delete(user.id).await.unwrap(), 1);
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_login_rewrites_last_login() {
        let store = MemoryStore::new();
        store.insert(sample("a@b.co", Role::User)).await.unwrap();
        let touched = store
            .record_login("a@b.co", "02/02/2024 12:00:00")
            .await
            .unwrap();
        assert_eq!(touched, 1);
        let user = store.find_by_username("a@b.co").await.unwrap().unwrap();
        assert_eq!(user.last_login, "02/02/2024 12:00:00");
    }
}
