use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{
    format_description::FormatItem, macros::format_description, Duration, OffsetDateTime,
    PrimitiveDateTime,
};
use uuid::Uuid;

/// Wire format for `created_at` / `last_login` timestamps.
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[month]/[day]/[year] [hour]:[minute]:[second]");

/// Window after the last successful login during which a user counts as active.
const ACTIVE_WINDOW: Duration = Duration::days(30);

pub fn format_timestamp(at: OffsetDateTime) -> anyhow::Result<String> {
    Ok(at.format(TIMESTAMP_FORMAT)?)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Privilege tier gating the admin mutation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    ReadOnly,
}

/// One account as stored. The password hash never leaves the process:
/// `skip_serializing` keeps it out of any JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
}

impl User {
    /// Derived, not stored: active means the last login is at most 30 days
    /// old. A `last_login` that does not parse counts as inactive.
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        match PrimitiveDateTime::parse(&self.last_login, TIMESTAMP_FORMAT) {
            Ok(parsed) => now - parsed.assume_utc() <= ACTIVE_WINDOW,
            Err(_) => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_last_login(last_login: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "john@mail.com".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            role: Role::User,
            created_at: "01/01/2024 00:00:00".into(),
            last_login: last_login.into(),
            hashed_password: "irrelevant".into(),
        }
    }

    #[test]
    fn recent_login_is_active() {
        let now = OffsetDateTime::now_utc();
        let stamp = format_timestamp(now - Duration::days(10)).unwrap();
        assert!(user_with_last_login(&stamp).is_active_at(now));
    }

    #[test]
    fn stale_login_is_inactive() {
        let now = OffsetDateTime::now_utc();
        let stamp = format_timestamp(now - Duration::days(40)).unwrap();
        assert!(!user_with_last_login(&stamp).is_active_at(now));
    }

    #[test]
    fn unparsable_last_login_is_inactive() {
        let now = OffsetDateTime::now_utc();
        assert!(!user_with_last_login("not a timestamp").is_active_at(now));
    }

    #[test]
    fn hash_never_serializes() {
        let user = user_with_last_login("01/01/2024 00:00:00");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(!json.contains("irrelevant"));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("john@mail.com"));
        assert!(!is_valid_email("john"));
        assert!(!is_valid_email("john@mail"));
        assert!(!is_valid_email("jo hn@mail.com"));
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::ReadOnly).unwrap(), "\"read_only\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
