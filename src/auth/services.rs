use crate::auth::password::verify_password;
use crate::store::UserStore;
use crate::users::model::User;

/// Credential check against the store. Unknown username and wrong password
/// both come back as `None` so callers cannot tell the cases apart
/// (enumeration defense). `Err` is reserved for store failures.
pub async fn authenticate_user(
    store: &dyn UserStore,
    username: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let Some(user) = store.find_by_username(username).await? else {
        return Ok(None);
    };
    if !verify_password(password, &user.hashed_password) {
        return Ok(None);
    }
    Ok(Some(user))
}
