use super::UserStatus;

/// Row values for a freshly created user. The avatar is always absent at
/// insert time; it is attached once the row id is known.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
    pub status: UserStatus,
}
