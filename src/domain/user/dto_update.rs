use super::UserStatus;

/// Name fields a user may change on their own profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
}

/// Fields an administrator may change on another account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChanges {
    pub profile: ProfileChanges,
    pub role_id: i32,
    pub status: UserStatus,
}
