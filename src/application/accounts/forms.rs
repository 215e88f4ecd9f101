//! Submitted account forms
//!
//! Text values are kept apart from the avatar upload so handlers can clone
//! them for re-rendering while the upload moves into the workflow.

use crate::infrastructure::storage::StagedUpload;

/// What arrived in the `avatar` file field.
#[derive(Debug, Default)]
pub enum AvatarSubmission {
    /// No file chosen
    #[default]
    None,
    Staged(StagedUpload),
    /// The upload stream broke off before the file was complete
    Interrupted,
}

impl AvatarSubmission {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFields {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
}

impl NameFields {
    pub fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            middle_name: self.middle_name.trim().to_string(),
        }
    }
}

/// Own-profile edit
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub names: NameFields,
    pub remove_avatar: bool,
    pub avatar: AvatarSubmission,
}

/// Values of the create form that are echoed back on rejection. Passwords
/// are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserFields {
    pub names: NameFields,
    pub email: String,
    /// `None` when nothing or something unparsable was selected
    pub role_id: Option<i32>,
    pub status: String,
}

impl Default for NewUserFields {
    fn default() -> Self {
        Self {
            names: NameFields::default(),
            email: String::new(),
            role_id: None,
            status: "active".to_string(),
        }
    }
}

/// Admin create
#[derive(Debug, Default)]
pub struct CreateUserForm {
    pub fields: NewUserFields,
    pub password: String,
    pub password_confirmation: String,
    pub avatar: AvatarSubmission,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFields {
    pub names: NameFields,
    pub role_id: Option<i32>,
    pub status: String,
}

/// Admin edit. Email and password are not editable here.
#[derive(Debug, Default)]
pub struct EditUserForm {
    pub fields: AccountFields,
    pub remove_avatar: bool,
    pub avatar: AvatarSubmission,
}

/// Parses a `role_id` form value; zero, negatives and garbage mean "none".
pub fn parse_role_id(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_id_parsing() {
        assert_eq!(parse_role_id("3"), Some(3));
        assert_eq!(parse_role_id(" 2 "), Some(2));
        assert_eq!(parse_role_id("0"), None);
        assert_eq!(parse_role_id("-1"), None);
        assert_eq!(parse_role_id("admin"), None);
        assert_eq!(parse_role_id(""), None);
    }

    #[test]
    fn names_are_trimmed() {
        let names = NameFields {
            first_name: "  Ana ".into(),
            last_name: "\tLopez\n".into(),
            middle_name: "   ".into(),
        };
        assert_eq!(
            names.trimmed(),
            NameFields {
                first_name: "Ana".into(),
                last_name: "Lopez".into(),
                middle_name: String::new(),
            }
        );
    }
}
