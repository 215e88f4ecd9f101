//! Field checks shared by the account flows
//!
//! Checks never stop at the first failure. Messages are collected in the
//! order the form presents its fields.

use validator::ValidateEmail;

use super::forms::NameFields;
use crate::domain::UserRepositoryInterface;
use crate::support::DomainResult;

pub const FIRST_NAME_REQUIRED: &str = "First name is required.";
pub const LAST_NAME_REQUIRED: &str = "Last name is required.";
pub const EMAIL_REQUIRED: &str = "Email is required.";
pub const EMAIL_INVALID: &str = "Email address is not valid.";
pub const EMAIL_TAKEN: &str = "A user with that email is already registered.";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters.";
pub const PASSWORDS_DIFFER: &str = "Passwords do not match.";
pub const ROLE_REQUIRED: &str = "A role must be selected.";
pub const ROLE_UNKNOWN: &str = "Selected role does not exist.";

pub const MIN_PASSWORD_CHARS: usize = 8;

/// Ordered list of user-facing validation messages.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn check_names(&mut self, names: &NameFields) {
        if names.first_name.is_empty() {
            self.push(FIRST_NAME_REQUIRED);
        }
        if names.last_name.is_empty() {
            self.push(LAST_NAME_REQUIRED);
        }
    }

    /// Returns true when the email is present and well formed.
    pub fn check_email_syntax(&mut self, email: &str) -> bool {
        if email.is_empty() {
            self.push(EMAIL_REQUIRED);
            false
        } else if !email.validate_email() {
            self.push(EMAIL_INVALID);
            false
        } else {
            true
        }
    }

    pub fn check_password(&mut self, password: &str, confirmation: &str) {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            self.push(PASSWORD_TOO_SHORT);
        }
        if password != confirmation {
            self.push(PASSWORDS_DIFFER);
        }
    }

    pub async fn check_role(
        &mut self,
        repo: &dyn UserRepositoryInterface,
        role_id: Option<i32>,
    ) -> DomainResult<()> {
        match role_id {
            None => self.push(ROLE_REQUIRED),
            Some(id) => {
                if !repo.role_exists(id).await? {
                    self.push(ROLE_UNKNOWN);
                }
            }
        }
        Ok(())
    }

    pub async fn check_email_unique(
        &mut self,
        repo: &dyn UserRepositoryInterface,
        email: &str,
    ) -> DomainResult<()> {
        if repo.email_exists(email).await? {
            self.push(EMAIL_TAKEN);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_name_and_password_problems_are_reported() {
        let mut v = Violations::default();
        v.check_names(&NameFields::default());
        v.check_password("short", "other");
        assert_eq!(
            v.into_vec(),
            vec![FIRST_NAME_REQUIRED, LAST_NAME_REQUIRED, PASSWORD_TOO_SHORT, PASSWORDS_DIFFER]
        );
    }

    #[test]
    fn email_syntax() {
        let mut v = Violations::default();
        assert!(!v.check_email_syntax(""));
        assert!(!v.check_email_syntax("not-an-email"));
        assert!(v.check_email_syntax("ana@example.com"));
        assert_eq!(v.into_vec(), vec![EMAIL_REQUIRED, EMAIL_INVALID]);
    }

    #[test]
    fn password_length_counts_characters() {
        let mut v = Violations::default();
        v.check_password("ñññññññ", "ñññññññ");
        assert_eq!(v.into_vec(), vec![PASSWORD_TOO_SHORT]);

        let mut v = Violations::default();
        v.check_password("ññññññññ", "ññññññññ");
        assert!(v.is_empty());
    }
}
