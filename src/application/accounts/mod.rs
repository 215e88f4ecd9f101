//! Account changes: own profile, admin create and admin edit

pub mod forms;
pub mod validation;
pub mod workflow;

pub use forms::{
    parse_role_id, AccountFields, AvatarSubmission, CreateUserForm, EditUserForm, NameFields,
    NewUserFields, ProfileForm,
};
pub use workflow::{AccountError, AccountOutcome, AccountWorkflow, Flow};
