use axum::http::StatusCode;
use axum::response::Response;

use super::{insert_avatar_input, insert_name_fields, page_context, Nav, Views};
use crate::application::accounts::NameFields;
use crate::domain::User;

pub struct ProfileView<'a> {
    pub user: &'a User,
    /// Values to show in the name inputs
    pub names: &'a NameFields,
    pub avatar_url: String,
    pub errors: &'a [String],
    pub success: Option<&'a str>,
}

pub fn profile_page(views: &Views, nav: &Nav, view: &ProfileView<'_>) -> Response {
    let mut context = page_context("My profile", Some(nav), view.errors, view.success);
    insert_name_fields(&mut context, view.names);
    insert_avatar_input(&mut context, Some(&view.avatar_url), view.user.avatar.is_some());
    context.insert("email", &view.user.email);
    context.insert("role", &view.user.role_name);
    views.render(StatusCode::OK, "profile.html", &context)
}
