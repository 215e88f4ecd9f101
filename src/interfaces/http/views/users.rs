use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

use super::{insert_avatar_input, insert_name_fields, page_context, Nav, Views};
use crate::application::accounts::{AccountFields, NewUserFields};
use crate::domain::{Role, User};

/// One row of the user table.
pub struct UserRow<'a> {
    pub user: &'a User,
    pub avatar_url: String,
}

#[derive(Serialize)]
struct RowView<'a> {
    id: i32,
    name: String,
    email: &'a str,
    role: &'a str,
    status: &'static str,
    active: bool,
    avatar_url: &'a str,
}

impl<'a> From<&'a UserRow<'a>> for RowView<'a> {
    fn from(row: &'a UserRow<'a>) -> Self {
        let user = row.user;
        Self {
            id: user.id,
            name: format!("{} {} {}", user.first_name, user.last_name, user.middle_name)
                .trim_end()
                .to_string(),
            email: &user.email,
            role: &user.role_name,
            status: user.status.as_str(),
            active: user.is_active(),
            avatar_url: &row.avatar_url,
        }
    }
}

pub fn user_list_page(views: &Views, nav: &Nav, rows: &[UserRow<'_>]) -> Response {
    let rows: Vec<RowView<'_>> = rows.iter().map(RowView::from).collect();
    let mut context = page_context("Users", Some(nav), &[], None);
    context.insert("rows", &rows);
    views.render(StatusCode::OK, "users/list.html", &context)
}

pub struct CreateUserView<'a> {
    pub fields: &'a NewUserFields,
    pub roles: &'a [Role],
    pub errors: &'a [String],
    pub success: Option<&'a str>,
}

pub fn create_user_page(views: &Views, nav: &Nav, view: &CreateUserView<'_>) -> Response {
    let fields = view.fields;
    let mut context = page_context("New user", Some(nav), view.errors, view.success);
    insert_name_fields(&mut context, &fields.names);
    insert_avatar_input(&mut context, None, false);
    context.insert("email", &fields.email);
    context.insert("roles", view.roles);
    context.insert("selected_role", &fields.role_id);
    context.insert("status", &fields.status);
    views.render(StatusCode::OK, "users/new.html", &context)
}

pub struct EditUserView<'a> {
    pub user: &'a User,
    pub fields: &'a AccountFields,
    pub roles: &'a [Role],
    pub avatar_url: String,
    pub errors: &'a [String],
    pub success: Option<&'a str>,
}

pub fn edit_user_page(views: &Views, nav: &Nav, view: &EditUserView<'_>) -> Response {
    let fields = view.fields;
    let mut context = page_context("Edit user", Some(nav), view.errors, view.success);
    insert_name_fields(&mut context, &fields.names);
    insert_avatar_input(&mut context, Some(&view.avatar_url), view.user.avatar.is_some());
    context.insert("user_id", &view.user.id);
    context.insert("email", &view.user.email);
    context.insert("roles", view.roles);
    context.insert("selected_role", &fields.role_id);
    context.insert("status", &fields.status);
    views.render(StatusCode::OK, "users/edit.html", &context)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::body_text;
    use super::*;
    use crate::application::accounts::NameFields;

    fn admin_nav() -> Nav {
        Nav {
            display_name: "Root".into(),
            role: "admin".into(),
            is_admin: true,
            avatar_url: "/uploads/avatars/default.png".into(),
        }
    }

    #[tokio::test]
    async fn create_form_keeps_role_and_escapes_input() {
        let views = Views::new().unwrap();
        let fields = NewUserFields {
            names: NameFields {
                first_name: "\"><b>Ana".into(),
                last_name: "Lima".into(),
                middle_name: String::new(),
            },
            email: "ana@example.com".into(),
            role_id: Some(3),
            status: "inactive".into(),
        };
        let roles = vec![
            Role { id: 1, name: "admin".into() },
            Role { id: 3, name: "user".into() },
        ];
        let view = CreateUserView {
            fields: &fields,
            roles: &roles,
            errors: &[],
            success: None,
        };

        let html = body_text(create_user_page(&views, &admin_nav(), &view)).await;
        assert!(html.contains(r#"<option value="3" selected>user</option>"#));
        assert!(html.contains(r#"<option value="1">admin</option>"#));
        assert!(html.contains(r#"<option value="inactive" selected>Inactive</option>"#));
        assert!(html.contains(r#"value="ana@example.com""#));
        assert!(!html.contains("<b>Ana"));
        assert!(!html.contains("Remove current avatar"));
    }
}
