//! Server-rendered HTML
//!
//! Pages are Tera templates compiled into the binary from `templates/`.
//! Every template name ends in `.html`, so Tera autoescapes all values;
//! handlers pass raw user text.

pub mod auth;
pub mod home;
pub mod profile;
pub mod users;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::error;

use crate::application::accounts::NameFields;
use crate::application::identity::RequestContext;
use crate::infrastructure::storage::AvatarStore;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("partials/alerts.html", include_str!("templates/partials/alerts.html")),
    ("partials/name_fields.html", include_str!("templates/partials/name_fields.html")),
    ("partials/account_options.html", include_str!("templates/partials/account_options.html")),
    ("partials/avatar_input.html", include_str!("templates/partials/avatar_input.html")),
    ("login.html", include_str!("templates/login.html")),
    ("home.html", include_str!("templates/home.html")),
    ("message.html", include_str!("templates/message.html")),
    ("profile.html", include_str!("templates/profile.html")),
    ("users/list.html", include_str!("templates/users/list.html")),
    ("users/new.html", include_str!("templates/users/new.html")),
    ("users/edit.html", include_str!("templates/users/edit.html")),
];

const MAX_AVATAR_LABEL: &str = "2MB";

/// Compiled page templates, shared through the router state.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    fn render(&self, status: StatusCode, template: &str, context: &Context) -> Response {
        match self.tera.render(template, context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!(template, error = ?e, "Failed to render template");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }

    /// Generic failure page; details stay in the logs.
    pub fn server_error(&self) -> Response {
        let errors = ["Something went wrong. Please try again later.".to_string()];
        let context = page_context("Error", None, &errors, None);
        self.render(StatusCode::INTERNAL_SERVER_ERROR, "message.html", &context)
    }

    pub fn not_found(&self, nav: &Nav, message: &str) -> Response {
        let errors = [message.to_string()];
        let context = page_context("Not found", Some(nav), &errors, None);
        self.render(StatusCode::NOT_FOUND, "message.html", &context)
    }
}

/// Navigation bar data for a signed-in user.
#[derive(Debug, Serialize)]
pub struct Nav {
    pub display_name: String,
    pub role: String,
    pub is_admin: bool,
    pub avatar_url: String,
}

impl Nav {
    pub fn new(ctx: &RequestContext, avatars: &AvatarStore) -> Self {
        Self {
            display_name: ctx.display_name.clone(),
            role: ctx.role.clone(),
            is_admin: ctx.is_admin(),
            avatar_url: avatars.public_url(ctx.avatar.as_deref()),
        }
    }
}

#[derive(Serialize)]
struct TextField<'a> {
    name: &'static str,
    label: &'static str,
    value: &'a str,
    required: bool,
}

/// Keys read by `base.html` and `partials/alerts.html`.
fn page_context(title: &str, nav: Option<&Nav>, errors: &[String], success: Option<&str>) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("nav", &nav);
    context.insert("errors", errors);
    context.insert("success", &success);
    context
}

fn insert_name_fields(context: &mut Context, names: &NameFields) {
    let fields = [
        TextField { name: "first_name", label: "First name", value: &names.first_name, required: true },
        TextField { name: "last_name", label: "Last name", value: &names.last_name, required: true },
        TextField { name: "middle_name", label: "Middle name", value: &names.middle_name, required: false },
    ];
    context.insert("name_fields", &fields);
}

/// Keys read by `partials/avatar_input.html`.
fn insert_avatar_input(context: &mut Context, current: Option<&str>, removable: bool) {
    context.insert("current_avatar", &current);
    context.insert("removable", &removable);
    context.insert("max_avatar", MAX_AVATAR_LABEL);
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::response::Response;

    pub async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
