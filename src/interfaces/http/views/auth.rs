use axum::http::StatusCode;
use axum::response::Response;

use super::{page_context, Views};

pub fn login_page(views: &Views, email: &str, error: Option<&str>) -> Response {
    let errors: Vec<String> = error.map(str::to_string).into_iter().collect();
    let mut context = page_context("Sign in", None, &errors, None);
    context.insert("email", email);
    views.render(StatusCode::OK, "login.html", &context)
}
