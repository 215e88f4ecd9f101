use axum::http::StatusCode;
use axum::response::Response;

use super::{page_context, Nav, Views};

pub fn home_page(views: &Views, nav: &Nav) -> Response {
    let context = page_context("Home", Some(nav), &[], None);
    views.render(StatusCode::OK, "home.html", &context)
}
