use axum::{extract::State, response::Response, Extension};

use crate::application::identity::RequestContext;
use crate::interfaces::http::router::AppState;
use crate::interfaces::http::views::{home::home_page, Nav};

/// `GET /`
pub async fn home(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Response {
    home_page(&state.views, &Nav::new(&ctx, &state.avatars))
}
