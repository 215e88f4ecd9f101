//! Sign-in and sign-out pages

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use tracing::{error, warn};

use super::dto::LoginForm;
use crate::domain::DomainError;
use crate::interfaces::http::middleware::session_token;
use crate::interfaces::http::router::AppState;
use crate::interfaces::http::views::auth::login_page;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const ACCOUNT_DISABLED: &str = "This account is inactive.";

/// `GET /login`; signed-in users go straight home.
pub async fn show_login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        match state.identity.authenticate(token).await {
            Ok(Some(_)) => return Redirect::to("/").into_response(),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session check failed on login page"),
        }
    }
    login_page(&state.views, "", None)
}

/// `POST /login`
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.identity.login(&form.email, &form.password).await {
        Ok(session) => {
            let mut response = Redirect::to("/").into_response();
            if let Some(cookie) = state.cookies.session(&session) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            response
        }
        Err(DomainError::Unauthorized(_)) => login_page(&state.views, &form.email, Some(INVALID_CREDENTIALS)),
        Err(DomainError::Forbidden(_)) => login_page(&state.views, &form.email, Some(ACCOUNT_DISABLED)),
        Err(e) => {
            error!(error = %e, "Login failed");
            state.views.server_error()
        }
    }
}

/// `POST /logout`
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response = Redirect::to("/login").into_response();
    if let Some(cleared) = state.cookies.cleared() {
        response.headers_mut().append(header::SET_COOKIE, cleared);
    }
    response
}
