//! Session middleware for the HTML pages
//!
//! The signed session token lives in an HttpOnly cookie. Pages behind
//! [`require_session`] receive the [`RequestContext`] through request
//! extensions; anonymous visitors, and sessions whose account is gone or
//! inactive, are redirected to the login page.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

use crate::application::identity::{IdentityService, RequestContext, SignedSession};
use crate::interfaces::http::views::Views;

pub const SESSION_COOKIE: &str = "portal_session";

/// Attributes of the session cookie
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    /// Adds `Secure`; enable behind HTTPS
    pub secure: bool,
}

impl CookieSettings {
    /// `Set-Cookie` value carrying a freshly signed session.
    pub fn session(&self, session: &SignedSession) -> Option<HeaderValue> {
        self.build(&session.token, session.expires_in)
    }

    /// `Set-Cookie` value that deletes the session cookie.
    pub fn cleared(&self) -> Option<HeaderValue> {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: i64) -> Option<HeaderValue> {
        let secure = if self.secure { " Secure;" } else { "" };
        let cookie = format!(
            "{}={}; Path=/; HttpOnly;{} SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, value, secure, max_age
        );
        match cookie.parse() {
            Ok(header) => Some(header),
            Err(e) => {
                error!(error = %e, "Failed to build session cookie");
                None
            }
        }
    }
}

/// Session middleware state
#[derive(Clone)]
pub struct SessionState {
    pub identity: Arc<IdentityService>,
    pub cookies: CookieSettings,
    pub views: Arc<Views>,
}

/// Reads the session token from the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .find_map(|kv| kv.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
}

/// Resolves the session cookie into a [`RequestContext`] or redirects to
/// `/login`.
pub async fn require_session(
    State(state): State<SessionState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()) else {
        return Redirect::to("/login").into_response();
    };

    match state.identity.authenticate(token).await {
        Ok(Some(ctx)) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => {
            error!(error = %e, "Failed to resolve session");
            state.views.server_error()
        }
        Ok(None) => {
            let mut response = Redirect::to("/login").into_response();
            if let Some(cleared) = state.cookies.cleared() {
                response.headers_mut().append(header::SET_COOKIE, cleared);
            }
            response
        }
    }
}

/// Lets only admins through; everyone else goes back to the home page.
/// Must run inside [`require_session`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let allowed = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_admin);

    if !allowed {
        debug!(path = %request.uri().path(), "Admin page refused");
        return Redirect::to("/").into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; portal_session=abc.def.ghi; lang=es"),
        );
        assert_eq!(session_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn similarly_named_or_empty_cookies_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("portal_session_old=zzz; portal_session="),
        );
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        let plain = CookieSettings::default().cleared().unwrap();
        assert_eq!(
            plain.to_str().unwrap(),
            "portal_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );

        let secure = CookieSettings { secure: true }.cleared().unwrap();
        assert!(secure.to_str().unwrap().contains("HttpOnly; Secure; SameSite=Lax"));
    }
}
