//! Router and shared state for the web pages

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::accounts::AccountWorkflow;
use crate::application::identity::{IdentityService, RequestContext, SignedSession};
use crate::domain::UserRepositoryInterface;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::database::UserRepository;
use crate::infrastructure::storage::AvatarStore;
use crate::interfaces::http::middleware::{require_admin, require_session, CookieSettings, SessionState};
use crate::interfaces::http::modules::health::HealthState;
use crate::interfaces::http::modules::metrics::{http_metrics_middleware, MetricsState};
use crate::interfaces::http::modules::{auth, health, home, metrics, profile, users};
use crate::interfaces::http::views::Views;

/// State shared by every route. Handler-specific states are derived via
/// `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub accounts: Arc<AccountWorkflow>,
    pub users: Arc<dyn UserRepositoryInterface>,
    pub avatars: AvatarStore,
    pub cookies: CookieSettings,
    pub db: DatabaseConnection,
    pub metrics: PrometheusHandle,
    pub views: Arc<Views>,
    pub started_at: Arc<Instant>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        jwt_config: JwtConfig,
        avatars: AvatarStore,
        bcrypt_cost: u32,
        cookies: CookieSettings,
        metrics: PrometheusHandle,
    ) -> Result<Self, tera::Error> {
        let users: Arc<dyn UserRepositoryInterface> = Arc::new(UserRepository::new(db.clone()));
        Ok(Self {
            identity: Arc::new(IdentityService::new(users.clone(), jwt_config)),
            accounts: Arc::new(AccountWorkflow::new(users.clone(), avatars.clone(), bcrypt_cost)),
            users,
            avatars,
            cookies,
            db,
            metrics,
            views: Arc::new(Views::new()?),
            started_at: Arc::new(Instant::now()),
        })
    }

    /// Signs a new session after the user changed their own account.
    pub fn reissue_session(&self, ctx: &RequestContext) -> Option<SignedSession> {
        match self.identity.issue(ctx) {
            Ok(session) => Some(session),
            Err(e) => {
                error!(user_id = ctx.user_id(), error = %e, "Failed to re-issue session");
                None
            }
        }
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(s: &AppState) -> Self {
        SessionState {
            identity: Arc::clone(&s.identity),
            cookies: s.cookies.clone(),
            views: Arc::clone(&s.views),
        }
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(s: &AppState) -> Self {
        HealthState {
            db: s.db.clone(),
            avatars: s.avatars.clone(),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<AppState> for MetricsState {
    fn from_ref(s: &AppState) -> Self {
        MetricsState {
            handle: s.metrics.clone(),
        }
    }
}

impl FromRef<AppState> for AvatarStore {
    fn from_ref(s: &AppState) -> Self {
        s.avatars.clone()
    }
}

/// Request body limit for the upload forms: four times the avatar limit plus
/// room for the text fields. An avatar cut off by this cap has already
/// exceeded the avatar limit and is reported as too large.
pub fn upload_body_limit(max_avatar_bytes: u64) -> usize {
    let limit = max_avatar_bytes.saturating_mul(4).saturating_add(64 * 1024);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/users", get(users::list_users))
        .route(
            "/admin/users/new",
            get(users::show_create_user).post(users::create_user),
        )
        .route(
            "/admin/users/{id}/edit",
            get(users::show_edit_user).post(users::update_user),
        )
        .route_layer(middleware::from_fn(require_admin));

    let pages = Router::new()
        .route("/", get(home::home))
        .route(
            "/profile",
            get(profile::show_profile).post(profile::update_profile),
        )
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            SessionState::from_ref(&state),
            require_session,
        ))
        .layer(DefaultBodyLimit::max(upload_body_limit(state.avatars.max_bytes())));

    let public = Router::new()
        .route("/login", get(auth::show_login).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    let avatar_route = format!("/{}", state.avatars.config().public_prefix.trim_matches('/'));
    let avatar_files = ServeDir::new(&state.avatars.config().directory);

    Router::new()
        .merge(public)
        .merge(pages)
        .nest_service(&avatar_route, avatar_files)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::application::accounts::validation::EMAIL_TAKEN;
    use crate::application::identity::bootstrap_admin;
    use crate::config::AdminSection;
    use crate::infrastructure::crypto::password::TEST_BCRYPT_COST;
    use crate::infrastructure::database::memory_database;
    use crate::infrastructure::storage::avatar_store::test_support::{store_in, JPEG, PNG};
    use crate::interfaces::http::common::account_form::test_support::{
        chunked, content_type, MultipartBody,
    };

    struct TestApp {
        router: Router,
        state: AppState,
        _dir: TempDir,
    }

    async fn test_app() -> TestApp {
        let db = memory_database().await;
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            db,
            JwtConfig::default(),
            store_in(dir.path()),
            TEST_BCRYPT_COST,
            CookieSettings::default(),
            PrometheusBuilder::new().build_recorder().handle(),
        )
        .unwrap();
        bootstrap_admin(state.users.as_ref(), &AdminSection::default(), TEST_BCRYPT_COST)
            .await
            .unwrap();

        TestApp {
            router: create_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::builder().uri(uri);
            if let Some(cookie) = cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn post_form(&self, uri: &str, cookie: &str, body: Vec<u8>) -> Response {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, content_type())
                .body(chunked(body))
                .unwrap();
            self.send(request).await
        }

        async fn login(&self, email: &str, password: &str) -> Response {
            let request = Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "email={}&password={}",
                    email.replace('@', "%40"),
                    password
                )))
                .unwrap();
            self.send(request).await
        }

        /// Signs in and returns the `Cookie` header value for later requests.
        async fn session_cookie(&self, email: &str, password: &str) -> String {
            let response = self.login(email, password).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            cookie_from(&response).unwrap()
        }

        async fn admin_cookie(&self) -> String {
            self.session_cookie("admin@example.com", "admin12345").await
        }
    }

    fn cookie_from(response: &Response) -> Option<String> {
        let set_cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        set_cookie.split(';').next().map(str::to_string)
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_pages_redirect_to_login() {
        let app = test_app().await;
        for uri in ["/", "/profile", "/admin/users"] {
            let response = app.get(uri, None).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/login");
        }
    }

    #[tokio::test]
    async fn forged_cookie_is_cleared() {
        let app = test_app().await;
        let response = app.get("/", Some("portal_session=forged")).await;
        assert_eq!(location(&response), "/login");
        assert_eq!(cookie_from(&response).as_deref(), Some("portal_session="));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app().await;
        let response = app.get("/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"]["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_is_public() {
        let app = test_app().await;
        let response = app.get("/metrics", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_credentials_rerender_login() {
        let app = test_app().await;
        let response = app.login("admin@example.com", "wrong-pass").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_from(&response).is_none());
        let html = body_text(response).await;
        assert!(html.contains("Invalid email or password."));
        assert!(html.contains("admin@example.com"));
    }

    #[tokio::test]
    async fn admin_sees_user_list() {
        let app = test_app().await;
        let cookie = app.admin_cookie().await;

        let response = app.get("/", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Welcome, System"));

        let response = app.get("/admin/users", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("admin@example.com"));
        assert!(html.contains("/uploads/avatars/default.png"));
    }

    async fn register(app: &TestApp, cookie: &str, email: &str) -> Response {
        let role_id = app
            .state
            .users
            .find_role_by_name("user")
            .await
            .unwrap()
            .unwrap()
            .id;
        let body = MultipartBody::default()
            .text("first_name", "Ana")
            .text("last_name", "Lopez")
            .text("email", email)
            .text("password", "password123")
            .text("password_confirmation", "password123")
            .text("role_id", &role_id.to_string())
            .text("status", "active")
            .file("avatar", "", "application/octet-stream", b"")
            .finish();
        app.post_form("/admin/users/new", cookie, body).await
    }

    #[tokio::test]
    async fn non_admin_is_sent_home() {
        let app = test_app().await;
        let admin = app.admin_cookie().await;
        let created = register(&app, &admin, "ana@example.com").await;
        assert!(body_text(created).await.contains("User registered successfully."));

        let cookie = app.session_cookie("ana@example.com", "password123").await;
        let response = app.get("/admin/users", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn duplicate_email_is_reported_on_the_form() {
        let app = test_app().await;
        let admin = app.admin_cookie().await;
        register(&app, &admin, "ana@example.com").await;

        let response = register(&app, &admin, "ana@example.com").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(EMAIL_TAKEN));
        assert!(html.contains(r#"value="ana@example.com""#));
    }

    #[tokio::test]
    async fn profile_upload_refreshes_session_and_serves_file() {
        let app = test_app().await;
        let cookie = app.admin_cookie().await;

        let body = MultipartBody::default()
            .text("first_name", "Root")
            .text("last_name", "Admin")
            .file("avatar", "me.png", "image/png", PNG)
            .finish();
        let response = app.post_form("/profile", &cookie, body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let refreshed = cookie_from(&response).unwrap();
        assert_ne!(refreshed, cookie);
        let html = body_text(response).await;
        assert!(html.contains("Profile updated successfully."));
        assert!(html.contains("/uploads/avatars/user_1.png"));

        let ctx = app
            .state
            .identity
            .authenticate(refreshed.trim_start_matches("portal_session="))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.display_name, "Root");
        assert_eq!(ctx.avatar.as_deref(), Some("uploads/avatars/user_1.png"));

        let file = app.get("/uploads/avatars/user_1.png", None).await;
        assert_eq!(file.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_upload_is_a_form_error() {
        let app = test_app().await;
        let cookie = app.admin_cookie().await;

        let mut big = JPEG.to_vec();
        big.resize(3 * 1024 * 1024, 0);
        let body = MultipartBody::default()
            .text("first_name", "Root")
            .text("last_name", "Admin")
            .file("avatar", "big.jpg", "image/jpeg", &big)
            .finish();
        let response = app.post_form("/profile", &cookie, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_from(&response).is_none());
        let html = body_text(response).await;
        assert!(html.contains("The avatar exceeds the maximum allowed size (2MB)."));
    }

    #[tokio::test]
    async fn upload_past_body_limit_is_reported_as_too_large() {
        let app = test_app().await;
        let cookie = app.admin_cookie().await;

        let mut huge = JPEG.to_vec();
        huge.resize(9 * 1024 * 1024, 0);
        let body = MultipartBody::default()
            .text("first_name", "Root")
            .text("last_name", "Admin")
            .file("avatar", "huge.jpg", "image/jpeg", &huge)
            .finish();
        let response = app.post_form("/profile", &cookie, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("The avatar exceeds the maximum allowed size (2MB)."));
        assert!(!html.contains("First name is required."));
    }

    #[tokio::test]
    async fn deactivated_user_is_signed_out() {
        let app = test_app().await;
        let admin = app.admin_cookie().await;
        register(&app, &admin, "ana@example.com").await;
        let cookie = app.session_cookie("ana@example.com", "password123").await;
        assert_eq!(app.get("/", Some(&cookie)).await.status(), StatusCode::OK);

        let ana = app.state.users.find_by_email("ana@example.com").await.unwrap().unwrap();
        let body = MultipartBody::default()
            .text("first_name", "Ana")
            .text("last_name", "Lopez")
            .text("role_id", &ana.role_id.to_string())
            .text("status", "inactive")
            .finish();
        let edited = app
            .post_form(&format!("/admin/users/{}/edit", ana.id), &admin, body)
            .await;
        assert_eq!(edited.status(), StatusCode::OK);

        let response = app.get("/", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        assert_eq!(cookie_from(&response).as_deref(), Some("portal_session="));
    }

    #[tokio::test]
    async fn sign_in_ignores_email_case() {
        let app = test_app().await;
        let response = app.login("Admin@Example.com", "admin12345").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn editing_unknown_user_is_not_found() {
        let app = test_app().await;
        let cookie = app.admin_cookie().await;
        let response = app.get("/admin/users/999/edit", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let app = test_app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(location(&response), "/login");
        assert_eq!(cookie_from(&response).as_deref(), Some("portal_session="));
    }
}
