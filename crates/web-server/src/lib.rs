//! # Classbook HTTP API
//!
//! An axum router over the repository registry. Authentication is a bearer
//! token checked by [`auth::authenticate`] on every request; role gating is
//! done per handler through extractors.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use configuration::Config;
use database::Models;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;

use handlers::{
    academic, classes, groups, journals, logs, marks, sessions, students, taxonomy, users,
};

/// The shared application state that all handlers can access.
#[derive(Debug, Clone)]
pub struct AppState {
    pub models: Models,
    /// Lifetime of a freshly issued session.
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(models: Models, config: &Config) -> Self {
        Self { models, session_ttl: chrono::Duration::hours(config.session.ttl_hours) }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin.");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
        .expose_headers(Any)
}

/// Builds the full application router.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // --- Sessions ---
        .route("/sessions", post(sessions::login).get(sessions::list_own))
        .route("/sessions/:id", delete(sessions::delete_own))
        // --- Identity ---
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).patch(users::update))
        .route("/users/:id/class", get(users::get_class).put(users::set_class))
        .route("/users/:id/journals", post(users::add_to_journal))
        .route("/users/:id/journals/:journal_id", delete(users::remove_from_journal))
        .route("/users/:id/children", get(users::list_children).post(users::link_child))
        .route("/classes", get(classes::list).post(classes::create))
        .route("/classes/:id", get(classes::get).patch(classes::update))
        .route("/classes/:id/users", get(classes::list_users))
        .route("/groups", get(groups::list).post(groups::create))
        .route("/groups/:id", get(groups::get))
        .route("/groups/:id/users", get(groups::list_users))
        .route("/groups/:id/users/:user_id", put(groups::add_user).delete(groups::remove_user))
        // --- Taxonomy ---
        .route("/subjects", get(taxonomy::list_subjects).post(taxonomy::create_subject))
        .route("/subjects/:id", get(taxonomy::get_subject).patch(taxonomy::update_subject))
        .route("/grades", get(taxonomy::list_grades).post(taxonomy::create_grade))
        .route("/grades/:id", get(taxonomy::get_grade).patch(taxonomy::update_grade))
        .route("/years", get(taxonomy::list_years).post(taxonomy::create_year))
        .route("/years/current", get(taxonomy::current_year))
        .route("/years/:id/current", put(taxonomy::set_current_year))
        // --- Journals ---
        .route("/journals", get(journals::list).post(journals::create))
        .route(
            "/journals/:id",
            get(journals::get).patch(journals::update).delete(journals::delete),
        )
        .route("/journals/:id/students", get(journals::list_students))
        .route("/journals/:id/lessons", get(journals::list_lessons))
        .route("/journals/:id/assignments", get(journals::list_assignments))
        .route("/journals/:id/marks", get(journals::matrix))
        // --- Lessons and assignments ---
        .route("/lessons", post(academic::create_lesson))
        .route(
            "/lessons/:id",
            get(academic::get_lesson)
                .patch(academic::update_lesson)
                .delete(academic::delete_lesson),
        )
        .route("/assignments", post(academic::create_assignment))
        .route(
            "/assignments/:id",
            get(academic::get_assignment)
                .patch(academic::update_assignment)
                .delete(academic::delete_assignment),
        )
        // --- Marks ---
        .route("/marks", post(marks::create))
        .route("/marks/:id", get(marks::get).patch(marks::supersede).delete(marks::delete))
        .route("/students/:id/latest", get(students::latest))
        .route("/students/:id/marks", get(students::marks))
        .route("/students/:id/absences", get(students::absences))
        .route("/students/:id/journals", get(students::journals))
        .route("/students/:id/absences/:mark_id/excuse", post(students::excuse))
        .route("/students/:id/excuses/:excuse_id", delete(students::delete_excuse))
        // --- Audit ---
        .route("/logs", get(logs::list))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .with_state(state)
        .layer(cors_layer(cors_origins))
        // This middleware will automatically log information about every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
}

/// Binds the configured address and serves until the process is stopped.
pub async fn run_server(config: &Config, models: Models) -> anyhow::Result<()> {
    let addr = config.web.listen_addr()?;
    let state = Arc::new(AppState::new(models, config));
    let app = router(state, &config.web.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Web server started and listening.");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use configuration::DatabaseConfig;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    /// A router over a pool that never connects; only routes that fail
    /// before touching the database can be exercised.
    fn app() -> Router {
        let pool = database::connect_lazy(&DatabaseConfig::default()).unwrap();
        let models = Models::new(pool, Duration::from_secs(1));
        let state = Arc::new(AppState::new(models, &Config::default()));
        router(state, &[])
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "available");
    }

    #[tokio::test]
    async fn malformed_tokens_are_rejected_before_lookup() {
        let request = Request::get("/health")
            .header("Authorization", "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "invalid or missing authentication token"
        );
    }

    #[tokio::test]
    async fn anonymous_requests_need_a_session() {
        for path in ["/users", "/logs", "/students/1/latest", "/journals/1/marks"] {
            let response = app()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
            let body = json_body(response).await;
            assert!(body["error"].is_string(), "{path}: {body}");
        }
    }

    #[tokio::test]
    async fn login_bodies_are_validated() {
        let request = Request::post("/sessions")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"email":"not-an-email","password":""}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"]["email"].is_string());
        assert!(body["error"]["password"].is_string());
    }

    #[tokio::test]
    async fn unparseable_json_is_a_bad_request() {
        let request = Request::post("/sessions")
            .header("Content-Type", "application/json")
            .body(Body::from("{"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }
}
