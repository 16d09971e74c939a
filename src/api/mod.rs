pub mod auth;
pub mod error;
mod logs;
mod reports;
mod users;
mod validation;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public auth entry points
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password-reset", post(auth::request_password_reset))
        .route(
            "/password",
            post(auth::set_password).put(auth::change_password),
        );

    // Everything below authenticates via the CurrentUser extractor; role
    // checks live in the handlers.
    let api_routes = Router::new()
        // DTR logs
        .route("/logs", get(logs::list_logs))
        .route("/logs", post(logs::create_log))
        .route("/logs/:id/review", post(logs::review_log))
        // Reporting
        .route("/reports/queue", get(reports::queue))
        .route("/reports/verified", get(reports::verified))
        .route("/reports/export", get(reports::export))
        .route("/stats", get(reports::stats))
        // User directory (admin)
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", delete(users::delete_user));

    // Proof attachments are served read-only under /uploads
    let uploads = ServeDir::new(state.proofs.root());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
