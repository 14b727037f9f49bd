use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. The route guard still sees every
/// request here: `/login` and `/signup` are in the auth-entry set, so a user
/// who already holds a valid session is redirected to the dashboard instead.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // The login entry point. The guard attaches ?redirectedFrom=<path>
        // when it bounced a protected request here; the form carries it
        // through so a successful sign-in returns the user where they started.
        .route(
            "/login",
            get(handlers::login_page).post(handlers::login_submit),
        )
        // GET/POST /signup
        // Account registration against the external auth service.
        .route(
            "/signup",
            get(handlers::signup_page).post(handlers::signup_submit),
        )
        // POST /logout
        // Clears the session cookies. Classified public so it works even with
        // a half-expired session.
        .route("/logout", post(handlers::logout))
}
