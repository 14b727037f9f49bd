use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Notices Router Module
///
/// The HTTP surface of the process-wide notification hub. Every page's toast
/// display talks to these endpoints; the stream subscription is the display's
/// hub listener, so closing the page tears the subscription down with it.
pub fn notices_routes() -> Router<AppState> {
    Router::new()
        // GET /api/v1/notices/current: snapshot of the visible notice.
        .route("/api/v1/notices/current", get(handlers::current_notice))
        // POST /api/v1/notices/dismiss: explicit dismissal (close button).
        .route("/api/v1/notices/dismiss", post(handlers::dismiss_notice))
        // GET /api/v1/notices/stream: SSE with current state, then every change.
        .route("/api/v1/notices/stream", get(handlers::notices_stream))
}
