use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Portal Router Module
///
/// The dashboard area and its JSON API.
///
/// Access Control Strategy:
/// The three page routes match the guard's protected prefixes, so an
/// unauthenticated browser never reaches them; it is redirected to `/login`
/// with a return path. The `/api/v1` data routes are classified public by the
/// guard (they are fetched by page scripts, not navigated to) and instead
/// authenticate per request through the `CurrentUser` extractor, which rejects
/// with 401 and a "session required" notice before any handler work happens.
pub fn portal_routes() -> Router<AppState> {
    Router::new()
        // --- Dashboard Pages (guard-protected prefixes) ---
        .route("/dashboard", get(handlers::dashboard_page))
        .route("/transactions", get(handlers::transactions_page))
        .route("/simulator", get(handlers::simulator_page))
        // --- Dashboard Data ---
        // GET  /api/v1/transactions: all movements, oldest first.
        // POST /api/v1/transactions: register a movement (quick-add).
        .route(
            "/api/v1/transactions",
            get(handlers::get_transactions).post(handlers::add_transaction),
        )
        // GET /api/v1/goals: savings goals by priority.
        .route("/api/v1/goals", get(handlers::get_goals))
        // GET /api/v1/balance: accumulated total plus the cumulative chart series.
        .route("/api/v1/balance", get(handlers::get_balance))
        // --- External Services (proxied with the caller's bearer token) ---
        // POST /api/v1/chat/ask: the AI assistant.
        .route("/api/v1/chat/ask", post(handlers::ask_assistant))
        // POST /api/v1/simulate/run: the what-if budget simulation.
        .route("/api/v1/simulate/run", post(handlers::run_simulation))
}
