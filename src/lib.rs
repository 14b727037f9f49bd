use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod finance_api;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Portal, Notices).
pub mod routes;
use routes::{notices, portal, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point.
pub use config::AppConfig;
pub use finance_api::{FinanceState, HttpFinanceApi, MockFinanceApi};
pub use guard::RouteRules;
pub use notify::NoticeHub;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MockSessionProvider, SessionState, SupabaseSessionProvider};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the JSON API
/// from the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` annotations.
/// Served at `/api-docs/openapi.json`, with the UI under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_transactions, handlers::add_transaction, handlers::get_goals,
        handlers::get_balance, handlers::ask_assistant, handlers::run_simulation,
        handlers::current_notice, handlers::dismiss_notice
    ),
    components(
        schemas(
            models::Transaction, models::Goal, models::NewTransactionRequest,
            models::ChatRequest, models::ChatResponse,
            models::SimulationParameters, models::SimulationRequest,
            models::ProjectedPoint, models::SimulationResponse,
            models::BalancePoint, models::BalanceOverview,
            notify::Notice,
        )
    ),
    tags(
        (name = "finanzas-portal", description = "Personal Finance Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all application
/// services and configuration, shared across every incoming request.
#[derive(Clone)]
pub struct AppState {
    /// Read access to the externally managed finance database.
    pub repo: RepositoryState,
    /// The Session Provider consulted by the route guard and the auth flows.
    pub sessions: SessionState,
    /// The external chat/simulation API client.
    pub finance: FinanceState,
    /// The process-wide toast notification hub.
    pub notices: NoticeHub,
    /// The static routing configuration the guard evaluates against.
    pub rules: Arc<RouteRules>,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These let handlers and extractors pull individual components out of the
// shared AppState instead of depending on the whole container.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for FinanceState {
    fn from_ref(app_state: &AppState) -> FinanceState {
        app_state.finance.clone()
    }
}

impl FromRef<AppState> for NoticeHub {
    fn from_ref(app_state: &AppState) -> NoticeHub {
        app_state.notices.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the route guard to every request,
/// stacks the observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Auth entry points and other unguarded endpoints.
        .merge(public::public_routes())
        // Dashboard pages and the JSON API behind them.
        .merge(portal::portal_routes())
        // Toast notification channel.
        .merge(notices::notices_routes())
        // Route Guard: classifies *every* request path, probes the session
        // once, and issues pass-through or redirect, including the cookie
        // rotation side effects of the probe on either path.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in
                // a tracing span correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the `TraceLayer` span: includes the `x-request-id` header (when
/// present) next to the HTTP method and URI so every log line of one request
/// is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
