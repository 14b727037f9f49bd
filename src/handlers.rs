use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{Stream, stream};
use serde::Deserialize;
use std::convert::Infallible;

use crate::{
    AppState,
    auth::CurrentUser,
    guard::REDIRECTED_FROM,
    models::{
        self, BalanceOverview, ChatRequest, ChatResponse, Goal, NewTransactionRequest,
        SimulationRequest, SimulationResponse, Transaction,
    },
    notify::{Notice, NoticeHub},
    session::{ACCESS_TOKEN_COOKIE, CookieMutation, REFRESH_TOKEN_COOKIE, apply_cookie_mutations},
};

// --- Form/Query Payloads ---

/// CredentialsForm
///
/// The login/signup form body. The password is only passed through to the
/// external auth service and never persisted or logged here.
#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

/// LoginQuery
///
/// Optional return path attached by the route guard when it bounced an
/// unauthenticated request to the login page.
#[derive(Deserialize, Default)]
pub struct LoginQuery {
    #[serde(rename = "redirectedFrom")]
    pub redirected_from: Option<String>,
}

// --- Auth Flow Handlers ---

/// login_submit
///
/// [Public Route] Exchanges the submitted credentials for a session token pair
/// via the external auth service, persists it as cookies, and returns the user
/// to where the guard intercepted them (or the default landing page).
pub async fn login_submit(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    axum::Form(form): axum::Form<CredentialsForm>,
) -> Response {
    match state.sessions.sign_in(&form.email, &form.password).await {
        Ok(grant) => {
            state
                .notices
                .push(Notice::new("Bienvenido", "Autenticación exitosa"));

            // Only internal paths are honored as return targets.
            let target = query
                .redirected_from
                .filter(|t| t.starts_with('/'))
                .unwrap_or_else(|| state.rules.landing_path.clone());

            let mut response = Redirect::to(&target).into_response();
            apply_cookie_mutations(&mut response, &grant.cookie_mutations());
            response
        }
        Err(e) => {
            tracing::warn!("sign-in rejected: {e}");
            state
                .notices
                .push(Notice::new("Error al iniciar sesión", e.to_string()));
            Redirect::to(&state.rules.login_path).into_response()
        }
    }
}

/// signup_submit
///
/// [Public Route] Registers a new account with the external auth service. No
/// session is established; the service sends its own confirmation email.
pub async fn signup_submit(
    State(state): State<AppState>,
    axum::Form(form): axum::Form<CredentialsForm>,
) -> Response {
    match state.sessions.sign_up(&form.email, &form.password).await {
        Ok(()) => {
            state.notices.push(Notice::new(
                "Cuenta creada",
                "Revisa tu correo para confirmar la cuenta.",
            ));
            Redirect::to(&state.rules.login_path).into_response()
        }
        Err(e) => {
            tracing::warn!("sign-up rejected: {e}");
            state
                .notices
                .push(Notice::new("Error al crear la cuenta", e.to_string()));
            Redirect::to("/signup").into_response()
        }
    }
}

/// logout
///
/// [Public Route] Clears both session cookies and returns to the login page.
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response = Redirect::to(&state.rules.login_path).into_response();
    apply_cookie_mutations(
        &mut response,
        &[
            CookieMutation::clear(ACCESS_TOKEN_COOKIE),
            CookieMutation::clear(REFRESH_TOKEN_COOKIE),
        ],
    );
    response
}

// --- Dashboard Data Handlers ---

/// get_transactions
///
/// [API Route] All movements of the authenticated user, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    responses((status = 200, description = "Movements", body = [Transaction]))
)]
pub async fn get_transactions(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
) -> Json<Vec<Transaction>> {
    Json(state.repo.get_transactions(id).await)
}

/// add_transaction
///
/// [API Route] Registers a new movement for the authenticated user and
/// confirms it with a notice, mirroring the dashboard's quick-add flow.
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = NewTransactionRequest,
    responses(
        (status = 201, description = "Created", body = Transaction),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn add_transaction(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NewTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), StatusCode> {
    match state.repo.add_transaction(id, payload).await {
        Some(transaction) => {
            state.notices.push(Notice::new(
                "Movimiento registrado",
                "El movimiento se registró correctamente.",
            ));
            Ok((StatusCode::CREATED, Json(transaction)))
        }
        None => {
            state.notices.push(Notice::new(
                "Error al registrar",
                "No se pudo guardar el movimiento.",
            ));
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// get_goals
///
/// [API Route] The authenticated user's savings goals, highest priority first.
#[utoipa::path(
    get,
    path = "/api/v1/goals",
    responses((status = 200, description = "Goals", body = [Goal]))
)]
pub async fn get_goals(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
) -> Json<Vec<Goal>> {
    Json(state.repo.get_goals(id).await)
}

/// get_balance
///
/// [API Route] The accumulated balance plus the cumulative series rendered by
/// the dashboard chart.
#[utoipa::path(
    get,
    path = "/api/v1/balance",
    responses((status = 200, description = "Balance overview", body = BalanceOverview))
)]
pub async fn get_balance(
    CurrentUser { id, .. }: CurrentUser,
    State(state): State<AppState>,
) -> Json<BalanceOverview> {
    let transactions = state.repo.get_transactions(id).await;
    Json(BalanceOverview {
        total: models::total_balance(&transactions),
        series: models::balance_series(&transactions),
    })
}

// --- External API Handlers ---

/// ask_assistant
///
/// [API Route] Forwards a question to the external AI assistant with the
/// caller's bearer token. Upstream failures become a dismissible notice and a
/// 502; nothing partial is stored.
#[utoipa::path(
    post,
    path = "/api/v1/chat/ask",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer", body = ChatResponse),
        (status = 502, description = "Assistant unavailable")
    )
)]
pub async fn ask_assistant(
    CurrentUser { access_token, .. }: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    match state
        .finance
        .ask_assistant(&access_token, &payload.query)
        .await
    {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            tracing::warn!("assistant call failed: {e}");
            state.notices.push(Notice::new("Error", e.to_string()));
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// run_simulation
///
/// [API Route] Runs a what-if budget simulation through the external API and
/// echoes the summary as a notice, as the simulator screen does on success.
#[utoipa::path(
    post,
    path = "/api/v1/simulate/run",
    request_body = SimulationRequest,
    responses(
        (status = 200, description = "Projection", body = SimulationResponse),
        (status = 502, description = "Simulator unavailable")
    )
)]
pub async fn run_simulation(
    CurrentUser { access_token, .. }: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SimulationRequest>,
) -> Result<Json<SimulationResponse>, StatusCode> {
    match state.finance.run_simulation(&access_token, &payload).await {
        Ok(result) => {
            state
                .notices
                .push(Notice::new("Simulación completada", result.summary.clone()));
            Ok(Json(result))
        }
        Err(e) => {
            tracing::warn!("simulation call failed: {e}");
            state.notices.push(Notice::new("Error", e.to_string()));
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

// --- Notification Channel Handlers ---

/// current_notice
///
/// [API Route] Snapshot of the visible notice, if any.
#[utoipa::path(
    get,
    path = "/api/v1/notices/current",
    responses((status = 200, description = "Current notice (null when none)", body = Notice))
)]
pub async fn current_notice(State(notices): State<NoticeHub>) -> Json<Option<Notice>> {
    Json(notices.current())
}

/// dismiss_notice
///
/// [API Route] Explicit dismissal from the toast's close affordance.
#[utoipa::path(
    post,
    path = "/api/v1/notices/dismiss",
    responses((status = 204, description = "Dismissed"))
)]
pub async fn dismiss_notice(State(notices): State<NoticeHub>) -> StatusCode {
    notices.dismiss();
    StatusCode::NO_CONTENT
}

/// notices_stream
///
/// [API Route] The display subscriber: an SSE stream that first delivers the
/// current state, then every change. Closing the stream drops the hub
/// subscription, so a torn-down display can never be notified again.
pub async fn notices_stream(
    State(notices): State<NoticeHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = notices.subscribe();
    let stream = stream::unfold(subscription, |mut subscription| async move {
        let update = subscription.recv().await?;
        let event = Event::default().event("notice").json_data(&update).ok()?;
        Some((Ok(event), subscription))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// --- Page Shells ---
// Markup is intentionally minimal; layout and styling live with the frontend
// assets, not in this service.

pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    // Keep the guard's return path alive through the form submission.
    let action = match query.redirected_from.as_deref() {
        Some(target) if target.starts_with('/') => {
            let params = url::form_urlencoded::Serializer::new(String::new())
                .append_pair(REDIRECTED_FROM, target)
                .finish();
            format!("/login?{params}")
        }
        _ => "/login".to_string(),
    };

    Html(format!(
        r#"<!doctype html><html lang="es"><head><meta charset="utf-8"><title>MCP Financiero</title></head>
<body><main>
<h1>MCP Financiero</h1>
<p>Ingresa tus credenciales para continuar.</p>
<form method="post" action="{action}">
  <label for="email">Correo electrónico</label>
  <input id="email" name="email" type="email" autocomplete="email" required>
  <label for="password">Contraseña</label>
  <input id="password" name="password" type="password" autocomplete="current-password" required>
  <button type="submit">Ingresar</button>
</form>
<p><a href="/signup">Crear una cuenta</a></p>
</main></body></html>"#
    ))
}

pub async fn signup_page() -> Html<&'static str> {
    Html(
        r#"<!doctype html><html lang="es"><head><meta charset="utf-8"><title>Crear cuenta</title></head>
<body><main>
<h1>Crear cuenta</h1>
<form method="post" action="/signup">
  <label for="email">Correo electrónico</label>
  <input id="email" name="email" type="email" autocomplete="email" required>
  <label for="password">Contraseña</label>
  <input id="password" name="password" type="password" autocomplete="new-password" required>
  <button type="submit">Registrarme</button>
</form>
</main></body></html>"#,
    )
}

/// Shared shell for the dashboard-area pages: nav plus a mount point the
/// frontend bundle hydrates from the JSON API.
const PAGE_SHELL: &str = r#"<!doctype html><html lang="es"><head><meta charset="utf-8"><title>MCP Financiero</title></head>
<body>
<header><h1>MCP Financiero</h1></header>
<nav>
  <a href="/dashboard">Dashboard</a>
  <a href="/transactions">Transacciones</a>
  <a href="/simulator">Simulador</a>
  <form method="post" action="/logout"><button type="submit">Salir</button></form>
</nav>
<main id="app"></main>
</body></html>"#;

pub async fn dashboard_page() -> Html<&'static str> {
    Html(PAGE_SHELL)
}

pub async fn transactions_page() -> Html<&'static str> {
    Html(PAGE_SHELL)
}

pub async fn simulator_page() -> Html<&'static str> {
    Html(PAGE_SHELL)
}
