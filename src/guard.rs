use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    session::{RequestCookies, apply_cookie_mutations},
};

/// RouteClass
///
/// The access class of a request path. Every path maps to exactly one class,
/// derived purely from the path string and the static route lists below; the
/// request method and body never participate in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a valid session (dashboard area).
    Protected,
    /// Must NOT have a valid session (login/signup entry points).
    AuthEntry,
    /// Everything else passes through untouched.
    Public,
}

/// RedirectDecision
///
/// The guard's verdict for a single request: either forward it unchanged or
/// answer with a navigation to another path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    PassThrough,
    Redirect(String),
}

/// RouteRules
///
/// The static routing configuration the guard evaluates against. Constructed
/// once at startup and shared through the application state, so the decision
/// function stays pure and trivially testable.
#[derive(Debug, Clone)]
pub struct RouteRules {
    /// Ordered prefix list; a path matching any entry is `Protected`.
    pub protected_prefixes: Vec<String>,
    /// Exact-match list of authentication entry paths (`AuthEntry`).
    pub auth_entry_paths: Vec<String>,
    /// Where unauthenticated users are sent to log in.
    pub login_path: String,
    /// Default landing page for already-authenticated users.
    pub landing_path: String,
}

/// Query parameter carrying the originally requested path through the login
/// redirect, so the login flow can return the user where they started.
pub const REDIRECTED_FROM: &str = "redirectedFrom";

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/transactions".to_string(),
                "/simulator".to_string(),
            ],
            auth_entry_paths: vec!["/login".to_string(), "/signup".to_string()],
            login_path: "/login".to_string(),
            landing_path: "/dashboard".to_string(),
        }
    }
}

impl RouteRules {
    /// classify
    ///
    /// Pure path classification. Prefix membership in the protected set takes
    /// precedence over the auth-entry exact-match set.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return RouteClass::Protected;
        }
        if self.auth_entry_paths.iter().any(|entry| entry == path) {
            return RouteClass::AuthEntry;
        }
        RouteClass::Public
    }

    /// evaluate
    ///
    /// The guard's decision function. First matching rule wins:
    /// 1. Protected class without a valid session → redirect to the login
    ///    entry point, carrying the original path in `redirectedFrom`.
    /// 2. Auth-entry class with a valid session → redirect to the landing page.
    /// 3. Otherwise → pass-through.
    ///
    /// Deterministic: the same `(path, session_valid)` pair always yields the
    /// same decision.
    pub fn evaluate(&self, path: &str, session_valid: bool) -> RedirectDecision {
        match self.classify(path) {
            RouteClass::Protected if !session_valid => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(REDIRECTED_FROM, path)
                    .finish();
                RedirectDecision::Redirect(format!("{}?{}", self.login_path, query))
            }
            RouteClass::AuthEntry if session_valid => {
                RedirectDecision::Redirect(self.landing_path.clone())
            }
            _ => RedirectDecision::PassThrough,
        }
    }
}

/// route_guard
///
/// Middleware applied to the whole router: classifies the request path, probes
/// the Session Provider once, and either forwards the request or answers with
/// a 307 redirect.
///
/// The session probe may rotate credentials while being queried; those
/// mutations arrive as explicit `CookieMutation` values and are appended to
/// the outgoing response on *every* path out of this function, redirects
/// included. A failed probe is reported by the provider as an invalid session,
/// so this middleware never aborts the request pipeline.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    // Read-only cookie snapshot for this request; mutations only ever apply
    // to the outgoing response.
    let cookies = RequestCookies::from_headers(request.headers());
    let probe = state.sessions.probe(&cookies).await;

    let decision = state.rules.evaluate(&path, probe.status.is_valid());

    let mut response = match decision {
        RedirectDecision::PassThrough => next.run(request).await,
        RedirectDecision::Redirect(target) => {
            tracing::debug!(from = %path, to = %target, "route guard redirect");
            redirect_response(&target)
        }
    };

    apply_cookie_mutations(&mut response, &probe.refreshed);

    response
}

/// Builds a 307 response so the client retries the original method against the
/// new location, matching the edge-redirect behavior the frontend expects.
fn redirect_response(target: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    if let Ok(value) = header::HeaderValue::from_str(target) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}
