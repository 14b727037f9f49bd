use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    http::{HeaderMap, header},
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::decode_access_token, config::AppConfig};

/// Cookie carrying the Supabase access token (a signed JWT).
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie carrying the opaque refresh token used to rotate an expired session.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

/// RequestCookies
///
/// A read-only snapshot of the request's cookies, taken once per request.
/// The Session Provider only ever reads from this snapshot; any credential
/// rotation it performs is returned as explicit [`CookieMutation`] values to be
/// applied to the outgoing response, never written back into the request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    values: HashMap<String, String>,
}

impl RequestCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for raw in headers.get_all(header::COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    values.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// CookieMutation
///
/// A single credential mutation destined for the outgoing response. Modeling
/// rotations as values keeps the side effect visible in the provider's
/// interface instead of hiding it in a shared mutable cookie jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieMutation {
    pub name: String,
    pub value: String,
    /// `Some(0)` expires the cookie immediately (a removal).
    pub max_age: Option<i64>,
}

impl CookieMutation {
    pub fn set(name: &str, value: &str, max_age: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            max_age,
        }
    }

    pub fn clear(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            max_age: Some(0),
        }
    }

    /// Renders the mutation as a `Set-Cookie` header value. Session cookies
    /// are HttpOnly and scoped to the whole site.
    pub fn to_header_value(&self) -> String {
        let mut rendered = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", self.name, self.value);
        if let Some(max_age) = self.max_age {
            rendered.push_str(&format!("; Max-Age={}", max_age));
        }
        rendered
    }
}

/// apply_cookie_mutations
///
/// Appends each mutation as a `Set-Cookie` header on the outgoing response.
/// Used by the route guard (refresh rotations) and the auth flow handlers
/// (sign-in, logout) alike.
pub fn apply_cookie_mutations(response: &mut Response, mutations: &[CookieMutation]) {
    for mutation in mutations {
        if let Ok(value) = header::HeaderValue::from_str(&mutation.to_header_value()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

/// Session
///
/// The resolved identity behind a valid session: who the user is and the
/// access token to present to the external finance API on their behalf.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
}

/// SessionStatus
///
/// The Session Provider's verdict for one request. Probe failures are folded
/// into `Invalid` by the provider, so callers never see an error variant.
#[derive(Debug, Clone)]
pub enum SessionStatus {
    Valid(Session),
    Invalid,
}

impl SessionStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionStatus::Valid(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionStatus::Valid(session) => Some(session),
            SessionStatus::Invalid => None,
        }
    }
}

/// SessionProbe
///
/// The full result of consulting the Session Provider: the validity verdict
/// plus any credential mutations that must ride on the outgoing response
/// (e.g., a rotated access/refresh token pair).
#[derive(Debug, Clone, Default)]
pub struct SessionProbe {
    pub status: SessionStatus,
    pub refreshed: Vec<CookieMutation>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Invalid
    }
}

impl SessionProbe {
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn valid(session: Session) -> Self {
        Self {
            status: SessionStatus::Valid(session),
            refreshed: Vec::new(),
        }
    }
}

/// SessionGrant
///
/// A freshly issued token pair from the auth service (password grant, refresh
/// grant). Convertible into the cookie mutations that persist it client-side.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl SessionGrant {
    pub fn cookie_mutations(&self) -> Vec<CookieMutation> {
        vec![
            CookieMutation::set(ACCESS_TOKEN_COOKIE, &self.access_token, self.expires_in),
            // Refresh tokens outlive the access token; give them a week.
            CookieMutation::set(REFRESH_TOKEN_COOKIE, &self.refresh_token, Some(60 * 60 * 24 * 7)),
        ]
    }
}

/// AuthServiceError
///
/// Failure modes when talking to the external auth service. `Rejected` carries
/// the service's own message so the UI can surface it verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// SessionProvider
///
/// The seam between this portal and the external auth service. `probe` is
/// consulted once per request by the route guard and must never fail: any
/// internal error is reported as an invalid session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Determines session validity from the request's cookie snapshot,
    /// performing at most one network round trip (a refresh-token rotation).
    async fn probe(&self, cookies: &RequestCookies) -> SessionProbe;

    /// Password-grant sign-in. Returns the issued token pair on success.
    async fn sign_in(&self, email: &str, password: &str)
    -> Result<SessionGrant, AuthServiceError>;

    /// Registers a new account. Supabase sends the confirmation email itself;
    /// no session is established here.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthServiceError>;
}

/// The shared trait-object handle stored in the application state.
pub type SessionState = Arc<dyn SessionProvider>;

/// SupabaseSessionProvider
///
/// The production implementation. Access tokens are validated locally with the
/// project's JWT secret (no network hop on the happy path); an expired or
/// missing access token falls back to one refresh-grant round trip when a
/// refresh cookie is present.
pub struct SupabaseSessionProvider {
    supabase_url: String,
    anon_key: String,
    jwt_secret: String,
    http: reqwest::Client,
}

/// Loose error payload shape used by the Supabase auth endpoints.
#[derive(Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl SupabaseSessionProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionGrant, AuthServiceError> {
        let url = format!(
            "{}/auth/v1/token?grant_type=refresh_token",
            self.supabase_url
        );
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(response.json::<SessionGrant>().await?)
    }

    /// Builds a `Session` from a raw access token, if it validates.
    fn session_from_token(&self, token: &str) -> Option<Session> {
        let claims = decode_access_token(&self.jwt_secret, token).ok()?;
        Some(Session {
            user_id: claims.sub,
            email: claims.email,
            access_token: token.to_string(),
        })
    }
}

async fn rejection(response: reqwest::Response) -> AuthServiceError {
    let status = response.status().as_u16();
    let message = match response.json::<AuthErrorBody>().await {
        Ok(body) => body
            .error_description
            .or(body.msg)
            .or(body.message)
            .unwrap_or_else(|| "Solicitud rechazada por el servicio de autenticación".to_string()),
        Err(_) => "Solicitud rechazada por el servicio de autenticación".to_string(),
    };
    AuthServiceError::Rejected { status, message }
}

#[async_trait]
impl SessionProvider for SupabaseSessionProvider {
    async fn probe(&self, cookies: &RequestCookies) -> SessionProbe {
        // Happy path: the access-token cookie still validates locally.
        if let Some(token) = cookies.get(ACCESS_TOKEN_COOKIE) {
            if let Some(session) = self.session_from_token(token) {
                return SessionProbe::valid(session);
            }
        }

        // Expired or absent access token: attempt one rotation.
        let Some(refresh_token) = cookies.get(REFRESH_TOKEN_COOKIE) else {
            return SessionProbe::invalid();
        };

        match self.refresh(refresh_token).await {
            Ok(grant) => match self.session_from_token(&grant.access_token) {
                Some(session) => SessionProbe {
                    status: SessionStatus::Valid(session),
                    refreshed: grant.cookie_mutations(),
                },
                None => SessionProbe::invalid(),
            },
            Err(e) => {
                // A failed probe is an invalid session, never a request error.
                tracing::warn!("session refresh failed: {e}");
                SessionProbe::invalid()
            }
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionGrant, AuthServiceError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.supabase_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(response.json::<SessionGrant>().await?)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthServiceError> {
        let url = format!("{}/auth/v1/signup", self.supabase_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

/// MockSessionProvider
///
/// Scripted implementation used by unit and integration tests: the probe
/// verdict, refreshed cookies, and sign-in outcome are all fixed up front, so
/// the guard and handlers can be exercised without an auth service.
#[derive(Default)]
pub struct MockSessionProvider {
    pub session: Option<Session>,
    pub refreshed: Vec<CookieMutation>,
    pub grant: Option<SessionGrant>,
}

impl MockSessionProvider {
    /// No session, no refresh side effects.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A valid session for the given user.
    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            session: Some(Session {
                user_id,
                email: Some("user@example.com".to_string()),
                access_token: "mock-access-token".to_string(),
            }),
            refreshed: Vec::new(),
            grant: None,
        }
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn probe(&self, _cookies: &RequestCookies) -> SessionProbe {
        SessionProbe {
            status: match &self.session {
                Some(session) => SessionStatus::Valid(session.clone()),
                None => SessionStatus::Invalid,
            },
            refreshed: self.refreshed.clone(),
        }
    }

    async fn sign_in(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<SessionGrant, AuthServiceError> {
        match &self.grant {
            Some(grant) => Ok(grant.clone()),
            None => Err(AuthServiceError::Rejected {
                status: 400,
                message: "Credenciales inválidas".to_string(),
            }),
        }
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<(), AuthServiceError> {
        Ok(())
    }
}
