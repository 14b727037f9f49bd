use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{ChatResponse, SimulationRequest, SimulationResponse};

/// FinanceApiError
///
/// Failure modes when calling the external chat/simulation API. Both are
/// caught at the call site and surfaced to the user as a dismissible notice;
/// neither ever reaches the rendering layer as a crash.
#[derive(Debug, thiserror::Error)]
pub enum FinanceApiError {
    /// The service answered with a non-2xx status and a `detail` message.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    /// The service could not be reached or returned an unreadable payload.
    #[error("No se pudo contactar el servicio financiero")]
    Transport(#[from] reqwest::Error),
}

/// FinanceApi
///
/// The contract for the external finance backend. Both operations authenticate
/// with the caller's bearer token; this portal never holds credentials of its
/// own for that service.
#[async_trait]
pub trait FinanceApi: Send + Sync {
    /// `POST /api/v1/chat/ask`: the AI assistant.
    async fn ask_assistant(&self, token: &str, query: &str)
    -> Result<ChatResponse, FinanceApiError>;

    /// `POST /api/v1/simulate/run`: the what-if budget simulation.
    async fn run_simulation(
        &self,
        token: &str,
        request: &SimulationRequest,
    ) -> Result<SimulationResponse, FinanceApiError>;
}

/// The shared trait-object handle stored in the application state.
pub type FinanceState = Arc<dyn FinanceApi>;

/// HttpFinanceApi
///
/// The concrete reqwest-backed client.
pub struct HttpFinanceApi {
    base_url: String,
    http: reqwest::Client,
}

/// Error payload shape of the upstream service (`{"detail": "..."}`).
#[derive(Deserialize)]
struct UpstreamError {
    detail: Option<String>,
}

impl HttpFinanceApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn rejection(response: reqwest::Response) -> FinanceApiError {
        let status = response.status().as_u16();
        let detail = match response.json::<UpstreamError>().await {
            Ok(body) => body.detail.unwrap_or_else(|| "Error inesperado".to_string()),
            Err(_) => "Error inesperado".to_string(),
        };
        FinanceApiError::Rejected { status, detail }
    }
}

#[async_trait]
impl FinanceApi for HttpFinanceApi {
    async fn ask_assistant(
        &self,
        token: &str,
        query: &str,
    ) -> Result<ChatResponse, FinanceApiError> {
        let url = format!("{}/api/v1/chat/ask", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<ChatResponse>().await?)
    }

    async fn run_simulation(
        &self,
        token: &str,
        request: &SimulationRequest,
    ) -> Result<SimulationResponse, FinanceApiError> {
        let url = format!("{}/api/v1/simulate/run", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<SimulationResponse>().await?)
    }
}

/// MockFinanceApi
///
/// Scripted implementation for tests. Records how many calls reached it so
/// tests can assert that unauthenticated requests never make it this far.
#[derive(Default)]
pub struct MockFinanceApi {
    /// When set, every operation fails with this `detail` message.
    pub failure_detail: Option<String>,
    pub calls: AtomicUsize,
}

impl MockFinanceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing(detail: &str) -> Self {
        Self {
            failure_detail: Some(detail.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FinanceApi for MockFinanceApi {
    async fn ask_assistant(
        &self,
        _token: &str,
        query: &str,
    ) -> Result<ChatResponse, FinanceApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.failure_detail {
            return Err(FinanceApiError::Rejected {
                status: 502,
                detail: detail.clone(),
            });
        }
        Ok(ChatResponse {
            answer: format!("respuesta simulada a: {query}"),
        })
    }

    async fn run_simulation(
        &self,
        _token: &str,
        request: &SimulationRequest,
    ) -> Result<SimulationResponse, FinanceApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.failure_detail {
            return Err(FinanceApiError::Rejected {
                status: 502,
                detail: detail.clone(),
            });
        }
        Ok(SimulationResponse {
            simulation_id: Some("mock-simulation".to_string()),
            summary: format!("Proyección simulada para {}", request.name),
            projected_data: Vec::new(),
        })
    }
}
