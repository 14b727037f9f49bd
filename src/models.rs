use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Transaction kind marker for money coming in.
pub const KIND_INCOME: &str = "ingreso";
/// Transaction kind marker for money going out.
pub const KIND_EXPENSE: &str = "gasto";

// --- Core Application Schemas (Mapped to Database) ---

/// Transaction
///
/// A single account movement from the `public.transactions` table of the
/// externally managed database.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Transaction {
    pub id: Uuid,
    // FK to the external auth user.
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub amount: f64,

    /// Maps SQL column "type" to Rust field "kind": `type` is a reserved
    /// keyword in Rust, but the API keeps the original JSON name.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,

    pub description: Option<String>,
}

impl Transaction {
    /// The movement's contribution to the balance: income adds, expense
    /// subtracts.
    pub fn signed_amount(&self) -> f64 {
        if self.kind == KIND_INCOME {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Goal
///
/// A savings goal from the `public.financial_goals` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    #[ts(type = "string | null")]
    pub target_date: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
}

/// --- Request Payloads (Input Schemas) ---

/// NewTransactionRequest
///
/// Input payload for registering a movement from the dashboard
/// (POST /api/v1/transactions). The date defaults to "now" when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewTransactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    #[ts(type = "string | null")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// ChatRequest
///
/// Input payload for the AI assistant (POST /api/v1/chat/ask).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChatRequest {
    pub query: String,
}

/// ChatResponse
///
/// The assistant's answer, passed through from the external API untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChatResponse {
    pub answer: String,
}

/// SimulationParameters
///
/// The two what-if levers the simulator exposes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SimulationParameters {
    pub income_change_percent: f64,
    pub expense_cut_flat: f64,
}

/// SimulationRequest
///
/// Input payload for running a budget simulation (POST /api/v1/simulate/run),
/// forwarded verbatim to the external simulation API.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SimulationRequest {
    pub name: String,
    pub parameters: SimulationParameters,
}

/// ProjectedPoint
///
/// One forecast period of the simulation output. The date is a `YYYY-MM`
/// month label produced by the upstream forecaster.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProjectedPoint {
    pub date: String,
    pub projected_amount: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// SimulationResponse
///
/// The external API's simulation result as consumed by the UI.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SimulationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_id: Option<String>,
    pub summary: String,
    pub projected_data: Vec<ProjectedPoint>,
}

/// --- Dashboard Schemas (Output) ---

/// BalancePoint
///
/// One step of the cumulative balance series rendered by the dashboard chart.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BalancePoint {
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub balance: f64,
}

/// BalanceOverview
///
/// Output schema for GET /api/v1/balance: the accumulated total plus the
/// series behind it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BalanceOverview {
    pub total: f64,
    pub series: Vec<BalancePoint>,
}

/// balance_series
///
/// Folds the movements, ordered by date, into a running balance.
pub fn balance_series(transactions: &[Transaction]) -> Vec<BalancePoint> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by_key(|t| t.date);

    let mut running = 0.0;
    ordered
        .into_iter()
        .map(|t| {
            running += t.signed_amount();
            BalancePoint {
                date: t.date,
                balance: running,
            }
        })
        .collect()
}

/// The accumulated balance over all movements.
pub fn total_balance(transactions: &[Transaction]) -> f64 {
    transactions.iter().map(Transaction::signed_amount).sum()
}
