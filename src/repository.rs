use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Goal, NewTransactionRequest, Transaction};

/// Repository Trait
///
/// The abstract contract for reading the externally managed finance database.
/// The database is owned by the auth/simulation services; this portal only
/// queries the tables the dashboard renders and inserts new movements.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's asynchronous tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All movements of one user, oldest first (the chart's natural order).
    async fn get_transactions(&self, user_id: Uuid) -> Vec<Transaction>;

    /// Registers a new movement. Returns the stored row, or `None` when the
    /// insert failed.
    async fn add_transaction(
        &self,
        user_id: Uuid,
        req: NewTransactionRequest,
    ) -> Option<Transaction>;

    /// The user's savings goals, highest priority first.
    async fn get_goals(&self, user_id: Uuid) -> Vec<Goal>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation backed by the external Postgres instance.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_transactions
    ///
    /// Scoped to the requesting user; the dashboard never mixes accounts.
    async fn get_transactions(&self, user_id: Uuid) -> Vec<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, date, amount, type, description
            FROM transactions
            WHERE user_id = $1
            ORDER BY date ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_transactions error: {:?}", e);
            vec![]
        })
    }

    /// add_transaction
    ///
    /// The `user_id` always comes from the authenticated session, never from
    /// the payload.
    async fn add_transaction(
        &self,
        user_id: Uuid,
        req: NewTransactionRequest,
    ) -> Option<Transaction> {
        let id = Uuid::new_v4();
        let date = req.date.unwrap_or_else(Utc::now);

        sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, user_id, date, amount, type, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, date, amount, type, description
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(date)
        .bind(req.amount)
        .bind(&req.kind)
        .bind(&req.description)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("add_transaction error: {:?}", e);
            None
        })
    }

    /// get_goals
    async fn get_goals(&self, user_id: Uuid) -> Vec<Goal> {
        sqlx::query_as::<_, Goal>(
            r#"
            SELECT id, user_id, name, target_amount, current_amount, target_date, priority
            FROM financial_goals
            WHERE user_id = $1
            ORDER BY priority ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_goals error: {:?}", e);
            vec![]
        })
    }
}
