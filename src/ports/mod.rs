//! Storage and collaborator seams. The core only talks to these traits;
//! adapters provide in-memory, Postgres and HTTP implementations.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Contribution, GradingDecision, Member, Order, SavingsAccount, SavingsTransaction,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Storage(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn insert(&self, member: &Member) -> RepositoryResult<Member>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Member>;
    async fn list_by_ids(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Member>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> RepositoryResult<Order>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Order>;
    async fn update(&self, order: &Order) -> RepositoryResult<Order>;
}

#[async_trait]
pub trait ContributionRepository: Send + Sync {
    async fn insert(&self, contribution: &Contribution) -> RepositoryResult<Contribution>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Contribution>;
    async fn list_for_order(&self, order_id: Uuid) -> RepositoryResult<Vec<Contribution>>;

    /// Stores the contribution's current grading and appends `decision`
    /// to its history in one step.
    async fn record_grading(
        &self,
        contribution: &Contribution,
        decision: &GradingDecision,
    ) -> RepositoryResult<()>;

    /// Oldest decision first.
    async fn grading_history(&self, contribution_id: Uuid) -> RepositoryResult<Vec<GradingDecision>>;
}

#[async_trait]
pub trait SavingsRepository: Send + Sync {
    async fn get_account(&self, member_id: Uuid) -> RepositoryResult<Option<SavingsAccount>>;
    async fn list_accounts(&self) -> RepositoryResult<Vec<SavingsAccount>>;

    /// Saves `account` and appends `tx` atomically.
    ///
    /// Fails with `Conflict` when the stored total (zero for a new account)
    /// differs from `tx.balance - tx.amount`, or when `tx` is a deposit for a
    /// (member, order) pair that already has one.
    async fn append(&self, account: &SavingsAccount, tx: &SavingsTransaction) -> RepositoryResult<()>;

    async fn find_deposit(
        &self,
        member_id: Uuid,
        order_id: Uuid,
    ) -> RepositoryResult<Option<SavingsTransaction>>;

    /// Ledger order, oldest first.
    async fn transactions(&self, member_id: Uuid) -> RepositoryResult<Vec<SavingsTransaction>>;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("rejected by partner: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementKind {
    DownPayment,
    Balance,
}

impl DisbursementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementKind::DownPayment => "down_payment",
            DisbursementKind::Balance => "balance",
        }
    }
}

/// Payment rail (M-Pesa, bank). Returns the partner's reference id.
/// The core never retries a failed call.
#[async_trait]
pub trait DisbursementGateway: Send + Sync {
    async fn request_disbursement(
        &self,
        order_id: Uuid,
        kind: DisbursementKind,
        amount: &BigDecimal,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionSummary {
    pub member_id: Uuid,
    pub accepted_quantity: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceSubmission {
    pub order_id: Uuid,
    pub produce_type: String,
    pub total_amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub contributions: Vec<ContributionSummary>,
    pub down_payment_pct: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceQuote {
    pub reference_id: String,
    pub down_payment_amount: BigDecimal,
    pub balance_amount: BigDecimal,
}

/// Trade-finance partner that fronts the down payment.
#[async_trait]
pub trait FinancePartner: Send + Sync {
    async fn submit(&self, submission: &FinanceSubmission) -> Result<FinanceQuote, GatewayError>;
}
