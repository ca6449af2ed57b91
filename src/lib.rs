pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod use_cases;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::adapters::{
    InMemoryContributionRepository, InMemoryMemberRepository, InMemoryOrderRepository,
    InMemorySavingsRepository, PostgresContributionRepository, PostgresMemberRepository,
    PostgresOrderRepository, PostgresSavingsRepository,
};
use crate::config::Config;
use crate::ports::{
    ContributionRepository, DisbursementGateway, FinancePartner, MemberRepository,
    OrderRepository, SavingsRepository,
};
use crate::services::fee_schedule::FloorPriceTable;
use crate::services::{ContributionLedger, KeyedLocks, SavingsAccrual};
use crate::use_cases::{GradeContribution, PlaceOrder, RegisterMember, RolloverInterest, SettleOrder};

/// Backing store, reported by the health check.
#[derive(Clone)]
pub enum Storage {
    Memory,
    Postgres(PgPool),
}

impl Storage {
    pub fn name(&self) -> &'static str {
        match self {
            Storage::Memory => "memory",
            Storage::Postgres(_) => "postgres",
        }
    }

    pub async fn is_reachable(&self) -> bool {
        match self {
            Storage::Memory => true,
            Storage::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        }
    }
}

#[derive(Clone)]
pub struct Repositories {
    pub members: Arc<dyn MemberRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub contributions: Arc<dyn ContributionRepository>,
    pub savings: Arc<dyn SavingsRepository>,
    pub storage: Storage,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            members: Arc::new(InMemoryMemberRepository::default()),
            orders: Arc::new(InMemoryOrderRepository::default()),
            contributions: Arc::new(InMemoryContributionRepository::default()),
            savings: Arc::new(InMemorySavingsRepository::default()),
            storage: Storage::Memory,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            members: Arc::new(PostgresMemberRepository::new(pool.clone())),
            orders: Arc::new(PostgresOrderRepository::new(pool.clone())),
            contributions: Arc::new(PostgresContributionRepository::new(pool.clone())),
            savings: Arc::new(PostgresSavingsRepository::new(pool.clone())),
            storage: Storage::Postgres(pool),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<PlaceOrder>,
    pub members: Arc<RegisterMember>,
    pub ledger: Arc<ContributionLedger>,
    pub grading: Arc<GradeContribution>,
    pub savings: Arc<SavingsAccrual>,
    pub settlement: Arc<SettleOrder>,
    pub rollover: Arc<RolloverInterest>,
    pub floor_prices: Arc<FloorPriceTable>,
    pub storage: Storage,
}

impl AppState {
    /// Wires services and use cases over `repos`. All order-scoped work shares
    /// one lock table.
    pub fn new(
        config: &Config,
        repos: Repositories,
        finance: Arc<dyn FinancePartner>,
        gateway: Arc<dyn DisbursementGateway>,
    ) -> Self {
        let order_locks = Arc::new(KeyedLocks::new());
        let fees = Arc::new(config.fees.clone());
        let floor_prices = Arc::new(config.floor_prices.clone());

        let ledger = Arc::new(ContributionLedger::new(repos.contributions.clone()));
        let savings = Arc::new(SavingsAccrual::new(
            repos.savings.clone(),
            config.savings.clone(),
        ));

        let orders = Arc::new(PlaceOrder::new(
            repos.orders.clone(),
            floor_prices.clone(),
            fees.clone(),
            order_locks.clone(),
        ));
        let grading = Arc::new(GradeContribution::new(
            repos.orders.clone(),
            repos.members.clone(),
            ledger.clone(),
            fees.clone(),
            order_locks.clone(),
        ));
        let settlement = Arc::new(SettleOrder::new(
            repos.orders.clone(),
            ledger.clone(),
            savings.clone(),
            finance,
            gateway,
            fees,
            order_locks,
        ));

        Self {
            orders,
            members: Arc::new(RegisterMember::new(repos.members.clone())),
            ledger,
            grading,
            rollover: Arc::new(RolloverInterest::new(savings.clone())),
            savings,
            settlement,
            floor_prices,
            storage: repos.storage,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/members", post(handlers::members::register_member))
        .route("/members/:id", get(handlers::members::get_member))
        .route("/members/:id/savings", get(handlers::savings::get_statement))
        .route(
            "/members/:id/savings/withdrawals",
            post(handlers::savings::withdraw),
        )
        .route(
            "/members/:id/savings/projected-interest",
            get(handlers::savings::projected_interest),
        )
        .route("/orders", post(handlers::orders::place_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/status", post(handlers::orders::change_status))
        .route("/orders/:id/price", post(handlers::orders::change_price))
        .route(
            "/orders/:id/contributions",
            get(handlers::contributions::list_contributions)
                .post(handlers::contributions::record_contribution),
        )
        .route("/orders/:id/allocations", get(handlers::orders::get_allocations))
        .route("/orders/:id/report", get(handlers::orders::get_report))
        .route("/orders/:id/settlement", post(handlers::orders::settle_order))
        .route(
            "/contributions/:id/grade",
            post(handlers::contributions::grade_contribution),
        )
        .route(
            "/contributions/:id/history",
            get(handlers::contributions::grading_history),
        )
        .route("/fees/floor-price", get(handlers::fees::check_floor_price))
        .route("/fees/transport-rate", get(handlers::fees::transport_rate))
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
