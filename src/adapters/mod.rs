pub mod memory;
pub mod payment_gateway;
pub mod postgres_order_repository;
pub mod postgres_savings_repository;

pub use memory::{
    InMemoryContributionRepository, InMemoryMemberRepository, InMemoryOrderRepository,
    InMemorySavingsRepository,
};
pub use payment_gateway::HttpPaymentGateway;
pub use postgres_order_repository::{
    PostgresContributionRepository, PostgresMemberRepository, PostgresOrderRepository,
};
pub use postgres_savings_repository::PostgresSavingsRepository;
