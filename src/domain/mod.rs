//! Domain entities.
//! Framework-agnostic representations of members, orders, contributions and savings.

pub mod contribution;
pub mod member;
pub mod money;
pub mod order;
pub mod savings;

pub use contribution::{Contribution, ContributionStatus, GradingDecision, QualityGrade};
pub use member::{Member, MemberStatus};
pub use order::{Order, OrderStatus, TruckTier, Unit};
pub use savings::{AccountState, SavingsAccount, SavingsTransaction, SavingsTransactionKind};
