pub mod contribution_ledger;
pub mod distribution_report;
pub mod fee_schedule;
pub mod locks;
pub mod payment_allocator;
pub mod savings_accrual;

pub use contribution_ledger::{ContributionLedger, GradeRequest};
pub use distribution_report::{distribution_report, DistributionReport, ReportRow, ReportRowKind};
pub use fee_schedule::{
    breakdown, floor_price_check, FeeBreakdown, FeeConfig, FeeDefaults, FeeLine,
    FloorPriceCheck, FloorPriceTable, GradingFee,
};
pub use locks::KeyedLocks;
pub use payment_allocator::{allocate, PaymentAllocation};
pub use savings_accrual::{SavingsAccrual, SavingsSettings, SavingsStatement};
