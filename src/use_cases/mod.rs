//! Application workflows. Each use case composes the services over the
//! repository and collaborator ports.

pub mod grade_contribution;
pub mod place_order;
pub mod register_member;
pub mod rollover_interest;
pub mod settle_order;

pub use grade_contribution::{
    GradeContribution, GradeOutcome, OrderDistribution, RecordContributionInput,
};
pub use place_order::{PlaceOrder, PlaceOrderInput};
pub use register_member::{RegisterMember, RegisterMemberInput};
pub use rollover_interest::{RolloverInterest, RolloverSummary};
pub use settle_order::{PayoutLine, SettleOrder, SettlementOutcome};

use crate::domain::{Contribution, Order};
use crate::error::EngineError;
use crate::services::fee_schedule::{breakdown, FeeBreakdown, FeeDefaults};
use crate::services::payment_allocator::{allocate, PaymentAllocation};

/// Fee breakdown on the order's total. It depends on the order alone, so an
/// order whose deductions exceed its total can never be distributed.
pub(crate) fn order_breakdown(order: &Order, fees: &FeeDefaults) -> Result<FeeBreakdown, EngineError> {
    breakdown(&order.total_amount(), &fees.config_for(order))
}

/// Fee breakdown on the order's total and the member split of its net amount.
pub(crate) fn distribute(
    order: &Order,
    contributions: &[Contribution],
    fees: &FeeDefaults,
) -> Result<(FeeBreakdown, Vec<PaymentAllocation>), EngineError> {
    let breakdown = order_breakdown(order, fees)?;
    let allocations = allocate(order, contributions, &breakdown);
    Ok((breakdown, allocations))
}
