//! Grade contribution use case.
//! Records and grades produce deliveries under the order lock and recomputes
//! the order's fulfillment and payment split from a consistent snapshot.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Contribution, MemberStatus, Order, QualityGrade, Unit};
use crate::error::EngineError;
use crate::ports::{MemberRepository, OrderRepository};
use crate::services::contribution_ledger::{fulfillment_percentage, total_accepted};
use crate::services::distribution_report::{distribution_report, DistributionReport};
use crate::services::fee_schedule::{FeeBreakdown, FeeDefaults};
use crate::services::payment_allocator::PaymentAllocation;
use crate::services::{ContributionLedger, GradeRequest, KeyedLocks};
use crate::use_cases::{distribute, order_breakdown};
use crate::validation::sanitize_string;

/// A delivery as reported by the receiving clerk.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordContributionInput {
    pub member_id: Uuid,
    pub produce_type: Option<String>,
    pub quantity: BigDecimal,
    /// Defaults to the order's unit; other units are converted to it.
    pub unit: Option<Unit>,
    pub quality_grade: QualityGrade,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDistribution {
    pub order_id: Uuid,
    pub total_accepted: BigDecimal,
    pub fulfillment_percentage: BigDecimal,
    pub breakdown: FeeBreakdown,
    pub allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeOutcome {
    pub contribution: Contribution,
    pub distribution: OrderDistribution,
}

pub struct GradeContribution {
    orders: Arc<dyn OrderRepository>,
    members: Arc<dyn MemberRepository>,
    ledger: Arc<ContributionLedger>,
    fees: Arc<FeeDefaults>,
    locks: Arc<KeyedLocks>,
}

impl GradeContribution {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        members: Arc<dyn MemberRepository>,
        ledger: Arc<ContributionLedger>,
        fees: Arc<FeeDefaults>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            orders,
            members,
            ledger,
            fees,
            locks,
        }
    }

    pub async fn record(
        &self,
        order_id: Uuid,
        input: RecordContributionInput,
    ) -> Result<Contribution, EngineError> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.orders.get_by_id(order_id).await?;

        if let Some(produce_type) = &input.produce_type {
            let produce_type = sanitize_string(produce_type).to_lowercase();
            if produce_type != order.produce_type {
                return Err(EngineError::InvalidOrder(format!(
                    "order {} buys {}, not {}",
                    order.id, order.produce_type, produce_type
                )));
            }
        }

        let member = self.members.get_by_id(input.member_id).await?;
        if member.status != MemberStatus::Active {
            return Err(EngineError::InvalidOrder(format!(
                "member {} is {} and cannot contribute",
                member.id,
                member.status.as_str()
            )));
        }
        if member.group_id != order.group_id {
            return Err(EngineError::InvalidOrder(format!(
                "member {} does not belong to the group fulfilling order {}",
                member.id, order.id
            )));
        }

        let quantity = match input.unit {
            Some(unit) if unit != order.unit => {
                order.unit.from_kilograms(&unit.to_kilograms(&input.quantity))
            }
            _ => input.quantity,
        };

        self.ledger
            .record_contribution(&order, member.id, quantity, input.quality_grade)
            .await
    }

    /// Grades one contribution and returns the recomputed split of its order.
    pub async fn execute(
        &self,
        contribution_id: Uuid,
        request: GradeRequest,
    ) -> Result<GradeOutcome, EngineError> {
        let order_id = self.ledger.get(contribution_id).await?.order_id;

        let _guard = self.locks.lock(order_id).await;
        let order = self.orders.get_by_id(order_id).await?;
        if !order.is_open() {
            return Err(EngineError::InvalidOrder(format!(
                "order {} is {} and its contributions can no longer be graded",
                order.id,
                order.status.as_str()
            )));
        }

        // Nothing is committed for an order that cannot be distributed.
        order_breakdown(&order, &self.fees)?;

        let contribution = self.ledger.grade(contribution_id, request).await?;
        let distribution = self.snapshot(&order).await?;

        tracing::info!(
            order_id = %order.id,
            total_accepted = %distribution.total_accepted,
            fulfillment_pct = %distribution.fulfillment_percentage,
            "Order distribution recomputed"
        );
        Ok(GradeOutcome {
            contribution,
            distribution,
        })
    }

    pub async fn distribution(&self, order_id: Uuid) -> Result<OrderDistribution, EngineError> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.orders.get_by_id(order_id).await?;
        self.snapshot(&order).await
    }

    /// Distribution report with allocation rows labelled by member name.
    pub async fn report(&self, order_id: Uuid) -> Result<DistributionReport, EngineError> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.orders.get_by_id(order_id).await?;
        let distribution = self.snapshot(&order).await?;

        let mut report =
            distribution_report(&order, &distribution.allocations, &distribution.breakdown);
        let ids: Vec<Uuid> = distribution.allocations.iter().map(|a| a.member_id).collect();
        let names: HashMap<Uuid, String> = self
            .members
            .list_by_ids(&ids)
            .await?
            .into_iter()
            .map(|member| (member.id, member.name))
            .collect();
        report.label_members(&names);
        Ok(report)
    }

    async fn snapshot(&self, order: &Order) -> Result<OrderDistribution, EngineError> {
        let contributions = self.ledger.contributions(order.id).await?;
        let total = total_accepted(&contributions);
        let fulfillment = fulfillment_percentage(&total, &order.required_quantity)?;
        let (breakdown, allocations) = distribute(order, &contributions, &self.fees)?;

        Ok(OrderDistribution {
            order_id: order.id,
            total_accepted: total,
            fulfillment_percentage: fulfillment,
            breakdown,
            allocations,
        })
    }
}
