//! Produce contributions per order and their grading outcomes.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::money::{hundred, sum, zero};
use crate::domain::{Contribution, ContributionStatus, GradingDecision, Order, QualityGrade};
use crate::error::EngineError;
use crate::ports::ContributionRepository;
use crate::validation::validate_positive;

/// A grader's decision on one contribution.
#[derive(Debug, Clone)]
pub struct GradeRequest {
    pub status: ContributionStatus,
    pub accepted_quantity: BigDecimal,
    pub rejection_reason: Option<String>,
    pub graded_by: Option<String>,
}

/// Sum of accepted quantities. Pending and rejected contributions add nothing.
pub fn total_accepted(contributions: &[Contribution]) -> BigDecimal {
    sum(contributions
        .iter()
        .filter(|c| c.status != ContributionStatus::Pending)
        .map(|c| &c.accepted_quantity))
}

/// `min(100, round(total / required × 100))` as a whole percentage.
pub fn fulfillment_percentage(
    total_accepted: &BigDecimal,
    required_quantity: &BigDecimal,
) -> Result<BigDecimal, EngineError> {
    if required_quantity <= &zero() {
        return Err(EngineError::InvalidOrder(format!(
            "required quantity must be greater than zero, got {}",
            required_quantity
        )));
    }

    let pct = (total_accepted * hundred() / required_quantity).round(0);
    Ok(if pct > hundred() { hundred() } else { pct })
}

pub struct ContributionLedger {
    contributions: Arc<dyn ContributionRepository>,
}

impl ContributionLedger {
    pub fn new(contributions: Arc<dyn ContributionRepository>) -> Self {
        Self { contributions }
    }

    /// Records a delivery in `pending` state, tagged with the order's unit.
    pub async fn record_contribution(
        &self,
        order: &Order,
        member_id: Uuid,
        quantity: BigDecimal,
        grade: QualityGrade,
    ) -> Result<Contribution, EngineError> {
        validate_positive("quantity", &quantity)?;
        if !order.is_open() {
            return Err(EngineError::InvalidOrder(format!(
                "order {} is {} and takes no more contributions",
                order.id,
                order.status.as_str()
            )));
        }

        let contribution = Contribution::new(order.id, member_id, quantity, order.unit, grade);
        let stored = self.contributions.insert(&contribution).await?;

        tracing::info!(
            order_id = %order.id,
            member_id = %member_id,
            contribution_id = %stored.id,
            quantity = %stored.quantity,
            grade = stored.grade.as_str(),
            "Contribution recorded"
        );
        Ok(stored)
    }

    /// Applies a grading decision, superseding any earlier one. The previous
    /// decision stays in the history.
    pub async fn grade(
        &self,
        contribution_id: Uuid,
        request: GradeRequest,
    ) -> Result<Contribution, EngineError> {
        let mut contribution = self.contributions.get_by_id(contribution_id).await?;
        let previous = contribution.status;

        let decision = match contribution.apply_grading(
            request.status,
            request.accepted_quantity,
            request.rejection_reason.as_deref(),
            request.graded_by,
        ) {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(
                    contribution_id = %contribution_id,
                    error = %err,
                    "Grading refused"
                );
                return Err(err);
            }
        };
        self.contributions
            .record_grading(&contribution, &decision)
            .await?;

        tracing::info!(
            order_id = %contribution.order_id,
            contribution_id = %contribution_id,
            from = previous.as_str(),
            to = contribution.status.as_str(),
            accepted_quantity = %contribution.accepted_quantity,
            "Contribution graded"
        );
        Ok(contribution)
    }

    pub async fn get(&self, contribution_id: Uuid) -> Result<Contribution, EngineError> {
        Ok(self.contributions.get_by_id(contribution_id).await?)
    }

    pub async fn contributions(&self, order_id: Uuid) -> Result<Vec<Contribution>, EngineError> {
        Ok(self.contributions.list_for_order(order_id).await?)
    }

    pub async fn history(&self, contribution_id: Uuid) -> Result<Vec<GradingDecision>, EngineError> {
        // Surface NotFound for unknown contributions rather than an empty history.
        self.contributions.get_by_id(contribution_id).await?;
        Ok(self.contributions.grading_history(contribution_id).await?)
    }

    pub async fn total_accepted(&self, order_id: Uuid) -> Result<BigDecimal, EngineError> {
        let contributions = self.contributions(order_id).await?;
        Ok(total_accepted(&contributions))
    }

    pub async fn fulfillment_percentage(
        &self,
        order_id: Uuid,
        required_quantity: &BigDecimal,
    ) -> Result<BigDecimal, EngineError> {
        let total = self.total_accepted(order_id).await?;
        fulfillment_percentage(&total, required_quantity)
    }
}
