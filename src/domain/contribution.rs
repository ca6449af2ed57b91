//! Produce contributions and their grading decisions.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money::zero;
use crate::domain::order::Unit;
use crate::error::EngineError;
use crate::validation::{sanitize_string, REJECTION_REASON_MAX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    Accepted,
    PartiallyAccepted,
    Rejected,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Accepted => "accepted",
            ContributionStatus::PartiallyAccepted => "partially_accepted",
            ContributionStatus::Rejected => "rejected",
        }
    }

    /// Accepted and partially accepted produce is paid for.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            ContributionStatus::Accepted | ContributionStatus::PartiallyAccepted
        )
    }
}

impl FromStr for ContributionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContributionStatus::Pending),
            "accepted" => Ok(ContributionStatus::Accepted),
            "partially_accepted" => Ok(ContributionStatus::PartiallyAccepted),
            "rejected" => Ok(ContributionStatus::Rejected),
            other => Err(format!("unknown contribution status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
}

impl QualityGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
        }
    }
}

impl FromStr for QualityGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(QualityGrade::A),
            "B" => Ok(QualityGrade::B),
            "C" => Ok(QualityGrade::C),
            other => Err(format!("unknown quality grade '{}'", other)),
        }
    }
}

/// One delivery of produce by a member toward an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub order_id: Uuid,
    pub member_id: Uuid,
    pub quantity: BigDecimal,
    pub unit: Unit,
    pub grade: QualityGrade,
    pub status: ContributionStatus,
    pub accepted_quantity: BigDecimal,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

/// One entry of a contribution's append-only grading history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingDecision {
    pub id: Uuid,
    pub contribution_id: Uuid,
    pub status: ContributionStatus,
    pub accepted_quantity: BigDecimal,
    pub rejection_reason: Option<String>,
    pub graded_by: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl Contribution {
    pub fn new(
        order_id: Uuid,
        member_id: Uuid,
        quantity: BigDecimal,
        unit: Unit,
        grade: QualityGrade,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            member_id,
            quantity,
            unit,
            grade,
            status: ContributionStatus::Pending,
            accepted_quantity: zero(),
            rejection_reason: None,
            created_at: Utc::now(),
            graded_at: None,
        }
    }

    pub fn accepted_kilograms(&self) -> BigDecimal {
        self.unit.to_kilograms(&self.accepted_quantity)
    }

    /// Replaces the current grading with a validated decision and returns
    /// the history entry describing it. On error the contribution is untouched.
    pub fn apply_grading(
        &mut self,
        status: ContributionStatus,
        accepted_quantity: BigDecimal,
        rejection_reason: Option<&str>,
        graded_by: Option<String>,
    ) -> Result<GradingDecision, EngineError> {
        // A full acceptance carries no rejection reason.
        let reason = rejection_reason
            .filter(|_| status != ContributionStatus::Accepted)
            .map(sanitize_string)
            .filter(|reason| !reason.is_empty());
        validate_grading(&self.quantity, status, &accepted_quantity, reason.as_deref())?;

        let now = Utc::now();
        self.status = status;
        self.accepted_quantity = accepted_quantity;
        self.rejection_reason = reason;
        self.graded_at = Some(now);

        Ok(GradingDecision {
            id: Uuid::new_v4(),
            contribution_id: self.id,
            status: self.status,
            accepted_quantity: self.accepted_quantity.clone(),
            rejection_reason: self.rejection_reason.clone(),
            graded_by,
            decided_at: now,
        })
    }
}

/// Checks a grading decision against the status/quantity mapping:
/// accepted takes everything, partial takes strictly between nothing and
/// everything, rejected takes nothing. Partial and rejected need a reason.
pub fn validate_grading(
    declared: &BigDecimal,
    status: ContributionStatus,
    accepted: &BigDecimal,
    rejection_reason: Option<&str>,
) -> Result<(), EngineError> {
    let nothing = zero();

    match status {
        ContributionStatus::Pending => {
            return Err(EngineError::InvalidGrading(
                "a grading decision cannot return a contribution to pending".to_string(),
            ));
        }
        ContributionStatus::Accepted => {
            if accepted != declared {
                return Err(EngineError::InvalidGrading(format!(
                    "accepted quantity {} must equal declared quantity {} when accepted",
                    accepted, declared
                )));
            }
        }
        ContributionStatus::PartiallyAccepted => {
            if accepted <= &nothing || accepted >= declared {
                return Err(EngineError::InvalidGrading(format!(
                    "accepted quantity {} must be strictly between 0 and {} when partially accepted",
                    accepted, declared
                )));
            }
        }
        ContributionStatus::Rejected => {
            if accepted != &nothing {
                return Err(EngineError::InvalidGrading(format!(
                    "accepted quantity must be 0 when rejected, got {}",
                    accepted
                )));
            }
        }
    }

    if matches!(
        status,
        ContributionStatus::Rejected | ContributionStatus::PartiallyAccepted
    ) {
        match rejection_reason {
            None => {
                return Err(EngineError::InvalidGrading(format!(
                    "a rejection reason is required when {}",
                    status.as_str()
                )));
            }
            Some(reason) if reason.chars().count() > REJECTION_REASON_MAX_LEN => {
                return Err(EngineError::InvalidGrading(format!(
                    "rejection reason must be at most {} characters",
                    REJECTION_REASON_MAX_LEN
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}
