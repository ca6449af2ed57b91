//! Settle order use case.
//! Pays a delivered order out: finance quote, disbursement legs, then the
//! members' compulsory savings deposits. A failed collaborator call aborts
//! the whole step before any savings are posted, so the caller can retry
//! from the top.

use bigdecimal::BigDecimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::money::zero;
use crate::domain::{Order, OrderStatus, SavingsTransaction};
use crate::error::EngineError;
use crate::ports::{
    ContributionSummary, DisbursementGateway, DisbursementKind, FinancePartner, FinanceQuote,
    FinanceSubmission, GatewayError, OrderRepository,
};
use crate::services::fee_schedule::{FeeBreakdown, FeeDefaults};
use crate::services::payment_allocator::PaymentAllocation;
use crate::services::{ContributionLedger, KeyedLocks, SavingsAccrual};
use crate::use_cases::distribute;
use crate::validation::validate_percentage;

/// What one member receives for an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutLine {
    pub member_id: Uuid,
    pub accepted_quantity: BigDecimal,
    pub accepted_kg: BigDecimal,
    pub gross_amount: BigDecimal,
    pub savings_withheld: BigDecimal,
    pub net_payout: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisbursementRecord {
    pub kind: DisbursementKind,
    pub amount: BigDecimal,
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub order_id: Uuid,
    pub finance_reference: String,
    pub disbursements: Vec<DisbursementRecord>,
    pub breakdown: FeeBreakdown,
    pub payouts: Vec<PayoutLine>,
    pub savings_deposits: Vec<SavingsTransaction>,
}

pub struct SettleOrder {
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<ContributionLedger>,
    savings: Arc<SavingsAccrual>,
    finance: Arc<dyn FinancePartner>,
    gateway: Arc<dyn DisbursementGateway>,
    fees: Arc<FeeDefaults>,
    locks: Arc<KeyedLocks>,
}

impl SettleOrder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<ContributionLedger>,
        savings: Arc<SavingsAccrual>,
        finance: Arc<dyn FinancePartner>,
        gateway: Arc<dyn DisbursementGateway>,
        fees: Arc<FeeDefaults>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            orders,
            ledger,
            savings,
            finance,
            gateway,
            fees,
            locks,
        }
    }

    pub async fn execute(
        &self,
        order_id: Uuid,
        down_payment_pct: BigDecimal,
    ) -> Result<SettlementOutcome, EngineError> {
        validate_percentage("down_payment_pct", &down_payment_pct)?;

        let _guard = self.locks.lock(order_id).await;
        let mut order = self.orders.get_by_id(order_id).await?;
        if order.status != OrderStatus::Delivered {
            return Err(EngineError::InvalidOrder(format!(
                "order {} is {}; only delivered orders can be settled",
                order.id,
                order.status.as_str()
            )));
        }

        let contributions = self.ledger.contributions(order.id).await?;
        let (breakdown, allocations) = distribute(&order, &contributions, &self.fees)?;
        if allocations.is_empty() {
            return Err(EngineError::InvalidOrder(format!(
                "order {} has no accepted produce to pay for",
                order.id
            )));
        }
        let payouts = self.payout_lines(&order, &allocations)?;

        let quote = self
            .request_quote(&order, &breakdown, &allocations, down_payment_pct)
            .await?;
        let disbursements = self.disburse(&order, &quote).await?;

        let mut savings_deposits = Vec::with_capacity(payouts.len());
        for payout in &payouts {
            let tx = self
                .savings
                .deposit(payout.member_id, order.id, &payout.accepted_kg)
                .await?;
            savings_deposits.push(tx);
        }

        order.transition_to(OrderStatus::Completed)?;
        self.orders.update(&order).await?;

        tracing::info!(
            order_id = %order.id,
            finance_reference = %quote.reference_id,
            net_amount = %breakdown.net_amount,
            members = payouts.len(),
            "Order settled"
        );
        Ok(SettlementOutcome {
            order_id: order.id,
            finance_reference: quote.reference_id,
            disbursements,
            breakdown,
            payouts,
            savings_deposits,
        })
    }

    /// Per-member payouts after the compulsory savings withholding.
    pub fn payout_lines(
        &self,
        order: &Order,
        allocations: &[PaymentAllocation],
    ) -> Result<Vec<PayoutLine>, EngineError> {
        allocations
            .iter()
            .map(|allocation| {
                let accepted_kg = order.unit.to_kilograms(&allocation.quantity);
                let savings_withheld = self.savings.withholding(&accepted_kg);
                let net_payout = &allocation.amount - &savings_withheld;
                if net_payout < zero() {
                    return Err(EngineError::NegativeNetAmount {
                        base: allocation.amount.clone(),
                        deductions: savings_withheld,
                    });
                }

                Ok(PayoutLine {
                    member_id: allocation.member_id,
                    accepted_quantity: allocation.quantity.clone(),
                    accepted_kg,
                    gross_amount: allocation.amount.clone(),
                    savings_withheld,
                    net_payout,
                })
            })
            .collect()
    }

    async fn request_quote(
        &self,
        order: &Order,
        breakdown: &FeeBreakdown,
        allocations: &[PaymentAllocation],
        down_payment_pct: BigDecimal,
    ) -> Result<FinanceQuote, EngineError> {
        let submission = FinanceSubmission {
            order_id: order.id,
            produce_type: order.produce_type.clone(),
            total_amount: breakdown.base_amount.clone(),
            net_amount: breakdown.net_amount.clone(),
            contributions: allocations
                .iter()
                .map(|a| ContributionSummary {
                    member_id: a.member_id,
                    accepted_quantity: a.quantity.clone(),
                })
                .collect(),
            down_payment_pct,
        };

        let quote = self.finance.submit(&submission).await.map_err(|err| {
            tracing::error!(order_id = %order.id, error = %err, "Finance submission failed");
            err
        })?;

        let quoted = &quote.down_payment_amount + &quote.balance_amount;
        if quote.down_payment_amount < zero()
            || quote.balance_amount < zero()
            || quoted != breakdown.net_amount
        {
            tracing::error!(
                order_id = %order.id,
                quoted = %quoted,
                net_amount = %breakdown.net_amount,
                "Finance quote does not match the net amount"
            );
            return Err(GatewayError::InvalidResponse(format!(
                "quote {} splits {} but the net amount is {}",
                quote.reference_id, quoted, breakdown.net_amount
            ))
            .into());
        }
        Ok(quote)
    }

    async fn disburse(
        &self,
        order: &Order,
        quote: &FinanceQuote,
    ) -> Result<Vec<DisbursementRecord>, EngineError> {
        let legs = [
            (DisbursementKind::DownPayment, &quote.down_payment_amount),
            (DisbursementKind::Balance, &quote.balance_amount),
        ];

        let mut records = Vec::new();
        for (kind, amount) in legs {
            if amount <= &zero() {
                continue;
            }
            let reference_id = self
                .gateway
                .request_disbursement(order.id, kind, amount)
                .await
                .map_err(|err| {
                    tracing::error!(
                        order_id = %order.id,
                        kind = kind.as_str(),
                        error = %err,
                        "Disbursement failed, settlement aborted"
                    );
                    err
                })?;
            records.push(DisbursementRecord {
                kind,
                amount: amount.clone(),
                reference_id,
            });
        }
        Ok(records)
    }
}
