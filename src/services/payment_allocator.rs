//! Splits an order's fee-adjusted net amount across the members whose
//! produce was accepted.
//!
//! Each member's exact share `net × memberQty / totalQty` is floored to whole
//! currency units. The units left over (`floor(net) − Σ floors`, never more
//! than members − 1) go one at a time to the members with the largest
//! fractional remainders; ties favour the larger quantity, then the lower
//! member id. The amounts therefore always add up to `floor(net)`.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::money::{hundred, sum, whole_units, zero};
use crate::domain::{Contribution, Order};
use crate::services::fee_schedule::FeeBreakdown;

/// Percentages are kept to four decimal places.
pub const PERCENTAGE_SCALE: i64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub order_id: Uuid,
    pub member_id: Uuid,
    /// Accepted quantity summed over all of the member's contributions.
    pub quantity: BigDecimal,
    pub percentage: BigDecimal,
    pub amount: BigDecimal,
}

/// Sums accepted quantity per member over the payable contributions of `order_id`.
pub fn member_totals(order_id: Uuid, contributions: &[Contribution]) -> BTreeMap<Uuid, BigDecimal> {
    let mut totals: BTreeMap<Uuid, BigDecimal> = BTreeMap::new();
    for contribution in contributions
        .iter()
        .filter(|c| c.order_id == order_id && c.status.is_payable())
    {
        let entry = totals.entry(contribution.member_id).or_insert_with(zero);
        *entry = &*entry + &contribution.accepted_quantity;
    }
    totals
}

/// Allocates `breakdown.net_amount` over the order's accepted and partially
/// accepted contributions. No payable contributions yields no allocations.
pub fn allocate(
    order: &Order,
    contributions: &[Contribution],
    breakdown: &FeeBreakdown,
) -> Vec<PaymentAllocation> {
    let totals = member_totals(order.id, contributions);
    let total_accepted = sum(totals.values());
    if total_accepted <= zero() {
        return Vec::new();
    }

    let net = &breakdown.net_amount;
    let mut shares: Vec<Share> = totals
        .into_iter()
        .map(|(member_id, quantity)| {
            let exact = net * &quantity / &total_accepted;
            let floor = whole_units(&exact);
            let remainder = &exact - &floor;
            Share {
                member_id,
                quantity,
                floor,
                remainder,
            }
        })
        .collect();

    let distributed = sum(shares.iter().map(|s| &s.floor));
    let mut leftover = whole_units(net) - distributed;

    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let (a, b) = (&shares[a], &shares[b]);
        b.remainder
            .cmp(&a.remainder)
            .then_with(|| b.quantity.cmp(&a.quantity))
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    let one = BigDecimal::from(1);
    for index in by_remainder {
        if leftover <= zero() {
            break;
        }
        shares[index].floor = &shares[index].floor + &one;
        leftover = leftover - &one;
    }

    let allocations: Vec<PaymentAllocation> = shares
        .into_iter()
        .map(|share| PaymentAllocation {
            order_id: order.id,
            member_id: share.member_id,
            percentage: (&share.quantity * hundred() / &total_accepted).round(PERCENTAGE_SCALE),
            quantity: share.quantity,
            amount: share.floor,
        })
        .collect();

    tracing::debug!(
        order_id = %order.id,
        members = allocations.len(),
        net_amount = %net,
        "Payment allocated"
    );
    allocations
}

struct Share {
    member_id: Uuid,
    quantity: BigDecimal,
    floor: BigDecimal,
    remainder: BigDecimal,
}
