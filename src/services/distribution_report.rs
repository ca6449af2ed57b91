//! Flat, export-ready view of how an order's money was split.

use bigdecimal::BigDecimal;
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::Order;
use crate::error::EngineError;
use crate::services::fee_schedule::FeeBreakdown;
use crate::services::payment_allocator::PaymentAllocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRowKind {
    Gross,
    Fee,
    Net,
    Allocation,
}

impl ReportRowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportRowKind::Gross => "gross",
            ReportRowKind::Fee => "fee",
            ReportRowKind::Net => "net",
            ReportRowKind::Allocation => "allocation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub kind: ReportRowKind,
    pub label: String,
    pub member_id: Option<Uuid>,
    pub quantity: Option<BigDecimal>,
    pub percentage: Option<BigDecimal>,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub order_id: Uuid,
    pub produce_type: String,
    pub unit: String,
    pub base_amount: BigDecimal,
    pub total_deductions: BigDecimal,
    pub net_amount: BigDecimal,
    pub allocated_amount: BigDecimal,
    pub rows: Vec<ReportRow>,
}

/// Builds the report: the gross line, one line per fee, the net line and
/// then one line per member allocation.
pub fn distribution_report(
    order: &Order,
    allocations: &[PaymentAllocation],
    breakdown: &FeeBreakdown,
) -> DistributionReport {
    let mut rows = Vec::with_capacity(allocations.len() + 7);
    rows.push(ReportRow {
        kind: ReportRowKind::Gross,
        label: "gross".to_string(),
        member_id: None,
        quantity: None,
        percentage: None,
        amount: breakdown.base_amount.clone(),
    });
    for line in breakdown.lines() {
        rows.push(ReportRow {
            kind: ReportRowKind::Fee,
            label: line.name,
            member_id: None,
            quantity: None,
            percentage: line.rate_pct,
            amount: line.amount,
        });
    }
    rows.push(ReportRow {
        kind: ReportRowKind::Net,
        label: "net".to_string(),
        member_id: None,
        quantity: None,
        percentage: None,
        amount: breakdown.net_amount.clone(),
    });
    for allocation in allocations {
        rows.push(ReportRow {
            kind: ReportRowKind::Allocation,
            label: allocation.member_id.to_string(),
            member_id: Some(allocation.member_id),
            quantity: Some(allocation.quantity.clone()),
            percentage: Some(allocation.percentage.clone()),
            amount: allocation.amount.clone(),
        });
    }

    DistributionReport {
        order_id: order.id,
        produce_type: order.produce_type.clone(),
        unit: order.unit.as_str().to_string(),
        base_amount: breakdown.base_amount.clone(),
        total_deductions: breakdown.total_deductions(),
        net_amount: breakdown.net_amount.clone(),
        allocated_amount: crate::domain::money::sum(allocations.iter().map(|a| &a.amount)),
        rows,
    }
}

#[derive(Debug, Serialize)]
struct ReportCsvRow {
    kind: &'static str,
    label: String,
    member_id: String,
    quantity: String,
    percentage: String,
    amount: String,
}

impl From<&ReportRow> for ReportCsvRow {
    fn from(row: &ReportRow) -> Self {
        Self {
            kind: row.kind.as_str(),
            label: row.label.clone(),
            member_id: row.member_id.map(|id| id.to_string()).unwrap_or_default(),
            quantity: row.quantity.as_ref().map(|q| q.to_string()).unwrap_or_default(),
            percentage: row.percentage.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            amount: row.amount.to_string(),
        }
    }
}

impl DistributionReport {
    /// Replaces allocation labels with member names where known.
    pub fn label_members(&mut self, names: &HashMap<Uuid, String>) {
        for row in self.rows.iter_mut() {
            if let Some(name) = row.member_id.and_then(|id| names.get(&id)) {
                row.label = name.clone();
            }
        }
    }

    pub fn allocation_rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows
            .iter()
            .filter(|row| row.kind == ReportRowKind::Allocation)
    }

    pub fn to_csv(&self) -> Result<String, EngineError> {
        let mut wtr = Writer::from_writer(vec![]);
        for row in &self.rows {
            wtr.serialize(ReportCsvRow::from(row))
                .map_err(|e| EngineError::Export(e.to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| EngineError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::Export(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TruckTier, Unit};
    use crate::services::fee_schedule::{breakdown, FeeConfig};

    fn fixture() -> (Order, Vec<PaymentAllocation>, FeeBreakdown) {
        let order = Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "maize".to_string(),
            BigDecimal::from(500),
            Unit::Kilogram,
            BigDecimal::from(400),
            TruckTier::new(3).unwrap(),
            None,
        );
        let config = FeeConfig {
            platform_fee_pct: BigDecimal::from(5),
            transport_pct: BigDecimal::from(3),
            ..FeeConfig::default()
        };
        let breakdown = breakdown(&BigDecimal::from(200_000), &config).unwrap();
        let allocations = vec![
            PaymentAllocation {
                order_id: order.id,
                member_id: Uuid::new_v4(),
                quantity: BigDecimal::from(200),
                percentage: BigDecimal::from(50),
                amount: BigDecimal::from(92_000),
            },
            PaymentAllocation {
                order_id: order.id,
                member_id: Uuid::new_v4(),
                quantity: BigDecimal::from(200),
                percentage: BigDecimal::from(50),
                amount: BigDecimal::from(92_000),
            },
        ];
        (order, allocations, breakdown)
    }

    #[test]
    fn report_lists_fees_before_allocations() {
        let (order, allocations, breakdown) = fixture();
        let report = distribution_report(&order, &allocations, &breakdown);

        let kinds: Vec<ReportRowKind> = report.rows.iter().map(|r| r.kind).collect();
        assert_eq!(kinds[0], ReportRowKind::Gross);
        assert_eq!(kinds[kinds.len() - 3], ReportRowKind::Net);
        assert_eq!(report.allocation_rows().count(), 2);
        assert_eq!(report.net_amount, BigDecimal::from(184_000));
        assert_eq!(report.allocated_amount, BigDecimal::from(184_000));
        assert_eq!(report.total_deductions, BigDecimal::from(16_000));
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let (order, allocations, breakdown) = fixture();
        let mut report = distribution_report(&order, &allocations, &breakdown);
        let mut names = HashMap::new();
        names.insert(allocations[0].member_id, "Wanjiru".to_string());
        report.label_members(&names);

        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "kind,label,member_id,quantity,percentage,amount");
        assert_eq!(lines.len(), report.rows.len() + 1);
        assert!(csv.contains("allocation,Wanjiru,"));
        assert!(csv.contains("fee,platform_fee,,,5,"));
    }
}
