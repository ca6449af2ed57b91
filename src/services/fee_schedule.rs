//! Standard deductions applied to an order's gross amount.
//!
//! Everything here is pure: no storage, no clocks, safe to call from any thread.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::money::{percent_of_truncated, sum, zero, CURRENCY_SCALE};
use crate::domain::{Order, TruckTier};
use crate::error::EngineError;
use crate::validation::{validate_percentage, ValidationError};

/// Transport rate (percent of the gross) for a truck capacity. Small trucks
/// cost proportionally more per trip.
pub fn transport_fee_rate(tier: TruckTier) -> BigDecimal {
    let pct = match tier.capacity_tons() {
        1..=2 => 10,
        3..=4 => 8,
        5..=6 => 6,
        _ => 5,
    };
    BigDecimal::from(pct)
}

/// Label form of [`transport_fee_rate`]; unknown tiers fail.
pub fn transport_fee_rate_for(label: &str) -> Result<BigDecimal, EngineError> {
    let tier: TruckTier = label.parse()?;
    Ok(transport_fee_rate(tier))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GradingFee {
    /// Passed through unscaled.
    Flat(BigDecimal),
    Percent(BigDecimal),
}

impl Default for GradingFee {
    fn default() -> Self {
        GradingFee::Percent(zero())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub platform_fee_pct: BigDecimal,
    pub finance_markup_pct: BigDecimal,
    pub transport_pct: BigDecimal,
    pub grading_fee: GradingFee,
    pub insurance_pct: BigDecimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            platform_fee_pct: zero(),
            finance_markup_pct: zero(),
            transport_pct: zero(),
            grading_fee: GradingFee::default(),
            insurance_pct: zero(),
        }
    }
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let checks = [
            ("platform_fee_pct", &self.platform_fee_pct),
            ("finance_markup_pct", &self.finance_markup_pct),
            ("transport_pct", &self.transport_pct),
            ("insurance_pct", &self.insurance_pct),
        ];
        for (field, pct) in checks {
            validate_percentage(field, pct).map_err(invalid_amount)?;
        }

        match &self.grading_fee {
            GradingFee::Percent(pct) => {
                validate_percentage("grading_fee", pct).map_err(invalid_amount)?
            }
            GradingFee::Flat(amount) if amount < &zero() => {
                return Err(EngineError::InvalidAmount(
                    "grading_fee: flat fee must not be negative".to_string(),
                ));
            }
            GradingFee::Flat(_) => {}
        }

        Ok(())
    }
}

fn invalid_amount(err: ValidationError) -> EngineError {
    EngineError::InvalidAmount(err.to_string())
}

/// Platform-wide fee settings; the transport rate comes from each order's truck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeDefaults {
    pub platform_fee_pct: BigDecimal,
    pub finance_markup_pct: BigDecimal,
    pub grading_fee: GradingFee,
    pub insurance_pct: BigDecimal,
}

impl Default for FeeDefaults {
    fn default() -> Self {
        Self {
            platform_fee_pct: BigDecimal::from(5),
            finance_markup_pct: zero(),
            grading_fee: GradingFee::default(),
            insurance_pct: zero(),
        }
    }
}

impl FeeDefaults {
    pub fn config_for(&self, order: &Order) -> FeeConfig {
        FeeConfig {
            platform_fee_pct: self.platform_fee_pct.clone(),
            finance_markup_pct: self.finance_markup_pct.clone(),
            transport_pct: transport_fee_rate(order.truck_tier),
            grading_fee: self.grading_fee.clone(),
            insurance_pct: self.insurance_pct.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    pub name: String,
    pub rate_pct: Option<BigDecimal>,
    pub amount: BigDecimal,
}

/// Derived deductions for one base amount. Never stored; recompute on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub base_amount: BigDecimal,
    pub platform_fee: BigDecimal,
    pub transport_fee: BigDecimal,
    pub grading_fee: BigDecimal,
    pub insurance_fee: BigDecimal,
    pub finance_markup: BigDecimal,
    pub net_amount: BigDecimal,
    #[serde(skip)]
    config: FeeConfig,
}

impl FeeBreakdown {
    pub fn total_deductions(&self) -> BigDecimal {
        sum([
            &self.platform_fee,
            &self.transport_fee,
            &self.grading_fee,
            &self.insurance_fee,
            &self.finance_markup,
        ])
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Named deduction lines in a fixed order, for reports.
    pub fn lines(&self) -> Vec<FeeLine> {
        let grading_rate = match &self.config.grading_fee {
            GradingFee::Percent(pct) => Some(pct.clone()),
            GradingFee::Flat(_) => None,
        };

        vec![
            FeeLine {
                name: "platform_fee".to_string(),
                rate_pct: Some(self.config.platform_fee_pct.clone()),
                amount: self.platform_fee.clone(),
            },
            FeeLine {
                name: "transport_fee".to_string(),
                rate_pct: Some(self.config.transport_pct.clone()),
                amount: self.transport_fee.clone(),
            },
            FeeLine {
                name: "grading_fee".to_string(),
                rate_pct: grading_rate,
                amount: self.grading_fee.clone(),
            },
            FeeLine {
                name: "insurance_fee".to_string(),
                rate_pct: Some(self.config.insurance_pct.clone()),
                amount: self.insurance_fee.clone(),
            },
            FeeLine {
                name: "finance_markup".to_string(),
                rate_pct: Some(self.config.finance_markup_pct.clone()),
                amount: self.finance_markup.clone(),
            },
        ]
    }
}

/// Applies every deduction to `base_amount`. Percentage lines are truncated
/// to cents, so percentages summing below 100 always leave a positive net.
/// Refuses, rather than clamps, when the deductions would exceed the base.
pub fn breakdown(base_amount: &BigDecimal, config: &FeeConfig) -> Result<FeeBreakdown, EngineError> {
    if base_amount < &zero() {
        return Err(EngineError::InvalidAmount(format!(
            "base amount must not be negative, got {}",
            base_amount
        )));
    }
    config.validate()?;

    let grading_fee = match &config.grading_fee {
        GradingFee::Flat(amount) => amount.round(CURRENCY_SCALE),
        GradingFee::Percent(pct) => percent_of_truncated(base_amount, pct),
    };

    let mut result = FeeBreakdown {
        base_amount: base_amount.clone(),
        platform_fee: percent_of_truncated(base_amount, &config.platform_fee_pct),
        transport_fee: percent_of_truncated(base_amount, &config.transport_pct),
        grading_fee,
        insurance_fee: percent_of_truncated(base_amount, &config.insurance_pct),
        finance_markup: percent_of_truncated(base_amount, &config.finance_markup_pct),
        net_amount: zero(),
        config: config.clone(),
    };

    let deductions = result.total_deductions();
    if &deductions > base_amount {
        return Err(EngineError::NegativeNetAmount {
            base: base_amount.clone(),
            deductions,
        });
    }
    result.net_amount = base_amount - &deductions;

    Ok(result)
}

/// Minimum price per unit by produce type. Produce without an entry has no floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorPriceTable {
    floors: HashMap<String, BigDecimal>,
}

impl FloorPriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floor(mut self, produce_type: &str, floor: BigDecimal) -> Self {
        self.floors.insert(normalize(produce_type), floor);
        self
    }

    pub fn floor_for(&self, produce_type: &str) -> Option<&BigDecimal> {
        self.floors.get(&normalize(produce_type))
    }

    /// Entries sorted by produce type.
    pub fn entries(&self) -> Vec<(&str, &BigDecimal)> {
        let mut entries: Vec<(&str, &BigDecimal)> = self
            .floors
            .iter()
            .map(|(produce, floor)| (produce.as_str(), floor))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }
}

fn normalize(produce_type: &str) -> String {
    produce_type.trim().to_lowercase()
}

impl FromStr for FloorPriceTable {
    type Err = String;

    /// `maize=30,beans=80`; blank input yields an empty table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = FloorPriceTable::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (produce, price) = entry
                .split_once('=')
                .ok_or_else(|| format!("floor price entry '{}' must look like produce=price", entry))?;
            let price = BigDecimal::from_str(price.trim())
                .map_err(|e| format!("floor price for '{}': {}", produce.trim(), e))?;
            if price < zero() {
                return Err(format!("floor price for '{}' must not be negative", produce.trim()));
            }
            table = table.with_floor(produce, price);
        }
        Ok(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPriceCheck {
    pub ok: bool,
    pub floor_price: Option<BigDecimal>,
}

pub fn floor_price_check(
    produce_type: &str,
    offered_price_per_unit: &BigDecimal,
    table: &FloorPriceTable,
) -> FloorPriceCheck {
    match table.floor_for(produce_type) {
        Some(floor) => FloorPriceCheck {
            ok: offered_price_per_unit >= floor,
            floor_price: Some(floor.clone()),
        },
        None => FloorPriceCheck {
            ok: true,
            floor_price: None,
        },
    }
}

/// Refusing form of [`floor_price_check`] for submission paths.
pub fn ensure_above_floor(
    produce_type: &str,
    offered_price_per_unit: &BigDecimal,
    table: &FloorPriceTable,
) -> Result<(), EngineError> {
    let check = floor_price_check(produce_type, offered_price_per_unit, table);
    match check {
        FloorPriceCheck {
            ok: false,
            floor_price: Some(floor_price),
        } => Err(EngineError::FloorPriceViolation {
            produce_type: produce_type.to_string(),
            offered: offered_price_per_unit.clone(),
            floor_price,
        }),
        _ => Ok(()),
    }
}
