use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money::CURRENCY_SCALE;
use crate::error::EngineError;

/// Largest truck the transport table knows about.
pub const MAX_TRUCK_TONS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed)
            | (Confirmed, InTransit)
            | (InTransit, Delivered)
            | (Delivered, Completed) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "in_transit" => Ok(OrderStatus::InTransit),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg", alias = "kgs", alias = "kilogram")]
    Kilogram,
    #[serde(rename = "tonne", alias = "t", alias = "ton", alias = "tons", alias = "tonnes")]
    Tonne,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Tonne => "tonne",
        }
    }

    pub fn to_kilograms(&self, quantity: &BigDecimal) -> BigDecimal {
        match self {
            Unit::Kilogram => quantity.clone(),
            Unit::Tonne => quantity * BigDecimal::from(1000),
        }
    }

    pub fn from_kilograms(&self, kilograms: &BigDecimal) -> BigDecimal {
        match self {
            Unit::Kilogram => kilograms.clone(),
            Unit::Tonne => kilograms / BigDecimal::from(1000),
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" | "kilogram" => Ok(Unit::Kilogram),
            "t" | "ton" | "tons" | "tonne" | "tonnes" => Ok(Unit::Tonne),
            other => Err(format!("unknown unit '{}'", other)),
        }
    }
}

/// Truck capacity in whole tonnes; drives the transport fee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TruckTier(u32);

impl TruckTier {
    pub fn new(capacity_tons: u32) -> Result<Self, EngineError> {
        if capacity_tons == 0 || capacity_tons > MAX_TRUCK_TONS {
            return Err(EngineError::UnknownTier(format!("{}-ton", capacity_tons)));
        }
        Ok(Self(capacity_tons))
    }

    pub fn capacity_tons(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TruckTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-ton", self.0)
    }
}

impl FromStr for TruckTier {
    type Err = EngineError;

    /// Parses labels like `3-ton`, `3 ton`, `3t`, `3 tonnes` or a bare `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        let mut number = label.as_str();
        for suffix in ["tonnes", "tonne", "tons", "ton", "t"] {
            if let Some(stripped) = number.strip_suffix(suffix) {
                number = stripped;
                break;
            }
        }
        let number = number.trim_end_matches(|ch: char| ch == '-' || ch.is_whitespace());

        let tons = number
            .parse::<u32>()
            .map_err(|_| EngineError::UnknownTier(s.to_string()))?;
        TruckTier::new(tons).map_err(|_| EngineError::UnknownTier(s.to_string()))
    }
}

impl TryFrom<String> for TruckTier {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TruckTier> for String {
    fn from(tier: TruckTier) -> Self {
        tier.to_string()
    }
}

/// A buyer's purchase request fulfilled by one farmer group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub group_id: Uuid,
    pub produce_type: String,
    pub required_quantity: BigDecimal,
    pub unit: Unit,
    pub price_per_unit: BigDecimal,
    pub truck_tier: TruckTier,
    pub status: OrderStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buyer_id: Uuid,
        group_id: Uuid,
        produce_type: String,
        required_quantity: BigDecimal,
        unit: Unit,
        price_per_unit: BigDecimal,
        truck_tier: TruckTier,
        scheduled_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            group_id,
            produce_type,
            required_quantity,
            unit,
            price_per_unit,
            truck_tier,
            status: OrderStatus::Pending,
            scheduled_date,
            delivery_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// price × quantity, kept to cents.
    pub fn total_amount(&self) -> BigDecimal {
        (&self.price_per_unit * &self.required_quantity).round(CURRENCY_SCALE)
    }

    /// Contributions may only be recorded or graded on open orders.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_repriceable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidOrder(format!(
                "order {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        let now = Utc::now();
        if next == OrderStatus::Delivered {
            self.delivery_date = Some(now.date_naive());
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maize_order() -> Order {
        Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "maize".to_string(),
            BigDecimal::from(500),
            Unit::Kilogram,
            BigDecimal::from(400),
            TruckTier::new(3).unwrap(),
            None,
        )
    }

    #[test]
    fn total_amount_is_price_times_quantity() {
        assert_eq!(maize_order().total_amount(), BigDecimal::from(200_000));
    }

    #[test]
    fn follows_the_happy_path() {
        let mut order = maize_order();
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ] {
            order.transition_to(next).unwrap();
        }
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.delivery_date.is_some());
        assert!(!order.is_open());
    }

    #[test]
    fn refuses_skipping_and_leaving_terminal_states() {
        let mut order = maize_order();
        assert!(order.transition_to(OrderStatus::Delivered).is_err());

        order.transition_to(OrderStatus::Cancelled).unwrap();
        assert!(order.transition_to(OrderStatus::Confirmed).is_err());
        assert!(order.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn parses_truck_tier_labels() {
        assert_eq!("3-ton".parse::<TruckTier>().unwrap().capacity_tons(), 3);
        assert_eq!("5 ton".parse::<TruckTier>().unwrap().capacity_tons(), 5);
        assert_eq!("7t".parse::<TruckTier>().unwrap().capacity_tons(), 7);
        assert_eq!("10 tonnes".parse::<TruckTier>().unwrap().capacity_tons(), 10);
        assert_eq!("2".parse::<TruckTier>().unwrap().capacity_tons(), 2);
    }

    #[test]
    fn rejects_unknown_truck_tiers() {
        for label in ["0-ton", "31-ton", "big", "", "-3 ton"] {
            assert!(
                matches!(label.parse::<TruckTier>(), Err(EngineError::UnknownTier(_))),
                "{label} should be unknown"
            );
        }
    }

    #[test]
    fn converts_tonnes_to_kilograms() {
        let qty = BigDecimal::from(2);
        assert_eq!(Unit::Tonne.to_kilograms(&qty), BigDecimal::from(2000));
        assert_eq!(Unit::Kilogram.to_kilograms(&qty), BigDecimal::from(2));
        assert_eq!("tons".parse::<Unit>().unwrap(), Unit::Tonne);
    }
}
