//! Place order use case.
//! Creates buyer orders and handles price and status changes, re-checking
//! the produce floor price on every price event.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, TruckTier, Unit};
use crate::error::EngineError;
use crate::ports::OrderRepository;
use crate::services::fee_schedule::{ensure_above_floor, FeeDefaults, FloorPriceTable};
use crate::services::KeyedLocks;
use crate::use_cases::order_breakdown;
use crate::validation::{sanitize_string, validate_positive, validate_produce_type, ValidationError};

/// Input for the PlaceOrder use case.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderInput {
    pub buyer_id: Uuid,
    pub group_id: Uuid,
    pub produce_type: String,
    pub required_quantity: BigDecimal,
    #[serde(default = "default_unit")]
    pub unit: Unit,
    pub price_per_unit: BigDecimal,
    pub truck_tier: String,
    pub scheduled_date: Option<NaiveDate>,
}

fn default_unit() -> Unit {
    Unit::Kilogram
}

pub struct PlaceOrder {
    orders: Arc<dyn OrderRepository>,
    floor_prices: Arc<FloorPriceTable>,
    fees: Arc<FeeDefaults>,
    locks: Arc<KeyedLocks>,
}

impl PlaceOrder {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        floor_prices: Arc<FloorPriceTable>,
        fees: Arc<FeeDefaults>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            orders,
            floor_prices,
            fees,
            locks,
        }
    }

    pub async fn execute(&self, input: PlaceOrderInput) -> Result<Order, EngineError> {
        if input.buyer_id.is_nil() {
            return Err(ValidationError::new("buyer_id", "must be a valid id").into());
        }
        if input.group_id.is_nil() {
            return Err(ValidationError::new("group_id", "must be a valid id").into());
        }
        validate_produce_type(&input.produce_type)?;
        validate_positive("required_quantity", &input.required_quantity)?;
        validate_positive("price_per_unit", &input.price_per_unit)?;
        let truck_tier: TruckTier = input.truck_tier.parse()?;
        let produce_type = sanitize_string(&input.produce_type).to_lowercase();

        // Last check before the order exists; the caller's view may be stale.
        self.check_floor(&produce_type, &input.price_per_unit)?;

        let order = Order::new(
            input.buyer_id,
            input.group_id,
            produce_type,
            input.required_quantity,
            input.unit,
            input.price_per_unit,
            truck_tier,
            input.scheduled_date,
        );
        // The standard deductions must fit inside the order's total.
        order_breakdown(&order, &self.fees)?;
        let order = self.orders.insert(&order).await?;

        tracing::info!(
            order_id = %order.id,
            group_id = %order.group_id,
            produce_type = %order.produce_type,
            required_quantity = %order.required_quantity,
            unit = order.unit.as_str(),
            price_per_unit = %order.price_per_unit,
            truck_tier = %order.truck_tier,
            "Order placed"
        );
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, EngineError> {
        Ok(self.orders.get_by_id(order_id).await?)
    }

    /// Price-change event. Only pending and confirmed orders may be re-priced.
    pub async fn change_price(
        &self,
        order_id: Uuid,
        new_price: BigDecimal,
    ) -> Result<Order, EngineError> {
        validate_positive("price_per_unit", &new_price)?;

        let _guard = self.locks.lock(order_id).await;
        let mut order = self.orders.get_by_id(order_id).await?;
        if !order.is_repriceable() {
            return Err(EngineError::InvalidOrder(format!(
                "order {} is {} and can no longer be re-priced",
                order.id,
                order.status.as_str()
            )));
        }
        self.check_floor(&order.produce_type, &new_price)?;

        let previous = std::mem::replace(&mut order.price_per_unit, new_price);
        order_breakdown(&order, &self.fees)?;
        order.updated_at = Utc::now();
        let order = self.orders.update(&order).await?;

        tracing::info!(
            order_id = %order.id,
            previous_price = %previous,
            new_price = %order.price_per_unit,
            "Order re-priced"
        );
        Ok(order)
    }

    pub async fn transition(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, EngineError> {
        let _guard = self.locks.lock(order_id).await;
        let mut order = self.orders.get_by_id(order_id).await?;
        let previous = order.status;
        order.transition_to(next)?;
        let order = self.orders.update(&order).await?;

        tracing::info!(
            order_id = %order.id,
            from = previous.as_str(),
            to = order.status.as_str(),
            "Order status changed"
        );
        Ok(order)
    }

    fn check_floor(&self, produce_type: &str, price: &BigDecimal) -> Result<(), EngineError> {
        ensure_above_floor(produce_type, price, &self.floor_prices).map_err(|err| {
            tracing::warn!(produce_type = %produce_type, offered = %price, "Price below floor refused");
            err
        })
    }
}
