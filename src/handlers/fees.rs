use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::fee_schedule::{floor_price_check, transport_fee_rate_for};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FloorPriceQuery {
    pub produce_type: String,
    pub price_per_unit: BigDecimal,
}

pub async fn check_floor_price(
    State(state): State<AppState>,
    Query(query): Query<FloorPriceQuery>,
) -> impl IntoResponse {
    Json(floor_price_check(
        &query.produce_type,
        &query.price_per_unit,
        &state.floor_prices,
    ))
}

#[derive(Debug, Deserialize)]
pub struct TransportRateQuery {
    pub truck_tier: String,
}

#[derive(Debug, Serialize)]
pub struct TransportRate {
    pub truck_tier: String,
    pub rate_pct: BigDecimal,
}

pub async fn transport_rate(
    Query(query): Query<TransportRateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rate_pct = transport_fee_rate_for(&query.truck_tier)?;
    Ok(Json(TransportRate {
        truck_tier: query.truck_tier,
        rate_pct,
    }))
}
