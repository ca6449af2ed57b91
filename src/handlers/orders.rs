use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::OrderStatus;
use crate::error::AppError;
use crate::use_cases::PlaceOrderInput;
use crate::AppState;

pub async fn place_order(
    State(state): State<AppState>,
    Json(input): Json<PlaceOrderInput>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.execute(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orders.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> Result<impl IntoResponse, AppError> {
    let next: OrderStatus = body.status.parse().map_err(AppError::Validation)?;
    Ok(Json(state.orders.transition(id, next).await?))
}

#[derive(Debug, Deserialize)]
pub struct PriceChange {
    pub price_per_unit: BigDecimal,
}

pub async fn change_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PriceChange>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.orders.change_price(id, body.price_per_unit).await?))
}

pub async fn get_allocations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.grading.distribution(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Report format: "csv" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let report = state.grading.report(id).await?;

    match query.format.to_lowercase().as_str() {
        "json" => Ok(Json(report).into_response()),
        "csv" => {
            let body = report.to_csv()?;
            let filename = format!("attachment; filename=\"distribution_{}.csv\"", id);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                body,
            )
                .into_response())
        }
        other => Err(AppError::BadRequest(format!(
            "unsupported report format '{}', use csv or json",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    pub down_payment_pct: BigDecimal,
}

pub async fn settle_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SettlementRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.settlement.execute(id, body.down_payment_pct).await?))
}
