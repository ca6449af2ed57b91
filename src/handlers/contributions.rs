use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::ContributionStatus;
use crate::error::AppError;
use crate::services::GradeRequest;
use crate::use_cases::RecordContributionInput;
use crate::AppState;

pub async fn record_contribution(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RecordContributionInput>,
) -> Result<impl IntoResponse, AppError> {
    let contribution = state.grading.record(order_id, input).await?;
    Ok((StatusCode::CREATED, Json(contribution)))
}

pub async fn list_contributions(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Unknown orders are a 404, not an empty list.
    state.orders.get(order_id).await?;
    Ok(Json(state.ledger.contributions(order_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct GradeBody {
    pub status: ContributionStatus,
    pub accepted_quantity: BigDecimal,
    pub rejection_reason: Option<String>,
    pub graded_by: Option<String>,
}

pub async fn grade_contribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GradeBody>,
) -> Result<impl IntoResponse, AppError> {
    let request = GradeRequest {
        status: body.status,
        accepted_quantity: body.accepted_quantity,
        rejection_reason: body.rejection_reason,
        graded_by: body.graded_by,
    };
    Ok(Json(state.grading.execute(id, request).await?))
}

pub async fn grading_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.ledger.history(id).await?))
}
