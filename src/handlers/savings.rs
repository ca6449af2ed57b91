use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    /// Date the account state is evaluated on: YYYY-MM-DD, defaults to today
    pub as_of: Option<NaiveDate>,
}

pub async fn get_statement(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Query(query): Query<StatementQuery>,
) -> Result<impl IntoResponse, AppError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.savings.statement(member_id, as_of).await?))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: BigDecimal,
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(body): Json<WithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.savings.withdraw(member_id, &body.amount).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

#[derive(Debug, Serialize)]
pub struct ProjectedInterest {
    pub member_id: Uuid,
    pub projected_interest: BigDecimal,
}

pub async fn projected_interest(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let projected_interest = state.savings.projected_interest(member_id).await?;
    Ok(Json(ProjectedInterest {
        member_id,
        projected_interest,
    }))
}
