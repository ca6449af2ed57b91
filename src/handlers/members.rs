use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::use_cases::RegisterMemberInput;
use crate::AppState;

pub async fn register_member(
    State(state): State<AppState>,
    Json(input): Json<RegisterMemberInput>,
) -> Result<impl IntoResponse, AppError> {
    let member = state.members.execute(input).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.members.get(id).await?))
}
