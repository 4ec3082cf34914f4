use axum::{ extract::{ Path, State }, Json };
use serde::Deserialize;
use uuid::Uuid;

use crate::db::entity::withdrawal;
use crate::error::Result;
use crate::services::withdrawal_service::WithdrawalRequest;

use super::AppState;

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<Vec<withdrawal::Model>>> {
    let withdrawals = state.withdrawals.find_by_user(&user_id).await?;

    Ok(Json(withdrawals))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<withdrawal::Model>> {
    let record = state.withdrawals.find_by_id(id).await?;

    Ok(Json(record))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>
) -> Result<Json<withdrawal::Model>> {
    let record = state.withdrawal_service.request(request).await?;

    Ok(Json(record))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub user_id: String,
    pub code: String,
}

pub async fn verify_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyRequest>
) -> Result<Json<withdrawal::Model>> {
    let record = state.withdrawal_service.verify(&body.user_id, id, &body.code).await?;

    Ok(Json(record))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub user_id: String,
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>
) -> Result<Json<withdrawal::Model>> {
    let record = state.withdrawal_service.cancel(&body.user_id, id).await?;

    Ok(Json(record))
}
