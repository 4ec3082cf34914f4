use axum::{ extract::{ Path, State }, Json };

use crate::db::entity::deposit;
use crate::error::Result;

use super::AppState;

pub async fn list_deposits(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<Vec<deposit::Model>>> {
    let deposits = state.deposits.find_by_user(&user_id).await?;

    Ok(Json(deposits))
}
