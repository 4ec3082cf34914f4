use axum::{ extract::{ Path, State }, Json };

use crate::db::entity::balance;
use crate::error::Result;

use super::AppState;

pub async fn get_balances(
    State(state): State<AppState>,
    Path(user_id): Path<String>
) -> Result<Json<Vec<balance::Model>>> {
    let balances = state.ledger_service.balances_for_user(&user_id).await?;

    Ok(Json(balances))
}
