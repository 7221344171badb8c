//! User lookups

use axum::{extract::State, Json};

use crate::AppState;
use paperdesk_common::{
    auth::{Caller, UserRecord},
    errors::Result,
};

/// Users an admin may assign as reviewers
pub async fn list_reviewers(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<UserRecord>>> {
    Ok(Json(state.workflow.list_reviewers(&caller).await?))
}
