//! Reviewer assignment, responses and the final decision

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::papers::MutationResponse;
use crate::AppState;
use paperdesk_common::{auth::Caller, domain::Decision, errors::Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub reviewer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Admin names (or renames) the reviewer
pub async fn assign_reviewer(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<MutationResponse>> {
    let outcome = state.workflow.assign(&caller, paper_id, request.reviewer_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn accept_paper(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<MutationResponse>> {
    let outcome = state.workflow.accept(&caller, paper_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn decline_paper(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<MutationResponse>> {
    let outcome = state.workflow.decline(&caller, paper_id).await?;
    Ok(Json(outcome.into()))
}

/// Publish or reject a paper under review
pub async fn decide_paper(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<MutationResponse>> {
    let outcome = state
        .workflow
        .decide(&caller, paper_id, request.decision, request.remark)
        .await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_body() {
        let request: DecisionRequest =
            serde_json::from_str(r#"{"decision":"REJECTED","remark":"Out of scope"}"#).unwrap();
        assert_eq!(request.decision, Decision::Rejected);
        assert_eq!(request.remark.as_deref(), Some("Out of scope"));

        let request: DecisionRequest = serde_json::from_str(r#"{"decision":"PUBLISH"}"#).unwrap();
        assert_eq!(request.decision, Decision::Publish);
        assert!(request.remark.is_none());

        assert!(serde_json::from_str::<DecisionRequest>(r#"{"decision":"MAYBE"}"#).is_err());
    }

    #[test]
    fn test_assign_body() {
        let id = Uuid::new_v4();
        let request: AssignRequest = serde_json::from_str(&format!(r#"{{"reviewerId":"{}"}}"#, id)).unwrap();
        assert_eq!(request.reviewer_id, id);
    }
}
