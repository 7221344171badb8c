//! Reviewer assignment and the reviewer's response

use tracing::info;
use uuid::Uuid;

use super::{observe, Outcome, Workflow, WorkflowEvent};
use crate::auth::Caller;
use crate::domain::{Paper, ReviewerResponse};
use crate::errors::{AppError, Result};

impl Workflow {
    /// Name (or rename) the reviewer of a paper and notify them
    pub async fn assign(&self, caller: &Caller, paper_id: Uuid, reviewer_id: Uuid) -> Result<Outcome<Paper>> {
        observe("assign", self.run_assign(caller, paper_id, reviewer_id)).await
    }

    /// The assigned reviewer takes the paper on
    pub async fn accept(&self, caller: &Caller, paper_id: Uuid) -> Result<Outcome<Paper>> {
        observe("accept", self.respond(caller, paper_id, ReviewerResponse::Accept)).await
    }

    /// The assigned reviewer turns the paper down; it stays open for reassignment
    pub async fn decline(&self, caller: &Caller, paper_id: Uuid) -> Result<Outcome<Paper>> {
        observe("decline", self.respond(caller, paper_id, ReviewerResponse::Decline)).await
    }

    async fn run_assign(&self, caller: &Caller, paper_id: Uuid, reviewer_id: Uuid) -> Result<Outcome<Paper>> {
        caller.require_admin("assign reviewers")?;

        let paper = self.load(paper_id).await?;

        let reviewer = self
            .users
            .find_user(reviewer_id)
            .await?
            .ok_or_else(|| AppError::InvalidReviewer {
                id: reviewer_id.to_string(),
                reason: "user does not exist".to_string(),
            })?;
        if !reviewer.role.can_review() {
            return Err(AppError::InvalidReviewer {
                id: reviewer_id.to_string(),
                reason: format!("user has role {}, reviewer or admin required", reviewer.role),
            });
        }

        let mut next = paper.clone();
        next.state = paper.state.assign(reviewer.id)?;
        let updated = self.commit(&paper, &next).await?;

        info!(
            paper_id = %updated.id,
            reviewer_id = %reviewer.id,
            previous_reviewer = ?paper.reviewer_id(),
            "Reviewer assigned"
        );

        let report = self
            .dispatch(WorkflowEvent::ReviewerAssigned { paper: updated.clone(), reviewer })
            .await;
        Ok(Outcome::notified(updated, report))
    }

    async fn respond(&self, caller: &Caller, paper_id: Uuid, response: ReviewerResponse) -> Result<Outcome<Paper>> {
        let paper = self.load(paper_id).await?;

        let mut next = paper.clone();
        next.state = paper.state.respond(caller.user_id, response)?;
        let updated = self.commit(&paper, &next).await?;

        info!(
            paper_id = %updated.id,
            reviewer_id = %caller.user_id,
            response = ?response,
            status = %updated.status(),
            "Reviewer responded"
        );
        Ok(Outcome::quiet(updated))
    }
}
