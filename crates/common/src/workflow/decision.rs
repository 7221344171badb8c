//! Final publication decision

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{observe, Outcome, Workflow};
use crate::auth::Caller;
use crate::domain::validation::check_remark;
use crate::domain::{Decision, Paper};
use crate::errors::{AppError, Result};

impl Workflow {
    /// Publish or reject a paper under review. Both outcomes are terminal.
    pub async fn decide(
        &self,
        caller: &Caller,
        paper_id: Uuid,
        decision: Decision,
        remark: Option<String>,
    ) -> Result<Outcome<Paper>> {
        observe("decide", self.run_decide(caller, paper_id, decision, remark)).await
    }

    async fn run_decide(
        &self,
        caller: &Caller,
        paper_id: Uuid,
        decision: Decision,
        remark: Option<String>,
    ) -> Result<Outcome<Paper>> {
        let remark = match decision {
            Decision::Rejected => check_remark(remark)?,
            Decision::Publish => None,
        };

        let paper = self.load(paper_id).await?;
        if !caller.is_admin() && paper.reviewer_id() != Some(caller.user_id) {
            return Err(AppError::forbidden(
                "Only an admin or the assigned reviewer may decide on this paper",
            ));
        }

        let mut next = paper.clone();
        next.state = paper.state.decide(decision, remark, Utc::now())?;
        let updated = self.commit(&paper, &next).await?;

        info!(
            paper_id = %updated.id,
            decided_by = %caller.user_id,
            status = %updated.status(),
            "Decision recorded"
        );
        Ok(Outcome::quiet(updated))
    }
}
