//! Reads and administrative operations

use tracing::{info, warn};
use uuid::Uuid;

use super::{observe, Workflow};
use crate::auth::{Caller, Role, UserRecord};
use crate::domain::{Paper, PaperStatus};
use crate::errors::{AppError, Result};
use crate::store::{Page, PaperQuery};

impl Workflow {
    /// Fetch one paper the caller is allowed to see
    pub async fn get(&self, caller: &Caller, paper_id: Uuid) -> Result<Paper> {
        let paper = self.load(paper_id).await?;

        let visible = caller.is_admin()
            || paper.author_id == caller.user_id
            || paper.reviewer_id() == Some(caller.user_id)
            || paper.status() == PaperStatus::Publish;
        if !visible {
            return Err(AppError::forbidden("You do not have access to this paper"));
        }
        Ok(paper)
    }

    /// List papers; non-admins must scope the query to themselves or to published papers
    pub async fn list(&self, caller: &Caller, query: PaperQuery) -> Result<Page<Paper>> {
        let query = query.normalized();

        if !caller.is_admin() {
            let scoped = query.author_id == Some(caller.user_id)
                || query.reviewer_id == Some(caller.user_id)
                || query.status == Some(PaperStatus::Publish);
            if !scoped {
                return Err(AppError::forbidden(
                    "Filter by your own authorId or reviewerId, or by status PUBLISH",
                ));
            }
        }

        self.papers.list(&query).await
    }

    /// Admin bulk delete. Records go first, then their files (best effort).
    pub async fn delete_papers(&self, caller: &Caller, paper_ids: &[Uuid]) -> Result<u64> {
        observe("delete", async {
            caller.require_admin("delete papers")?;
            if paper_ids.is_empty() {
                return Err(AppError::validation("paperIds", "At least one paper id is required"));
            }

            let mut deleted = 0u64;
            for &id in paper_ids {
                let Some(paper) = self.papers.get(id).await? else {
                    warn!(paper_id = %id, "Paper to delete not found, skipping");
                    continue;
                };
                if self.papers.delete(id).await? {
                    deleted += 1;
                    self.discard_blobs(paper.files.all()).await;
                }
            }

            info!(requested = paper_ids.len(), deleted, "Papers deleted");
            Ok(deleted)
        })
        .await
    }

    /// Users that may be assigned as reviewers
    pub async fn list_reviewers(&self, caller: &Caller) -> Result<Vec<UserRecord>> {
        caller.require_admin("list reviewers")?;
        self.users.list_by_roles(&[Role::Reviewer, Role::Admin]).await
    }
}
