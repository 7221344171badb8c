//! Submission and author updates

use tracing::{info, warn};
use uuid::Uuid;

use super::{observe, Outcome, Workflow, WorkflowEvent};
use crate::auth::Caller;
use crate::domain::validation::{check_content, check_pdf};
use crate::domain::{BlobRef, ContentPatch, FileUpload, NewPaper, Paper, PaperContent, PaperFiles};
use crate::errors::{AppError, Result};

/// Everything an author provides for a new paper
#[derive(Debug, Clone)]
pub struct Submission {
    pub content: PaperContent,
    pub manuscript: FileUpload,
    pub cover_letter: Option<FileUpload>,
}

/// Author changes to an existing paper; absent parts stay as they are
#[derive(Debug, Clone, Default)]
pub struct PaperUpdate {
    pub content: ContentPatch,
    pub manuscript: Option<FileUpload>,
    pub cover_letter: Option<FileUpload>,
}

impl PaperUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.manuscript.is_none() && self.cover_letter.is_none()
    }
}

/// Blobs written during one operation, not yet referenced by a committed record
#[derive(Default)]
struct Uploaded {
    manuscript: Option<BlobRef>,
    cover_letter: Option<BlobRef>,
}

impl Uploaded {
    fn refs(&self) -> impl Iterator<Item = &BlobRef> {
        self.manuscript.iter().chain(self.cover_letter.iter())
    }
}

impl Workflow {
    /// Validate, upload files, create the paper, then confirm by mail
    pub async fn submit(&self, caller: &Caller, submission: Submission) -> Result<Outcome<Paper>> {
        observe("submit", self.run_submit(caller, submission)).await
    }

    /// Change content and/or files of a non-terminal paper owned by the caller
    pub async fn update(&self, caller: &Caller, paper_id: Uuid, update: PaperUpdate) -> Result<Outcome<Paper>> {
        observe("update", self.run_update(caller, paper_id, update)).await
    }

    /// Upload manuscript and cover letter concurrently.
    ///
    /// If either upload fails the other one is removed again, so a failed call
    /// leaves nothing behind.
    async fn upload_files(&self, manuscript: Option<&FileUpload>, cover_letter: Option<&FileUpload>) -> Result<Uploaded> {
        let manuscript_folder = self.settings.manuscript_folder.as_str();
        let cover_letter_folder = self.settings.cover_letter_folder.as_str();

        let (manuscript, cover_letter) = futures::join!(
            async {
                match manuscript {
                    Some(upload) => self.put_blob(upload, manuscript_folder).await.map(Some),
                    None => Ok(None),
                }
            },
            async {
                match cover_letter {
                    Some(upload) => self.put_blob(upload, cover_letter_folder).await.map(Some),
                    None => Ok(None),
                }
            }
        );

        match (manuscript, cover_letter) {
            (Ok(manuscript), Ok(cover_letter)) => Ok(Uploaded { manuscript, cover_letter }),
            (manuscript, cover_letter) => {
                let stored: Vec<BlobRef> = [&manuscript, &cover_letter]
                    .into_iter()
                    .filter_map(|r| r.as_ref().ok().cloned().flatten())
                    .collect();
                self.discard_blobs(&stored).await;

                // At least one side failed; report the manuscript error first
                Err(manuscript.and(cover_letter).err().unwrap_or_else(|| AppError::Internal {
                    message: "upload failed without an error".to_string(),
                }))
            }
        }
    }

    async fn run_submit(&self, caller: &Caller, submission: Submission) -> Result<Outcome<Paper>> {
        let content = check_content(submission.content)?;
        check_pdf(&submission.manuscript, "manuscript")?;
        if let Some(ref cover_letter) = submission.cover_letter {
            check_pdf(cover_letter, "coverLetter")?;
        }

        let uploaded = self
            .upload_files(Some(&submission.manuscript), submission.cover_letter.as_ref())
            .await?;
        let Some(manuscript) = uploaded.manuscript.clone() else {
            return Err(AppError::Internal {
                message: "manuscript upload returned no reference".to_string(),
            });
        };

        let new = NewPaper {
            author_id: caller.user_id,
            content,
            files: PaperFiles {
                manuscript,
                cover_letter: uploaded.cover_letter.clone(),
            },
        };

        let paper = match self.papers.create(new).await {
            Ok(paper) => paper,
            Err(e) => {
                warn!(error = %e, "Paper creation failed after upload, removing blobs");
                self.discard_blobs(uploaded.refs()).await;
                return Err(e);
            }
        };

        info!(
            paper_id = %paper.id,
            author_id = %paper.author_id,
            cover_letter = paper.files.cover_letter.is_some(),
            "Paper submitted"
        );

        // Committed; from here on nothing may fail the submission
        let author_email = match self.users.find_user(caller.user_id).await {
            Ok(Some(user)) => Some(user.email),
            Ok(None) => None,
            Err(e) => {
                warn!(author_id = %caller.user_id, error = %e, "Could not resolve author email");
                None
            }
        };

        let report = self
            .dispatch(WorkflowEvent::PaperSubmitted { paper: paper.clone(), author_email })
            .await;
        Ok(Outcome::notified(paper, report))
    }

    async fn run_update(&self, caller: &Caller, paper_id: Uuid, update: PaperUpdate) -> Result<Outcome<Paper>> {
        if update.is_empty() {
            return Err(AppError::Validation {
                message: "Nothing to update".to_string(),
                field: None,
            });
        }

        let paper = self.load(paper_id).await?;
        if paper.author_id != caller.user_id {
            return Err(AppError::forbidden("Only the author may update this paper"));
        }
        if paper.is_terminal() {
            return Err(AppError::InvalidState {
                expected: "a non-terminal status".to_string(),
                actual: paper.state.describe(),
            });
        }

        let content = if update.content.is_empty() {
            paper.content.clone()
        } else {
            check_content(update.content.apply(&paper.content))?
        };
        if let Some(ref manuscript) = update.manuscript {
            check_pdf(manuscript, "manuscript")?;
        }
        if let Some(ref cover_letter) = update.cover_letter {
            check_pdf(cover_letter, "coverLetter")?;
        }

        // Replace-then-delete: new blobs first, old ones only after the commit
        let uploaded = self
            .upload_files(update.manuscript.as_ref(), update.cover_letter.as_ref())
            .await?;

        let mut next = paper.clone();
        next.content = content;
        if let Some(ref manuscript) = uploaded.manuscript {
            next.files.manuscript = manuscript.clone();
        }
        if let Some(ref cover_letter) = uploaded.cover_letter {
            next.files.cover_letter = Some(cover_letter.clone());
        }

        let updated = match self.commit(&paper, &next).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_blobs(uploaded.refs()).await;
                return Err(e);
            }
        };

        let replaced: Vec<BlobRef> = paper
            .files
            .all()
            .filter(|old| !updated.files.all().any(|current| current == *old))
            .cloned()
            .collect();
        self.discard_blobs(&replaced).await;

        info!(
            paper_id = %updated.id,
            version = updated.version,
            replaced_files = replaced.len(),
            "Paper updated"
        );
        Ok(Outcome::quiet(updated))
    }
}
