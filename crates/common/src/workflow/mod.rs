//! Paper review workflow
//!
//! [`Workflow`] runs every operation a caller can invoke on a paper:
//! submission and update, reviewer assignment and response, the final
//! decision, plus the read and admin operations around them. Each mutating
//! operation follows the same shape:
//!
//! 1. check the caller and the input
//! 2. perform blob uploads (if any)
//! 3. compute the next state with a pure transition
//! 4. commit with a compare-and-swap against the snapshot read in step 3
//! 5. only then emit a [`WorkflowEvent`] to the notifier
//!
//! Notification results ride along in [`Outcome`] and never fail the call.

mod assignment;
mod decision;
pub mod events;
mod queries;
mod submission;

pub use events::WorkflowEvent;
pub use submission::{PaperUpdate, Submission};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{BlobRef, FileUpload, Paper};
use crate::errors::{AppError, Result};
use crate::metrics::{record_blob, TransitionTimer};
use crate::notify::{NotificationReport, Notifier};
use crate::storage::BlobStore;
use crate::store::{PaperStore, UserDirectory};

/// Deployment-specific knobs of the workflow
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub manuscript_folder: String,
    pub cover_letter_folder: String,
    /// Editorial office address copied on submission confirmations
    pub admin_address: String,
    /// A send still pending after this long is reported failed
    pub notification_timeout: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            manuscript_folder: config.storage.manuscript_folder.clone(),
            cover_letter_folder: config.storage.cover_letter_folder.clone(),
            admin_address: config.mail.admin_address.clone(),
            notification_timeout: config.notification_timeout(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            manuscript_folder: "papers".to_string(),
            cover_letter_folder: "coverletters".to_string(),
            admin_address: "editor@paperdesk.local".to_string(),
            notification_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of a committed operation plus the outcome of its notification, if one was due
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub notification: Option<NotificationReport>,
}

impl<T> Outcome<T> {
    pub fn quiet(value: T) -> Self {
        Self { value, notification: None }
    }

    pub fn notified(value: T, report: NotificationReport) -> Self {
        Self { value, notification: Some(report) }
    }
}

/// The workflow service; cheap to clone
#[derive(Clone)]
pub struct Workflow {
    papers: Arc<dyn PaperStore>,
    users: Arc<dyn UserDirectory>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<WorkflowSettings>,
}

impl Workflow {
    pub fn new(
        papers: Arc<dyn PaperStore>,
        users: Arc<dyn UserDirectory>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            papers,
            users,
            blobs,
            notifier,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Read a paper or fail with `PaperNotFound`
    async fn load(&self, id: Uuid) -> Result<Paper> {
        self.papers
            .get(id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })
    }

    /// Conditionally write `next` over `current`, keyed on `current`'s snapshot
    async fn commit(&self, current: &Paper, next: &Paper) -> Result<Paper> {
        self.papers.update(current.id, &current.snapshot(), next).await
    }

    async fn put_blob(&self, upload: &FileUpload, folder: &str) -> Result<BlobRef> {
        let result = self.blobs.put(upload, folder).await;
        record_blob("put", result.is_ok());
        result
    }

    /// Delete blobs that are no longer referenced; failures are logged only
    async fn discard_blobs<'a>(&self, references: impl IntoIterator<Item = &'a BlobRef>) {
        for reference in references {
            match self.blobs.delete_by_reference(reference).await {
                Ok(deleted) => {
                    record_blob("delete", true);
                    if !deleted {
                        warn!(reference = %reference, "Blob was already gone");
                    }
                }
                Err(e) => {
                    record_blob("delete", false);
                    warn!(reference = %reference, error = %e, "Failed to delete blob, leaving it orphaned");
                }
            }
        }
    }

    async fn dispatch(&self, event: WorkflowEvent) -> NotificationReport {
        events::dispatch(self.notifier.as_ref(), &self.settings, event).await
    }
}

/// Record duration and outcome of one workflow operation
async fn observe<T>(operation: &'static str, work: impl Future<Output = Result<T>>) -> Result<T> {
    let timer = TransitionTimer::start(operation);
    let result = work.await;
    match &result {
        Ok(_) => timer.finish("ok"),
        Err(e) => timer.finish(&format!("{:?}", e.code())),
    }
    result
}
