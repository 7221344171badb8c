//! Post-commit workflow events and their notifications

use tracing::{info, warn};

use super::WorkflowSettings;
use crate::auth::UserRecord;
use crate::domain::{paper::push_unique_email, Paper};
use crate::metrics::record_notification;
use crate::notify::{templates, NotificationReport, Notifier};

/// Something that happened to a paper after its state change was committed
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    PaperSubmitted {
        paper: Paper,
        /// Absent when the author could not be resolved
        author_email: Option<String>,
    },
    ReviewerAssigned {
        paper: Paper,
        reviewer: UserRecord,
    },
}

impl WorkflowEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::PaperSubmitted { .. } => "paper_submitted",
            WorkflowEvent::ReviewerAssigned { .. } => "reviewer_assigned",
        }
    }

    pub fn paper(&self) -> &Paper {
        match self {
            WorkflowEvent::PaperSubmitted { paper, .. } | WorkflowEvent::ReviewerAssigned { paper, .. } => paper,
        }
    }
}

/// Author, contributors, point of contact, then the editorial office; no address twice
pub fn submission_recipients(author_email: Option<&str>, paper: &Paper, admin_address: &str) -> Vec<String> {
    let mut recipients = Vec::new();
    if let Some(email) = author_email {
        push_unique_email(&mut recipients, email);
    }
    for email in paper.content.contact_emails() {
        push_unique_email(&mut recipients, &email);
    }
    push_unique_email(&mut recipients, admin_address);
    recipients
}

/// Render and send the notification for `event`
pub async fn dispatch(notifier: &dyn Notifier, settings: &WorkflowSettings, event: WorkflowEvent) -> NotificationReport {
    let kind = event.kind();
    let paper_id = event.paper().id;

    let notification = match &event {
        WorkflowEvent::PaperSubmitted { paper, author_email } => {
            let to = submission_recipients(author_email.as_deref(), paper, &settings.admin_address);
            templates::submission_confirmation(paper, to)
        }
        WorkflowEvent::ReviewerAssigned { paper, reviewer } => {
            templates::reviewer_assignment(paper, &reviewer.name, vec![reviewer.email.clone()])
        }
    };

    let recipients = notification.to.len();
    let report = match tokio::time::timeout(settings.notification_timeout, notifier.send(notification)).await {
        Ok(report) => report,
        Err(_) => NotificationReport::failed(format!(
            "Notification not delivered within {}ms",
            settings.notification_timeout.as_millis()
        )),
    };
    record_notification(kind, report.success);

    if report.success {
        info!(paper_id = %paper_id, event = kind, recipients, "Notification sent");
    } else {
        warn!(paper_id = %paper_id, event = kind, reason = %report.message, "Notification failed");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::domain::{BlobRef, Contact, PaperContent, PaperFiles, WorkflowState};
    use crate::notify::{Notification, RecordingNotifier};
    use chrono::Utc;
    use uuid::Uuid;

    fn contact(email: &str) -> Contact {
        Contact {
            full_name: "Frances Allen".into(),
            email: email.into(),
            phone: "+1 914 000 0000".into(),
            affiliation: "IBM".into(),
        }
    }

    fn paper() -> Paper {
        Paper {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: PaperContent {
                title: "Program Optimization by Flow Analysis".into(),
                abstract_text: "a".repeat(400),
                keywords: vec!["compilers".into()],
                contributors: vec![contact("fran@example.org"), contact("john@example.org")],
                point_of_contact: contact("FRAN@example.org"),
            },
            files: PaperFiles {
                manuscript: BlobRef("memory://papers/0-m.pdf".into()),
                cover_letter: None,
            },
            state: WorkflowState::Draft,
            version: 1,
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_submission_recipients_deduplicated() {
        let recipients = submission_recipients(Some("john@example.org"), &paper(), "editor@journal.org");
        assert_eq!(
            recipients,
            vec!["john@example.org", "fran@example.org", "editor@journal.org"]
        );
    }

    #[tokio::test]
    async fn test_dispatch_assignment_goes_to_reviewer_only() {
        let notifier = RecordingNotifier::new();
        let reviewer = UserRecord {
            id: Uuid::new_v4(),
            name: "Ken".into(),
            email: "ken@example.org".into(),
            role: Role::Reviewer,
        };

        let report = dispatch(
            &notifier,
            &WorkflowSettings::default(),
            WorkflowEvent::ReviewerAssigned { paper: paper(), reviewer },
        )
        .await;

        assert!(report.success);
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["ken@example.org"]);
        assert!(sent[0].subject.starts_with("New paper assigned for review:"));
    }

    /// Never answers
    struct StalledNotifier;

    #[async_trait::async_trait]
    impl Notifier for StalledNotifier {
        async fn send(&self, _notification: Notification) -> NotificationReport {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dispatch_gives_up_on_stalled_sender() {
        let settings = WorkflowSettings {
            notification_timeout: std::time::Duration::from_millis(50),
            ..WorkflowSettings::default()
        };

        let report = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            dispatch(
                &StalledNotifier,
                &settings,
                WorkflowEvent::PaperSubmitted { paper: paper(), author_email: None },
            ),
        )
        .await
        .expect("dispatch is bounded");

        assert!(!report.success);
        assert!(report.message.contains("50ms"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported() {
        let notifier = RecordingNotifier::new();
        notifier.fail_sends(true);

        let report = dispatch(
            &notifier,
            &WorkflowSettings::default(),
            WorkflowEvent::PaperSubmitted { paper: paper(), author_email: None },
        )
        .await;
        assert!(!report.success);
    }
}
