//! Paper aggregate and its value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::state::{PaperStatus, ReviewerStatus, WorkflowState};
use super::validation::{validate_keywords, validate_phone};

/// A person attached to a submission: contributor or point of contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(length(min = 1, message = "Affiliation is required"))]
    pub affiliation: String,
}

impl Contact {
    fn trimmed(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            affiliation: self.affiliation.trim().to_string(),
        }
    }
}

/// Author-editable content of a paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaperContent {
    #[validate(length(min = 20, max = 200, message = "Title must be between 20 and 200 characters"))]
    pub title: String,

    #[serde(rename = "abstract")]
    #[validate(length(min = 350, max = 1000, message = "Abstract must be between 350 and 1000 characters"))]
    pub abstract_text: String,

    #[validate(
        length(min = 1, message = "At least one keyword is required"),
        custom(function = "validate_keywords")
    )]
    pub keywords: Vec<String>,

    #[validate(length(min = 1, message = "At least one contributor is required"), nested)]
    pub contributors: Vec<Contact>,

    #[validate(nested)]
    pub point_of_contact: Contact,
}

impl PaperContent {
    /// Trim surrounding whitespace everywhere; keyword order and duplicates are kept
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            abstract_text: self.abstract_text.trim().to_string(),
            keywords: self.keywords.into_iter().map(|k| k.trim().to_string()).collect(),
            contributors: self.contributors.into_iter().map(Contact::trimmed).collect(),
            point_of_contact: self.point_of_contact.trimmed(),
        }
    }

    /// Every address tied to the submission, first-seen order, case-insensitively unique
    pub fn contact_emails(&self) -> Vec<String> {
        let mut emails = Vec::new();
        for email in self
            .contributors
            .iter()
            .chain(std::iter::once(&self.point_of_contact))
            .map(|c| c.email.as_str())
        {
            push_unique_email(&mut emails, email);
        }
        emails
    }
}

/// Append `email` unless an equal address (ignoring case) is present
pub fn push_unique_email(emails: &mut Vec<String>, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        return;
    }
    if !emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
        emails.push(email.to_string());
    }
}

/// Partial content for an update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub contributors: Option<Vec<Contact>>,
    pub point_of_contact: Option<Contact>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.abstract_text.is_none()
            && self.keywords.is_none()
            && self.contributors.is_none()
            && self.point_of_contact.is_none()
    }

    pub fn apply(self, current: &PaperContent) -> PaperContent {
        PaperContent {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            abstract_text: self.abstract_text.unwrap_or_else(|| current.abstract_text.clone()),
            keywords: self.keywords.unwrap_or_else(|| current.keywords.clone()),
            contributors: self.contributors.unwrap_or_else(|| current.contributors.clone()),
            point_of_contact: self.point_of_contact.unwrap_or_else(|| current.point_of_contact.clone()),
        }
    }
}

/// Stable, publicly resolvable locator of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file received from a caller, not yet stored
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Lower-cased extension of the original file name
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Stored files of a paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperFiles {
    pub manuscript: BlobRef,
    pub cover_letter: Option<BlobRef>,
}

impl PaperFiles {
    pub fn all(&self) -> impl Iterator<Item = &BlobRef> {
        std::iter::once(&self.manuscript).chain(self.cover_letter.iter())
    }
}

/// The central submission record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: PaperContent,
    pub files: PaperFiles,
    pub state: WorkflowState,
    pub version: i32,
    pub submitted_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Fields needed to create a paper; the store fills in the rest
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub author_id: Uuid,
    pub content: PaperContent,
    pub files: PaperFiles,
}

/// Values a conditional update compares against the stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: PaperStatus,
    pub reviewer_status: Option<ReviewerStatus>,
    pub reviewer_id: Option<Uuid>,
    pub version: i32,
}

impl Paper {
    pub fn status(&self) -> PaperStatus {
        self.state.status()
    }

    pub fn reviewer_status(&self) -> Option<ReviewerStatus> {
        self.state.reviewer_status()
    }

    pub fn reviewer_id(&self) -> Option<Uuid> {
        self.state.reviewer_id()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status(),
            reviewer_status: self.reviewer_status(),
            reviewer_id: self.reviewer_id(),
            version: self.version,
        }
    }

    /// Whether `snapshot` still describes this record
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.snapshot() == *snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str) -> Contact {
        Contact {
            full_name: "Ada Lovelace".into(),
            email: email.into(),
            phone: "+44 20 7946 0000".into(),
            affiliation: "Analytical Society".into(),
        }
    }

    fn content() -> PaperContent {
        PaperContent {
            title: "  Dependable Review Pipelines  ".into(),
            abstract_text: "a".repeat(400),
            keywords: vec![" rust ".into(), "review".into(), "rust".into()],
            contributors: vec![contact("ada@example.org"), contact("ADA@example.org")],
            point_of_contact: contact("poc@example.org"),
        }
    }

    #[test]
    fn test_normalize_keeps_keyword_order_and_duplicates() {
        let content = content().normalized();
        assert_eq!(content.title, "Dependable Review Pipelines");
        assert_eq!(content.keywords, vec!["rust", "review", "rust"]);
    }

    #[test]
    fn test_contact_emails_deduplicated_case_insensitively() {
        let emails = content().contact_emails();
        assert_eq!(emails, vec!["ada@example.org", "poc@example.org"]);
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let current = content().normalized();
        let patch = ContentPatch {
            keywords: Some(vec!["typestate".into()]),
            ..Default::default()
        };
        assert!(!patch.is_empty());

        let next = patch.apply(&current);
        assert_eq!(next.title, current.title);
        assert_eq!(next.keywords, vec!["typestate"]);
        assert!(ContentPatch::default().is_empty());
    }

    #[test]
    fn test_file_extension() {
        let upload = FileUpload::new("Manuscript.Final.PDF", "application/pdf", vec![1, 2, 3]);
        assert_eq!(upload.extension().as_deref(), Some("pdf"));
        assert_eq!(upload.size(), 3);
        assert_eq!(FileUpload::new("noext", "application/pdf", vec![]).extension(), None);
    }

    #[test]
    fn test_content_serializes_with_wire_names() {
        let json = serde_json::to_value(content()).unwrap();
        assert!(json.get("abstract").is_some());
        assert!(json.get("pointOfContact").is_some());
        assert!(json["contributors"][0].get("fullName").is_some());
    }
}
