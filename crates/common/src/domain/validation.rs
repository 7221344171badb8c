//! Input rules shared by submission, update and decision
//!
//! Field-level rules are declared with `validator` on the input structs in
//! `paper.rs`; this module holds the custom checks those derive attributes
//! call, plus file and remark checks that do not fit a derive.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex_lite::Regex;
use validator::{Validate, ValidationError};

use super::paper::{FileUpload, PaperContent};
use crate::errors::{AppError, Result};

/// Largest accepted manuscript or cover letter (10 MiB)
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Longest accepted rejection remark, in characters
pub const MAX_REMARK_CHARS: usize = 2000;

const PDF_MIME: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9 ()\-]+$").expect("phone pattern is valid"))
}

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Digits with optional leading `+`, spaces, dashes and parentheses; at least six digits
pub fn validate_phone(phone: &str) -> std::result::Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Err(failure("required", "Contact number is required"));
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !phone_pattern().is_match(phone) || digits < 6 {
        return Err(failure("phone", "Invalid contact number"));
    }
    Ok(())
}

/// Each keyword must carry text
pub fn validate_keywords(keywords: &[String]) -> std::result::Result<(), ValidationError> {
    if keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(failure("keyword", "Keywords must not be empty"));
    }
    Ok(())
}

/// Normalize and validate paper content
pub fn check_content(content: PaperContent) -> Result<PaperContent> {
    let content = content.normalized();
    content.validate()?;
    Ok(content)
}

/// PDF type, name, signature and size checks for an uploaded file
pub fn check_pdf(upload: &FileUpload, field: &str) -> Result<()> {
    if upload.bytes.is_empty() {
        return Err(AppError::validation(field, "File is empty"));
    }
    if upload.size() > MAX_FILE_BYTES {
        return Err(AppError::validation(
            field,
            format!("File size {} bytes exceeds the 10MB limit", upload.size()),
        ));
    }

    let mime = upload
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime != PDF_MIME || upload.extension().as_deref() != Some("pdf") {
        return Err(AppError::validation(field, "Only PDF files are allowed"));
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::validation(field, "File is not a valid PDF document"));
    }
    Ok(())
}

/// Blank remarks are dropped; long ones rejected
pub fn check_remark(remark: Option<String>) -> Result<Option<String>> {
    let remark = remark
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if let Some(ref r) = remark {
        if r.chars().count() > MAX_REMARK_CHARS {
            return Err(AppError::validation(
                "remark",
                format!("Remark must be at most {} characters", MAX_REMARK_CHARS),
            ));
        }
    }
    Ok(remark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::paper::Contact;

    fn contact() -> Contact {
        Contact {
            full_name: "Grace Hopper".into(),
            email: "grace@navy.example".into(),
            phone: "+1 (555) 010-9999".into(),
            affiliation: "Harvard".into(),
        }
    }

    fn valid_content() -> PaperContent {
        PaperContent {
            title: "X".repeat(20),
            abstract_text: "word ".repeat(80),
            keywords: vec!["compilers".into()],
            contributors: vec![contact()],
            point_of_contact: contact(),
        }
    }

    fn pdf(size: usize) -> FileUpload {
        let mut bytes = PDF_MAGIC.to_vec();
        bytes.resize(size.max(PDF_MAGIC.len()), b'0');
        FileUpload::new("manuscript.pdf", "application/pdf", bytes)
    }

    fn field_of(err: AppError) -> Option<String> {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_content_passes() {
        let content = check_content(valid_content()).unwrap();
        assert_eq!(content.title.len(), 20);
    }

    #[test]
    fn test_title_bounds() {
        let mut content = valid_content();
        content.title = "X".repeat(19);
        assert_eq!(field_of(check_content(content).unwrap_err()).as_deref(), Some("title"));

        let mut content = valid_content();
        content.title = "X".repeat(201);
        assert!(check_content(content).is_err());
    }

    #[test]
    fn test_abstract_bounds() {
        let mut content = valid_content();
        content.abstract_text = "a".repeat(349);
        assert!(field_of(check_content(content).unwrap_err()).is_some());

        let mut content = valid_content();
        content.abstract_text = "a".repeat(1001);
        assert!(check_content(content).is_err());
    }

    #[test]
    fn test_keywords_must_be_present_and_non_empty() {
        let mut content = valid_content();
        content.keywords.clear();
        assert!(check_content(content).is_err());

        let mut content = valid_content();
        content.keywords.push("   ".into());
        assert_eq!(field_of(check_content(content).unwrap_err()).as_deref(), Some("keywords"));
    }

    #[test]
    fn test_contributor_email_checked() {
        let mut content = valid_content();
        content.contributors[0].email = "not-an-email".into();
        let field = field_of(check_content(content).unwrap_err()).unwrap();
        assert_eq!(field, "contributors[0].email");
    }

    #[test]
    fn test_needs_a_contributor() {
        let mut content = valid_content();
        content.contributors.clear();
        assert_eq!(field_of(check_content(content).unwrap_err()).as_deref(), Some("contributors"));
    }

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("12-34").is_err());
        assert!(validate_phone("call me maybe").is_err());
    }

    #[test]
    fn test_pdf_checks() {
        assert!(check_pdf(&pdf(2 * 1024 * 1024), "manuscript").is_ok());
        assert!(check_pdf(&pdf(MAX_FILE_BYTES), "manuscript").is_ok());
        assert!(check_pdf(&pdf(MAX_FILE_BYTES + 1), "manuscript").is_err());

        let mut wrong_type = pdf(64);
        wrong_type.content_type = "application/msword".into();
        assert!(check_pdf(&wrong_type, "manuscript").is_err());

        let mut wrong_name = pdf(64);
        wrong_name.file_name = "manuscript.docx".into();
        assert!(check_pdf(&wrong_name, "manuscript").is_err());

        let fake = FileUpload::new("fake.pdf", "application/pdf", b"PK\x03\x04".to_vec());
        assert_eq!(field_of(check_pdf(&fake, "coverLetter").unwrap_err()).as_deref(), Some("coverLetter"));
    }

    #[test]
    fn test_pdf_mime_parameters_ignored() {
        let mut upload = pdf(64);
        upload.content_type = "Application/PDF; charset=binary".into();
        assert!(check_pdf(&upload, "manuscript").is_ok());
    }

    #[test]
    fn test_remark_normalization() {
        assert_eq!(check_remark(None).unwrap(), None);
        assert_eq!(check_remark(Some("   ".into())).unwrap(), None);
        assert_eq!(check_remark(Some(" weak method ".into())).unwrap().as_deref(), Some("weak method"));
        assert!(check_remark(Some("r".repeat(MAX_REMARK_CHARS + 1))).is_err());
    }
}
