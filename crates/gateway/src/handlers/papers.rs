//! Paper submission, update, reads and bulk deletion

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use paperdesk_common::{
    auth::Caller,
    domain::{Contact, ContentPatch, FileUpload, Paper, PaperContent, PaperStatus, ReviewerStatus},
    errors::{AppError, Result},
    notify::NotificationReport,
    store::{Page, PaperQuery},
    workflow::{Outcome, PaperUpdate, Submission},
};

/// Wire shape of a paper
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub contributors: Vec<Contact>,
    pub point_of_contact: Contact,
    pub file_path: String,
    pub cover_letter_path: Option<String>,
    pub status: PaperStatus,
    pub reviewer_status: Option<ReviewerStatus>,
    pub reviewer_id: Option<Uuid>,
    pub rejection_remark: Option<String>,
    pub rejection_date: Option<DateTime<Utc>>,
    pub current_version: i32,
    pub submission_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<Paper> for PaperResponse {
    fn from(paper: Paper) -> Self {
        let wire = paper.state.to_wire();
        Self {
            id: paper.id,
            author_id: paper.author_id,
            title: paper.content.title,
            abstract_text: paper.content.abstract_text,
            keywords: paper.content.keywords,
            contributors: paper.content.contributors,
            point_of_contact: paper.content.point_of_contact,
            file_path: paper.files.manuscript.0,
            cover_letter_path: paper.files.cover_letter.map(|r| r.0),
            status: wire.status,
            reviewer_status: wire.reviewer_status,
            reviewer_id: wire.reviewer_id,
            rejection_remark: wire.rejection_remark,
            rejection_date: wire.rejection_date,
            current_version: paper.version,
            submission_date: paper.submitted_at,
            last_updated: paper.last_updated,
        }
    }
}

/// A changed paper plus the mail sent about it, if any
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub paper: PaperResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationReport>,
}

impl From<Outcome<Paper>> for MutationResponse {
    fn from(outcome: Outcome<Paper>) -> Self {
        Self {
            paper: outcome.value.into(),
            notification: outcome.notification,
        }
    }
}

/// Multipart fields of a submission or update, all optional at parse time
#[derive(Debug, Default)]
struct PaperForm {
    title: Option<String>,
    abstract_text: Option<String>,
    keywords: Option<Vec<String>>,
    contributors: Option<Vec<Contact>>,
    point_of_contact: Option<Contact>,
    manuscript: Option<FileUpload>,
    cover_letter: Option<FileUpload>,
}

/// Body-limit hits become `PayloadTooLarge`, anything else a validation error on the body
fn multipart_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::validation("body", e.body_text())
    }
}

fn parse_json<T: DeserializeOwned>(field: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AppError::validation(field, format!("Invalid JSON: {}", e)))
}

/// `"a, b,c"` → `["a", "b", "c"]`
fn split_keywords(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',').map(str::trim).filter(|k| !k.is_empty()).map(str::to_string)
}

impl PaperForm {
    async fn read(mut multipart: Multipart, limit: usize) -> Result<Self> {
        let mut form = Self::default();
        let bad_multipart = |e: MultipartError| multipart_error(e, limit);

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "manuscript" | "coverLetter" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    // Browsers send an empty part for an untouched file input
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    let upload = FileUpload::new(file_name, content_type, bytes.to_vec());
                    if name == "manuscript" {
                        form.manuscript = Some(upload);
                    } else {
                        form.cover_letter = Some(upload);
                    }
                }
                "title" => form.title = Some(field.text().await.map_err(bad_multipart)?),
                "abstract" => form.abstract_text = Some(field.text().await.map_err(bad_multipart)?),
                "keywords" => {
                    let raw = field.text().await.map_err(bad_multipart)?;
                    form.keywords.get_or_insert_with(Vec::new).extend(split_keywords(&raw));
                }
                "contributors" => {
                    let raw = field.text().await.map_err(bad_multipart)?;
                    form.contributors = Some(parse_json("contributors", &raw)?);
                }
                "pointOfContact" => {
                    let raw = field.text().await.map_err(bad_multipart)?;
                    form.point_of_contact = Some(parse_json("pointOfContact", &raw)?);
                }
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn into_submission(self) -> Result<Submission> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T> {
            value.ok_or_else(|| AppError::MissingField { field: field.to_string() })
        }

        Ok(Submission {
            content: PaperContent {
                title: required(self.title, "title")?,
                abstract_text: required(self.abstract_text, "abstract")?,
                keywords: required(self.keywords, "keywords")?,
                contributors: required(self.contributors, "contributors")?,
                point_of_contact: required(self.point_of_contact, "pointOfContact")?,
            },
            manuscript: required(self.manuscript, "manuscript")?,
            cover_letter: self.cover_letter,
        })
    }

    fn into_update(self) -> PaperUpdate {
        PaperUpdate {
            content: ContentPatch {
                title: self.title,
                abstract_text: self.abstract_text,
                keywords: self.keywords,
                contributors: self.contributors,
                point_of_contact: self.point_of_contact,
            },
            manuscript: self.manuscript,
            cover_letter: self.cover_letter,
        }
    }
}

/// Submit a new paper
pub async fn submit_paper(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MutationResponse>)> {
    let submission = PaperForm::read(multipart, state.max_upload_bytes).await?.into_submission()?;
    let outcome = state.workflow.submit(&caller, submission).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Revise a paper's content or files
pub async fn update_paper(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<MutationResponse>> {
    let update = PaperForm::read(multipart, state.max_upload_bytes).await?.into_update();
    let outcome = state.workflow.update(&caller, paper_id, update).await?;
    Ok(Json(outcome.into()))
}

/// Get a paper by ID
pub async fn get_paper(
    State(state): State<AppState>,
    caller: Caller,
    Path(paper_id): Path<Uuid>,
) -> Result<Json<PaperResponse>> {
    let paper = state.workflow.get(&caller, paper_id).await?;
    Ok(Json(paper.into()))
}

/// Query string of `GET /v1/papers`; list values are comma-separated
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub author_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListParams {
    fn into_query(self) -> Result<PaperQuery> {
        let defaults = PaperQuery::default();
        Ok(PaperQuery {
            author_id: self.author_id,
            reviewer_id: self.reviewer_id,
            status: self.status.as_deref().map(str::parse).transpose()?,
            titles: self
                .title
                .as_deref()
                .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            keywords: self.keywords.as_deref().map(|k| split_keywords(k).collect()).unwrap_or_default(),
            sort: self.sort_by.as_deref().map(str::parse).transpose()?.unwrap_or(defaults.sort),
            order: self.order.as_deref().map(str::parse).transpose()?.unwrap_or(defaults.order),
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

/// List papers visible to the caller
pub async fn list_papers(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<PaperResponse>>> {
    let page = state.workflow.list(&caller, params.into_query()?).await?;
    Ok(Json(page.map(PaperResponse::from)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePapersRequest {
    pub paper_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePapersResponse {
    pub deleted_count: u64,
}

/// Admin bulk delete
pub async fn delete_papers(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<DeletePapersRequest>,
) -> Result<Json<DeletePapersResponse>> {
    let deleted_count = state.workflow.delete_papers(&caller, &request.paper_ids).await?;
    Ok(Json(DeletePapersResponse { deleted_count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdesk_common::domain::BlobRef;
    use paperdesk_common::store::{PaperSort, SortOrder};

    fn contact(email: &str) -> Contact {
        Contact {
            full_name: "Barbara Liskov".into(),
            email: email.into(),
            phone: "+1 617 000 0000".into(),
            affiliation: "MIT".into(),
        }
    }

    #[test]
    fn test_split_keywords() {
        let keywords: Vec<_> = split_keywords(" abstraction, ,types ,").collect();
        assert_eq!(keywords, vec!["abstraction", "types"]);
    }

    #[test]
    fn test_submission_requires_every_part() {
        let form = PaperForm {
            title: Some("Data Abstraction and Hierarchy".into()),
            abstract_text: Some("a".repeat(400)),
            keywords: Some(vec!["types".into()]),
            contributors: Some(vec![contact("b@mit.test")]),
            point_of_contact: Some(contact("b@mit.test")),
            manuscript: None,
            cover_letter: None,
        };

        match form.into_submission() {
            Err(AppError::MissingField { field }) => assert_eq!(field, "manuscript"),
            other => panic!("expected missing manuscript, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_update_carries_only_sent_parts() {
        let form = PaperForm {
            keywords: Some(vec!["substitution".into()]),
            ..Default::default()
        };
        let update = form.into_update();
        assert!(update.content.title.is_none());
        assert_eq!(update.content.keywords, Some(vec!["substitution".to_string()]));
        assert!(update.manuscript.is_none());
    }

    #[test]
    fn test_contributors_json() {
        let parsed: Vec<Contact> = parse_json(
            "contributors",
            r#"[{"fullName":"Barbara Liskov","email":"b@mit.test","phone":"+1 617 000 0000","affiliation":"MIT"}]"#,
        )
        .unwrap();
        assert_eq!(parsed, vec![contact("b@mit.test")]);

        let err = parse_json::<Vec<Contact>>("contributors", "{not json").unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "contributors"));
    }

    #[tokio::test]
    async fn test_oversized_upload_returns_json_413() {
        use axum::{body::Body, extract::DefaultBodyLimit, http, routing::post, Router};
        use tower::ServiceExt;

        const LIMIT: usize = 256;
        let app = Router::new()
            .route(
                "/",
                post(|multipart: Multipart| async move { PaperForm::read(multipart, LIMIT).await.map(|_| "ok") }),
            )
            .layer(DefaultBodyLimit::max(LIMIT));

        let boundary = "paperdesk-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"manuscript\"; filename=\"paper.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n{pdf}\r\n--{b}--\r\n",
            b = boundary,
            pdf = "%".repeat(LIMIT * 4),
        );
        let request = http::Request::builder()
            .method("POST")
            .uri("/")
            .header(http::header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert!(json["error"]["message"].as_str().unwrap().contains("256 bytes"));
    }

    #[test]
    fn test_list_params_into_query() {
        let params = ListParams {
            status: Some("ON_REVIEW".into()),
            title: Some("clu, argus".into()),
            keywords: Some("types,abstraction".into()),
            sort_by: Some("title".into()),
            order: Some("asc".into()),
            page: Some(3),
            ..Default::default()
        };
        let query = params.into_query().unwrap();

        assert_eq!(query.status, Some(PaperStatus::OnReview));
        assert_eq!(query.titles, vec!["clu", "argus"]);
        assert_eq!(query.keywords, vec!["types", "abstraction"]);
        assert_eq!(query.sort, PaperSort::Title);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.page, 3);
        assert_eq!(query.limit, 5);
    }

    #[test]
    fn test_list_params_reject_unknown_status() {
        let params = ListParams {
            status: Some("LOST".into()),
            ..Default::default()
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn test_paper_response_wire_names() {
        let paper = Paper {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: PaperContent {
                title: "Data Abstraction and Hierarchy".into(),
                abstract_text: "a".repeat(400),
                keywords: vec!["types".into()],
                contributors: vec![contact("b@mit.test")],
                point_of_contact: contact("b@mit.test"),
            },
            files: paperdesk_common::domain::PaperFiles {
                manuscript: BlobRef("http://localhost:8080/files/papers/p.pdf".into()),
                cover_letter: None,
            },
            state: paperdesk_common::domain::WorkflowState::Draft,
            version: 1,
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        };

        let json = serde_json::to_value(PaperResponse::from(paper)).unwrap();
        assert_eq!(json["status"], "UPLOAD");
        assert_eq!(json["filePath"], "http://localhost:8080/files/papers/p.pdf");
        assert_eq!(json["currentVersion"], 1);
        assert!(json["reviewerStatus"].is_null());
        assert!(json["abstract"].is_string());
        assert_eq!(json["pointOfContact"]["fullName"], "Barbara Liskov");
    }
}
