//! Repository pattern for database operations
//!
//! Implements `PaperStore` and `UserDirectory` over SeaORM. Contributors and
//! the point of contact are stored as JSONB and only parsed into typed
//! contacts here, at the storage boundary.

use crate::auth::{Role, UserRecord};
use crate::db::models::*;
use crate::db::DbPool;
use crate::domain::{
    BlobRef, Contact, NewPaper, Paper, PaperContent, PaperFiles, PaperStatus, ReviewerStatus,
    Snapshot, WireState, WorkflowState,
};
use crate::errors::{AppError, Result};
use crate::store::{Page, PaperQuery, PaperSort, PaperStore, SortOrder, UserDirectory};
use async_trait::async_trait;
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn corrupt(id: Uuid, what: &str, err: impl std::fmt::Display) -> AppError {
    AppError::DataIntegrity {
        message: format!("paper {}: unreadable {}: {}", id, what, err),
    }
}

fn parse_json<T: DeserializeOwned>(id: Uuid, what: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| corrupt(id, what, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(Into::into)
}

/// Convert a stored row into the domain paper
pub(crate) fn paper_from_row(row: PaperRow) -> Result<Paper> {
    let id = row.id;
    let status: PaperStatus = row.status.parse().map_err(|e| corrupt(id, "status", e))?;
    let reviewer_status: Option<ReviewerStatus> = row
        .reviewer_status
        .as_deref()
        .map(str::parse::<ReviewerStatus>)
        .transpose()
        .map_err(|e| corrupt(id, "reviewer status", e))?;

    let state = WorkflowState::from_wire(WireState {
        status,
        reviewer_status,
        reviewer_id: row.reviewer_id,
        rejection_remark: row.rejection_remark,
        rejection_date: row.rejection_date.map(Into::into),
    })?;

    let contributors: Vec<Contact> = parse_json(id, "contributors", row.contributors)?;
    let point_of_contact: Contact = parse_json(id, "point of contact", row.point_of_contact)?;

    Ok(Paper {
        id,
        author_id: row.author_id,
        content: PaperContent {
            title: row.title,
            abstract_text: row.abstract_text,
            keywords: row.keywords,
            contributors,
            point_of_contact,
        },
        files: PaperFiles {
            manuscript: BlobRef(row.file_path),
            cover_letter: row.cover_letter_path.map(BlobRef),
        },
        state,
        version: row.current_version,
        submitted_at: row.submission_date.into(),
        last_updated: row.last_updated.into(),
    })
}

fn user_from_row(row: UserRow) -> Result<UserRecord> {
    let role: Role = row.user_type.parse().map_err(|e| AppError::DataIntegrity {
        message: format!("user {}: unreadable role: {}", row.id, e),
    })?;
    Ok(UserRecord {
        id: row.id,
        name: row.name,
        email: row.email,
        role,
    })
}

/// Escape LIKE wildcards in a user-supplied search term
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Stored `reviewer_status` matching the snapshot value.
///
/// Older rows may hold NULL where `NOT_RESPONDED` is meant; both read as the
/// same state, so both must satisfy the precondition.
fn reviewer_status_condition(expected: Option<ReviewerStatus>) -> Condition {
    match expected {
        None | Some(ReviewerStatus::NotResponded) => Condition::any()
            .add(PaperColumn::ReviewerStatus.is_null())
            .add(PaperColumn::ReviewerStatus.eq(ReviewerStatus::NotResponded.as_str())),
        Some(status) => Condition::all().add(PaperColumn::ReviewerStatus.eq(status.as_str())),
    }
}

fn sort_column(sort: PaperSort) -> PaperColumn {
    match sort {
        PaperSort::SubmissionDate => PaperColumn::SubmissionDate,
        PaperSort::LastUpdated => PaperColumn::LastUpdated,
        PaperSort::Title => PaperColumn::Title,
    }
}

// ============================================================================
// Paper Operations
// ============================================================================

#[async_trait]
impl PaperStore for Repository {
    async fn create(&self, new: NewPaper) -> Result<Paper> {
        let now = chrono::Utc::now();
        let wire = WorkflowState::Draft.to_wire();

        let paper = PaperActiveModel {
            id: Set(Uuid::new_v4()),
            author_id: Set(new.author_id),
            title: Set(new.content.title.clone()),
            abstract_text: Set(new.content.abstract_text.clone()),
            keywords: Set(new.content.keywords.clone()),
            contributors: Set(to_json(&new.content.contributors)?),
            point_of_contact: Set(to_json(&new.content.point_of_contact)?),
            file_path: Set(new.files.manuscript.0.clone()),
            cover_letter_path: Set(new.files.cover_letter.as_ref().map(|r| r.0.clone())),
            status: Set(wire.status.as_str().to_string()),
            reviewer_status: Set(None),
            reviewer_id: Set(None),
            rejection_remark: Set(None),
            rejection_date: Set(None),
            current_version: Set(1),
            submission_date: Set(now.into()),
            last_updated: Set(now.into()),
        };

        let row = paper.insert(self.write_conn()).await?;
        paper_from_row(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(paper_from_row)
            .transpose()
    }

    async fn update(&self, id: Uuid, expected: &Snapshot, next: &Paper) -> Result<Paper> {
        let wire = next.state.to_wire();
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
        let rejection_date: Option<sea_orm::prelude::DateTimeWithTimeZone> =
            wire.rejection_date.map(Into::into);

        let reviewer_id_condition = match expected.reviewer_id {
            Some(reviewer_id) => PaperColumn::ReviewerId.eq(reviewer_id),
            None => PaperColumn::ReviewerId.is_null(),
        };

        let precondition = Condition::all()
            .add(PaperColumn::Id.eq(id))
            .add(PaperColumn::Status.eq(expected.status.as_str()))
            .add(reviewer_status_condition(expected.reviewer_status))
            .add(reviewer_id_condition)
            .add(PaperColumn::CurrentVersion.eq(expected.version));

        // Single conditional UPDATE; author_id and submission_date are never written
        let updated = PaperEntity::update_many()
            .col_expr(PaperColumn::Title, Expr::value(next.content.title.clone()))
            .col_expr(PaperColumn::AbstractText, Expr::value(next.content.abstract_text.clone()))
            .col_expr(PaperColumn::Keywords, Expr::value(next.content.keywords.clone()))
            .col_expr(PaperColumn::Contributors, Expr::value(to_json(&next.content.contributors)?))
            .col_expr(PaperColumn::PointOfContact, Expr::value(to_json(&next.content.point_of_contact)?))
            .col_expr(PaperColumn::FilePath, Expr::value(next.files.manuscript.0.clone()))
            .col_expr(
                PaperColumn::CoverLetterPath,
                Expr::value(next.files.cover_letter.as_ref().map(|r| r.0.clone())),
            )
            .col_expr(PaperColumn::Status, Expr::value(wire.status.as_str()))
            .col_expr(
                PaperColumn::ReviewerStatus,
                Expr::value(wire.reviewer_status.map(|s| s.as_str().to_string())),
            )
            .col_expr(PaperColumn::ReviewerId, Expr::value(wire.reviewer_id))
            .col_expr(PaperColumn::RejectionRemark, Expr::value(wire.rejection_remark))
            .col_expr(PaperColumn::RejectionDate, Expr::value(rejection_date))
            .col_expr(PaperColumn::CurrentVersion, Expr::value(expected.version + 1))
            .col_expr(PaperColumn::LastUpdated, Expr::value(now))
            .filter(precondition)
            .exec_with_returning(self.write_conn())
            .await?;

        match updated.into_iter().next() {
            Some(row) => paper_from_row(row),
            None => {
                // Nothing matched: either the row is gone or it moved on
                let exists = PaperEntity::find_by_id(id).one(self.write_conn()).await?.is_some();
                if exists {
                    tracing::debug!(paper_id = %id, version = expected.version, "Conditional update lost the race");
                    Err(AppError::Conflict { id: id.to_string() })
                } else {
                    Err(AppError::PaperNotFound { id: id.to_string() })
                }
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = PaperEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list(&self, query: &PaperQuery) -> Result<Page<Paper>> {
        let mut select = PaperEntity::find();

        if let Some(author_id) = query.author_id {
            select = select.filter(PaperColumn::AuthorId.eq(author_id));
        }
        if let Some(reviewer_id) = query.reviewer_id {
            select = select.filter(PaperColumn::ReviewerId.eq(reviewer_id));
        }
        if let Some(status) = query.status {
            select = select.filter(PaperColumn::Status.eq(status.as_str()));
        }
        if !query.titles.is_empty() {
            let any_title = query.titles.iter().fold(Condition::any(), |cond, title| {
                cond.add(Expr::col(PaperColumn::Title).ilike(format!("%{}%", escape_like(title))))
            });
            select = select.filter(any_title);
        }
        if !query.keywords.is_empty() {
            let any_keyword = query.keywords.iter().fold(Condition::any(), |cond, keyword| {
                cond.add(Expr::cust_with_values("? = ANY(keywords)", [keyword.clone()]))
            });
            select = select.filter(any_keyword);
        }

        let order = match query.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let paginator = select
            .order_by(sort_column(query.sort), order.clone())
            .order_by(PaperColumn::Id, order)
            .paginate(self.read_conn(), query.limit.max(1));

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(query.page.max(1) - 1).await?;
        let items = rows.into_iter().map(paper_from_row).collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, query.page, query.limit))
    }
}

// ============================================================================
// User Operations
// ============================================================================

#[async_trait]
impl UserDirectory for Repository {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>> {
        let mut names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        if roles.contains(&Role::User) {
            names.push("AUTHOR");
        }

        UserEntity::find()
            .filter(UserColumn::UserType.is_in(names))
            .order_by_asc(UserColumn::Name)
            .order_by_asc(UserColumn::Id)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(user_from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn contact_json(email: &str) -> serde_json::Value {
        json!({
            "fullName": "Barbara Liskov",
            "email": email,
            "phone": "+1 617 253 0000",
            "affiliation": "MIT"
        })
    }

    fn row() -> PaperRow {
        let now = Utc::now();
        PaperRow {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Data Abstraction and Hierarchy".into(),
            abstract_text: "a".repeat(360),
            keywords: vec!["types".into(), "subtyping".into()],
            contributors: json!([contact_json("barbara@example.org")]),
            point_of_contact: contact_json("poc@example.org"),
            file_path: "http://localhost:8080/files/papers/a.pdf".into(),
            cover_letter_path: None,
            status: "UPLOAD".into(),
            reviewer_status: None,
            reviewer_id: None,
            rejection_remark: None,
            rejection_date: None,
            current_version: 1,
            submission_date: now.into(),
            last_updated: now.into(),
        }
    }

    #[test]
    fn test_row_to_paper() {
        let paper = paper_from_row(row()).unwrap();
        assert_eq!(paper.status(), PaperStatus::Upload);
        assert_eq!(paper.content.contributors[0].full_name, "Barbara Liskov");
        assert_eq!(paper.content.point_of_contact.email, "poc@example.org");
        assert_eq!(paper.files.cover_letter, None);
    }

    #[test]
    fn test_row_under_review() {
        let reviewer = Uuid::new_v4();
        let mut row = row();
        row.status = "ON_REVIEW".into();
        row.reviewer_status = Some("ACCEPTED".into());
        row.reviewer_id = Some(reviewer);

        let paper = paper_from_row(row).unwrap();
        assert_eq!(paper.state, WorkflowState::UnderReview { reviewer_id: reviewer });
    }

    #[test]
    fn test_malformed_contacts_are_integrity_errors() {
        let mut row = row();
        row.contributors = json!({"not": "a list"});
        assert!(matches!(paper_from_row(row), Err(AppError::DataIntegrity { .. })));
    }

    #[test]
    fn test_unknown_status_is_integrity_error() {
        let mut row = row();
        row.status = "ARCHIVED".into();
        assert!(matches!(paper_from_row(row), Err(AppError::DataIntegrity { .. })));
    }

    #[test]
    fn test_legacy_author_role() {
        let user = user_from_row(UserRow {
            id: Uuid::new_v4(),
            name: "Edsger".into(),
            email: "ewd@example.org".into(),
            user_type: "AUTHOR".into(),
            created_at: Utc::now().into(),
        })
        .unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
