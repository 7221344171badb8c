//! Persistence abstraction for papers and users
//!
//! The workflow talks to these traits only. `db::Repository` implements them
//! over PostgreSQL; [`InMemoryStore`] implements them over a map for tests and
//! local runs.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{Role, UserRecord};
use crate::domain::{NewPaper, Paper, PaperStatus, Snapshot};
use crate::errors::{AppError, Result};

/// Default page size for paper listings
pub const DEFAULT_PAGE_SIZE: u64 = 5;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u64 = 100;

/// Storage for paper records.
///
/// `update` is the only way to change a stored paper and is a compare-and-swap:
/// it applies only if the stored `(status, reviewerStatus, reviewerId, version)`
/// still equals `expected`.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Insert a new paper in the `UPLOAD` state with version 1
    async fn create(&self, paper: NewPaper) -> Result<Paper>;

    /// Fetch a paper, `None` if unknown
    async fn get(&self, id: Uuid) -> Result<Option<Paper>>;

    /// Write `next` over the stored record if it still matches `expected`.
    ///
    /// Content, files and state come from `next`; the author and submission
    /// date are never rewritten. The stored version becomes `expected.version + 1`.
    /// Fails with `PaperNotFound` when the row is gone and `Conflict` when it moved.
    async fn update(&self, id: Uuid, expected: &Snapshot, next: &Paper) -> Result<Paper>;

    /// Remove a paper; `false` if nothing was deleted
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Filtered, sorted, paginated listing
    async fn list(&self, query: &PaperQuery) -> Result<Page<Paper>>;
}

/// Lookup of registered users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Users holding any of `roles`, ordered by name
    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>>;
}

/// Sort key for paper listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaperSort {
    #[default]
    SubmissionDate,
    LastUpdated,
    Title,
}

impl FromStr for PaperSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submissionDate" => Ok(PaperSort::SubmissionDate),
            "lastUpdated" => Ok(PaperSort::LastUpdated),
            "title" => Ok(PaperSort::Title),
            other => Err(AppError::validation("sortBy", format!("Unsupported sort key: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::validation("sortOrder", format!("Unsupported sort order: {}", other))),
        }
    }
}

/// Filters and paging for [`PaperStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperQuery {
    pub author_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub status: Option<PaperStatus>,
    /// Case-insensitive substrings; a paper matches if any one is in its title
    pub titles: Vec<String>,
    /// A paper matches if it carries any of these keywords
    pub keywords: Vec<String>,
    pub sort: PaperSort,
    pub order: SortOrder,
    /// 1-based
    pub page: u64,
    pub limit: u64,
}

impl Default for PaperQuery {
    fn default() -> Self {
        Self {
            author_id: None,
            reviewer_id: None,
            status: None,
            titles: Vec::new(),
            keywords: Vec::new(),
            sort: PaperSort::default(),
            order: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaperQuery {
    /// Clamp paging into range and drop blank search terms
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.titles = self
            .titles
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.keywords = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        Self {
            items,
            total,
            page,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query = PaperQuery::default();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.sort, PaperSort::SubmissionDate);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_query_normalization() {
        let query = PaperQuery {
            page: 0,
            limit: 10_000,
            titles: vec!["  ".into(), " graph ".into()],
            keywords: vec!["".into()],
            ..Default::default()
        }
        .normalized();

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.titles, vec!["graph"]);
        assert!(query.keywords.is_empty());
    }

    #[test]
    fn test_offset() {
        let query = PaperQuery { page: 3, limit: 5, ..Default::default() };
        assert_eq!(query.offset(), 10);
    }

    #[test]
    fn test_page_counts() {
        assert_eq!(Page::new(Vec::<u8>::new(), 0, 1, 5).total_pages, 0);
        assert_eq!(Page::new(vec![1u8], 11, 1, 5).total_pages, 3);
        assert_eq!(Page::new(vec![1u8], 10, 2, 5).total_pages, 2);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("lastUpdated".parse::<PaperSort>().unwrap(), PaperSort::LastUpdated);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("rating".parse::<PaperSort>().is_err());
    }
}
