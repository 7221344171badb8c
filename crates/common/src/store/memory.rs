//! In-memory implementation of `PaperStore` and `UserDirectory`.
//!
//! All records are held in maps behind `RwLock`s and lost on restart. The
//! compare-and-swap in `update` runs under the write lock, so it has the same
//! semantics as the conditional `UPDATE` in the database repository.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, PaperQuery, PaperSort, PaperStore, SortOrder, UserDirectory};
use crate::auth::{Role, UserRecord};
use crate::domain::{NewPaper, Paper, Snapshot, WorkflowState};
use crate::errors::{AppError, Result};

pub struct InMemoryStore {
    papers: RwLock<HashMap<Uuid, Paper>>,
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            papers: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Register a user (upsert)
    pub async fn insert_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn paper_count(&self) -> usize {
        self.papers.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(paper: &Paper, query: &PaperQuery) -> bool {
    if query.author_id.is_some_and(|id| paper.author_id != id) {
        return false;
    }
    if query.reviewer_id.is_some() && paper.reviewer_id() != query.reviewer_id {
        return false;
    }
    if query.status.is_some_and(|s| paper.status() != s) {
        return false;
    }
    if !query.titles.is_empty() {
        let title = paper.content.title.to_lowercase();
        if !query.titles.iter().any(|t| title.contains(&t.to_lowercase())) {
            return false;
        }
    }
    if !query.keywords.is_empty()
        && !query.keywords.iter().any(|k| paper.content.keywords.contains(k))
    {
        return false;
    }
    true
}

fn compare(a: &Paper, b: &Paper, sort: PaperSort) -> Ordering {
    let primary = match sort {
        PaperSort::SubmissionDate => a.submitted_at.cmp(&b.submitted_at),
        PaperSort::LastUpdated => a.last_updated.cmp(&b.last_updated),
        PaperSort::Title => a.content.title.cmp(&b.content.title),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl PaperStore for InMemoryStore {
    async fn create(&self, new: NewPaper) -> Result<Paper> {
        let now = Utc::now();
        let paper = Paper {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            content: new.content,
            files: new.files,
            state: WorkflowState::Draft,
            version: 1,
            submitted_at: now,
            last_updated: now,
        };

        self.papers.write().await.insert(paper.id, paper.clone());
        Ok(paper)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Paper>> {
        Ok(self.papers.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, expected: &Snapshot, next: &Paper) -> Result<Paper> {
        let mut papers = self.papers.write().await;
        let stored = papers
            .get_mut(&id)
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })?;

        if !stored.matches(expected) {
            return Err(AppError::Conflict { id: id.to_string() });
        }

        stored.content = next.content.clone();
        stored.files = next.files.clone();
        stored.state = next.state.clone();
        stored.version = expected.version + 1;
        stored.last_updated = Utc::now();

        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.papers.write().await.remove(&id).is_some())
    }

    async fn list(&self, query: &PaperQuery) -> Result<Page<Paper>> {
        let papers = self.papers.read().await;

        let mut matched: Vec<&Paper> = papers.values().filter(|p| matches_query(p, query)).collect();
        matched.sort_by(|a, b| {
            let ord = compare(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, total, query.page, query.limit))
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>> {
        let users = self.users.read().await;
        let mut found: Vec<UserRecord> = users
            .values()
            .filter(|u| roles.contains(&u.role))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}
