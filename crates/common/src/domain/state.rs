//! Paper workflow state machine
//!
//! A paper's lifecycle is stored as two wire fields, `status` and
//! `reviewerStatus`, but inside the service it is a single [`WorkflowState`]
//! so that combinations such as `PUBLISH` + `NOT_RESPONDED` cannot be built.
//! Transitions are pure: they take the current state and return the next one
//! or a [`TransitionError`]. Persistence and side effects live in `workflow`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

/// Paper status as persisted and exchanged on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperStatus {
    Upload,
    ReviewerAllocation,
    OnReview,
    Publish,
    Rejected,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Upload => "UPLOAD",
            PaperStatus::ReviewerAllocation => "REVIEWER_ALLOCATION",
            PaperStatus::OnReview => "ON_REVIEW",
            PaperStatus::Publish => "PUBLISH",
            PaperStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOAD" => Ok(PaperStatus::Upload),
            "REVIEWER_ALLOCATION" => Ok(PaperStatus::ReviewerAllocation),
            "ON_REVIEW" => Ok(PaperStatus::OnReview),
            "PUBLISH" => Ok(PaperStatus::Publish),
            "REJECTED" => Ok(PaperStatus::Rejected),
            other => Err(AppError::validation("status", format!("Invalid paper status: {}", other))),
        }
    }
}

/// Reviewer response as persisted and exchanged on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewerStatus {
    NotResponded,
    Accepted,
    Rejected,
}

impl ReviewerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerStatus::NotResponded => "NOT_RESPONDED",
            ReviewerStatus::Accepted => "ACCEPTED",
            ReviewerStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewerStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_RESPONDED" => Ok(ReviewerStatus::NotResponded),
            "ACCEPTED" => Ok(ReviewerStatus::Accepted),
            "REJECTED" => Ok(ReviewerStatus::Rejected),
            other => Err(AppError::validation(
                "reviewerStatus",
                format!("Invalid reviewer status: {}", other),
            )),
        }
    }
}

/// How the allocated reviewer has answered so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationResponse {
    NotResponded,
    Declined,
}

/// Reviewer answer to an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewerResponse {
    Accept,
    Decline,
}

/// Final editorial decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Publish,
    Rejected,
}

/// Lifecycle of a paper; each variant carries only what is valid in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// Submitted, no reviewer yet
    Draft,
    /// A reviewer is named and either has not answered or declined
    AwaitingReviewer {
        reviewer_id: Uuid,
        response: AllocationResponse,
    },
    /// Reviewer accepted; awaiting the decision
    UnderReview { reviewer_id: Uuid },
    Published { reviewer_id: Uuid },
    Rejected {
        reviewer_id: Uuid,
        remark: Option<String>,
        rejected_at: DateTime<Utc>,
    },
}

/// Wire projection of a [`WorkflowState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireState {
    pub status: PaperStatus,
    pub reviewer_status: Option<ReviewerStatus>,
    pub reviewer_id: Option<Uuid>,
    pub rejection_remark: Option<String>,
    pub rejection_date: Option<DateTime<Utc>>,
}

/// Why a transition was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The paper is not in the state the operation requires
    InvalidState { expected: String, actual: String },
    /// The caller is not the reviewer allocated to this paper
    NotAssignedReviewer,
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidState { expected, actual } => {
                AppError::InvalidState { expected, actual }
            }
            TransitionError::NotAssignedReviewer => {
                AppError::forbidden("Only the assigned reviewer may respond to this paper")
            }
        }
    }
}

impl WorkflowState {
    pub fn status(&self) -> PaperStatus {
        match self {
            WorkflowState::Draft => PaperStatus::Upload,
            WorkflowState::AwaitingReviewer { .. } => PaperStatus::ReviewerAllocation,
            WorkflowState::UnderReview { .. } => PaperStatus::OnReview,
            WorkflowState::Published { .. } => PaperStatus::Publish,
            WorkflowState::Rejected { .. } => PaperStatus::Rejected,
        }
    }

    pub fn reviewer_status(&self) -> Option<ReviewerStatus> {
        match self {
            WorkflowState::Draft => None,
            WorkflowState::AwaitingReviewer { response: AllocationResponse::NotResponded, .. } => {
                Some(ReviewerStatus::NotResponded)
            }
            WorkflowState::AwaitingReviewer { response: AllocationResponse::Declined, .. } => {
                Some(ReviewerStatus::Rejected)
            }
            WorkflowState::UnderReview { .. }
            | WorkflowState::Published { .. }
            | WorkflowState::Rejected { .. } => Some(ReviewerStatus::Accepted),
        }
    }

    pub fn reviewer_id(&self) -> Option<Uuid> {
        match self {
            WorkflowState::Draft => None,
            WorkflowState::AwaitingReviewer { reviewer_id, .. }
            | WorkflowState::UnderReview { reviewer_id }
            | WorkflowState::Published { reviewer_id }
            | WorkflowState::Rejected { reviewer_id, .. } => Some(*reviewer_id),
        }
    }

    /// PUBLISH and REJECTED accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Published { .. } | WorkflowState::Rejected { .. })
    }

    /// Human-readable label used in error messages
    pub fn describe(&self) -> String {
        match self.reviewer_status() {
            Some(rs) => format!("status {} with reviewerStatus {}", self.status(), rs),
            None => format!("status {}", self.status()),
        }
    }

    pub fn to_wire(&self) -> WireState {
        let (rejection_remark, rejection_date) = match self {
            WorkflowState::Rejected { remark, rejected_at, .. } => (remark.clone(), Some(*rejected_at)),
            _ => (None, None),
        };

        WireState {
            status: self.status(),
            reviewer_status: self.reviewer_status(),
            reviewer_id: self.reviewer_id(),
            rejection_remark,
            rejection_date,
        }
    }

    /// Rebuild the state from stored fields, rejecting impossible combinations
    pub fn from_wire(wire: WireState) -> Result<Self, AppError> {
        let inconsistent = |why: &str| AppError::DataIntegrity {
            message: format!(
                "{} (status {}, reviewerStatus {:?}, reviewerId {:?})",
                why, wire.status, wire.reviewer_status, wire.reviewer_id
            ),
        };

        match (wire.status, wire.reviewer_status, wire.reviewer_id) {
            (PaperStatus::Upload, None | Some(ReviewerStatus::NotResponded), None) => {
                Ok(WorkflowState::Draft)
            }
            (PaperStatus::Upload, _, _) => Err(inconsistent("reviewer set on an unallocated paper")),

            (PaperStatus::ReviewerAllocation, None | Some(ReviewerStatus::NotResponded), Some(reviewer_id)) => {
                Ok(WorkflowState::AwaitingReviewer {
                    reviewer_id,
                    response: AllocationResponse::NotResponded,
                })
            }
            (PaperStatus::ReviewerAllocation, Some(ReviewerStatus::Rejected), Some(reviewer_id)) => {
                Ok(WorkflowState::AwaitingReviewer {
                    reviewer_id,
                    response: AllocationResponse::Declined,
                })
            }
            (PaperStatus::ReviewerAllocation, _, _) => {
                Err(inconsistent("allocation without a reviewer"))
            }

            (PaperStatus::OnReview, Some(ReviewerStatus::Accepted), Some(reviewer_id)) => {
                Ok(WorkflowState::UnderReview { reviewer_id })
            }
            (PaperStatus::Publish, Some(ReviewerStatus::Accepted), Some(reviewer_id)) => {
                Ok(WorkflowState::Published { reviewer_id })
            }
            (PaperStatus::Rejected, Some(ReviewerStatus::Accepted), Some(reviewer_id)) => {
                Ok(WorkflowState::Rejected {
                    reviewer_id,
                    remark: wire.rejection_remark.clone(),
                    rejected_at: wire.rejection_date.ok_or_else(|| inconsistent("rejection without a date"))?,
                })
            }
            _ => Err(inconsistent("review state without an accepting reviewer")),
        }
    }

    /// Name (or rename) the reviewer; resets any previous response
    pub fn assign(&self, reviewer_id: Uuid) -> Result<WorkflowState, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::InvalidState {
                expected: "a non-terminal status".to_string(),
                actual: self.describe(),
            });
        }

        Ok(WorkflowState::AwaitingReviewer {
            reviewer_id,
            response: AllocationResponse::NotResponded,
        })
    }

    /// The allocated reviewer accepts or declines, exactly once
    pub fn respond(&self, caller: Uuid, response: ReviewerResponse) -> Result<WorkflowState, TransitionError> {
        if let Some(reviewer_id) = self.reviewer_id() {
            if reviewer_id != caller {
                return Err(TransitionError::NotAssignedReviewer);
            }
        }

        match self {
            WorkflowState::AwaitingReviewer {
                reviewer_id,
                response: AllocationResponse::NotResponded,
            } => Ok(match response {
                ReviewerResponse::Accept => WorkflowState::UnderReview { reviewer_id: *reviewer_id },
                ReviewerResponse::Decline => WorkflowState::AwaitingReviewer {
                    reviewer_id: *reviewer_id,
                    response: AllocationResponse::Declined,
                },
            }),
            other => Err(TransitionError::InvalidState {
                expected: "status REVIEWER_ALLOCATION with reviewerStatus NOT_RESPONDED".to_string(),
                actual: other.describe(),
            }),
        }
    }

    /// Terminal adjudication of a paper under review
    pub fn decide(
        &self,
        decision: Decision,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WorkflowState, TransitionError> {
        match self {
            WorkflowState::UnderReview { reviewer_id } => Ok(match decision {
                Decision::Publish => WorkflowState::Published { reviewer_id: *reviewer_id },
                Decision::Rejected => WorkflowState::Rejected {
                    reviewer_id: *reviewer_id,
                    remark,
                    rejected_at: now,
                },
            }),
            other => Err(TransitionError::InvalidState {
                expected: "status ON_REVIEW".to_string(),
                actual: other.describe(),
            }),
        }
    }
}
