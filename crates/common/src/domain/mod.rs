//! Domain model: papers, their workflow state and input rules

pub mod paper;
pub mod state;
pub mod validation;

pub use paper::{
    BlobRef, Contact, ContentPatch, FileUpload, NewPaper, Paper, PaperContent, PaperFiles, Snapshot,
};
pub use state::{
    AllocationResponse, Decision, PaperStatus, ReviewerResponse, ReviewerStatus, TransitionError,
    WireState, WorkflowState,
};
