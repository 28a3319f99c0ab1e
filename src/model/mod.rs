//! Record model shared by the store and the analyzer
//!
//! Sessions exclusively own their activities. Everything here is plain data;
//! aggregates derived from these records live in [`crate::analytics`].

pub mod activity;
pub mod normalize;
pub mod session;

pub use activity::{Activity, ActivityStatus, AgentType, FileOperation, FileOperationType};
pub use normalize::{activity_from_value, session_from_value};
pub use session::Session;

use thiserror::Error;

/// Reasons a record is refused at the write boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("expected a JSON object for {0}")]
    NotAnObject(&'static str),

    #[error("completed tasks ({completed}) exceed total tasks ({total})")]
    TaskCountMismatch { completed: u32, total: u32 },

    #[error("{record} ends before it starts")]
    EndBeforeStart { record: String },

    #[error("duplicate task id within session: {0}")]
    DuplicateTask(String),
}
