//! Mergebot: deterministic triage for package pull requests.
//!
//! Given a snapshot of a pull request, decides which labels it should carry,
//! which review-board column it belongs in, which comments to post, and
//! whether it should be merged or closed. The decision engine is pure; the
//! [`source`] and [`executor`] seams handle reading snapshots and applying
//! plans.

pub mod actions;
pub mod approval;
pub mod cli;
pub mod comments;
pub mod error;
pub mod executor;
pub mod run;
pub mod source;
pub mod staleness;
pub mod types;
pub mod welcome;

pub use actions::{ActionPlan, Column, Label, compute_actions};
pub use approval::{Approval, ApproverKind};
pub use cli::{DisplayMode, parse_args};
pub use comments::Comment;
pub use error::EngineError;
pub use executor::{
    Executor, Mutation, PrState, RecordedMutation, RecordingExecutor, execute_plan,
    plan_mutations,
};
pub use run::{Evaluation, RunResult, RunSpec, evaluate};
pub use source::{FileSource, Location, SnapshotSource};
pub use staleness::Staleness;
pub use types::{
    ApprovalFlags, BotInput, CiResult, DangerLevel, FileInfo, FileKind, PopularityLevel, PrInfo,
    StaleReview,
};
