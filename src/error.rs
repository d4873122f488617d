use crate::staleness::Staleness;

/// Contract violations detected while computing a plan.
///
/// These never describe a problem with the pull request itself: they mean
/// the snapshot or the engine broke an assumption, and the PR must not be
/// routed on a guess.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown popularity level '{0}'")]
    UnknownPopularityLevel(String),

    #[error("unexpected staleness {0:?} for a PR that needs author attention")]
    UnexpectedStaleness(Staleness),
}
