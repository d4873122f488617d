use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    actions::{ActionPlan, compute_actions},
    executor::{PrState, RecordedMutation, RecordingExecutor, execute_plan},
    source::{Location, SnapshotSource},
    types::BotInput,
};

/// What to evaluate, as assembled from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    pub snapshots: Vec<Location>,
    /// Current PR state to diff against; an untouched PR when absent.
    pub state: Option<Location>,
    /// Also run the plans through the dry-run executor.
    pub mutations: bool,
}

impl RunSpec {
    pub fn has_mutations(&self) -> bool {
        self.mutations
    }
}

/// The plan computed for one snapshot.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub input: BotInput,
    pub plan: ActionPlan,
}

#[derive(Debug, Default)]
pub struct RunResult {
    pub evaluations: Vec<Evaluation>,
    pub mutations: Vec<RecordedMutation>,
}

/// Loads every snapshot, computes its plan and, when asked, records the
/// mutations a dry run would apply.
///
/// An engine invariant violation aborts the whole run: the offending PR is
/// named in the error and nothing is routed on a guess.
pub async fn evaluate<S>(spec: &RunSpec, source: &S) -> Result<RunResult>
where
    S: SnapshotSource + Sync,
{
    let mut evaluations = Vec::with_capacity(spec.snapshots.len());

    for location in &spec.snapshots {
        let input = source
            .snapshot(location)
            .await
            .with_context(|| format!("Failed to load snapshot {location}"))?;

        if let BotInput::Error { pr_number, message, .. } = &input {
            warn!(pr = pr_number, %message, "snapshot reports an upstream error");
        }

        let plan = compute_actions(&input)
            .with_context(|| format!("Cannot compute actions for PR {}", input.pr_number()))?;
        debug!(pr = plan.pr_number, kind = input.kind(), "evaluated {location}");

        evaluations.push(Evaluation { input, plan });
    }

    let mut mutations = Vec::new();
    if spec.has_mutations() {
        let state = match &spec.state {
            Some(location) => source
                .pr_state(location)
                .await
                .with_context(|| format!("Failed to load PR state {location}"))?,
            None => PrState::default(),
        };

        let executor = RecordingExecutor::new();
        for evaluation in &evaluations {
            execute_plan(&evaluation.plan, &state, &executor).await?;
        }
        mutations = executor.into_recorded();
    }

    Ok(RunResult {
        evaluations,
        mutations,
    })
}
