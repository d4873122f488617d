use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    actions::{ActionPlan, Column, Label},
    comments::Comment,
};

const TAG_MARKER_START: &str = "<!--mergebot:";
const TAG_MARKER_END: &str = "-->";

/// A comment the bot posted earlier, as read back from the PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingComment {
    pub id: u64,
    pub body: String,
}

/// The parts of a pull request's current state that plans are diffed
/// against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrState {
    #[serde(default)]
    pub labels: Vec<String>,
    /// Comments authored by the bot.
    #[serde(default)]
    pub comments: Vec<ExistingComment>,
    #[serde(default)]
    pub column: Option<Column>,
}

impl PrState {
    pub fn has_label(&self, label: Label) -> bool {
        self.labels.iter().any(|name| name == label.as_str())
    }

    fn comment_tagged(&self, tag: &str) -> Option<&ExistingComment> {
        self.comments
            .iter()
            .find(|comment| comment_tag(&comment.body) == Some(tag))
    }
}

/// A single change to apply to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum Mutation {
    PostComment { tag: String, body: String },
    EditComment { id: u64, tag: String, body: String },
    AddLabels { labels: Vec<Label> },
    RemoveLabels { labels: Vec<Label> },
    MoveCard { column: Column },
    RemoveCard,
    Merge,
    Close,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::PostComment { .. } => "post-comment",
            Mutation::EditComment { .. } => "edit-comment",
            Mutation::AddLabels { .. } => "add-labels",
            Mutation::RemoveLabels { .. } => "remove-labels",
            Mutation::MoveCard { .. } => "move-card",
            Mutation::RemoveCard => "remove-card",
            Mutation::Merge => "merge",
            Mutation::Close => "close",
        }
    }
}

/// The body as posted: the comment text followed by a hidden marker
/// carrying its tag.
pub fn tagged_body(comment: &Comment) -> String {
    format!(
        "{}\n{TAG_MARKER_START}{}{TAG_MARKER_END}",
        comment.body, comment.tag
    )
}

/// Extracts the tag from a body produced by [`tagged_body`].
pub fn comment_tag(body: &str) -> Option<&str> {
    let start = body.rfind(TAG_MARKER_START)? + TAG_MARKER_START.len();
    let len = body[start..].find(TAG_MARKER_END)?;
    Some(&body[start..start + len])
}

/// Computes the mutations needed to bring `state` in line with `plan`.
///
/// Order is comments, labels, board, then merge and close.
pub fn plan_mutations(plan: &ActionPlan, state: &PrState) -> Vec<Mutation> {
    let mut mutations = Vec::new();

    for comment in &plan.comments {
        let body = tagged_body(comment);
        match state.comment_tagged(&comment.tag) {
            Some(existing) if existing.body == body => {}
            Some(existing) => mutations.push(Mutation::EditComment {
                id: existing.id,
                tag: comment.tag.clone(),
                body,
            }),
            None => mutations.push(Mutation::PostComment {
                tag: comment.tag.clone(),
                body,
            }),
        }
    }

    if plan.should_update_labels {
        let mut add = Vec::new();
        let mut remove = Vec::new();
        for (label, on) in &plan.labels {
            match (*on, state.has_label(*label)) {
                (true, false) => add.push(*label),
                (false, true) => remove.push(*label),
                _ => {}
            }
        }

        if !add.is_empty() {
            mutations.push(Mutation::AddLabels { labels: add });
        }
        if !remove.is_empty() {
            mutations.push(Mutation::RemoveLabels { labels: remove });
        }
    }

    if plan.should_remove_from_active_columns {
        if state.column.is_some() {
            mutations.push(Mutation::RemoveCard);
        }
    } else if plan.should_update_project_column
        && let Some(column) = plan.target_column
        && state.column != Some(column)
    {
        mutations.push(Mutation::MoveCard { column });
    }

    if plan.should_merge {
        mutations.push(Mutation::Merge);
    }
    if plan.should_close {
        mutations.push(Mutation::Close);
    }

    mutations
}

/// Applies mutations to a pull request.
#[async_trait]
pub trait Executor {
    async fn apply(&self, pr_number: u64, mutation: &Mutation) -> Result<()>;
}

/// A mutation together with the PR it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMutation {
    pub pr_number: u64,
    #[serde(flatten)]
    pub mutation: Mutation,
}

/// Dry-run executor: records what would have been done.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    recorded: Mutex<Vec<RecordedMutation>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_recorded(self) -> Vec<RecordedMutation> {
        self.recorded
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn apply(&self, pr_number: u64, mutation: &Mutation) -> Result<()> {
        let mut recorded = self
            .recorded
            .lock()
            .map_err(|_| anyhow::anyhow!("mutation log lock poisoned"))?;
        recorded.push(RecordedMutation {
            pr_number,
            mutation: mutation.clone(),
        });
        Ok(())
    }
}

/// Diffs `plan` against `state` and applies the result through `executor`,
/// returning the mutations that were applied.
pub async fn execute_plan<E>(
    plan: &ActionPlan,
    state: &PrState,
    executor: &E,
) -> Result<Vec<Mutation>>
where
    E: Executor + Sync,
{
    let mutations = plan_mutations(plan, state);
    for mutation in &mutations {
        debug!(pr = plan.pr_number, mutation = mutation.name(), "applying");
        executor
            .apply(plan.pr_number, mutation)
            .await
            .with_context(|| format!("Failed to {} on PR {}", mutation.name(), plan.pr_number))?;
    }
    Ok(mutations)
}
