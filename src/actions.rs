use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    approval::{self, Approval, ApproverKind},
    comments::{self, Comment},
    error::EngineError,
    staleness::Staleness,
    types::{ApprovalFlags, BotInput, CiResult, DangerLevel, PopularityLevel, PrInfo},
    welcome::{self, NarrativeContext},
};

/// Label and column updates wait this long after the last push, because CI
/// reports back slower than the bot and the labels would otherwise flap.
pub const LABEL_DEBOUNCE_SECS: i64 = 60;

/// Project board columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "Needs Maintainer Action")]
    NeedsMaintainerAction,
    #[serde(rename = "Needs Maintainer Review")]
    NeedsMaintainerReview,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Waiting for Author to Merge")]
    WaitingForAuthorToMerge,
    #[serde(rename = "Needs Author Action")]
    NeedsAuthorAction,
    #[serde(rename = "Recently Merged")]
    RecentlyMerged,
    #[serde(rename = "Waiting for Code Reviews")]
    WaitingForCodeReviews,
}

/// Labels managed by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Mergebot Error")]
    MergebotError,
    #[serde(rename = "Has Merge Conflict")]
    HasMergeConflict,
    #[serde(rename = "The CI failed")]
    CiFailed,
    #[serde(rename = "Revision needed")]
    RevisionNeeded,
    #[serde(rename = "New Definition")]
    NewDefinition,
    #[serde(rename = "Where is GH Actions?")]
    WhereIsGhActions,
    #[serde(rename = "Owner Approved")]
    OwnerApproved,
    #[serde(rename = "Other Approved")]
    OtherApproved,
    #[serde(rename = "Maintainer Approved")]
    MaintainerApproved,
    #[serde(rename = "Merge:Auto")]
    MergeAuto,
    /// Reserved; never set.
    #[serde(rename = "Merge:LGTM")]
    MergeLgtm,
    #[serde(rename = "Merge:YSYL")]
    MergeYsyl,
    #[serde(rename = "Popular package")]
    PopularPackage,
    #[serde(rename = "Critical package")]
    CriticalPackage,
    #[serde(rename = "Edits Infrastructure")]
    EditsInfrastructure,
    #[serde(rename = "Edits multiple packages")]
    EditsMultiplePackages,
    #[serde(rename = "Author is Owner")]
    AuthorIsOwner,
    #[serde(rename = "No Other Owners")]
    NoOtherOwners,
    #[serde(rename = "Too Many Owners")]
    TooManyOwners,
    #[serde(rename = "Untested Change")]
    UntestedChange,
    #[serde(rename = "Config Edit")]
    ConfigEdit,
    #[serde(rename = "Abandoned")]
    Abandoned,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::NeedsMaintainerAction,
        Column::NeedsMaintainerReview,
        Column::Other,
        Column::WaitingForAuthorToMerge,
        Column::NeedsAuthorAction,
        Column::RecentlyMerged,
        Column::WaitingForCodeReviews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::NeedsMaintainerAction => "Needs Maintainer Action",
            Column::NeedsMaintainerReview => "Needs Maintainer Review",
            Column::Other => "Other",
            Column::WaitingForAuthorToMerge => "Waiting for Author to Merge",
            Column::NeedsAuthorAction => "Needs Author Action",
            Column::RecentlyMerged => "Recently Merged",
            Column::WaitingForCodeReviews => "Waiting for Code Reviews",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|column| column.as_str() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Label {
    pub const ALL: [Label; 22] = [
        Label::MergebotError,
        Label::HasMergeConflict,
        Label::CiFailed,
        Label::RevisionNeeded,
        Label::NewDefinition,
        Label::WhereIsGhActions,
        Label::OwnerApproved,
        Label::OtherApproved,
        Label::MaintainerApproved,
        Label::MergeAuto,
        Label::MergeLgtm,
        Label::MergeYsyl,
        Label::PopularPackage,
        Label::CriticalPackage,
        Label::EditsInfrastructure,
        Label::EditsMultiplePackages,
        Label::AuthorIsOwner,
        Label::NoOtherOwners,
        Label::TooManyOwners,
        Label::UntestedChange,
        Label::ConfigEdit,
        Label::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::MergebotError => "Mergebot Error",
            Label::HasMergeConflict => "Has Merge Conflict",
            Label::CiFailed => "The CI failed",
            Label::RevisionNeeded => "Revision needed",
            Label::NewDefinition => "New Definition",
            Label::WhereIsGhActions => "Where is GH Actions?",
            Label::OwnerApproved => "Owner Approved",
            Label::OtherApproved => "Other Approved",
            Label::MaintainerApproved => "Maintainer Approved",
            Label::MergeAuto => "Merge:Auto",
            Label::MergeLgtm => "Merge:LGTM",
            Label::MergeYsyl => "Merge:YSYL",
            Label::PopularPackage => "Popular package",
            Label::CriticalPackage => "Critical package",
            Label::EditsInfrastructure => "Edits Infrastructure",
            Label::EditsMultiplePackages => "Edits multiple packages",
            Label::AuthorIsOwner => "Author is Owner",
            Label::NoOtherOwners => "No Other Owners",
            Label::TooManyOwners => "Too Many Owners",
            Label::UntestedChange => "Untested Change",
            Label::ConfigEdit => "Config Edit",
            Label::Abandoned => "Abandoned",
        }
    }

    pub fn from_name(name: &str) -> Option<Label> {
        Label::ALL.into_iter().find(|label| label.as_str() == name)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the bot should do with one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub pr_number: u64,
    pub target_column: Option<Column>,
    pub labels: BTreeMap<Label, bool>,
    pub comments: Vec<Comment>,
    pub should_close: bool,
    pub should_merge: bool,
    pub should_update_labels: bool,
    pub should_update_project_column: bool,
    pub should_remove_from_active_columns: bool,
    pub is_ready_for_auto_merge: bool,
}

impl ActionPlan {
    /// A plan that manages every label, with all of them off.
    pub fn with_all_labels(pr_number: u64) -> Self {
        Self {
            pr_number,
            target_column: Some(Column::Other),
            labels: Label::ALL.into_iter().map(|label| (label, false)).collect(),
            comments: Vec::new(),
            should_close: false,
            should_merge: false,
            should_update_labels: true,
            should_update_project_column: true,
            should_remove_from_active_columns: false,
            is_ready_for_auto_merge: false,
        }
    }

    /// A plan that touches nothing.
    pub fn empty(pr_number: u64) -> Self {
        Self {
            pr_number,
            target_column: None,
            labels: BTreeMap::new(),
            comments: Vec::new(),
            should_close: false,
            should_merge: false,
            should_update_labels: false,
            should_update_project_column: false,
            should_remove_from_active_columns: false,
            is_ready_for_auto_merge: false,
        }
    }

    pub fn label(&self, label: Label) -> bool {
        self.labels.get(&label).copied().unwrap_or(false)
    }

    /// Labels the plan wants present.
    pub fn active_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.labels
            .iter()
            .filter(|(_, on)| **on)
            .map(|(label, _)| *label)
    }

    pub fn comment(&self, tag: &str) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.tag == tag)
    }

    fn set(&mut self, label: Label, on: bool) {
        self.labels.insert(label, on);
    }
}

/// Computes the plan for one snapshot.
///
/// Fails only when the snapshot or the engine breaks an invariant; such a
/// PR must not be routed at all.
pub fn compute_actions(input: &BotInput) -> Result<ActionPlan, EngineError> {
    match input {
        BotInput::Remove {
            pr_number,
            is_draft,
        } => {
            let mut plan = ActionPlan::empty(*pr_number);
            if *is_draft {
                plan.target_column = Some(Column::NeedsAuthorAction);
                plan.should_update_project_column = true;
            } else {
                plan.should_remove_from_active_columns = true;
            }
            Ok(plan)
        }
        BotInput::NoPackages { pr_number } => {
            let mut plan = ActionPlan::empty(*pr_number);
            plan.target_column = Some(Column::NeedsMaintainerAction);
            plan.should_update_project_column = true;
            plan.set(Label::EditsInfrastructure, true);
            plan.should_update_labels = true;
            Ok(plan)
        }
        BotInput::Error {
            pr_number,
            author,
            message,
        } => {
            let mut plan = ActionPlan::with_all_labels(*pr_number);
            plan.set(Label::MergebotError, true);
            plan.comments.push(comments::had_error(author, message));
            Ok(plan)
        }
        BotInput::Info(info) => compute_for_info(info),
    }
}

fn compute_for_info(info: &PrInfo) -> Result<ActionPlan, EngineError> {
    let mut plan = ActionPlan::with_all_labels(info.pr_number);

    let approval = approval::resolve(info)?;
    let failed_ci = info.ci_result == CiResult::Fail;
    let needs_author_attention =
        failed_ci || info.has_merge_conflict || info.is_changes_requested;
    let can_be_merged =
        info.ci_result == CiResult::Pass && !info.has_merge_conflict && approval.approved;
    let staleness = Staleness::classify(info.staleness_in_days, can_be_merged);
    let no_other_owners = info.has_no_other_owners();
    let too_many_owners = info.has_too_many_owners();
    let flags = info.approval_flags;

    plan.set(Label::HasMergeConflict, info.has_merge_conflict);
    plan.set(Label::CiFailed, failed_ci);
    plan.set(Label::RevisionNeeded, info.is_changes_requested);
    plan.set(
        Label::CriticalPackage,
        info.popularity_level == PopularityLevel::Critical,
    );
    plan.set(
        Label::PopularPackage,
        info.popularity_level == PopularityLevel::Popular,
    );
    plan.set(Label::OtherApproved, flags.contains(ApprovalFlags::OTHER));
    plan.set(Label::OwnerApproved, flags.contains(ApprovalFlags::OWNER));
    plan.set(
        Label::MaintainerApproved,
        flags.contains(ApprovalFlags::MAINTAINER),
    );
    plan.set(Label::NewDefinition, info.has_new_packages());
    plan.set(
        Label::EditsInfrastructure,
        info.danger_level == DangerLevel::Infrastructure,
    );
    plan.set(
        Label::EditsMultiplePackages,
        info.danger_level == DangerLevel::MultiplePackagesEdited,
    );
    plan.set(Label::AuthorIsOwner, info.author_is_owner);
    plan.set(
        Label::NoOtherOwners,
        !info.has_new_packages() && no_other_owners,
    );
    plan.set(Label::TooManyOwners, too_many_owners);
    plan.set(Label::MergeAuto, can_be_merged);
    plan.is_ready_for_auto_merge = can_be_merged;
    plan.set(
        Label::ConfigEdit,
        !info.has_new_packages() && info.danger_level == DangerLevel::ScopedAndConfiguration,
    );
    plan.set(
        Label::UntestedChange,
        info.danger_level == DangerLevel::ScopedAndUntested,
    );
    plan.set(Label::MergeYsyl, staleness == Staleness::YSYL);
    plan.set(Label::Abandoned, staleness == Staleness::Abandoned);

    let narrative = NarrativeContext {
        info,
        approval,
        staleness,
        can_be_merged,
    };
    plan.comments.push(comments::welcome(welcome::render(&narrative)));

    if !info.is_changes_requested
        && !flags.intersects(ApprovalFlags::OWNER | ApprovalFlags::MAINTAINER)
    {
        if no_other_owners {
            if info.popularity_level != PopularityLevel::Critical {
                plan.comments.push(comments::ping_reviewers_other(
                    &info.author,
                    &info.review_link,
                ));
            }
        } else if too_many_owners {
            plan.comments
                .push(comments::ping_reviewers_too_many(&info.other_owners()));
        } else {
            plan.comments.push(comments::ping_reviewers(
                &info.other_owners(),
                &info.review_link,
            ));
        }
    }

    plan.target_column = Some(Column::Other);

    if needs_author_attention {
        plan.target_column = Some(Column::NeedsAuthorAction);

        let oid = &info.head_commit_abbr_oid;
        if info.has_merge_conflict {
            plan.comments
                .push(comments::merge_conflicted(oid, &info.author));
        }
        if failed_ci {
            plan.comments
                .push(comments::ci_failed(oid, &info.author, info.ci_url.as_ref()));
        }
        if info.is_changes_requested {
            plan.comments
                .push(comments::changes_requested(oid, &info.author));
        }

        match staleness {
            Staleness::NearlyYSYL | Staleness::YSYL => {
                return Err(EngineError::UnexpectedStaleness(staleness));
            }
            Staleness::NearlyAbandoned => {
                plan.comments.push(comments::nearly_abandoned(&info.author));
            }
            Staleness::Abandoned => {
                plan.comments.push(comments::sorry_abandoned(&info.author));
                plan.should_close = true;
                plan.should_remove_from_active_columns = true;
            }
            Staleness::Fresh | Staleness::PayAttention => {}
        }
    } else if matches!(staleness, Staleness::YSYL | Staleness::Abandoned) {
        // Abandoned here means nothing is broken but nobody reviewed it.
        plan.target_column = Some(Column::NeedsMaintainerAction);
    } else {
        match info.ci_result {
            CiResult::Pending => {
                plan.target_column = Some(Column::WaitingForCodeReviews);
            }
            CiResult::Missing => {
                plan.set(Label::WhereIsGhActions, true);
            }
            CiResult::Pass => {
                if !can_be_merged {
                    plan.target_column = Some(review_column_with_least_access(&approval));
                } else if info.merge_is_requested {
                    plan.should_merge = true;
                    plan.target_column = Some(Column::RecentlyMerged);
                } else {
                    let owners = if too_many_owners || !info.danger_level.is_scoped() {
                        Vec::new()
                    } else {
                        info.other_owners()
                    };
                    plan.comments
                        .push(comments::ask_for_auto_merge_permission(&info.author, &owners));
                    plan.target_column = Some(Column::WaitingForAuthorToMerge);
                }

                if let Some(ping) = stale_review_ping(info) {
                    plan.comments.push(ping);
                }
            }
            // Failed CI always needs author attention.
            CiResult::Fail => {}
        }
    }

    let debounced =
        info.now - info.last_push_date >= chrono::Duration::seconds(LABEL_DEBOUNCE_SECS);
    plan.should_update_labels = debounced;
    plan.should_update_project_column = debounced;

    debug!(
        pr = info.pr_number,
        approver_kind = %approval.approver_kind,
        approved = approval.approved,
        ?staleness,
        column = ?plan.target_column,
        merge = plan.should_merge,
        close = plan.should_close,
        "computed actions"
    );

    Ok(plan)
}

/// Lets owners and the community review first, falling back to the
/// maintainer queues only when nobody else may approve.
fn review_column_with_least_access(approval: &Approval) -> Column {
    if approval.approver_kind != ApproverKind::Maintainers {
        Column::WaitingForCodeReviews
    } else if approval.blessable {
        Column::NeedsMaintainerReview
    } else {
        Column::NeedsMaintainerAction
    }
}

/// One ping for every reviewer whose approval predates the head commit,
/// pointing at the commit of the most recent stale review.
fn stale_review_ping(info: &PrInfo) -> Option<Comment> {
    let latest = info
        .reviewers_with_stale_reviews
        .iter()
        .max_by_key(|review| review.date)?;

    let mut reviewers: Vec<&str> = Vec::new();
    for review in &info.reviewers_with_stale_reviews {
        if !reviewers.contains(&review.reviewer.as_str()) {
            reviewers.push(&review.reviewer);
        }
    }

    Some(comments::ping_stale_reviewer(
        &latest.reviewed_abbr_oid,
        &reviewers,
    ))
}
