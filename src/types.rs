use std::{fmt, ops::BitOr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Packages listing more owners than this are treated as bulk-owned and
/// always need a maintainer.
pub const TOO_MANY_OWNERS: usize = 50;

/// Overall CI outcome for the head commit of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiResult {
    Pass,
    Fail,
    Pending,
    Missing,
}

/// Risk classification of a pull request's diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DangerLevel {
    ScopedAndTested,
    ScopedAndUntested,
    ScopedAndConfiguration,
    MultiplePackagesEdited,
    Infrastructure,
}

/// Download-derived popularity of the packages a pull request touches.
///
/// Tiers the upstream pipeline produces but this crate does not know about
/// are kept as `Unrecognized` so the approval resolver can reject them
/// instead of the whole snapshot failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PopularityLevel {
    WellLikedByEveryone,
    Popular,
    Critical,
    Unrecognized(String),
}

/// Classification of a single changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Normal,
    Infrastructure,
}

impl CiResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            CiResult::Pass => "pass",
            CiResult::Fail => "fail",
            CiResult::Pending => "pending",
            CiResult::Missing => "missing",
        }
    }
}

impl fmt::Display for CiResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DangerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DangerLevel::ScopedAndTested => "ScopedAndTested",
            DangerLevel::ScopedAndUntested => "ScopedAndUntested",
            DangerLevel::ScopedAndConfiguration => "ScopedAndConfiguration",
            DangerLevel::MultiplePackagesEdited => "MultiplePackagesEdited",
            DangerLevel::Infrastructure => "Infrastructure",
        }
    }

    /// True for the levels that stay within a single package.
    pub fn is_scoped(&self) -> bool {
        matches!(
            self,
            DangerLevel::ScopedAndTested
                | DangerLevel::ScopedAndUntested
                | DangerLevel::ScopedAndConfiguration
        )
    }
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PopularityLevel {
    pub fn as_str(&self) -> &str {
        match self {
            PopularityLevel::WellLikedByEveryone => "Well-liked by everyone",
            PopularityLevel::Popular => "Popular",
            PopularityLevel::Critical => "Critical",
            PopularityLevel::Unrecognized(other) => other,
        }
    }
}

impl From<String> for PopularityLevel {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Well-liked by everyone" | "normal" | "Normal" => PopularityLevel::WellLikedByEveryone,
            "Popular" => PopularityLevel::Popular,
            "Critical" => PopularityLevel::Critical,
            _ => PopularityLevel::Unrecognized(value),
        }
    }
}

impl From<PopularityLevel> for String {
    fn from(value: PopularityLevel) -> Self {
        match value {
            PopularityLevel::Unrecognized(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PopularityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kinds of reviewer have approved the head commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalFlags(u8);

impl ApprovalFlags {
    pub const NONE: ApprovalFlags = ApprovalFlags(0);
    pub const OTHER: ApprovalFlags = ApprovalFlags(1);
    pub const OWNER: ApprovalFlags = ApprovalFlags(2);
    pub const MAINTAINER: ApprovalFlags = ApprovalFlags(4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every flag in `other` is set.
    pub const fn contains(self, other: ApprovalFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one flag in `other` is set.
    pub const fn intersects(self, other: ApprovalFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ApprovalFlags {
    type Output = ApprovalFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ApprovalFlags(self.0 | rhs.0)
    }
}

/// A changed file in the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub kind: FileKind,
    /// Why the file looks risky, when it does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspect: Option<String>,
}

/// An approval that was given against a commit older than the current head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleReview {
    pub reviewer: String,
    pub date: DateTime<Utc>,
    pub reviewed_abbr_oid: String,
}

/// Everything the bot knows about an open pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrInfo {
    pub pr_number: u64,
    pub author: String,
    pub owners: Vec<String>,
    pub author_is_owner: bool,
    pub packages: Vec<String>,
    pub new_packages: Vec<String>,
    pub files: Vec<FileInfo>,
    pub ci_result: CiResult,
    #[serde(default)]
    pub ci_url: Option<Url>,
    pub has_merge_conflict: bool,
    pub is_changes_requested: bool,
    pub approval_flags: ApprovalFlags,
    pub maintainer_blessed: bool,
    pub danger_level: DangerLevel,
    pub popularity_level: PopularityLevel,
    pub staleness_in_days: u32,
    pub last_push_date: DateTime<Utc>,
    pub merge_is_requested: bool,
    pub is_draft: bool,
    pub is_first_contribution: bool,
    pub head_commit_oid: String,
    pub head_commit_abbr_oid: String,
    pub review_link: Url,
    pub reviewers_with_stale_reviews: Vec<StaleReview>,
    pub now: DateTime<Utc>,
}

impl PrInfo {
    /// Owners other than the author, compared case-insensitively.
    pub fn other_owners(&self) -> Vec<&str> {
        self.owners
            .iter()
            .filter(|owner| !owner.eq_ignore_ascii_case(&self.author))
            .map(String::as_str)
            .collect()
    }

    pub fn has_no_other_owners(&self) -> bool {
        self.owners
            .iter()
            .all(|owner| owner.eq_ignore_ascii_case(&self.author))
    }

    pub fn has_too_many_owners(&self) -> bool {
        self.owners.len() > TOO_MANY_OWNERS
    }

    pub fn has_new_packages(&self) -> bool {
        !self.new_packages.is_empty()
    }

    pub fn is_new_package(&self, package: &str) -> bool {
        self.new_packages.iter().any(|p| p == package)
    }

    pub fn infrastructure_files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files
            .iter()
            .filter(|file| file.kind == FileKind::Infrastructure)
    }

    pub fn suspect_files(&self) -> impl Iterator<Item = (&FileInfo, &str)> {
        self.files
            .iter()
            .filter_map(|file| file.suspect.as_deref().map(|why| (file, why)))
    }
}

/// Input to the decision engine.
///
/// Besides a full snapshot, the upstream pipeline can report that there is
/// nothing package-related to triage, that the PR should leave the board, or
/// that it failed to gather the snapshot at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotInput {
    Info(PrInfo),
    NoPackages {
        pr_number: u64,
    },
    Remove {
        pr_number: u64,
        is_draft: bool,
    },
    Error {
        pr_number: u64,
        author: String,
        message: String,
    },
}

impl BotInput {
    pub fn pr_number(&self) -> u64 {
        match self {
            BotInput::Info(info) => info.pr_number,
            BotInput::NoPackages { pr_number }
            | BotInput::Remove { pr_number, .. }
            | BotInput::Error { pr_number, .. } => *pr_number,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BotInput::Info(_) => "info",
            BotInput::NoPackages { .. } => "no_packages",
            BotInput::Remove { .. } => "remove",
            BotInput::Error { .. } => "error",
        }
    }
}
