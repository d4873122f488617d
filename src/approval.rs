use std::fmt;

use serde::Serialize;

use crate::{
    error::EngineError,
    types::{ApprovalFlags, DangerLevel, PopularityLevel, PrInfo},
};

/// The least-privileged group whose approval is sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproverKind {
    Maintainers,
    Owners,
    Others,
}

impl ApproverKind {
    /// Approval flags that satisfy this requirement.
    pub fn accepted_flags(&self) -> ApprovalFlags {
        match self {
            ApproverKind::Others => {
                ApprovalFlags::MAINTAINER | ApprovalFlags::OWNER | ApprovalFlags::OTHER
            }
            ApproverKind::Owners => ApprovalFlags::MAINTAINER | ApprovalFlags::OWNER,
            ApproverKind::Maintainers => ApprovalFlags::MAINTAINER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverKind::Maintainers => "maintainers",
            ApproverKind::Owners => "owners",
            ApproverKind::Others => "others",
        }
    }
}

impl fmt::Display for ApproverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving the approval policy for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub approver_kind: ApproverKind,
    pub approved: bool,
    /// Whether a maintainer blessing is allowed to lower the requirement.
    pub blessable: bool,
}

/// A maintainer blessing never applies to new packages, infrastructure
/// edits, or packages whose only owner is the author.
pub fn is_blessable(info: &PrInfo) -> bool {
    !(info.has_new_packages()
        || info.danger_level == DangerLevel::Infrastructure
        || info.has_no_other_owners())
}

/// First stage: the requirement implied by risk and popularity alone.
pub fn base_approver_kind(info: &PrInfo) -> Result<ApproverKind, EngineError> {
    if info.danger_level != DangerLevel::ScopedAndTested || info.has_too_many_owners() {
        return Ok(ApproverKind::Maintainers);
    }

    match &info.popularity_level {
        PopularityLevel::WellLikedByEveryone => Ok(ApproverKind::Others),
        PopularityLevel::Popular => Ok(ApproverKind::Owners),
        PopularityLevel::Critical => Ok(ApproverKind::Maintainers),
        PopularityLevel::Unrecognized(level) => {
            Err(EngineError::UnknownPopularityLevel(level.clone()))
        }
    }
}

/// Second stage: a blessing relaxes a maintainer requirement to owners, and
/// an owner requirement with no other owners escalates to maintainers.
pub fn substitute(kind: ApproverKind, blessed: bool, no_other_owners: bool) -> ApproverKind {
    match kind {
        ApproverKind::Maintainers if blessed => ApproverKind::Owners,
        ApproverKind::Owners if no_other_owners => ApproverKind::Maintainers,
        other => other,
    }
}

/// Resolves the approval policy for a snapshot.
pub fn resolve(info: &PrInfo) -> Result<Approval, EngineError> {
    let blessable = is_blessable(info);
    let blessed = blessable && info.maintainer_blessed;

    let approver_kind = substitute(
        base_approver_kind(info)?,
        blessed,
        info.has_no_other_owners(),
    );
    let approved = info
        .approval_flags
        .intersects(approver_kind.accepted_flags());

    Ok(Approval {
        approver_kind,
        approved,
        blessable,
    })
}
