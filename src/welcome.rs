use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;

use crate::{
    approval::{Approval, ApproverKind},
    staleness::Staleness,
    types::{CiResult, DangerLevel, PopularityLevel, PrInfo},
};

const REPO_URL: &str = "https://github.com/DefinitelyTyped/DefinitelyTyped";
const TESTING_EDITED_PACKAGES_URL: &str =
    "https://github.com/DefinitelyTyped/DefinitelyTyped#editing-tests-on-an-existing-package";
const TESTING_NEW_PACKAGES_URL: &str = "https://github.com/DefinitelyTyped/DefinitelyTyped#testing";

/// Placeholder written over `now` in the diagnostic dump.
pub const SCRUBBED_NOW: &str = "-";

/// Inputs shared by every section.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeContext<'a> {
    pub info: &'a PrInfo,
    pub approval: Approval,
    pub staleness: Staleness,
    pub can_be_merged: bool,
}

/// A section producer.
pub type Section = fn(&NarrativeContext<'_>) -> Option<String>;

/// Sections in the order they appear in the comment.
pub const SECTIONS: &[Section] = &[
    greeting,
    package_list,
    code_reviews,
    risk_warning,
    status_checklist,
    call_to_action,
    inactive_footer,
    diagnostics,
];

/// Renders the full status comment body.
pub fn render(ctx: &NarrativeContext<'_>) -> String {
    let body = SECTIONS
        .iter()
        .filter_map(|section| section(ctx))
        .collect::<Vec<_>>()
        .join("\n\n");
    body.trim_end().to_string()
}

/// Who the author should expect a review from, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerAdvisory {
    NewPackage,
    CriticalUnblessed,
    ScopedAndTested,
    NoOtherOwnersUnblessed,
    MultiplePackagesUnblessed,
    ConfigEditUnblessed,
    DefaultUnblessed,
    Blessed,
}

impl ReviewerAdvisory {
    pub fn for_info(info: &PrInfo) -> Self {
        let blessed = info.maintainer_blessed;
        if info.has_new_packages() {
            ReviewerAdvisory::NewPackage
        } else if info.popularity_level == PopularityLevel::Critical && !blessed {
            ReviewerAdvisory::CriticalUnblessed
        } else if info.danger_level == DangerLevel::ScopedAndTested {
            ReviewerAdvisory::ScopedAndTested
        } else if info.has_no_other_owners() && !blessed {
            ReviewerAdvisory::NoOtherOwnersUnblessed
        } else if info.danger_level == DangerLevel::MultiplePackagesEdited && !blessed {
            ReviewerAdvisory::MultiplePackagesUnblessed
        } else if info.danger_level == DangerLevel::ScopedAndConfiguration && !blessed {
            ReviewerAdvisory::ConfigEditUnblessed
        } else if !blessed {
            ReviewerAdvisory::DefaultUnblessed
        } else {
            ReviewerAdvisory::Blessed
        }
    }
}

/// Which rule the approval checklist item is explained by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalRequirement {
    NewPackages,
    Infrastructure,
    MultiplePackages,
    ApprovedByRequired,
    NoOtherReviewers,
    ConfigEdit,
    WithoutTests,
}

impl ApprovalRequirement {
    pub fn for_info(info: &PrInfo) -> Self {
        if info.has_new_packages() {
            ApprovalRequirement::NewPackages
        } else if info.danger_level == DangerLevel::Infrastructure {
            ApprovalRequirement::Infrastructure
        } else if info.danger_level == DangerLevel::MultiplePackagesEdited {
            ApprovalRequirement::MultiplePackages
        } else if info.danger_level == DangerLevel::ScopedAndTested || info.maintainer_blessed {
            ApprovalRequirement::ApprovedByRequired
        } else if info.has_no_other_owners() {
            ApprovalRequirement::NoOtherReviewers
        } else if info.danger_level == DangerLevel::ScopedAndConfiguration {
            ApprovalRequirement::ConfigEdit
        } else {
            ApprovalRequirement::WithoutTests
        }
    }
}

fn required_approvers(kind: ApproverKind) -> &'static str {
    match kind {
        ApproverKind::Others => "type definition owners, DT maintainers or others",
        ApproverKind::Owners => "type definition owners or DT maintainers",
        ApproverKind::Maintainers => "DT maintainers",
    }
}

fn a_required_approver(kind: ApproverKind) -> &'static str {
    match kind {
        ApproverKind::Others => "someone",
        ApproverKind::Owners => "an owner or a DT maintainer",
        ApproverKind::Maintainers => "a DT maintainer",
    }
}

fn capitalized(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn check(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

fn tests_link(info: &PrInfo) -> &'static str {
    if info.has_new_packages() {
        TESTING_NEW_PACKAGES_URL
    } else {
        TESTING_EDITED_PACKAGES_URL
    }
}

/// Maps a DefinitelyTyped directory name to its npm package name, turning
/// `scope__name` into `@scope/name`.
pub fn npm_package_name(package: &str) -> Cow<'_, str> {
    static SCOPED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(.*?)__(.)").expect("Failed to compile scope pattern"));
    SCOPED.replace(package, "@${1}/${2}")
}

fn strip_types_prefix(path: &str) -> Cow<'_, str> {
    static TYPES_DIR: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^types/").expect("Failed to compile types pattern"));
    TYPES_DIR.replace(path, "")
}

pub fn greeting(ctx: &NarrativeContext<'_>) -> Option<String> {
    let special = if ctx.info.is_first_contribution {
        " I see this is your first time submitting to DefinitelyTyped 👋 — I'm the local bot who \
         will help you through the process of getting things through."
    } else {
        ""
    };
    Some(format!(
        "@{} Thank you for submitting this PR!{special}\n\n\
         ***This is a live comment which I will keep updated.***",
        ctx.info.author
    ))
}

pub fn package_list(ctx: &NarrativeContext<'_>) -> Option<String> {
    let info = ctx.info;
    if info.packages.is_empty() {
        return None;
    }

    let links = info
        .packages
        .iter()
        .map(|package| {
            let maybe_new = if info.is_new_package(package) {
                " (*new!*)"
            } else {
                ""
            };
            let name = npm_package_name(package);
            format!(
                "- `{package}`{maybe_new} [on npm](https://www.npmjs.com/package/{name}), \
                 [on unpkg](https://unpkg.com/browse/{name}@latest/)"
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let count = info.packages.len();
    let plural = if count > 1 { "s" } else { "" };
    Some(format!("## {count} package{plural} in this PR\n\n{links}"))
}

pub fn code_reviews(ctx: &NarrativeContext<'_>) -> Option<String> {
    let who = a_required_approver(ctx.approval.approver_kind);
    let advisory = match ReviewerAdvisory::for_info(ctx.info) {
        ReviewerAdvisory::NewPackage => format!(
            "This PR adds a new definition, so it needs to be reviewed by {who} before it can be \
             merged."
        ),
        ReviewerAdvisory::CriticalUnblessed => format!(
            "Because this is a widely-used package, {who} will need to review it before it can \
             be merged."
        ),
        ReviewerAdvisory::ScopedAndTested => String::from(
            "Because you edited one package and updated the tests (👏), I can help you merge \
             this PR once someone else signs off on it.",
        ),
        ReviewerAdvisory::NoOtherOwnersUnblessed => {
            format!("There aren't any other owners of this package, so {who} will review it.")
        }
        ReviewerAdvisory::MultiplePackagesUnblessed => format!(
            "Because this PR edits multiple packages, it can be merged once it's reviewed by \
             {who}."
        ),
        ReviewerAdvisory::ConfigEditUnblessed => format!(
            "Because this PR edits the configuration file, it can be merged once it's reviewed \
             by {who}."
        ),
        ReviewerAdvisory::DefaultUnblessed => {
            format!("This PR can be merged once it's reviewed by {who}.")
        }
        ReviewerAdvisory::Blessed => "This PR can be merged once it's reviewed.".to_string(),
    };
    Some(format!("## Code Reviews\n\n{advisory}"))
}

pub fn risk_warning(ctx: &NarrativeContext<'_>) -> Option<String> {
    match ctx.info.danger_level {
        DangerLevel::ScopedAndUntested => Some(format!(
            "This PR doesn't modify any tests, so it's hard to know what's being fixed, and your \
             changes might regress in the future. Have you considered [adding tests]({}) to \
             cover the change you're making? Including tests allows this PR to be merged by \
             yourself and the owners of this module. This can potentially save days of time for \
             you.",
            tests_link(ctx.info)
        )),
        DangerLevel::Infrastructure => Some(format!(
            "This PR touches some part of DefinitelyTyped infrastructure, so {} will need to \
             review it. This is rare — did you mean to do this?",
            a_required_approver(ctx.approval.approver_kind)
        )),
        DangerLevel::ScopedAndTested
        | DangerLevel::ScopedAndConfiguration
        | DangerLevel::MultiplePackagesEdited => None,
    }
}

fn approval_line(ctx: &NarrativeContext<'_>) -> String {
    let info = ctx.info;
    let kind = ctx.approval.approver_kind;
    let mark = check(ctx.approval.approved);
    let who = a_required_approver(kind);
    let who_cap = capitalized(who);

    match ApprovalRequirement::for_info(info) {
        ApprovalRequirement::NewPackages => format!(
            " * {mark} Only {who} can approve changes when there are new packages added"
        ),
        ApprovalRequirement::Infrastructure => {
            let links = info
                .infrastructure_files()
                .map(|file| {
                    format!(
                        "[`{path}`]({REPO_URL}/blob/{oid}/{path})",
                        path = file.path,
                        oid = info.head_commit_oid
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                " * {mark} {who_cap} needs to approve changes which affect DT infrastructure \
                 ({links})"
            )
        }
        ApprovalRequirement::MultiplePackages => format!(
            " * {mark} {who_cap} needs to approve changes which affect more than one package"
        ),
        ApprovalRequirement::ApprovedByRequired => format!(
            " * {mark} Most recent commit is approved by {}",
            required_approvers(kind)
        ),
        ApprovalRequirement::NoOtherReviewers => format!(
            " * {mark} {who_cap} can merge changes when there are no other reviewers"
        ),
        ApprovalRequirement::ConfigEdit => {
            let mut line = format!(
                " * {mark} {who_cap} needs to approve changes which affect module config files"
            );
            for (file, why) in info.suspect_files() {
                line.push_str(&format!("\n   - `{}`: {why}", strip_types_prefix(&file.path)));
            }
            line
        }
        ApprovalRequirement::WithoutTests => format!(
            " * {mark} Only {who} can approve changes [without tests]({})",
            tests_link(info)
        ),
    }
}

pub fn status_checklist(ctx: &NarrativeContext<'_>) -> Option<String> {
    let info = ctx.info;
    let expected = if info.ci_result == CiResult::Pending {
        "finished"
    } else {
        "passed"
    };
    Some(format!(
        "## Status\n\n * {} No merge conflicts\n * {} Continuous integration tests have {expected}\n{}",
        check(!info.has_merge_conflict),
        check(info.ci_result == CiResult::Pass),
        approval_line(ctx)
    ))
}

pub fn call_to_action(ctx: &NarrativeContext<'_>) -> Option<String> {
    let text = if ctx.can_be_merged {
        "All of the items on the list are green. **To merge, you need to post a comment \
         including the string \"Ready to merge\"** to bring in your changes."
    } else {
        "Once every item on this list is checked, I'll ask you for permission to merge and \
         publish the changes."
    };
    Some(text.to_string())
}

pub fn inactive_footer(ctx: &NarrativeContext<'_>) -> Option<String> {
    let suffix = match ctx.staleness {
        Staleness::Fresh => return None,
        Staleness::PayAttention => ".",
        Staleness::NearlyYSYL => {
            " — please merge or say something if there's a problem, otherwise it will move to \
             the DT maintainer queue soon!"
        }
        Staleness::YSYL => " — waiting for a DT maintainer!",
        Staleness::NearlyAbandoned => " — it is considered nearly abandoned!",
        Staleness::Abandoned => " — it is considered abandoned!",
    };
    Some(format!(
        "## Inactive\n\nThis PR has been inactive for {} days{suffix}",
        ctx.info.staleness_in_days
    ))
}

/// Pretty JSON of the snapshot with `now` scrubbed, so clock drift alone
/// never changes the comment.
pub fn diagnostic_json(info: &PrInfo) -> Option<String> {
    let mut value = serde_json::to_value(info).ok()?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("now".to_string(), SCRUBBED_NOW.into());
    }
    serde_json::to_string_pretty(&value).ok()
}

pub fn diagnostics(ctx: &NarrativeContext<'_>) -> Option<String> {
    let json = diagnostic_json(ctx.info)?;
    Some(format!(
        "----------------------\n\
         <details><summary>Diagnostic Information: What the bot saw about this PR</summary>\n\n\
         ```json\n{json}\n```\n\n</details>"
    ))
}
