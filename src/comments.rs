use serde::{Deserialize, Serialize};
use url::Url;

/// A comment to post or update, identified by its stable tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub tag: String,
    pub body: String,
}

impl Comment {
    pub fn new(tag: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            body: body.into(),
        }
    }
}

fn mentions<S: AsRef<str>>(users: &[S]) -> String {
    users
        .iter()
        .map(|user| format!("@{}", user.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The live status comment, rendered by [`crate::welcome`].
pub fn welcome(body: String) -> Comment {
    Comment::new("welcome", body)
}

pub fn had_error(user: &str, message: &str) -> Comment {
    Comment::new(
        "had-error",
        format!(
            "@{user} I had an error gathering information about this PR, so I can't help with it \
             right now. A maintainer will need to take a look.\n\n```\n{message}\n```"
        ),
    )
}

pub fn ping_reviewers<S: AsRef<str>>(owners: &[S], review_link: &Url) -> Comment {
    Comment::new(
        "pingreviewers",
        format!(
            "🔔 {} — please [review this PR]({review_link}) in the next few days. Be sure to \
             explicitly select **`Approve`** or **`Request Changes`** in the GitHub UI so I know \
             what's going on.",
            mentions(owners)
        ),
    )
}

pub fn ping_reviewers_other(user: &str, review_link: &Url) -> Comment {
    Comment::new(
        "pingreviewers-other",
        format!(
            "🔔 @{user} — you're the only owner, but it would still be good if you find someone \
             to [review this PR]({review_link}) in the next few days, otherwise a maintainer will \
             look at it. (And if you do find someone, maybe even recruit them to be a second \
             owner to make future changes easier 😉)"
        ),
    )
}

/// How many owners are named in the digest before it is cut short.
pub const TOO_MANY_OWNERS_DIGEST: usize = 5;

/// Packages with bulk-listed owners get a digest instead of a mass ping.
pub fn ping_reviewers_too_many<S: AsRef<str>>(owners: &[S]) -> Comment {
    let named = owners
        .iter()
        .take(TOO_MANY_OWNERS_DIGEST)
        .map(|owner| format!("`{}`", owner.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let rest = owners.len().saturating_sub(TOO_MANY_OWNERS_DIGEST);
    let and_more = if rest > 0 {
        format!(" and {rest} more")
    } else {
        String::new()
    };

    Comment::new(
        "pingreviewers-too-many",
        format!(
            "⚠️ There are too many reviewers for this PR change ({}: {named}{and_more}). Please \
             discuss with the DT maintainers whether the owner list should be trimmed, and ask \
             for a review from one of them in the meantime.",
            owners.len()
        ),
    )
}

pub fn merge_conflicted(abbr_oid: &str, user: &str) -> Comment {
    Comment::new(
        format!("merge-conflict-{abbr_oid}"),
        format!(
            "@{user} Unfortunately, this pull request currently has a merge conflict 😥. Please \
             update your PR branch to be up-to-date with respect to master. Have a nice day!"
        ),
    )
}

pub fn ci_failed(abbr_oid: &str, user: &str, ci_url: Option<&Url>) -> Comment {
    let logs = match ci_url {
        Some(url) => format!("Please [review the logs for more information]({url})."),
        None => "Please review the logs for more information.".to_string(),
    };
    Comment::new(
        format!("gh-actions-complaint-{abbr_oid}"),
        format!(
            "@{user} The CI build failed! {logs}\n\nOnce you've pushed the fixes, the build will \
             automatically re-run. Thanks!"
        ),
    )
}

pub fn changes_requested(abbr_oid: &str, user: &str) -> Comment {
    Comment::new(
        format!("reviewer-complaint-{abbr_oid}"),
        format!(
            "@{user} One or more reviewers has requested changes. Please address their comments. \
             I'll be back once they sign off or you've pushed new commits. Thank you!"
        ),
    )
}

pub fn nearly_abandoned(user: &str) -> Comment {
    Comment::new(
        "abandon-sorry",
        format!(
            "@{user} I haven't seen any activity on this PR in more than three weeks, and it \
             still has problems that prevent it from being merged. The PR will be closed in a \
             week if the issues aren't addressed."
        ),
    )
}

pub fn sorry_abandoned(user: &str) -> Comment {
    Comment::new(
        "close-abandoned",
        format!(
            "@{user} To keep things tidy, we have to close PRs that aren't mergeable and don't \
             have activity in the last month. No worries, though — please open a new PR if you'd \
             like to continue with this change. Thank you!"
        ),
    )
}

pub fn ask_for_auto_merge_permission<S: AsRef<str>>(user: &str, other_owners: &[S]) -> Comment {
    let owners_note = if other_owners.is_empty() {
        String::new()
    } else {
        format!(
            "\n\n({}: you can do this too.)",
            other_owners
                .iter()
                .map(|owner| format!("@{}", owner.as_ref()))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    Comment::new(
        "merge-offer",
        format!(
            "@{user} Everything looks good here. Great job! I am ready to merge this PR on your \
             behalf.\n\nIf you'd like that to happen, please post a comment saying:\n\n> Ready to \
             merge\n\nand I'll merge this PR almost instantly. Thanks for helping out! ❤️\
             {owners_note}"
        ),
    )
}

pub fn ping_stale_reviewer<S: AsRef<str>>(reviewed_abbr_oid: &str, reviewers: &[S]) -> Comment {
    Comment::new(
        format!("stale-ping-{reviewed_abbr_oid}"),
        format!(
            "{} Thank you for reviewing this PR! The author has pushed new commits since your \
             last review. Could you take another look and submit a fresh review?",
            mentions(reviewers)
        ),
    )
}
