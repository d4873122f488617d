use chrono::{DateTime, Duration, TimeZone, Utc};
use mergebot::{
    ApprovalFlags, ApproverKind, BotInput, CiResult, Column, DangerLevel, EngineError, FileInfo,
    FileKind, Label, Mutation, PopularityLevel, PrInfo, PrState, StaleReview, Staleness,
    approval, compute_actions,
    executor::{ExistingComment, tagged_body},
    plan_mutations,
};
use url::Url;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

/// A fresh, single-package PR by an owner, with CI green and no reviews yet.
fn base_info() -> PrInfo {
    PrInfo {
        pr_number: 1234,
        author: "alice".to_string(),
        owners: vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
        author_is_owner: true,
        packages: vec!["lodash".to_string()],
        new_packages: vec![],
        files: vec![FileInfo {
            path: "types/lodash/index.d.ts".to_string(),
            kind: FileKind::Normal,
            suspect: None,
        }],
        ci_result: CiResult::Pass,
        ci_url: None,
        has_merge_conflict: false,
        is_changes_requested: false,
        approval_flags: ApprovalFlags::NONE,
        maintainer_blessed: false,
        danger_level: DangerLevel::ScopedAndTested,
        popularity_level: PopularityLevel::WellLikedByEveryone,
        staleness_in_days: 0,
        last_push_date: now() - Duration::hours(2),
        merge_is_requested: false,
        is_draft: false,
        is_first_contribution: false,
        head_commit_oid: "abc1234def5678abc1234def5678abc1234def56".to_string(),
        head_commit_abbr_oid: "abc1234".to_string(),
        review_link: Url::parse("https://github.com/DefinitelyTyped/DefinitelyTyped/pull/1234/files")
            .unwrap(),
        reviewers_with_stale_reviews: vec![],
        now: now(),
    }
}

fn plan_for(info: PrInfo) -> mergebot::ActionPlan {
    compute_actions(&BotInput::Info(info)).unwrap()
}

fn comment_tags(plan: &mergebot::ActionPlan) -> Vec<&str> {
    plan.comments.iter().map(|c| c.tag.as_str()).collect()
}

#[test]
fn test_scenario_a_requested_merge_goes_through() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::MAINTAINER;
    info.merge_is_requested = true;

    let plan = plan_for(info);

    assert!(plan.should_merge);
    assert!(plan.is_ready_for_auto_merge);
    assert_eq!(plan.target_column, Some(Column::RecentlyMerged));
    assert!(plan.label(Label::MergeAuto));
    assert!(plan.label(Label::MaintainerApproved));
    assert!(!plan.should_close);
    assert_eq!(comment_tags(&plan), vec!["welcome"]);
}

#[test]
fn test_scenario_b_failed_ci_needs_author() {
    let mut info = base_info();
    info.ci_result = CiResult::Fail;
    info.ci_url = Some(Url::parse("https://github.com/DefinitelyTyped/DefinitelyTyped/actions/runs/1").unwrap());

    let plan = plan_for(info);

    assert_eq!(plan.target_column, Some(Column::NeedsAuthorAction));
    assert!(plan.label(Label::CiFailed));
    assert!(!plan.should_merge);
    let complaint = plan.comment("gh-actions-complaint-abc1234").unwrap();
    assert!(complaint.body.starts_with("@alice The CI build failed!"));
    assert!(complaint.body.contains("actions/runs/1"));
}

#[test]
fn test_scenario_c_infrastructure_is_never_blessable() {
    let mut info = base_info();
    info.danger_level = DangerLevel::Infrastructure;
    info.maintainer_blessed = true;

    for level in [
        PopularityLevel::WellLikedByEveryone,
        PopularityLevel::Popular,
        PopularityLevel::Critical,
    ] {
        info.popularity_level = level;
        let resolved = approval::resolve(&info).unwrap();
        assert_eq!(resolved.approver_kind, ApproverKind::Maintainers);
        assert!(!resolved.blessable);
    }
}

#[test]
fn test_scenario_d_too_many_owners_needs_maintainer() {
    let mut info = base_info();
    info.popularity_level = PopularityLevel::Popular;
    info.owners = std::iter::once("alice".to_string())
        .chain((1..60).map(|i| format!("owner{i}")))
        .collect();

    let resolved = approval::resolve(&info).unwrap();
    assert_eq!(resolved.approver_kind, ApproverKind::Maintainers);

    let plan = plan_for(info);
    assert!(plan.label(Label::TooManyOwners));
    assert!(plan.label(Label::PopularPackage));
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerReview));

    let ping = plan.comment("pingreviewers-too-many").unwrap();
    assert!(ping.body.contains("(59: "));
    assert!(plan.comment("pingreviewers").is_none());
}

#[test]
fn test_scenario_e_ysyl_with_author_attention_is_an_error() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::MAINTAINER;
    info.is_changes_requested = true;
    info.staleness_in_days = 9;

    let err = compute_actions(&BotInput::Info(info.clone())).unwrap_err();
    assert_eq!(err, EngineError::UnexpectedStaleness(Staleness::YSYL));

    info.staleness_in_days = 5;
    let err = compute_actions(&BotInput::Info(info)).unwrap_err();
    assert_eq!(err, EngineError::UnexpectedStaleness(Staleness::NearlyYSYL));
}

#[test]
fn test_compute_actions_is_deterministic() {
    let mut infos = vec![base_info()];
    let mut failing = base_info();
    failing.ci_result = CiResult::Fail;
    failing.has_merge_conflict = true;
    infos.push(failing);
    let mut offer = base_info();
    offer.approval_flags = ApprovalFlags::OTHER;
    infos.push(offer);

    for info in infos {
        let input = BotInput::Info(info);
        assert_eq!(compute_actions(&input), compute_actions(&input));
    }
}

#[test]
fn test_status_comment_ignores_clock() {
    let info = base_info();
    let mut later = info.clone();
    later.now = info.now + Duration::hours(3);

    let first = plan_for(info);
    let second = plan_for(later);

    assert_eq!(first, second);
    let welcome = first.comment("welcome").unwrap();
    assert!(welcome.body.contains(r#""now": "-""#));
}

#[test]
fn test_status_comment_section_order() {
    let mut info = base_info();
    info.danger_level = DangerLevel::ScopedAndUntested;
    info.is_first_contribution = true;

    let plan = plan_for(info);
    let body = &plan.comment("welcome").unwrap().body;

    assert!(body.starts_with("@alice Thank you for submitting this PR! I see this is your first time"));
    let packages = body.find("## 1 package in this PR").unwrap();
    let reviews = body.find("## Code Reviews").unwrap();
    let warning = body.find("This PR doesn't modify any tests").unwrap();
    let status = body.find("## Status").unwrap();
    let diagnostics = body.find("Diagnostic Information").unwrap();
    assert!(packages < reviews);
    assert!(reviews < warning);
    assert!(warning < status);
    assert!(status < diagnostics);
    assert!(!body.ends_with('\n'));
}

#[test]
fn test_remove_draft_moves_to_author_column() {
    let plan = compute_actions(&BotInput::Remove {
        pr_number: 7,
        is_draft: true,
    })
    .unwrap();

    assert_eq!(plan.target_column, Some(Column::NeedsAuthorAction));
    assert!(plan.should_update_project_column);
    assert!(!plan.should_remove_from_active_columns);
    assert!(!plan.should_update_labels);
    assert!(plan.labels.is_empty());
    assert!(plan.comments.is_empty());
}

#[test]
fn test_remove_leaves_the_board() {
    let plan = compute_actions(&BotInput::Remove {
        pr_number: 7,
        is_draft: false,
    })
    .unwrap();

    assert!(plan.should_remove_from_active_columns);
    assert!(!plan.should_close);
    assert!(!plan.should_update_labels);
}

#[test]
fn test_no_packages_is_infrastructure() {
    let plan = compute_actions(&BotInput::NoPackages { pr_number: 8 }).unwrap();

    assert_eq!(plan.labels.len(), 1);
    assert!(plan.label(Label::EditsInfrastructure));
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerAction));
    assert!(plan.should_update_labels);
}

#[test]
fn test_error_snapshot_only_flags_the_error() {
    let plan = compute_actions(&BotInput::Error {
        pr_number: 9,
        author: "alice".to_string(),
        message: "could not fetch files".to_string(),
    })
    .unwrap();

    assert_eq!(plan.labels.len(), Label::ALL.len());
    assert_eq!(plan.active_labels().collect::<Vec<_>>(), vec![Label::MergebotError]);
    assert_eq!(comment_tags(&plan), vec!["had-error"]);
    assert!(plan.comments[0].body.contains("could not fetch files"));
    assert!(!plan.should_merge);
}

#[test]
fn test_labels_wait_one_minute_after_push() {
    let mut info = base_info();
    info.last_push_date = info.now - Duration::seconds(59);
    let plan = plan_for(info.clone());
    assert!(!plan.should_update_labels);
    assert!(!plan.should_update_project_column);

    info.last_push_date = info.now - Duration::seconds(60);
    let plan = plan_for(info);
    assert!(plan.should_update_labels);
    assert!(plan.should_update_project_column);
}

#[test]
fn test_ping_reviewers_names_other_owners() {
    let plan = plan_for(base_info());

    let ping = plan.comment("pingreviewers").unwrap();
    assert!(ping.body.starts_with("🔔 @bob @carol"));
    assert!(ping.body.contains("pull/1234/files"));
    assert_eq!(plan.target_column, Some(Column::WaitingForCodeReviews));
}

#[test]
fn test_ping_reviewers_sole_owner() {
    let mut info = base_info();
    info.owners = vec!["Alice".to_string()];

    let plan = plan_for(info.clone());
    assert!(plan.comment("pingreviewers-other").is_some());
    assert!(plan.label(Label::NoOtherOwners));

    info.popularity_level = PopularityLevel::Critical;
    let plan = plan_for(info);
    assert!(plan.comment("pingreviewers-other").is_none());
    assert!(plan.comment("pingreviewers").is_none());
}

#[test]
fn test_no_ping_once_owner_reviewed_or_changes_requested() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::OWNER;
    assert!(plan_for(info).comment("pingreviewers").is_none());

    let mut info = base_info();
    info.is_changes_requested = true;
    let plan = plan_for(info);
    assert!(plan.comment("pingreviewers").is_none());
    assert!(plan.comment("reviewer-complaint-abc1234").is_some());
    assert!(plan.label(Label::RevisionNeeded));
}

#[test]
fn test_merge_offer_mentions_other_owners() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::OTHER;
    info.owners = vec!["ALICE".to_string(), "bob".to_string()];

    let plan = plan_for(info);

    assert_eq!(plan.target_column, Some(Column::WaitingForAuthorToMerge));
    assert!(!plan.should_merge);
    let offer = plan.comment("merge-offer").unwrap();
    assert!(offer.body.ends_with("(@bob: you can do this too.)"));
}

#[test]
fn test_merge_offer_skips_owners_for_unscoped_changes() {
    let mut info = base_info();
    info.danger_level = DangerLevel::MultiplePackagesEdited;
    info.approval_flags = ApprovalFlags::MAINTAINER;

    let plan = plan_for(info);
    let offer = plan.comment("merge-offer").unwrap();
    assert!(offer.body.ends_with("❤️"));
}

#[test]
fn test_stale_reviewers_pinged_once() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::OTHER;
    info.reviewers_with_stale_reviews = vec![
        StaleReview {
            reviewer: "bob".to_string(),
            date: now() - Duration::days(5),
            reviewed_abbr_oid: "0000000".to_string(),
        },
        StaleReview {
            reviewer: "carol".to_string(),
            date: now() - Duration::days(3),
            reviewed_abbr_oid: "2222222".to_string(),
        },
        StaleReview {
            reviewer: "bob".to_string(),
            date: now() - Duration::days(4),
            reviewed_abbr_oid: "1111111".to_string(),
        },
    ];

    let plan = plan_for(info);
    let stale: Vec<_> = plan
        .comments
        .iter()
        .filter(|c| c.tag.starts_with("stale-ping-"))
        .collect();

    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].tag, "stale-ping-2222222");
    assert!(stale[0].body.starts_with("@bob @carol Thank you for reviewing"));
}

#[test]
fn test_unmergeable_and_silent_is_closed() {
    let mut info = base_info();
    info.ci_result = CiResult::Fail;
    info.staleness_in_days = 31;

    let plan = plan_for(info.clone());
    assert!(plan.should_close);
    assert!(plan.should_remove_from_active_columns);
    assert!(plan.label(Label::Abandoned));
    assert!(plan.comment("close-abandoned").is_some());

    info.staleness_in_days = 23;
    let plan = plan_for(info);
    assert!(!plan.should_close);
    assert!(plan.comment("abandon-sorry").is_some());
}

#[test]
fn test_unreviewed_abandoned_goes_to_maintainers() {
    let mut info = base_info();
    info.staleness_in_days = 31;

    let plan = plan_for(info);
    assert!(!plan.should_close);
    assert!(plan.label(Label::Abandoned));
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerAction));
}

#[test]
fn test_ysyl_goes_to_maintainers() {
    let mut info = base_info();
    info.approval_flags = ApprovalFlags::OTHER;
    info.staleness_in_days = 9;

    let plan = plan_for(info);
    assert!(plan.label(Label::MergeYsyl));
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerAction));
    assert!(plan.comment("merge-offer").is_none());
}

#[test]
fn test_ci_pending_and_missing() {
    let mut info = base_info();
    info.ci_result = CiResult::Pending;
    let plan = plan_for(info);
    assert_eq!(plan.target_column, Some(Column::WaitingForCodeReviews));

    let mut info = base_info();
    info.ci_result = CiResult::Missing;
    let plan = plan_for(info);
    assert!(plan.label(Label::WhereIsGhActions));
    assert_eq!(plan.target_column, Some(Column::Other));
}

#[test]
fn test_review_column_by_required_approver() {
    let mut info = base_info();
    info.popularity_level = PopularityLevel::Critical;
    assert_eq!(plan_for(info.clone()).target_column, Some(Column::NeedsMaintainerReview));

    info.new_packages = vec!["lodash".to_string()];
    let plan = plan_for(info);
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerAction));
    assert!(plan.label(Label::NewDefinition));
    assert!(!plan.label(Label::NoOtherOwners));
}

#[test]
fn test_popular_package_with_sole_owner_escalates_to_maintainers() {
    let mut info = base_info();
    info.popularity_level = PopularityLevel::Popular;
    info.owners = vec!["alice".to_string()];
    info.approval_flags = ApprovalFlags::OWNER;

    let resolved = approval::resolve(&info).unwrap();
    assert_eq!(resolved.approver_kind, ApproverKind::Maintainers);
    assert!(!resolved.approved);
    assert!(!resolved.blessable);

    let plan = plan_for(info);
    assert!(plan.label(Label::PopularPackage));
    assert!(plan.label(Label::NoOtherOwners));
    assert!(!plan.label(Label::MergeAuto));
    assert_eq!(plan.target_column, Some(Column::NeedsMaintainerAction));
}

#[test]
fn test_blessed_critical_package_is_reviewed_by_owners() {
    let mut info = base_info();
    info.popularity_level = PopularityLevel::Critical;
    info.maintainer_blessed = true;

    let resolved = approval::resolve(&info).unwrap();
    assert_eq!(resolved.approver_kind, ApproverKind::Owners);
    assert!(!resolved.approved);
    assert!(resolved.blessable);

    let plan = plan_for(info.clone());
    assert!(plan.label(Label::CriticalPackage));
    assert!(!plan.label(Label::MergeAuto));
    assert_eq!(plan.target_column, Some(Column::WaitingForCodeReviews));

    info.approval_flags = ApprovalFlags::OWNER;
    let plan = plan_for(info);
    assert!(plan.label(Label::MergeAuto));
    assert_eq!(plan.target_column, Some(Column::WaitingForAuthorToMerge));
}

#[test]
fn test_unknown_popularity_is_rejected() {
    let mut info = base_info();
    info.popularity_level = PopularityLevel::Unrecognized("Niche".to_string());

    let err = compute_actions(&BotInput::Info(info.clone())).unwrap_err();
    assert_eq!(err, EngineError::UnknownPopularityLevel("Niche".to_string()));

    info.danger_level = DangerLevel::Infrastructure;
    let plan = plan_for(info);
    assert!(plan.label(Label::EditsInfrastructure));
}

#[test]
fn test_snapshot_json_accepts_normal_popularity() {
    let mut value = serde_json::to_value(BotInput::Info(base_info())).unwrap();
    value["popularity_level"] = "normal".into();

    let input: BotInput = serde_json::from_value(value).unwrap();
    let BotInput::Info(info) = input else {
        panic!("expected an info snapshot");
    };
    assert_eq!(info.popularity_level, PopularityLevel::WellLikedByEveryone);
}

fn state_matching(plan: &mergebot::ActionPlan) -> PrState {
    PrState {
        labels: plan.active_labels().map(|l| l.as_str().to_string()).collect(),
        comments: plan
            .comments
            .iter()
            .enumerate()
            .map(|(i, comment)| ExistingComment {
                id: i as u64 + 100,
                body: tagged_body(comment),
            })
            .collect(),
        column: plan.target_column,
    }
}

#[test]
fn test_rerun_on_unchanged_pr_is_a_no_op() {
    let plan = plan_for(base_info());
    let state = state_matching(&plan);

    assert!(plan_mutations(&plan, &state).is_empty());
}

#[test]
fn test_mutations_for_untouched_pr() {
    let plan = plan_for(base_info());
    let mutations = plan_mutations(&plan, &PrState::default());

    assert!(matches!(
        &mutations[0],
        Mutation::PostComment { tag, .. } if tag == "welcome"
    ));
    assert!(mutations.contains(&Mutation::AddLabels {
        labels: vec![Label::AuthorIsOwner],
    }));
    assert_eq!(
        mutations.last(),
        Some(&Mutation::MoveCard {
            column: Column::WaitingForCodeReviews
        })
    );
}

#[test]
fn test_mutations_edit_and_clean_up() {
    let plan = plan_for(base_info());
    let mut state = state_matching(&plan);
    state.comments[0].body = "@alice outdated\n<!--mergebot:welcome-->".to_string();
    state.labels.push("The CI failed".to_string());
    state.labels.push("Hand-applied label".to_string());

    let mutations = plan_mutations(&plan, &state);

    assert_eq!(mutations.len(), 2);
    assert!(matches!(
        &mutations[0],
        Mutation::EditComment { id: 100, tag, .. } if tag == "welcome"
    ));
    assert_eq!(
        mutations[1],
        Mutation::RemoveLabels {
            labels: vec![Label::CiFailed],
        }
    );
}

#[test]
fn test_debounced_plan_leaves_labels_alone() {
    let mut info = base_info();
    info.last_push_date = info.now - Duration::seconds(10);
    let plan = plan_for(info);

    let state = PrState {
        labels: vec!["The CI failed".to_string()],
        ..PrState::default()
    };
    let mutations = plan_mutations(&plan, &state);

    assert!(mutations.iter().all(|m| matches!(
        m,
        Mutation::PostComment { .. } | Mutation::EditComment { .. }
    )));
}
