//! Integration tests for the land and unlink engines.

mod common;

use common::{run_git, stack_context, StackRepo};

use ghstack::core::ledger::ConsumedLedger;
use ghstack::core::types::GhNumber;
use ghstack::engine::{
    run_land, run_submit, run_unlink, Error, LandOptions, Mode, SubmitOptions, WhatHappened,
};
use ghstack::forge::mock::MockOperation;
use ghstack::forge::{Forge, PrState};
use ghstack::msg;

fn options() -> SubmitOptions {
    SubmitOptions::default()
}

// =============================================================================
// S6: land fast-forwards the default branch
// =============================================================================

#[tokio::test]
async fn land_fast_forwards_the_stack() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");
    repo.commit("b.txt", "b\n", "Add b");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    let master_before = repo.origin_commit_count("master");

    let result = run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/501",
        &LandOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.landed, vec![500, 501]);

    // Two new commits on master, trees matching the orig commits.
    assert_eq!(repo.origin_commit_count("master"), master_before + 2);
    assert_eq!(
        repo.origin_tree("refs/heads/master"),
        repo.origin_tree("refs/heads/gh/ezyang/2/orig"),
    );
    assert_eq!(
        repo.origin_tree("refs/heads/master~1"),
        repo.origin_tree("refs/heads/gh/ezyang/1/orig"),
    );

    // The landed commit messages carry only the resolution trailer.
    let landed_msg = run_git(
        repo.origin.path(),
        &["log", "-1", "--format=%B", "refs/heads/master"],
    );
    let parsed = msg::parse(&landed_msg);
    assert_eq!(
        parsed.trailer(msg::PULL_REQUEST_RESOLVED_KEY),
        Some("https://github.com/pytorch/pytorch/pull/501")
    );
    assert!(parsed.recorded_source_id().is_none());

    // Both PRs closed; branches deleted through the forge.
    assert_eq!(repo.forge.pr(500).unwrap().state, PrState::Closed);
    assert_eq!(repo.forge.pr(501).unwrap().state, PrState::Closed);
    let deletes: Vec<String> = repo
        .forge
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            MockOperation::DeleteBranch { name } => Some(name),
            _ => None,
        })
        .collect();
    for branch in [
        "gh/ezyang/1/head",
        "gh/ezyang/1/base",
        "gh/ezyang/1/orig",
        "gh/ezyang/2/head",
        "gh/ezyang/2/base",
        "gh/ezyang/2/orig",
    ] {
        assert!(deletes.iter().any(|d| d == branch), "missing delete of {}", branch);
    }

    // Both numbers are retired.
    let ledger = ConsumedLedger::read(&git).unwrap();
    assert!(ledger.contains(GhNumber::new(1)));
    assert!(ledger.contains(GhNumber::new(2)));
}

#[tokio::test]
async fn land_bottom_of_stack_leaves_the_top_open() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");
    repo.commit("b.txt", "b\n", "Add b");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    let result = run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/500",
        &LandOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.landed, vec![500]);
    assert_eq!(repo.forge.pr(500).unwrap().state, PrState::Closed);
    assert_eq!(repo.forge.pr(501).unwrap().state, PrState::Open);

    let ledger = ConsumedLedger::read(&git).unwrap();
    assert!(ledger.contains(GhNumber::new(1)));
    assert!(!ledger.contains(GhNumber::new(2)));
}

#[tokio::test]
async fn land_rejects_closed_pr() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    repo.forge.close_pr(500).await.unwrap();

    let err = run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/500",
        &LandOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::LandPrNotOpen { number: 500, .. }));
}

#[tokio::test]
async fn land_rejects_out_of_sync_stack() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    // Someone force-pushes orig ahead of the reviewed head (e.g. an aborted
    // run on another machine).
    repo.amend("a.txt", "divergent\n");
    run_git(
        repo.local.path(),
        &["push", "--force", "origin", "HEAD:refs/heads/gh/ezyang/1/orig"],
    );
    run_git(repo.local.path(), &["fetch", "origin"]);

    let err = run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/500",
        &LandOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::LandOutOfSync { number: 500 }));

    // --force lands what is on the orig branch anyway.
    run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/500",
        &LandOptions { force: true },
    )
    .await
    .unwrap();
    assert_eq!(repo.forge.pr(500).unwrap().state, PrState::Closed);
}

#[tokio::test]
async fn allocation_skips_numbers_consumed_by_land() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    run_land(
        &ctx,
        "https://github.com/pytorch/pytorch/pull/500",
        &LandOptions::default(),
    )
    .await
    .unwrap();

    // GitHub actually deletes the branches; mirror that on the origin so
    // only the ledger remembers number 1.
    repo.delete_origin_branches(&[
        "gh/ezyang/1/base",
        "gh/ezyang/1/head",
        "gh/ezyang/1/orig",
    ]);

    // Start a fresh stack on the landed master.
    run_git(repo.local.path(), &["fetch", "origin"]);
    run_git(repo.local.path(), &["reset", "--hard", "origin/master"]);
    repo.commit("c.txt", "c\n", "Add c");

    let result = run_submit(&ctx, &options()).await.unwrap();
    assert_eq!(result.diffs[0].what, WhatHappened::Created);

    // Number 1 is never reused.
    assert_eq!(result.diffs[0].ghnum, GhNumber::new(2));
    assert!(repo.origin_branch("gh/ezyang/2/head").is_some());
}

// =============================================================================
// Unlink
// =============================================================================

#[tokio::test]
async fn unlink_strips_trailers_and_forces_fresh_prs() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a\n\nDetails.");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    assert!(msg::parse(&repo.head_message())
        .recorded_source_id()
        .is_some());

    let result = run_unlink(&git, "origin", "master", &[]).unwrap();
    assert_eq!(result.unlinked, 1);

    let parsed = msg::parse(&repo.head_message());
    assert!(parsed.recorded_source_id().is_none());
    assert!(parsed.trailer(msg::PULL_REQUEST_RESOLVED_KEY).is_none());
    assert_eq!(parsed.prose, "Add a\n\nDetails.");

    // The next submit opens a brand-new PR under a fresh number.
    let result = run_submit(&ctx, &options()).await.unwrap();
    assert_eq!(result.diffs[0].number, 501);
    assert_eq!(result.diffs[0].what, WhatHappened::Created);
    assert!(repo.origin_branch("gh/ezyang/2/head").is_some());
}

#[tokio::test]
async fn unlink_preserves_user_trailers() {
    let repo = StackRepo::new();
    repo.commit(
        "a.txt",
        "a\n",
        "Add a\n\nBody.\n\nSigned-off-by: Test User <test@example.com>",
    );

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    run_unlink(&git, "origin", "master", &[]).unwrap();

    let parsed = msg::parse(&repo.head_message());
    assert_eq!(
        parsed.trailer("Signed-off-by"),
        Some("Test User <test@example.com>")
    );
    assert!(parsed.recorded_source_id().is_none());
}

#[tokio::test]
async fn unlink_rejects_commits_outside_the_stack() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");

    let git = repo.git();
    // The initial commit is below the merge base.
    let outside = run_git(repo.local.path(), &["rev-parse", "HEAD~1"]);
    run_git(repo.local.path(), &["fetch", "origin"]);

    let err = run_unlink(&git, "origin", "master", &[outside.clone()]).unwrap_err();
    match err {
        Error::UnlinkOutsideStack { commits } => assert!(commits.contains(&outside)),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unlink_requires_clean_worktree() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");
    run_git(repo.local.path(), &["fetch", "origin"]);

    std::fs::write(repo.local.path().join("a.txt"), "dirty\n").unwrap();

    let git = repo.git();
    let err = run_unlink(&git, "origin", "master", &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::Git(ghstack::git::GitError::DirtyWorktree { .. })
    ));
}

#[tokio::test]
async fn unlink_subset_only_rewrites_from_first_target() {
    let repo = StackRepo::new();
    repo.commit("a.txt", "a\n", "Add a");
    repo.commit("b.txt", "b\n", "Add b");

    let git = repo.git();
    let ctx = stack_context(&git, &repo.forge, Mode::Stack);
    run_submit(&ctx, &options()).await.unwrap();

    // Unlink only the top commit.
    let top = repo.head();
    run_unlink(&git, "origin", "master", &[top]).unwrap();

    let top_parsed = msg::parse(&repo.head_message());
    assert!(top_parsed.recorded_source_id().is_none());

    let below = run_git(repo.local.path(), &["log", "-1", "--format=%B", "HEAD~1"]);
    let below_parsed = msg::parse(&below);
    assert!(below_parsed.recorded_source_id().is_some());
}
