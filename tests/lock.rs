#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Lockfile generation, reproducibility and mismatch detection against a
//! fake GitHub archive.

mod common;

use common::*;
use workspaced::error::ModError;
use workspaced::modules::resolver::LockMode;
use workspaced::modules::sumfile::{SUMFILE_NAME, SumFile};

fn mod_error(err: &anyhow::Error) -> Option<&ModError> {
    err.chain().find_map(|e| e.downcast_ref::<ModError>())
}

fn lock(ws: &TestWorkspace) -> SumFile {
    let workspace = ws.open(LockMode::Relock).expect("open");
    let sum = workspace
        .resolver
        .lock(workspace.config.enabled_modules())
        .expect("lock");
    sum.save(&workspace.sumfile_path()).expect("save lockfile");
    sum
}

fn github_workspace(module_source: &str) -> TestWorkspace {
    let ws = TestWorkspace::with_fetcher(CountingFetcher::new(&[
        ("init.lua", "-- init\n"),
        ("lua/plugins.lua", "return {}\n"),
    ]));
    ws.config(&format!("[modules.nvim]\nsource = \"{module_source}\"\ntarget = \"~/.config/nvim\"\n"));
    ws
}

#[test]
fn lock_records_rev_and_hash() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    let sum = lock(&ws);
    let entry = &sum.modules["nvim"];
    assert_eq!(entry.source, "github:owner/nvim");
    assert_eq!(entry.version, COMMIT);
    assert_eq!(entry.rev.as_deref(), Some(COMMIT));
    assert_eq!(entry.hash.as_deref(), Some(ws.fetcher.hash().as_str()));

    let text = std::fs::read_to_string(ws.root().join(SUMFILE_NAME)).unwrap();
    assert!(text.starts_with("# Generated by `workspaced lock`"));
    assert_eq!(SumFile::load(&ws.root().join(SUMFILE_NAME)).unwrap(), Some(sum));
}

#[test]
fn locked_run_reproduces_bundle_provenance() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    let sum = lock(&ws);
    let hash = sum.modules["nvim"].hash.clone().unwrap();

    let workspace = ws.open(LockMode::Enforce).unwrap();
    let desired = workspace.desired(&workspaced::cancel::CancelToken::new()).unwrap();
    let infos: Vec<&str> = desired.iter().map(|d| d.source_info()).collect();
    assert_eq!(
        infos,
        vec![
            format!("bundle:nvim@{hash}:init.lua").as_str(),
            format!("bundle:nvim@{hash}:lua/plugins.lua").as_str(),
        ]
    );
    // Cache hit: the archive was downloaded once, by `lock`.
    assert_eq!(ws.fetcher.calls(), 1);
}

#[test]
fn unpinned_module_follows_the_lockfile() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    lock(&ws);

    // Without a pin the ref would have to be looked up, which `NoRefs`
    // refuses; the locked revision is used instead.
    ws.config("[modules.nvim]\nsource = \"github:owner/nvim\"\n");
    let desired = ws.desired().unwrap();
    assert_eq!(desired.len(), 2);
}

#[test]
fn unlocked_unpinned_module_needs_ref_lookup() {
    let ws = github_workspace("github:owner/nvim");
    let err = ws.desired().unwrap_err();
    assert!(matches!(mod_error(&err), Some(ModError::Fetch { .. })), "{err:#}");
}

#[test]
fn tampered_hash_is_a_mismatch() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    let mut sum = lock(&ws);
    sum.modules.get_mut("nvim").unwrap().hash = Some(format!("sha256:{}", "0".repeat(64)));
    sum.save(&ws.root().join(SUMFILE_NAME)).unwrap();

    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::LockMismatch { .. })),
        "{err:#}"
    );
}

#[test]
fn different_pin_than_locked_is_a_conflict() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    lock(&ws);
    let before = ws.fetcher.calls();
    ws.config(&format!(
        "[modules.nvim]\nsource = \"github:owner/nvim@{}\"\n",
        "f".repeat(40)
    ));
    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::VersionConflict { .. })),
        "{err:#}"
    );
    assert_eq!(ws.fetcher.calls(), before);
}

#[test]
fn changed_repository_is_a_mismatch_before_any_lookup() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    lock(&ws);
    ws.config("[modules.nvim]\nsource = \"github:other/nvim\"\n");
    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::LockMismatch { .. })),
        "{err:#}"
    );
}

#[test]
fn branch_pin_against_locked_commit_is_a_conflict() {
    let ws = github_workspace(&format!("github:owner/nvim@{COMMIT}"));
    lock(&ws);
    ws.config("[modules.nvim]\nsource = \"github:owner/nvim@dev\"\n");
    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::VersionConflict { .. })),
        "{err:#}"
    );
}

#[test]
fn alias_source_change_is_a_mismatch() {
    let ws = TestWorkspace::with_fetcher(CountingFetcher::new(&[("vim/.vimrc", "set nu\n")]));
    ws.config("[modules.vim]\nsource = \"dots:vim\"\n")
        .write(
            "workspaced.mod.toml",
            &format!("[sources]\ndots = \"github:owner/dots@{COMMIT}\"\n"),
        );
    let sum = lock(&ws);
    assert_eq!(sum.sources["dots"].rev.as_deref(), Some(COMMIT));
    assert_eq!(sum.modules["vim"].source, "dots:vim");

    let desired = ws.desired().unwrap();
    assert_eq!(desired.len(), 1);
    assert_eq!(desired[0].target_path(), ws.home().join(".vimrc"));

    ws.write(
        "workspaced.mod.toml",
        &format!("[sources]\ndots = \"github:someone-else/dots@{COMMIT}\"\n"),
    );
    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::LockMismatch { .. })),
        "{err:#}"
    );
}

#[test]
fn version_on_aliased_module_is_rejected() {
    let ws = TestWorkspace::new();
    ws.config("[modules.vim]\nsource = \"dots:vim@v2\"\n")
        .write("workspaced.mod.toml", "[sources]\ndots = \"local:dots\"\n")
        .write("dots/vim/.vimrc", "set nu\n");
    let err = ws.desired().unwrap_err();
    assert!(
        matches!(mod_error(&err), Some(ModError::InvalidSpec { .. })),
        "{err:#}"
    );
}

#[test]
fn relock_drops_removed_modules() {
    let ws = TestWorkspace::new();
    ws.config("[modules.a]\nsource = \"local:mods/a\"\n[modules.b]\nsource = \"local:mods/b\"\n")
        .write("mods/a/x", "x")
        .write("mods/b/y", "y");
    assert_eq!(lock(&ws).modules.len(), 2);

    ws.config("[modules.a]\nsource = \"local:mods/a\"\n");
    let sum = lock(&ws);
    assert_eq!(sum.modules.keys().collect::<Vec<_>>(), vec!["a"]);
}
