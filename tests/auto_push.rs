use git2::Repository;
use git_auto_pusher::pusher::config::ConfigStore;
use git_auto_pusher::pusher::git_ops::{GitWorkspace, RepoStatus, REMOTE_NAME};
use git_auto_pusher::pusher::notifier::SilentNotifier;
use git_auto_pusher::pusher::session::Session;
use git_auto_pusher::pusher::watcher::{CycleOutcome, Pusher};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn init_repo(dir: &Path) -> Repository {
    let repository = Repository::init(dir).unwrap();
    let mut config = repository.config().unwrap();
    config.set_str("user.name", "Auto Pusher").unwrap();
    config.set_str("user.email", "pusher@example.com").unwrap();
    repository
}

fn pusher_for(dir: &Path) -> Pusher<GitWorkspace, SilentNotifier> {
    let session = Session::new(Some(dir), Duration::from_secs(30)).unwrap();
    let workspace = GitWorkspace::new(dir, None);
    Pusher::new(session, workspace, SilentNotifier)
}

#[test]
fn untracked_files_are_committed_and_pushed_in_one_shot() {
    let work = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let repository = init_repo(work.path());
    let origin = Repository::init_bare(remote.path()).unwrap();
    repository
        .remote(REMOTE_NAME, remote.path().to_str().unwrap())
        .unwrap();
    fs::write(work.path().join("one.txt"), "1").unwrap();
    fs::write(work.path().join("two.txt"), "2").unwrap();

    let pusher = pusher_for(work.path());
    assert!(pusher.run_once());

    let head = repository.head().unwrap();
    let branch = head.shorthand().unwrap().to_string();
    let commit = head.peel_to_commit().unwrap();
    assert!(commit.message().unwrap().starts_with("Auto-commit: "));
    let tree = commit.tree().unwrap();
    assert!(tree.get_name("one.txt").is_some());
    assert!(tree.get_name("two.txt").is_some());

    let pushed = origin
        .find_reference(&format!("refs/heads/{branch}"))
        .unwrap()
        .target();
    assert_eq!(pushed, Some(commit.id()));

    match pusher.check_and_push().unwrap() {
        CycleOutcome::Clean => {}
        other => panic!("expected a clean tree after pushing, got {other:?}"),
    }
}

#[test]
fn plain_directory_fails_without_touching_anything() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file.txt"), "data").unwrap();

    let pusher = pusher_for(dir.path());

    assert_eq!(pusher.check_and_push().unwrap(), CycleOutcome::NotARepository);
    assert!(!pusher.run_once());
    assert!(!dir.path().join(".git").exists());
}

#[test]
fn push_failure_leaves_commit_locally_and_reports_failure() {
    let work = TempDir::new().unwrap();
    let repository = init_repo(work.path());
    fs::write(work.path().join("notes.md"), "draft").unwrap();

    let pusher = pusher_for(work.path());

    assert!(!pusher.run_once());
    assert!(repository.head().is_ok());
    match git_auto_pusher::pusher::git_ops::status(work.path()).unwrap() {
        RepoStatus::Repository(status) => assert!(!status.has_changes),
        RepoStatus::NotARepository => panic!("expected a repository"),
    }
}

#[test]
fn recent_list_tracks_repositories_across_runs() {
    let home = TempDir::new().unwrap();
    let store = ConfigStore::new(home.path().join(".git_auto_pusher.json"));
    let first = home.path().join("first");
    let second = home.path().join("second");

    store.add_recent(&first).unwrap();
    store.add_recent(&second).unwrap();
    store.add_recent(&first).unwrap();

    let reopened = ConfigStore::new(store.path());
    assert_eq!(reopened.load().unwrap().recent_repos, vec![first, second]);
}
