use super::errors::Result;
use super::git_ops::{RepoStatus, Workspace};
use super::notifier::Notifier;
use super::session::Session;
use chrono::{DateTime, Local};
use git2::Oid;
use log::{error, info, warn};
use std::future::Future;
use tokio::sync::oneshot;
use tokio::{signal, task, time};

pub const APP_TITLE: &str = "Git Auto-Pusher";
pub const ERROR_TITLE: &str = "Git Auto-Pusher Error";

/// What a single check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NotARepository,
    Clean,
    Pushed { branch: String, commit: Option<Oid> },
}

/// Registers the Ctrl+C handler now and returns a future that resolves on
/// the first interrupt. Registering up front means an interrupt during the
/// first cycle is observed afterwards instead of killing the process. If the
/// handler cannot be installed the future never resolves.
pub async fn interrupt_signal() -> impl Future<Output = ()> {
    let (interrupted, received) = oneshot::channel();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                let _ = interrupted.send(());
            }
            Err(cause) => warn!("Cannot listen for Ctrl+C: {cause}"),
        }
    });
    // The listener registers on its first poll; let it run before a cycle
    // blocks this thread.
    task::yield_now().await;

    async move {
        if received.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn commit_message(now: DateTime<Local>) -> String {
    format!("Auto-commit: {}", now.format("%Y-%m-%d %H:%M:%S"))
}

/// Drives check → commit → push against one workspace.
pub struct Pusher<W, N> {
    session: Session,
    workspace: W,
    notifier: N,
}

impl<W: Workspace, N: Notifier> Pusher<W, N> {
    pub fn new(session: Session, workspace: W, notifier: N) -> Self {
        Self {
            session,
            workspace,
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One check. Errors from status, commit or push are returned.
    pub fn check_and_push(&self) -> Result<CycleOutcome> {
        let status = match self.workspace.status()? {
            RepoStatus::NotARepository => return Ok(CycleOutcome::NotARepository),
            RepoStatus::Repository(status) => status,
        };
        if !status.has_changes {
            return Ok(CycleOutcome::Clean);
        }

        info!(
            "Changes detected on '{}' ({} changed, {} untracked). Committing and pushing...",
            status.branch,
            status.changed.len(),
            status.untracked.len()
        );
        let commit = self
            .workspace
            .commit_and_push(&commit_message(Local::now()))?;
        Ok(CycleOutcome::Pushed {
            branch: status.branch,
            commit,
        })
    }

    /// One check with every failure logged and notified instead of returned.
    /// Returns whether the cycle succeeded.
    pub fn run_cycle(&self) -> bool {
        match self.check_and_push() {
            Ok(CycleOutcome::Clean) => {
                info!("No changes detected.");
                true
            }
            Ok(CycleOutcome::Pushed { branch, commit }) => {
                let message = format!(
                    "Successfully pushed changes to {}",
                    self.session.repo_name()
                );
                match commit {
                    Some(commit) => info!("{message} ({branch} at {commit})"),
                    None => info!("{message} ({branch})"),
                }
                self.notify(APP_TITLE, &message);
                true
            }
            Ok(CycleOutcome::NotARepository) => {
                let message = format!(
                    "{} is not a git repository",
                    self.workspace.path().display()
                );
                error!("{message}");
                self.notify(ERROR_TITLE, &message);
                false
            }
            Err(cause) => {
                let message = format!("Error during git operations: {cause}");
                error!("{message}");
                self.notify(ERROR_TITLE, &message);
                false
            }
        }
    }

    pub fn run_once(&self) -> bool {
        info!("Checking repository: {}", self.session.repo_path.display());
        self.run_cycle()
    }

    /// Runs cycles `interval` apart until `shutdown` resolves. The shutdown
    /// signal is only observed between cycles. Returns the number of cycles
    /// run.
    pub async fn watch<F: Future>(&mut self, shutdown: F) -> usize {
        info!(
            "Starting watch mode for repository: {}",
            self.session.repo_path.display()
        );
        info!(
            "Checking for changes every {} seconds",
            self.session.interval.as_secs_f64()
        );
        info!("Press Ctrl+C to stop");

        tokio::pin!(shutdown);
        self.session.start();
        let mut cycles = 0;
        while self.session.is_running() {
            self.run_cycle();
            cycles += 1;

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping Git Auto-Pusher...");
                    self.session.stop();
                }
                _ = time::sleep(self.session.interval) => {}
            }
        }
        cycles
    }

    fn notify(&self, title: &str, message: &str) {
        if let Err(cause) = self.notifier.notify(title, message) {
            warn!("Notification not delivered: {cause}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pusher::errors::{NotifyError, PushError};
    use crate::pusher::git_ops::WorkingTreeStatus;
    use crate::pusher::notifier::Delivery;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(String, String)>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, title: &str, message: &str) -> std::result::Result<Delivery, NotifyError> {
            self.sent
                .borrow_mut()
                .push((title.to_string(), message.to_string()));
            Ok(Delivery::Suppressed)
        }
    }

    /// Always dirty; the push numbered `fail_on` fails and the push numbered
    /// `stop_after` fires `done`.
    struct FlakyWorkspace {
        path: PathBuf,
        dirty: bool,
        is_repo: bool,
        pushes: Cell<usize>,
        fail_on: usize,
        stop_after: usize,
        done: Arc<Notify>,
    }

    impl FlakyWorkspace {
        fn new() -> Self {
            Self {
                path: PathBuf::from("/work/site"),
                dirty: true,
                is_repo: true,
                pushes: Cell::new(0),
                fail_on: 0,
                stop_after: 0,
                done: Arc::new(Notify::new()),
            }
        }
    }

    impl Workspace for FlakyWorkspace {
        fn path(&self) -> &Path {
            &self.path
        }

        fn status(&self) -> Result<RepoStatus> {
            if !self.is_repo {
                return Ok(RepoStatus::NotARepository);
            }
            let untracked = if self.dirty {
                vec!["draft.md".to_string()]
            } else {
                Vec::new()
            };
            Ok(RepoStatus::Repository(WorkingTreeStatus {
                branch: "main".into(),
                changed: Vec::new(),
                has_changes: !untracked.is_empty(),
                untracked,
            }))
        }

        fn commit_and_push(&self, message: &str) -> Result<Option<Oid>> {
            assert!(message.starts_with("Auto-commit: "));
            let push = self.pushes.get() + 1;
            self.pushes.set(push);
            if push == self.stop_after {
                self.done.notify_one();
            }
            if push == self.fail_on {
                return Err(PushError::PushRejected {
                    reference: "refs/heads/main".into(),
                    reason: "non-fast-forward".into(),
                });
            }
            Ok(None)
        }
    }

    fn session(interval: Duration) -> Session {
        Session::new(Some(Path::new("/work/site")), interval).unwrap()
    }

    #[test]
    fn commit_message_is_timestamped() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(commit_message(at), "Auto-commit: 2024-03-09 07:05:01");
    }

    #[test]
    fn clean_tree_is_success_without_push() {
        let workspace = FlakyWorkspace {
            dirty: false,
            ..FlakyWorkspace::new()
        };
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert_eq!(pusher.check_and_push().unwrap(), CycleOutcome::Clean);
        assert!(pusher.run_once());
        assert_eq!(workspace.pushes.get(), 0);
        assert!(recorder.sent.borrow().is_empty());
    }

    #[test]
    fn successful_push_is_notified() {
        let workspace = FlakyWorkspace::new();
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert!(pusher.run_once());

        let sent = recorder.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, APP_TITLE);
        assert_eq!(sent[0].1, "Successfully pushed changes to site");
    }

    #[test]
    fn pushed_outcome_names_branch() {
        let workspace = FlakyWorkspace::new();
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert_eq!(
            pusher.check_and_push().unwrap(),
            CycleOutcome::Pushed {
                branch: "main".into(),
                commit: None,
            }
        );
    }

    #[test]
    fn not_a_repository_fails_without_push() {
        let workspace = FlakyWorkspace {
            is_repo: false,
            ..FlakyWorkspace::new()
        };
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert!(!pusher.run_once());
        assert_eq!(workspace.pushes.get(), 0);
        assert_eq!(recorder.sent.borrow()[0].0, ERROR_TITLE);
    }

    #[test]
    fn push_failure_is_reported_not_raised() {
        let workspace = FlakyWorkspace {
            fail_on: 1,
            ..FlakyWorkspace::new()
        };
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert!(!pusher.run_once());
        let sent = recorder.sent.borrow();
        assert_eq!(sent[0].0, ERROR_TITLE);
        assert!(sent[0].1.contains("non-fast-forward"));
    }

    #[test]
    fn check_returns_push_errors_to_the_caller() {
        let workspace = FlakyWorkspace {
            fail_on: 1,
            ..FlakyWorkspace::new()
        };
        let recorder = Recorder::default();
        let pusher = Pusher::new(session(Duration::from_secs(30)), &workspace, &recorder);

        assert!(matches!(
            pusher.check_and_push(),
            Err(PushError::PushRejected { .. })
        ));
    }

    #[tokio::test]
    async fn watch_survives_a_failed_cycle() {
        let workspace = FlakyWorkspace {
            fail_on: 2,
            stop_after: 3,
            ..FlakyWorkspace::new()
        };
        let done = workspace.done.clone();
        let recorder = Recorder::default();
        let mut pusher = Pusher::new(session(Duration::from_millis(10)), &workspace, &recorder);

        let cycles = pusher.watch(async move { done.notified().await }).await;

        assert_eq!(cycles, 3);
        assert_eq!(workspace.pushes.get(), 3);
        assert!(!pusher.session().is_running());
        let titles: Vec<String> = recorder
            .sent
            .borrow()
            .iter()
            .map(|(title, _)| title.clone())
            .collect();
        assert_eq!(titles, vec![APP_TITLE, ERROR_TITLE, APP_TITLE]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_is_caught_once_listener_is_returned() {
        let interrupted = interrupt_signal().await;

        // Without a registered handler SIGINT would terminate the test binary.
        let status = std::process::Command::new("kill")
            .args(["-INT", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        time::timeout(Duration::from_secs(5), interrupted)
            .await
            .expect("interrupt observed");
    }
}
