use super::credentials::Credentials;
use super::errors::{PushError, Result};
use git2::{
    Commit, Cred, CredentialType, ErrorCode, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, Status, StatusOptions,
};
use log::{debug, info};
use std::path::{Path, PathBuf};

pub const REMOTE_NAME: &str = "origin";
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Result of inspecting a directory. Branch and file lists only exist for
/// actual repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoStatus {
    NotARepository,
    Repository(WorkingTreeStatus),
}

impl RepoStatus {
    pub fn is_repo(&self) -> bool {
        matches!(self, RepoStatus::Repository(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    pub branch: String,
    /// Tracked files with unstaged modifications.
    pub changed: Vec<String>,
    pub untracked: Vec<String>,
    pub has_changes: bool,
}

/// The repository operations the control loop needs.
pub trait Workspace {
    fn path(&self) -> &Path;
    fn status(&self) -> Result<RepoStatus>;
    /// Returns the new commit, or `None` if there was nothing to commit.
    fn commit_and_push(&self, message: &str) -> Result<Option<Oid>>;
}

impl<T: Workspace + ?Sized> Workspace for &T {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn status(&self) -> Result<RepoStatus> {
        (**self).status()
    }

    fn commit_and_push(&self, message: &str) -> Result<Option<Oid>> {
        (**self).commit_and_push(message)
    }
}

/// A working tree on disk, pushed with the given credentials.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    path: PathBuf,
    credentials: Option<Credentials>,
}

impl GitWorkspace {
    pub fn new(path: impl Into<PathBuf>, credentials: Option<Credentials>) -> Self {
        Self {
            path: path.into(),
            credentials,
        }
    }
}

impl Workspace for GitWorkspace {
    fn path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> Result<RepoStatus> {
        status(&self.path)
    }

    fn commit_and_push(&self, message: &str) -> Result<Option<Oid>> {
        commit_and_push(&self.path, message, self.credentials.as_ref())
    }
}

/// Inspects `path` without searching parent directories.
pub fn status(path: &Path) -> Result<RepoStatus> {
    let Some(repository) = open(path)? else {
        debug!("{} is not a git repository", path.display());
        return Ok(RepoStatus::NotARepository);
    };
    let branch = current_branch(&repository, path)?;

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repository.statuses(Some(&mut options))?;

    let unstaged =
        Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_TYPECHANGE | Status::WT_RENAMED;
    let mut changed = Vec::new();
    let mut untracked = Vec::new();
    for entry in statuses.iter() {
        let Some(file) = entry.path() else { continue };
        let state = entry.status();
        if state.is_wt_new() {
            untracked.push(file.to_string());
        } else if state.intersects(unstaged) {
            changed.push(file.to_string());
        }
    }

    debug!(
        "{} on '{branch}': {} changed, {} untracked",
        path.display(),
        changed.len(),
        untracked.len()
    );
    let has_changes = !changed.is_empty() || !untracked.is_empty();
    Ok(RepoStatus::Repository(WorkingTreeStatus {
        branch,
        changed,
        untracked,
        has_changes,
    }))
}

/// Stages everything, commits if the staged tree differs from HEAD, and
/// pushes the current branch to `origin`.
pub fn commit_and_push(
    path: &Path,
    message: &str,
    credentials: Option<&Credentials>,
) -> Result<Option<Oid>> {
    let repository = open(path)?.ok_or_else(|| PushError::NotARepository {
        path: path.to_path_buf(),
    })?;
    let branch = current_branch(&repository, path)?;

    let commit = commit_all(&repository, message)?;
    match commit {
        Some(oid) => info!("Committed {oid} on '{branch}'"),
        None => debug!("Nothing to commit on '{branch}'"),
    }

    push_branch(&repository, &branch, credentials)?;
    info!("Pushed '{branch}' to {REMOTE_NAME}");
    Ok(commit)
}

fn open(path: &Path) -> Result<Option<Repository>> {
    match Repository::open(path) {
        Ok(repository) => Ok(Some(repository)),
        Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Reads the branch from the symbolic HEAD so unborn branches have a name
/// too.
fn current_branch(repository: &Repository, path: &Path) -> Result<String> {
    let head = repository.find_reference("HEAD")?;
    head.symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_owned)
        .ok_or_else(|| PushError::DetachedHead {
            path: path.to_path_buf(),
        })
}

/// Stage and compare in one step: the commit is only created when the index
/// tree written after staging differs from HEAD's tree.
fn commit_all(repository: &Repository, message: &str) -> Result<Option<Oid>> {
    let mut index = repository.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"].iter(), None)?;
    index.write()?;
    let tree_id = index.write_tree()?;

    let parent = match repository.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(error) if error.code() == ErrorCode::UnbornBranch => None,
        Err(error) => return Err(error.into()),
    };
    let unchanged = match &parent {
        Some(parent) => parent.tree_id() == tree_id,
        None => index.is_empty(),
    };
    if unchanged {
        return Ok(None);
    }

    let tree = repository.find_tree(tree_id)?;
    let signature = repository.signature()?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repository.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(Some(oid))
}

/// Destination is the branch's upstream on `origin` when one is configured,
/// otherwise the branch of the same name.
fn push_refspec(repository: &Repository, branch: &str) -> Result<String> {
    let config = repository.config()?;
    let tracks_origin = config
        .get_string(&format!("branch.{branch}.remote"))
        .map(|remote| remote == REMOTE_NAME)
        .unwrap_or(false);
    let destination = match config.get_string(&format!("branch.{branch}.merge")) {
        Ok(merge) if tracks_origin => merge,
        Ok(_) => format!("refs/heads/{branch}"),
        Err(error) if error.code() == ErrorCode::NotFound => format!("refs/heads/{branch}"),
        Err(error) => return Err(error.into()),
    };
    Ok(format!("refs/heads/{branch}:{destination}"))
}

fn push_branch(
    repository: &Repository,
    branch: &str,
    credentials: Option<&Credentials>,
) -> Result<()> {
    let mut remote = repository.find_remote(REMOTE_NAME).map_err(|error| {
        if error.code() == ErrorCode::NotFound {
            PushError::MissingRemote
        } else {
            PushError::Git(error)
        }
    })?;
    let url = remote.url().unwrap_or_default().to_string();
    let refspec = push_refspec(repository, branch)?;
    debug!("Pushing {refspec} to {url}");

    let mut attempts = 0;
    let mut rejection = None;
    let pushed = {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_, username_from_url, allowed| {
            attempts += 1;
            authenticate(attempts, username_from_url, allowed, credentials)
        });
        callbacks.push_update_reference(|reference, status| {
            if let Some(reason) = status {
                rejection = Some((reference.to_string(), reason.to_string()));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut push_options))
    };

    if let Err(error) = pushed {
        return Err(if error.code() == ErrorCode::Auth || attempts > MAX_AUTH_ATTEMPTS {
            PushError::Authentication {
                url,
                message: error.message().to_string(),
            }
        } else if error.code() == ErrorCode::NotFastForward {
            PushError::PushRejected {
                reference: refspec,
                reason: error.message().to_string(),
            }
        } else {
            PushError::Git(error)
        });
    }
    if let Some((reference, reason)) = rejection {
        return Err(PushError::PushRejected { reference, reason });
    }
    Ok(())
}

/// Token as password for HTTPS, the SSH agent for SSH. Gives up after a few
/// rounds since libgit2 keeps asking while the server rejects.
fn authenticate(
    attempt: usize,
    username_from_url: Option<&str>,
    allowed: CredentialType,
    credentials: Option<&Credentials>,
) -> std::result::Result<Cred, git2::Error> {
    if attempt > MAX_AUTH_ATTEMPTS {
        return Err(git2::Error::from_str("credentials were rejected"));
    }
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        if let Some(credentials) = credentials {
            return Cred::userpass_plaintext(&credentials.username, &credentials.token);
        }
    }
    if allowed.contains(CredentialType::SSH_KEY) {
        return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
    }
    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username_from_url.unwrap_or("git"));
    }
    Cred::default()
}
