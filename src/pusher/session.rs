use super::errors::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// One invocation's target repository and polling interval.
#[derive(Debug, Clone)]
pub struct Session {
    /// Absolute path of the working tree
    pub repo_path: PathBuf,
    /// Pause between watch-mode cycles
    pub interval: Duration,
    running: bool,
}

impl Session {
    /// `None` means the current working directory.
    pub fn new(repo_path: Option<&Path>, interval: Duration) -> Result<Self> {
        let repo_path = match repo_path {
            Some(path) => std::path::absolute(path)?,
            None => std::env::current_dir()?,
        };
        Ok(Self {
            repo_path,
            interval,
            running: false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn start(&mut self) {
        self.running = true;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    /// Last path component, used in user-facing messages.
    pub fn repo_name(&self) -> String {
        self.repo_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.repo_path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_current_directory() {
        let session = Session::new(None, Duration::from_secs(DEFAULT_INTERVAL_SECS)).unwrap();
        assert_eq!(session.repo_path, std::env::current_dir().unwrap());
        assert!(!session.is_running());
    }

    #[test]
    fn relative_path_becomes_absolute() {
        let session = Session::new(Some(Path::new("projects/site")), Duration::from_secs(5)).unwrap();
        assert!(session.repo_path.is_absolute());
        assert_eq!(session.repo_name(), "site");
    }
}
