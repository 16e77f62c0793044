use super::errors::{PushError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".git_auto_pusher.json";

/// Persisted state: repositories this tool has been pointed at.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Absolute paths, most recent first, no duplicates.
    #[serde(default)]
    pub recent_repos: Vec<PathBuf>,
}

impl Config {
    /// Moves `path` to the front, dropping any earlier occurrence.
    pub fn insert_recent(&mut self, path: PathBuf) {
        self.recent_repos.retain(|existing| existing != &path);
        self.recent_repos.insert(0, path);
    }
}

/// `~/.git_auto_pusher.json`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_FILE_NAME))
        .ok_or(PushError::NoHomeDir)
}

/// Reads and writes the config file as a whole. There is no locking; the
/// last writer wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty config. Unreadable or malformed content is
    /// an error.
    pub fn load(&self) -> Result<Config> {
        let file_text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(PushError::Config {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&file_text).map_err(|source| PushError::ConfigFormat {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Writes to a sibling temp file and renames it over the target so a
    /// crash never leaves a half-written config behind.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(config)?;
        let tmp_path = self.temp_path();
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Records `path` (made absolute) as the most recent repository. JSON
    /// can only hold UTF-8, so other paths are recorded lossily.
    pub fn add_recent(&self, path: &Path) -> Result<Config> {
        let mut absolute = std::path::absolute(path)?;
        if absolute.to_str().is_none() {
            let lossy = PathBuf::from(absolute.to_string_lossy().into_owned());
            warn!(
                "{} is not valid UTF-8, recording it as {}",
                absolute.display(),
                lossy.display()
            );
            absolute = lossy;
        }
        let mut config = self.load()?;
        config.insert_recent(absolute);
        self.save(&config)?;
        Ok(config)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| CONFIG_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
