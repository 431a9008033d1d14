use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::{Deserialize, Serialize};

use kotoba_core::BucketWeights;
use kotoba_core::constants::DEFAULT_ANSWER_TIMEOUT_SECS;

use crate::error::Result;

pub const CONFIG_FILE: &str = "config.toml";
pub const DATA_DIR_ENV: &str = "KOTOBA_DATA_DIR";

/// Quiz settings read from `config.toml` in the data directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub answer_timeout_secs: u64,
    pub weights: BucketWeights,
    /// Relative paths resolve against the data directory.
    pub database: PathBuf,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            answer_timeout_secs: DEFAULT_ANSWER_TIMEOUT_SECS,
            weights: BucketWeights::default(),
            database: PathBuf::from("kotoba.db"),
        }
    }
}

impl QuizConfig {
    /// Load `<base_dir>/config.toml`, or defaults when there is none.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn database_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.database)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

/// `~/.kotoba`, falling back to the working directory without a home.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".kotoba")
}

/// Explicit flag, then `$KOTOBA_DATA_DIR`, then [`default_base_dir`].
pub fn resolve_base_dir(flag: Option<&Path>) -> PathBuf {
    pick_base_dir(flag, env::var_os(DATA_DIR_ENV))
}

fn pick_base_dir(flag: Option<&Path>, from_env: Option<OsString>) -> PathBuf {
    match (flag, from_env) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(dir)) if !dir.is_empty() => PathBuf::from(dir),
        _ => default_base_dir(),
    }
}
