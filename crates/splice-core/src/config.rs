//! Configuration management for Splice.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cherry_pick::EmptyStrategy;
use crate::error::Result;

/// Splice configuration loaded from `.git/splice/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Cherry-pick settings.
    #[serde(default)]
    pub cherry_pick: CherryPickConfig,

    /// Merge settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Rebase settings.
    #[serde(default)]
    pub rebase: RebaseConfig,
}

impl Config {
    /// Location of the config file inside a git directory.
    #[must_use]
    pub fn path_in(git_dir: &Path) -> PathBuf {
        git_dir.join("splice").join("config.toml")
    }

    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Cherry-pick settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CherryPickConfig {
    /// What to do when a picked commit brings no changes.
    #[serde(default)]
    pub empty: EmptyStrategy,
}

/// Merge settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    /// Default message for merge commits; `{source}` is replaced by the
    /// merged branch name.
    #[serde(default = "default_merge_message")]
    pub message: String,
}

impl MergeConfig {
    /// Render the merge message for a source branch.
    #[must_use]
    pub fn message_for(&self, source: &str) -> String {
        self.message.replace("{source}", source)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            message: default_merge_message(),
        }
    }
}

fn default_merge_message() -> String {
    "Merge branch '{source}'".into()
}

/// Rebase settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebaseConfig {
    /// Reorder `fixup!`/`squash!` commits in the default todo.
    #[serde(default)]
    pub autosquash: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cherry_pick.empty, EmptyStrategy::Stop);
        assert_eq!(config.merge.message, "Merge branch '{source}'");
        assert!(!config.rebase.autosquash);
    }

    #[test]
    fn test_load_config_file() {
        let temp = TempDir::new().unwrap();
        let path = Config::path_in(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[cherry_pick]\nempty = \"keep\"\n\n[merge]\nmessage = \"Integrate {source}\"\n\n[rebase]\nautosquash = true\n",
        )
        .unwrap();

        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.cherry_pick.empty, EmptyStrategy::Keep);
        assert_eq!(loaded.merge.message_for("topic"), "Integrate topic");
        assert!(loaded.rebase.autosquash);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[cherry_pick]\nempty = \"sometimes\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(crate::Error::Toml(_))));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[cherry_pick]\nempty = \"drop\"\n").unwrap();
        assert_eq!(config.cherry_pick.empty, EmptyStrategy::Drop);
        assert!(!config.rebase.autosquash);
        assert_eq!(config.merge.message_for("x"), "Merge branch 'x'");
    }

    #[test]
    fn test_missing_config_returns_default() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.cherry_pick.empty, EmptyStrategy::Stop);
    }
}
