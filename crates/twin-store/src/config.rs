//! Data directory layout and `config.toml`.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use twin_core::{DEFAULT_THRESHOLD, PolicyConfig, THRESHOLD_SETTING_KEY};

use crate::error::{Result, StoreError};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TWIN_DATA_DIR";

pub const CONFIG_FILE: &str = "config.toml";

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// `$TWIN_DATA_DIR`, else `~/.twin-finder`.
pub fn default_data_dir() -> PathBuf {
    match env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".twin-finder"),
    }
}

/// What the host does with reports arriving on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Archive,
    Compare,
    Notification,
}

/// One channel id or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChannelIds {
    One(String),
    Many(Vec<String>),
}

impl ChannelIds {
    pub fn contains(&self, channel: &str) -> bool {
        match self {
            ChannelIds::One(id) => id == channel,
            ChannelIds::Many(ids) => ids.iter().any(|id| id == channel),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Channels {
    pub database: Option<ChannelIds>,
    pub comparison: Option<ChannelIds>,
    pub notification: Option<ChannelIds>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwinConfig {
    /// Threshold used until one is persisted.
    pub default_threshold: f64,
    /// Whether emitted reports should carry link descriptions.
    pub ai_links: bool,
    pub channels: Channels,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            ai_links: true,
            channels: Channels::default(),
        }
    }
}

impl TwinConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        if !(0.0..=100.0).contains(&config.default_threshold) {
            return Err(StoreError::Config(format!(
                "default_threshold must be between 0 and 100, got {}",
                config.default_threshold
            )));
        }
        Ok(config)
    }

    /// Load `<dir>/config.toml`. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content)
                .map_err(|e| StoreError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Role of `channel`. Archive wins over compare when a channel is listed
    /// under both.
    pub fn role_for(&self, channel: &str) -> Option<Role> {
        let listed = |ids: &Option<ChannelIds>| ids.as_ref().is_some_and(|ids| ids.contains(channel));
        if listed(&self.channels.database) {
            Some(Role::Archive)
        } else if listed(&self.channels.comparison) {
            Some(Role::Compare)
        } else if listed(&self.channels.notification) {
            Some(Role::Notification)
        } else {
            None
        }
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            default_threshold: self.default_threshold,
            threshold_key: THRESHOLD_SETTING_KEY.to_string(),
            describe_links: self.ai_links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TwinConfig::parse("").unwrap();
        assert_eq!(config, TwinConfig::default());
        assert_eq!(config.default_threshold, 70.0);
        assert!(config.ai_links);
        assert_eq!(config.role_for("-1001"), None);
    }

    #[test]
    fn test_full_file() {
        let config = TwinConfig::parse(
            r#"
default_threshold = 65.5
ai_links = false

[channels]
database = "-1001"
comparison = ["-1002", "-1004"]
notification = "-1003"
"#,
        )
        .unwrap();
        assert_eq!(config.default_threshold, 65.5);
        assert_eq!(config.role_for("-1001"), Some(Role::Archive));
        assert_eq!(config.role_for("-1004"), Some(Role::Compare));
        assert_eq!(config.role_for("-1003"), Some(Role::Notification));
        assert_eq!(config.role_for("-9"), None);

        let policy = config.policy_config();
        assert_eq!(policy.default_threshold, 65.5);
        assert!(!policy.describe_links);
        assert_eq!(policy.threshold_key, THRESHOLD_SETTING_KEY);
    }

    #[test]
    fn test_archive_wins_over_compare() {
        let config = TwinConfig::parse("[channels]\ndatabase = \"x\"\ncomparison = \"x\"").unwrap();
        assert_eq!(config.role_for("x"), Some(Role::Archive));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        assert!(matches!(
            TwinConfig::parse("default_threshold = 120.0"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_key() {
        assert!(matches!(
            TwinConfig::parse("threshold = 50.0"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(TwinConfig::load(dir.path()).unwrap(), TwinConfig::default());

        fs::write(dir.path().join(CONFIG_FILE), "ai_links = \"yes\"").unwrap();
        let err = TwinConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
