use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub instance: InstanceConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    /// Base URL of the Piped instance API (no trailing slash required).
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Playlist bucketing strategy: one playlist per month or per ISO week.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Month,
    Week,
}

/// How the oldest-allowed horizon is derived.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// A sliding window ending at the start of today.
    Duration,
    /// A fixed calendar date.
    Date,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Day,
    Month,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default = "default_playlist_prefix")]
    pub playlist_prefix: String,
    #[serde(default = "default_window")]
    pub window: WindowMode,
    /// Fixed horizon date; required (and only read) when `window = "date"`.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: DurationConfig,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DurationConfig {
    #[serde(default = "default_duration_unit")]
    pub unit: DurationUnit,
    #[serde(default = "default_duration_value")]
    pub value: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            playlist_prefix: default_playlist_prefix(),
            window: default_window(),
            date: None,
            duration: DurationConfig::default(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            unit: default_duration_unit(),
            value: default_duration_value(),
        }
    }
}

fn default_strategy() -> Strategy {
    Strategy::Month
}
fn default_playlist_prefix() -> String {
    "PF - ".to_string()
}
fn default_window() -> WindowMode {
    WindowMode::Duration
}
fn default_duration_unit() -> DurationUnit {
    DurationUnit::Month
}
fn default_duration_value() -> u32 {
    1
}
fn default_parallelism() -> usize {
    4
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.instance.base_url.trim().is_empty() {
        anyhow::bail!("instance.base_url must not be empty");
    }
    if config.instance.username.trim().is_empty() || config.instance.password.trim().is_empty() {
        anyhow::bail!("instance.username and instance.password must be set");
    }

    if !(1..=12).contains(&config.sync.duration.value) {
        anyhow::bail!("sync.duration.value must be in [1, 12]");
    }

    if config.sync.window == WindowMode::Date {
        let date = config
            .sync
            .date
            .context("sync.date must be set when sync.window is \"date\"")?;
        if date > Local::now().date_naive() {
            anyhow::bail!("sync.date must not be in the future");
        }
    }

    if config.sync.parallelism == 0 {
        anyhow::bail!("sync.parallelism must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"
[instance]
base_url = "https://piped.example.org"
username = "user"
password = "secret"

[db]
path = "./feedmirror.sqlite"
{extra}
"#
        )
    }

    #[test]
    fn defaults_applied() {
        let config = parse_config(&minimal("")).unwrap();
        assert_eq!(config.sync.strategy, Strategy::Month);
        assert_eq!(config.sync.playlist_prefix, "PF - ");
        assert_eq!(config.sync.window, WindowMode::Duration);
        assert_eq!(config.sync.duration.unit, DurationUnit::Month);
        assert_eq!(config.sync.duration.value, 1);
        assert_eq!(config.sync.parallelism, 4);
    }

    #[test]
    fn duration_value_bounds() {
        let err = parse_config(&minimal("[sync.duration]\nvalue = 0\n")).unwrap_err();
        assert!(err.to_string().contains("[1, 12]"));
        let err = parse_config(&minimal("[sync.duration]\nvalue = 13\n")).unwrap_err();
        assert!(err.to_string().contains("[1, 12]"));
        assert!(parse_config(&minimal("[sync.duration]\nvalue = 12\n")).is_ok());
    }

    #[test]
    fn date_window_requires_date() {
        let err = parse_config(&minimal("[sync]\nwindow = \"date\"\n")).unwrap_err();
        assert!(err.to_string().contains("sync.date"));
    }

    #[test]
    fn date_window_rejects_future() {
        let err =
            parse_config(&minimal("[sync]\nwindow = \"date\"\ndate = \"2999-01-01\"\n"))
                .unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn date_window_accepts_past_date() {
        let config =
            parse_config(&minimal("[sync]\nwindow = \"date\"\ndate = \"2024-01-01\"\n")).unwrap();
        assert_eq!(
            config.sync.date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn unparsable_date_is_fatal() {
        assert!(parse_config(&minimal("[sync]\nwindow = \"date\"\ndate = \"01/01/2024\"\n"))
            .is_err());
    }

    #[test]
    fn empty_credentials_rejected() {
        let content = r#"
[instance]
base_url = "https://piped.example.org"
username = ""
password = "secret"

[db]
path = "./feedmirror.sqlite"
"#;
        assert!(parse_config(content).is_err());
    }
}
