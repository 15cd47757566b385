//! Sticky configuration system.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StickyError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StickyConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub event: EventConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl StickyConfig {
    /// Load config from the default path (~/.sticky/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StickyError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| StickyError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.progress.unit_size == 0 {
            return Err(StickyError::Config("progress.unit_size must be > 0".into()));
        }
        if self.event.tick_secs == 0 {
            return Err(StickyError::Config("event.tick_secs must be > 0".into()));
        }
        if self.event.lead_times.is_empty() {
            tracing::warn!("⚠️ event.lead_times is empty, reminders fall back to 5 and 1 minutes");
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Sticky home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sticky")
    }
}

/// Where the state store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.sticky/sticky.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// The event day and reminder timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Day every slot time refers to.
    #[serde(default = "default_event_date")]
    pub date: NaiveDate,
    /// Minutes before a slot at which reminders fire.
    #[serde(default = "default_lead_times")]
    pub lead_times: Vec<u32>,
    /// Timer loop resolution.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Reminders overdue by more than this are dropped, not sent.
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: u64,
}

fn default_event_date() -> NaiveDate { chrono::Local::now().date_naive() }
fn default_lead_times() -> Vec<u32> { vec![5, 1] }
fn default_tick_secs() -> u64 { 1 }
fn default_misfire_grace_secs() -> u64 { 60 }

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            date: default_event_date(),
            lead_times: default_lead_times(),
            tick_secs: default_tick_secs(),
            misfire_grace_secs: default_misfire_grace_secs(),
        }
    }
}

/// Progress bitmask shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Cells unlocked together by one unlock command.
    #[serde(default = "default_unit_size")]
    pub unit_size: usize,
    /// Cells per group (one per content item).
    #[serde(default = "default_total_items")]
    pub total_items: usize,
}

fn default_unit_size() -> usize { 8 }
fn default_total_items() -> usize { 88 }

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            unit_size: default_unit_size(),
            total_items: default_total_items(),
        }
    }
}
