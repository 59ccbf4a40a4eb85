//! Scheduler configuration.
//!
//! Empirically chosen constants (weighted-selection grouping window, watchdog
//! timeout multiple) are tunables here rather than hard-coded invariants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaskweaveError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed-delay polling cadence of the driver loop, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Trigger-time bucket width for weighted tie-break grouping, in seconds.
    #[serde(default = "default_weight_group_window")]
    pub weight_group_window_secs: u64,

    /// Movement watchdog tick, in milliseconds (one game tick by default).
    #[serde(default = "default_watchdog_tick")]
    pub watchdog_tick_ms: u64,

    /// Stall timeout expressed as a multiple of the watchdog tick.
    #[serde(default = "default_watchdog_timeout_ticks")]
    pub watchdog_timeout_ticks: u32,

    /// Movement smaller than this tile radius does not count as progress.
    #[serde(default = "default_stall_radius")]
    pub stall_area_radius: i32,

    /// Per-call attempt cap for world relocation.
    #[serde(default = "default_hop_attempts")]
    pub max_hop_attempts_per_world: u32,

    /// Base delay for hop retry backoff, in milliseconds.
    #[serde(default = "default_hop_base_delay")]
    pub hop_base_delay_ms: u64,

    /// Ceiling for the exponential hop retry delay, in milliseconds.
    #[serde(default = "default_hop_max_delay")]
    pub hop_max_delay_ms: u64,
}

fn default_poll_interval() -> u64 { 1 }
fn default_weight_group_window() -> u64 { 300 }
fn default_watchdog_tick() -> u64 { 600 }
fn default_watchdog_timeout_ticks() -> u32 { 10 }
fn default_stall_radius() -> i32 { 2 }
fn default_hop_attempts() -> u32 { 3 }
fn default_hop_base_delay() -> u64 { 1_000 }
fn default_hop_max_delay() -> u64 { 30_000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            weight_group_window_secs: default_weight_group_window(),
            watchdog_tick_ms: default_watchdog_tick(),
            watchdog_timeout_ticks: default_watchdog_timeout_ticks(),
            stall_area_radius: default_stall_radius(),
            max_hop_attempts_per_world: default_hop_attempts(),
            hop_base_delay_ms: default_hop_base_delay(),
            hop_max_delay_ms: default_hop_max_delay(),
        }
    }
}

impl SchedulerConfig {
    /// Load from the default path, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TaskweaveError::Config(format!("failed to parse config: {e}")))?;
        Ok(config.normalized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| TaskweaveError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config path (~/.taskweave/config.toml).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Taskweave home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskweave")
    }

    /// Clamp nonsensical user input instead of raising; bad values come from
    /// hand-edited files.
    pub fn normalized(mut self) -> Self {
        if self.poll_interval_secs == 0 {
            tracing::warn!("poll_interval_secs of 0 clamped to 1");
            self.poll_interval_secs = 1;
        }
        if self.watchdog_tick_ms == 0 {
            self.watchdog_tick_ms = default_watchdog_tick();
        }
        if self.watchdog_timeout_ticks < 2 {
            tracing::warn!(
                "watchdog_timeout_ticks {} too aggressive, clamped to 2",
                self.watchdog_timeout_ticks
            );
            self.watchdog_timeout_ticks = 2;
        }
        if self.stall_area_radius < 0 {
            self.stall_area_radius = 0;
        }
        if self.max_hop_attempts_per_world == 0 {
            self.max_hop_attempts_per_world = 1;
        }
        if self.hop_max_delay_ms < self.hop_base_delay_ms {
            self.hop_max_delay_ms = self.hop_base_delay_ms;
        }
        self
    }

    /// Stall timeout in milliseconds (tick × multiple).
    pub fn watchdog_timeout_ms(&self) -> u64 {
        self.watchdog_tick_ms * u64::from(self.watchdog_timeout_ticks)
    }
}
