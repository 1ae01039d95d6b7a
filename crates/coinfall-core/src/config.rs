//! RON configuration for every coinfall component
//!
//! Every field has a default, so an empty `()` document is a valid config.
//! Enum-like values that operators type by hand (reset cadence, world mode)
//! are kept as strings here and interpreted leniently by their consumers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Sweep cadence, expiry, culling and stacking
    #[serde(default)]
    pub optimization: OptimizationConfig,
    /// Floating amount labels
    #[serde(default)]
    pub labels: LabelConfig,
    /// Placed-block ledger
    #[serde(default)]
    pub anti_duplication: AntiDuplicationConfig,
    /// Earnings statistics and their scheduled reset
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// Which worlds the plugin is active in
    #[serde(default)]
    pub worlds: WorldsConfig,
    /// Drop amounts and chances
    #[serde(default)]
    pub drops: DropsConfig,
    /// Embedded database location
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron(&content)
    }

    /// Parse configuration from a RON document
    pub fn from_ron(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

/// Optimizer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizationConfig {
    /// Merge nearby currency entities
    #[serde(default = "default_true")]
    pub stack_currency: bool,
    /// Merge radius in blocks
    #[serde(default = "default_stack_radius")]
    pub stack_radius: f64,
    /// Lifetime of an unclaimed currency entity in seconds
    #[serde(default = "default_despawn_time")]
    pub despawn_time_secs: u64,
    /// Names are hidden when no observer is closer than this
    #[serde(default = "default_hide_distance")]
    pub hide_distance: f64,
    /// Interval between sweeps in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

fn default_true() -> bool {
    true
}

fn default_stack_radius() -> f64 {
    3.0
}

fn default_despawn_time() -> u64 {
    300
}

fn default_hide_distance() -> f64 {
    15.0
}

fn default_sweep_interval() -> u64 {
    2000
}

impl OptimizationConfig {
    pub fn despawn_time(&self) -> Duration {
        Duration::from_secs(self.despawn_time_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            stack_currency: true,
            stack_radius: default_stack_radius(),
            despawn_time_secs: default_despawn_time(),
            hide_distance: default_hide_distance(),
            sweep_interval_ms: default_sweep_interval(),
            performance: PerformanceConfig::default(),
        }
    }
}

/// Per-sweep work caps
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceConfig {
    /// Entities visited per sweep
    #[serde(default = "default_max_items")]
    pub max_items_per_sweep: usize,
    /// Comparisons per stacking scan
    #[serde(default = "default_max_stack_checks")]
    pub max_stack_checks: usize,
    /// Entities absorbed per merge
    #[serde(default = "default_max_stack_size")]
    pub max_stack_size: usize,
    /// Tracked count that triggers an advisory log line, 0 disables
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: usize,
}

fn default_max_items() -> usize {
    50
}

fn default_max_stack_checks() -> usize {
    10
}

fn default_max_stack_size() -> usize {
    5
}

fn default_warning_threshold() -> usize {
    200
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_items_per_sweep: default_max_items(),
            max_stack_checks: default_max_stack_checks(),
            max_stack_size: default_max_stack_size(),
            warning_threshold: default_warning_threshold(),
        }
    }
}

/// Label settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Vertical offset above the currency entity
    #[serde(default = "default_label_height")]
    pub height: f64,
    /// Glyph appended after the amount
    #[serde(default = "default_glyph")]
    pub glyph: String,
}

fn default_label_height() -> f64 {
    0.5
}

fn default_glyph() -> String {
    "⛃".to_string()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height: default_label_height(),
            glyph: default_glyph(),
        }
    }
}

/// Placed-block ledger settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AntiDuplicationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keep the ledger across restarts
    #[serde(default)]
    pub persist_data: bool,
    /// Soft cap on tracked blocks
    #[serde(default = "default_max_tracked")]
    pub max_tracked_blocks: usize,
    /// Minutes between cleanup passes, 0 disables the job
    #[serde(default = "default_cleanup_interval")]
    pub auto_cleanup_interval_mins: u64,
    /// Records older than this many minutes are pruned, 0 or less disables
    #[serde(default = "default_max_block_age")]
    pub max_block_age_mins: i64,
    /// Share of records evicted when the cap is exceeded
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

fn default_max_tracked() -> usize {
    50_000
}

fn default_cleanup_interval() -> u64 {
    120
}

fn default_max_block_age() -> i64 {
    240
}

fn default_eviction_fraction() -> f64 {
    0.2
}

impl AntiDuplicationConfig {
    /// Maximum record age in milliseconds, `None` when pruning is disabled
    pub fn max_age_millis(&self) -> Option<i64> {
        (self.max_block_age_mins > 0).then(|| self.max_block_age_mins.saturating_mul(60_000))
    }

    /// Cleanup cadence, `None` when the job is disabled
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.auto_cleanup_interval_mins > 0)
            .then(|| Duration::from_secs(self.auto_cleanup_interval_mins * 60))
    }
}

impl Default for AntiDuplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist_data: false,
            max_tracked_blocks: default_max_tracked(),
            auto_cleanup_interval_mins: default_cleanup_interval(),
            max_block_age_mins: default_max_block_age(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

/// Statistics reset settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatisticsConfig {
    #[serde(default = "default_true")]
    pub reset_enabled: bool,
    /// `DAILY`, `WEEKLY` or `MONTHLY`
    #[serde(default = "default_reset_type")]
    pub reset_type: String,
    /// Local time of day, `HH:MM`
    #[serde(default = "default_reset_time")]
    pub reset_time: String,
}

fn default_reset_type() -> String {
    "DAILY".to_string()
}

fn default_reset_time() -> String {
    "00:00".to_string()
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            reset_enabled: true,
            reset_type: default_reset_type(),
            reset_time: default_reset_time(),
        }
    }
}

/// World filter settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldsConfig {
    /// `all`, `whitelist` or `blacklist`
    #[serde(default = "default_world_mode")]
    pub mode: String,
    #[serde(default)]
    pub list: Vec<String>,
}

fn default_world_mode() -> String {
    "all".to_string()
}

impl Default for WorldsConfig {
    fn default() -> Self {
        Self {
            mode: default_world_mode(),
            list: Vec::new(),
        }
    }
}

/// Drop tables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DropsConfig {
    /// Amount used when a kind has no rule, `"min-max"` or `"n"`
    #[serde(default = "default_amount")]
    pub default_amount: String,
    /// Percent chance used when a kind has no rule
    #[serde(default = "default_chance")]
    pub default_chance: u32,
    /// Rules keyed by lowercase mob kind
    #[serde(default)]
    pub mobs: HashMap<String, DropRuleConfig>,
    /// Rules keyed by lowercase block kind
    #[serde(default)]
    pub blocks: HashMap<String, DropRuleConfig>,
}

fn default_amount() -> String {
    "1-2".to_string()
}

fn default_chance() -> u32 {
    100
}

impl Default for DropsConfig {
    fn default() -> Self {
        Self {
            default_amount: default_amount(),
            default_chance: default_chance(),
            mobs: HashMap::new(),
            blocks: HashMap::new(),
        }
    }
}

/// A single drop rule; missing fields fall back to the table defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DropRuleConfig {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub chance: Option<u32>,
}

/// Embedded database settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "coinfall.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_ron("()").unwrap();
        assert!(config.optimization.stack_currency);
        assert_eq!(config.optimization.stack_radius, 3.0);
        assert_eq!(config.optimization.despawn_time(), Duration::from_secs(300));
        assert_eq!(config.optimization.sweep_interval(), Duration::from_secs(2));
        assert_eq!(config.optimization.performance.max_items_per_sweep, 50);
        assert_eq!(config.labels.glyph, "⛃");
        assert_eq!(config.anti_duplication.max_tracked_blocks, 50_000);
        assert_eq!(config.anti_duplication.eviction_fraction, 0.2);
        assert_eq!(config.statistics.reset_type, "DAILY");
        assert_eq!(config.worlds.mode, "all");
        assert_eq!(config.drops.default_amount, "1-2");
    }

    #[test]
    fn test_partial_document() {
        let config = Config::from_ron(
            r#"(
                optimization: (
                    stack_radius: 5.0,
                    performance: (max_stack_size: 8),
                ),
                anti_duplication: (persist_data: true, max_block_age_mins: 0),
                statistics: (reset_type: "WEEKLY", reset_time: "06:30"),
                drops: (
                    mobs: { "zombie": (amount: Some("2-4"), chance: Some(50)) },
                ),
            )"#,
        )
        .unwrap();

        assert_eq!(config.optimization.stack_radius, 5.0);
        assert_eq!(config.optimization.despawn_time_secs, 300);
        assert_eq!(config.optimization.performance.max_stack_size, 8);
        assert_eq!(config.optimization.performance.max_stack_checks, 10);
        assert!(config.anti_duplication.persist_data);
        assert_eq!(config.anti_duplication.max_age_millis(), None);
        assert_eq!(config.statistics.reset_time, "06:30");
        assert_eq!(config.drops.mobs["zombie"].chance, Some(50));
    }

    #[test]
    fn test_anti_duplication_durations() {
        let config = AntiDuplicationConfig::default();
        assert_eq!(config.max_age_millis(), Some(240 * 60_000));
        assert_eq!(config.cleanup_interval(), Some(Duration::from_secs(7200)));

        let disabled = AntiDuplicationConfig {
            auto_cleanup_interval_mins: 0,
            max_block_age_mins: -5,
            ..AntiDuplicationConfig::default()
        };
        assert_eq!(disabled.max_age_millis(), None);
        assert_eq!(disabled.cleanup_interval(), None);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            Config::from_ron("(optimization: 3)"),
            Err(Error::ConfigParse(_))
        ));
    }
}
