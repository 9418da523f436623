//! # Spawner Configuration
//!
//! Static input consumed once when the coordinator starts. Loaded from TOML:
//!
//! ```toml
//! [settings]
//! max_active = 20
//! lifetime_secs = 30.0
//! seed = 7
//!
//! [controller]
//! prototype = "controller"
//! initial_size = 20
//! max_size = 50
//!
//! [[category]]
//! category = "farm"
//! prototype = "slime"
//! initial_pool_size = 10
//! max_pool_size = 30
//! ```
//!
//! Every field has a default, so a table can be left out entirely.

use respawn_core::PoolConfig;
use respawn_shared::constants::{
    CATEGORY_INITIAL_SIZE, CATEGORY_MAX_SIZE, CONTROLLER_INITIAL_SIZE, CONTROLLER_MAX_SIZE,
    DEFAULT_CREATION_BATCH, INITIAL_POOL_SIZE_RANGE, MAINTENANCE_INTERVAL_SECS,
    MAX_POOL_SIZE_RANGE, MAX_TIMER_SECS, SPAWN_INTERVAL_SECS,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Coordinator-wide tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Cap on simultaneously active pairs. `None` means unlimited.
    pub max_active: Option<usize>,
    /// Seconds before an active pair is auto-returned. `None` disables expiry.
    pub lifetime_secs: Option<f32>,
    /// Seconds between spawn-loop attempts.
    pub spawn_interval_secs: f32,
    /// Seconds between maintenance reports.
    pub maintenance_interval_secs: f32,
    /// Whether maintenance reports are logged.
    pub enable_pool_stats: bool,
    /// Instances created per tick while prewarming.
    pub creation_batch: usize,
    /// Seed for category and spawn-point selection.
    pub seed: u64,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            max_active: None,
            lifetime_secs: None,
            spawn_interval_secs: SPAWN_INTERVAL_SECS,
            maintenance_interval_secs: MAINTENANCE_INTERVAL_SECS,
            enable_pool_stats: true,
            creation_batch: DEFAULT_CREATION_BATCH,
            seed: 0,
        }
    }
}

impl SpawnSettings {
    /// Spawn-loop period.
    #[must_use]
    pub fn spawn_interval(&self) -> Duration {
        seconds(self.spawn_interval_secs)
    }

    /// Maintenance period.
    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        seconds(self.maintenance_interval_secs)
    }

    /// Pair lifetime, if expiry is enabled.
    #[must_use]
    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime_secs.map(seconds)
    }
}

/// Unvalidated values are clamped into `[0, MAX_TIMER_SECS]`; NaN maps to zero.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.clamp(0.0, MAX_TIMER_SECS)).unwrap_or(Duration::ZERO)
}

/// The controller pool tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Catalog name of the controller prototype.
    pub prototype: String,
    /// Controllers prewarmed at startup.
    pub initial_size: usize,
    /// Hard cap on controllers.
    pub max_size: usize,
    /// Whether the controller pool may grow on demand.
    pub allow_growth: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            prototype: "controller".to_owned(),
            initial_size: CONTROLLER_INITIAL_SIZE,
            max_size: CONTROLLER_MAX_SIZE,
            allow_growth: true,
        }
    }
}

impl ControllerConfig {
    /// Pool configuration for the controller tier.
    #[must_use]
    pub fn pool_config(&self, creation_batch: usize) -> PoolConfig {
        PoolConfig::new(self.initial_size, self.max_size, self.allow_growth)
            .with_creation_batch(creation_batch)
    }
}

/// One actor prototype offered under a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig<C> {
    /// Category tag (level, biome, faction...).
    pub category: C,
    /// Catalog name of the actor prototype.
    pub prototype: String,
    /// Instances prewarmed at startup.
    #[serde(default = "default_initial_pool_size")]
    pub initial_pool_size: usize,
    /// Hard cap on instances.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
    /// Whether the pool may grow on demand.
    #[serde(default = "default_true")]
    pub allow_pool_growth: bool,
    /// Whether pairs built on this actor expire after the configured lifetime.
    #[serde(default = "default_true")]
    pub auto_return_on_expiry: bool,
    /// Whether the actor's motion is zeroed when it is returned.
    #[serde(default = "default_true")]
    pub reset_on_return: bool,
}

const fn default_initial_pool_size() -> usize {
    CATEGORY_INITIAL_SIZE
}

const fn default_max_pool_size() -> usize {
    CATEGORY_MAX_SIZE
}

const fn default_true() -> bool {
    true
}

impl<C> CategoryConfig<C> {
    /// Entry with default sizes and flags.
    pub fn new(category: C, prototype: impl Into<String>) -> Self {
        Self {
            category,
            prototype: prototype.into(),
            initial_pool_size: CATEGORY_INITIAL_SIZE,
            max_pool_size: CATEGORY_MAX_SIZE,
            allow_pool_growth: true,
            auto_return_on_expiry: true,
            reset_on_return: true,
        }
    }

    /// Overrides the pool sizes.
    #[must_use]
    pub fn with_sizes(mut self, initial_pool_size: usize, max_pool_size: usize) -> Self {
        self.initial_pool_size = initial_pool_size;
        self.max_pool_size = max_pool_size;
        self
    }

    /// Pool configuration for this entry.
    #[must_use]
    pub fn pool_config(&self, creation_batch: usize) -> PoolConfig {
        PoolConfig::new(
            self.initial_pool_size,
            self.max_pool_size,
            self.allow_pool_growth,
        )
        .with_creation_batch(creation_batch)
    }
}

/// Complete spawner configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnerConfig<C> {
    /// Coordinator-wide tuning.
    #[serde(default)]
    pub settings: SpawnSettings,
    /// The controller tier.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Actor entries in declaration order.
    #[serde(default = "Vec::new", rename = "category")]
    pub categories: Vec<CategoryConfig<C>>,
}

impl<C> Default for SpawnerConfig<C> {
    fn default() -> Self {
        Self {
            settings: SpawnSettings::default(),
            controller: ControllerConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl<C: DeserializeOwned> SpawnerConfig<C> {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, otherwise whatever
    /// [`SpawnerConfig::validate`] reports.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, then as
    /// [`SpawnerConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            categories = config.categories.len(),
            "spawner config loaded"
        );
        Ok(config)
    }
}

impl<C> SpawnerConfig<C> {
    /// Checks ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// The first problem found, as [`ConfigError::OutOfRange`] or
    /// [`ConfigError::Inconsistent`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;
        check_seconds("settings.spawn_interval_secs", settings.spawn_interval_secs)?;
        check_seconds(
            "settings.maintenance_interval_secs",
            settings.maintenance_interval_secs,
        )?;
        if let Some(lifetime) = settings.lifetime_secs {
            check_seconds("settings.lifetime_secs", lifetime)?;
        }
        if settings.creation_batch == 0 {
            return Err(ConfigError::Inconsistent(
                "settings.creation_batch must be at least 1".into(),
            ));
        }
        if settings.max_active == Some(0) {
            return Err(ConfigError::Inconsistent(
                "settings.max_active of 0 would never spawn, leave it out for no cap".into(),
            ));
        }

        let controller = &self.controller;
        if controller.prototype.is_empty() {
            return Err(ConfigError::Inconsistent(
                "controller.prototype is empty".into(),
            ));
        }
        if controller.max_size == 0 || controller.initial_size > controller.max_size {
            return Err(ConfigError::Inconsistent(format!(
                "controller.initial_size {} with controller.max_size {}",
                controller.initial_size, controller.max_size
            )));
        }

        for (index, entry) in self.categories.iter().enumerate() {
            check_range(
                format!("category[{index}].initial_pool_size"),
                entry.initial_pool_size,
                INITIAL_POOL_SIZE_RANGE,
            )?;
            check_range(
                format!("category[{index}].max_pool_size"),
                entry.max_pool_size,
                MAX_POOL_SIZE_RANGE,
            )?;
            if entry.initial_pool_size > entry.max_pool_size {
                return Err(ConfigError::Inconsistent(format!(
                    "category[{index}] initial_pool_size {} exceeds max_pool_size {}",
                    entry.initial_pool_size, entry.max_pool_size
                )));
            }
            if entry.prototype.is_empty() {
                return Err(ConfigError::Inconsistent(format!(
                    "category[{index}].prototype is empty"
                )));
            }
        }
        Ok(())
    }
}

fn check_range(field: String, value: usize, (min, max): (usize, usize)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_seconds(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= MAX_TIMER_SECS {
        Ok(())
    } else {
        Err(ConfigError::Inconsistent(format!(
            "{field} must be between 0 and {MAX_TIMER_SECS} seconds, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Zone {
        Swamp,
        Tundra,
    }

    #[test]
    fn test_defaults_fill_missing_tables() {
        let config: SpawnerConfig<Zone> = SpawnerConfig::from_toml_str(
            r#"
            [[category]]
            category = "swamp"
            prototype = "frog"
            "#,
        )
        .unwrap();

        assert_eq!(config.settings, SpawnSettings::default());
        assert_eq!(config.controller, ControllerConfig::default());
        assert_eq!(config.categories.len(), 1);

        let entry = &config.categories[0];
        assert_eq!(entry.category, Zone::Swamp);
        assert_eq!(entry.initial_pool_size, 10);
        assert_eq!(entry.max_pool_size, 30);
        assert!(entry.allow_pool_growth);
        assert!(entry.auto_return_on_expiry);
        assert!(entry.reset_on_return);
    }

    #[test]
    fn test_full_document() {
        let config: SpawnerConfig<Zone> = SpawnerConfig::from_toml_str(
            r#"
            [settings]
            max_active = 12
            lifetime_secs = 8.5
            spawn_interval_secs = 0.5
            enable_pool_stats = false
            creation_batch = 3
            seed = 99

            [controller]
            prototype = "brain"
            initial_size = 4
            max_size = 12
            allow_growth = false

            [[category]]
            category = "swamp"
            prototype = "frog"
            initial_pool_size = 5
            max_pool_size = 10
            reset_on_return = false

            [[category]]
            category = "tundra"
            prototype = "yeti"
            auto_return_on_expiry = false
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.max_active, Some(12));
        assert_eq!(config.settings.lifetime(), Some(Duration::from_secs_f32(8.5)));
        assert_eq!(config.settings.creation_batch, 3);
        assert_eq!(config.controller.prototype, "brain");
        assert!(!config.controller.allow_growth);
        assert!(!config.categories[0].reset_on_return);
        assert_eq!(config.categories[1].category, Zone::Tundra);
        assert!(!config.categories[1].auto_return_on_expiry);

        let pool = config.categories[0].pool_config(config.settings.creation_batch);
        assert_eq!(pool, PoolConfig::new(5, 10, true).with_creation_batch(3));
    }

    #[test]
    fn test_out_of_range_sizes_are_rejected() {
        let err = SpawnerConfig::<Zone>::from_toml_str(
            r#"
            [[category]]
            category = "swamp"
            prototype = "frog"
            initial_pool_size = 4
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { value: 4, min: 5, max: 50, .. }
        ));

        let err = SpawnerConfig::<Zone>::from_toml_str(
            r#"
            [[category]]
            category = "swamp"
            prototype = "frog"
            max_pool_size = 101
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { value: 101, .. }));
    }

    #[test]
    fn test_inconsistent_values_are_rejected() {
        let mut config = SpawnerConfig {
            categories: vec![CategoryConfig::new(Zone::Swamp, "frog").with_sizes(40, 20)],
            ..SpawnerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));

        config.categories.clear();
        config.settings.spawn_interval_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));

        config.settings = SpawnSettings {
            max_active: Some(0),
            ..SpawnSettings::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_timers_are_rejected() {
        let config = SpawnerConfig::<Zone> {
            settings: SpawnSettings {
                lifetime_secs: Some(1e20),
                ..SpawnSettings::default()
            },
            ..SpawnerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));

        let config = SpawnerConfig::<Zone> {
            settings: SpawnSettings {
                spawn_interval_secs: f32::MAX,
                ..SpawnSettings::default()
            },
            ..SpawnerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unvalidated_timers_never_panic() {
        let settings = SpawnSettings {
            lifetime_secs: Some(1e20),
            spawn_interval_secs: f32::NAN,
            maintenance_interval_secs: -3.0,
            ..SpawnSettings::default()
        };
        assert_eq!(
            settings.lifetime(),
            Some(Duration::from_secs_f32(MAX_TIMER_SECS))
        );
        assert_eq!(settings.spawn_interval(), Duration::ZERO);
        assert_eq!(settings.maintenance_interval(), Duration::ZERO);
    }

    #[test]
    fn test_unknown_category_tag_is_a_parse_error() {
        let err = SpawnerConfig::<Zone>::from_toml_str(
            r#"
            [[category]]
            category = "desert"
            prototype = "scorpion"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SpawnerConfig::<Zone>::load("definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
