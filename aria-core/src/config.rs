use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AriaConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub habits: HabitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HabitConfig {
    /// Minimum occurrence count before an intent is promoted to a habit.
    pub threshold: i64,
    /// Confidence stored on an intent when the caller supplies none.
    pub default_confidence: f64,
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            default_confidence: 0.9,
        }
    }
}

impl HabitConfig {
    /// A threshold below 1 would promote intents never observed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold < 1 {
            return Err(ConfigError::Message(format!(
                "habits.threshold must be at least 1, got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::Message(format!(
                "habits.default_confidence must be within [0, 1], got {}",
                self.default_confidence
            )));
        }
        Ok(())
    }
}

impl AriaConfig {
    /// Load from a TOML file, then overlay `ARIA__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("ARIA").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.habits.validate()?;
        Ok(config)
    }

    /// Configuration for an in-process run with no database.
    pub fn in_memory() -> Self {
        Self {
            service: ServiceConfig {
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            http: HttpConfig::default(),
            habits: HabitConfig::default(),
        }
    }
}
