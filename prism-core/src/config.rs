use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct PrismConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default)]
    pub backend: StorageBackend,
}

/// EMA parameters for preference folding.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub initial_confidence: f64,
    pub confidence_step: f64,
    pub max_confidence: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            initial_confidence: 0.1,
            confidence_step: 0.1,
            max_confidence: 0.95,
        }
    }
}

/// Weights used when turning known preferences into a score adjustment.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub confidence_threshold: f64,
    pub author_weight: f64,
    pub topic_weight: f64,
    pub content_type_weight: f64,
    pub tag_weight: f64,
    pub max_adjustment: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.2,
            author_weight: 0.4,
            topic_weight: 0.3,
            content_type_weight: 0.2,
            tag_weight: 0.1,
            max_adjustment: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrendingConfig {
    pub window_days: u32,
    pub max_items: usize,
    pub tag_candidates: usize,
    pub topic_candidates: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            max_items: 15,
            tag_candidates: 20,
            topic_candidates: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl PrismConfig {
    /// Load from a TOML file, overlaid by `PRISM__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PRISM").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject learning and scoring parameters outside their meaningful ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.learning;
        let s = &self.scoring;
        let checks = [
            ("learning.learning_rate", l.learning_rate, 0.0, 1.0),
            ("learning.initial_confidence", l.initial_confidence, 0.0, 1.0),
            ("learning.confidence_step", l.confidence_step, 0.0, 1.0),
            ("learning.max_confidence", l.max_confidence, 0.0, 1.0),
            ("scoring.confidence_threshold", s.confidence_threshold, 0.0, 1.0),
            ("scoring.author_weight", s.author_weight, -10.0, 10.0),
            ("scoring.topic_weight", s.topic_weight, -10.0, 10.0),
            ("scoring.content_type_weight", s.content_type_weight, -10.0, 10.0),
            ("scoring.tag_weight", s.tag_weight, -10.0, 10.0),
            ("scoring.max_adjustment", s.max_adjustment, 0.0, 10.0),
        ];
        for (name, value, min, max) in checks {
            if !(min..=max).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "{} must be within [{}, {}], got {}",
                    name, min, max, value
                )));
            }
        }
        Ok(())
    }

    /// In-memory configuration for tests and embedded use.
    pub fn in_memory() -> Self {
        Self {
            service: ServiceConfig {
                socket_path: "/tmp/prism.sock".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                backend: StorageBackend::Memory,
            },
            learning: LearningConfig::default(),
            scoring: ScoringConfig::default(),
            trending: TrendingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}
