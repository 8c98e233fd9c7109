//! Configuration Model

use config::builder::DefaultState;
use config::{
    Config as ConfigRaw,
    ConfigBuilder,
    ConfigError,
    Environment,
    File,
    FileFormat,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub prometheus_address: String,
    pub prometheus_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Tick driver period in milliseconds. The core contract assumes 1 Hz
    /// (1000ms); lowering this is only meant for tests.
    pub tick_period_ms: u64,
    /// How long `close()` waits for in-flight evaluations to observe the
    /// shutdown signal before the process gives up waiting on them.
    pub drain_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
/// * `main`: process-wide settings (metrics exporter address, ...)
/// * `scheduler`: tick driver and evaluation pool settings
pub struct Config {
    pub main: MainConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug)]
pub struct ConfigLoader {
    builder: ConfigBuilder<DefaultState>,
}

impl ConfigLoader {
    /// Loads a fresh copy of the configuration from source.
    pub fn load(&self) -> Result<Config, ConfigError> {
        Self::deserialize(self.builder.build_cloned()?)
    }

    /// Creates a new loader configured to load the default and overlay the
    /// user supplied config (if supplied).
    ///
    /// * `config_file`: The path of the configuration file to load.
    pub fn from_path(path: &Option<String>) -> ConfigLoader {
        let raw = include_str!("default.toml");
        let mut builder = ConfigRaw::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("FLOWSCHED")
                    .try_parsing(true)
                    .separator("__"),
            );
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        ConfigLoader { builder }
    }

    fn deserialize(config: ConfigRaw) -> Result<Config, ConfigError> {
        config.try_deserialize()
    }
}
