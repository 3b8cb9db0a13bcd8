use clap::Parser;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::errors::SettingsError;
use crate::simulation::config::{
    SimulationConfig, DEFAULT_ERROR_RATE, DEFAULT_MAX_DURATION, DEFAULT_REQUEST_RATE,
};

/// Command line overrides. Anything left unset falls back to the config
/// file, then `APP_*` environment variables, then built-in defaults.
#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "load_generator",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
pub struct Cli {
    /// Exclusive upper bound of simulated request durations, in seconds
    #[arg(long = "max-duration")]
    pub max_duration: Option<f64>,

    /// Fraction of simulated requests that fail, between 0 and 1
    #[arg(long = "error-rate")]
    pub error_rate: Option<f64>,

    /// Simulated requests per second
    #[arg(long = "request-rate")]
    pub request_rate: Option<f64>,

    /// Fixed RNG seed; defaults to the startup time
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub simulation: SimulationSettings,
}

impl Settings {
    pub fn new(cli: &Cli) -> Result<Self, SettingsError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        println!("Loading configuration for RUN_MODE: {}", &run_mode);

        let s = Self::with_defaults(Config::builder())?
            // Load environment-specific file (e.g., config/development.toml)
            .add_source(
                File::with_name(&format!("config/{}", run_mode))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            // Add environment variables (e.g., APP_SIMULATION__ERROR_RATE=0.2)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(Self::with_overrides(s, cli)?.build()?.try_deserialize()?)
    }

    fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 8080_u64)?
            .set_default("server.log_level", "info")?
            .set_default("logging.directory", "logs")?
            .set_default("logging.filename", "load_generator.log")?
            .set_default("simulation.max_duration", DEFAULT_MAX_DURATION)?
            .set_default("simulation.error_rate", DEFAULT_ERROR_RATE)?
            .set_default("simulation.request_rate", DEFAULT_REQUEST_RATE)
    }

    fn with_overrides(
        builder: ConfigBuilder<DefaultState>,
        cli: &Cli,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_override_option("simulation.max_duration", cli.max_duration)?
            .set_override_option("simulation.error_rate", cli.error_rate)?
            .set_override_option("simulation.request_rate", cli.request_rate)?
            .set_override_option("simulation.seed", cli.seed)?
            .set_override_option("server.port", cli.port.map(u64::from))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationSettings {
    pub max_duration: f64,
    pub error_rate: f64,
    pub request_rate: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationSettings {
    /// Same rules as the `/limits` endpoint.
    pub fn initial_config(&self) -> Result<SimulationConfig, SettingsError> {
        Ok(SimulationConfig::new(
            self.max_duration,
            self.error_rate,
            self.request_rate,
        )?)
    }
}
