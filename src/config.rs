use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// NeuroGrid live session telemetry server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(
    name = "neurogrid-server",
    version,
    about = "NeuroGrid live session telemetry server"
)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "NEUROGRID_PORT", default_value = "5001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "NEUROGRID_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./neurogrid.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "NEUROGRID_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Milliseconds without telemetry before an Active session counts as stale
    #[arg(long, env = "NEUROGRID_LIVENESS_TIMEOUT_MS", default_value = "5000")]
    pub liveness_timeout_ms: u64,

    /// Milliseconds between stale-session sweep ticks
    #[arg(long, env = "NEUROGRID_SWEEP_INTERVAL_MS", default_value = "2000")]
    pub sweep_interval_ms: u64,

    /// Milliseconds a Finished session stays visible before eviction
    #[arg(long, env = "NEUROGRID_GRACE_PERIOD_MS", default_value = "10000")]
    pub grace_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5001,
            bind_address: "0.0.0.0".to_string(),
            config: "./neurogrid.toml".to_string(),
            json_logs: false,
            generate_config: false,
            liveness_timeout_ms: 5000,
            sweep_interval_ms: 2000,
            grace_period_ms: 10000,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (NEUROGRID_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("NEUROGRID_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# NeuroGrid Live Telemetry Server Configuration
# Place this file at ./neurogrid.toml or specify with --config <path>
# All settings can be overridden via environment variables (NEUROGRID_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5001)
# port = 5001

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Session lifecycle timeouts ----
# Active clients send telemetry roughly every 200ms while a game is running;
# a session that goes silent longer than this without signaling completion is
# considered dead and evicted by the next sweep.
# liveness_timeout_ms = 5000

# Interval between stale-session sweep ticks
# sweep_interval_ms = 2000

# How long a gracefully finished session stays visible to observers before
# it is removed from the live feed
# grace_period_ms = 10000
"#
    .to_string()
}
