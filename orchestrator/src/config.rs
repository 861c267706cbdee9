use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::bus::BusSettings;
use crate::context::ContextSettings;
use crate::workflow::WorkflowSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub catalog_path: String,
    pub bus_capacity: usize,
    pub bus_send_timeout_secs: u64,
    pub agent_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub context_capacity: usize,
    pub context_ttl_secs: u64,
    pub history_limit: usize,
}

impl Config {
    /// Defaults, overridden by `.env` and the process environment
    /// (`PORT`, `GEMINI_API_KEY`, `BUS_CAPACITY`, ...).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Config = ::config::Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("log_level", "info")?
            .set_default("gemini_model", "gemini-2.5-flash")?
            .set_default(
                "gemini_base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("catalog_path", "data/catalog.json")?
            .set_default("bus_capacity", 100_i64)?
            .set_default("bus_send_timeout_secs", 5_i64)?
            .set_default("agent_timeout_secs", 30_i64)?
            .set_default("generation_timeout_secs", 20_i64)?
            .set_default("context_capacity", 10_000_i64)?
            .set_default("context_ttl_secs", 86_400_i64)?
            .set_default("history_limit", 10_i64)?
            .add_source(::config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.bus_capacity == 0 {
            anyhow::bail!("BUS_CAPACITY must be greater than zero");
        }
        if config.history_limit == 0 {
            anyhow::bail!("HISTORY_LIMIT must be greater than zero");
        }

        Ok(config)
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            agent_timeout: self.agent_timeout(),
            generation_timeout: self.generation_timeout(),
            history_limit: self.history_limit,
        }
    }

    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            capacity: self.bus_capacity,
            send_timeout: Duration::from_secs(self.bus_send_timeout_secs),
            call_timeout: self.agent_timeout(),
        }
    }

    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            capacity: self.context_capacity.max(1),
            ttl: (self.context_ttl_secs > 0).then(|| Duration::from_secs(self.context_ttl_secs)),
        }
    }
}
