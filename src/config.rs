use std::time::Duration;

use anyhow::{Context, anyhow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// How long a participant may stay silent before being evicted.
    pub inactivity_window: Duration,
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            inactivity_window: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Reads `PORT`, `INACTIVITY_WINDOW_SECS` and `SWEEP_INTERVAL_SECS`,
    /// including anything loaded from `.env`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().with_context(|| format!("PORT={raw:?}"))?,
            None => defaults.port,
        };

        Ok(Self {
            port,
            inactivity_window: secs(&lookup, "INACTIVITY_WINDOW_SECS", defaults.inactivity_window)?,
            sweep_interval: secs(&lookup, "SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
        })
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let secs: u64 = raw.trim().parse().with_context(|| format!("{key}={raw:?}"))?;
    if secs == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
