use std::path::PathBuf;
use std::time::Duration;

use crate::app::{FreshetError, Result};

/// Tuning knobs for the adaptive polling loop.
///
/// Grouped into one record so tests can construct variants without
/// touching process-wide state.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fraction of the expected inter-arrival time to wait before the
    /// next poll. Below 1.0 so we fetch ahead of the expected publish.
    pub lead_factor: f64,
    /// Exponential smoothing weight for the newest rate observation.
    pub alpha: f64,
    pub min_interval_hours: f64,
    pub max_interval_hours: f64,
    /// Interval used while a feed has too little history to estimate.
    pub default_interval_hours: f64,
    /// Number of most recent publish timestamps fed to the estimator.
    pub sample_size: usize,
    /// Upper bound on how long the scheduler sleeps between ticks.
    pub tick: Duration,
    /// Feeds processed in parallel within one tick.
    pub concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            lead_factor: 0.6,
            alpha: 0.3,
            min_interval_hours: 0.25,
            max_interval_hours: 24.0,
            default_interval_hours: 1.0,
            sample_size: 20,
            tick: Duration::from_secs(60),
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub poll: PollConfig,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `DATABASE_URL` points at the SQLite database file (an optional
    /// `sqlite://` prefix is accepted); `PORT` selects the API port.
    pub fn from_env() -> Result<Self> {
        let db_path = match std::env::var("DATABASE_URL") {
            Ok(raw) => db_path_from(&raw),
            Err(_) => Self::default_db_path()?,
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| FreshetError::Config(format!("invalid PORT: {raw}")))?,
            Err(_) => 3000,
        };

        Ok(Self {
            db_path,
            port,
            poll: PollConfig::default(),
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FreshetError::Config("could not find data directory".into()))?;
        Ok(data_dir.join("freshet").join("freshet.db"))
    }
}

fn db_path_from(raw: &str) -> PathBuf {
    PathBuf::from(raw.trim().trim_start_matches("sqlite://"))
}
