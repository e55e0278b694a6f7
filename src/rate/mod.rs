//! Publish-rate estimation for the adaptive polling loop.
//!
//! Feed publications are modeled as a Poisson process. The observed rate
//! is the maximum-likelihood estimate over the most recent inter-arrival
//! gaps, blended with the prior rate by exponential smoothing. The poll
//! interval is a fraction of the expected inter-arrival time, clamped to
//! configured bounds.

use chrono::{DateTime, Duration, Utc};

use crate::config::PollConfig;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Outcome of one estimation round.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPlan {
    pub next_fetch_at: DateTime<Utc>,
    /// Smoothed rate in items per hour. Carries the prior through
    /// unchanged when the input had too little signal.
    pub rate_per_hour: Option<f64>,
}

/// Compute the next poll time and updated rate from observed publish
/// timestamps.
///
/// Pure and deterministic: `now` is injected rather than read from the
/// clock, so identical inputs always produce identical output.
pub fn plan_next_poll(
    published: &[DateTime<Utc>],
    prior_rate: Option<f64>,
    now: DateTime<Utc>,
    cfg: &PollConfig,
) -> PollPlan {
    let mut ts = published.to_vec();
    ts.sort_unstable();

    if ts.len() < 2 {
        return fallback(prior_rate, now, cfg);
    }

    if ts.len() > cfg.sample_size {
        ts.drain(..ts.len() - cfg.sample_size);
    }

    // Non-positive gaps are duplicates or clock skew; they carry no
    // rate information.
    let gaps: Vec<f64> = ts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / MILLIS_PER_HOUR)
        .filter(|gap| *gap > 0.0)
        .collect();

    if gaps.is_empty() {
        return fallback(prior_rate, now, cfg);
    }

    let observed = gaps.len() as f64 / gaps.iter().sum::<f64>();
    let rate = match prior_rate {
        Some(prior) => cfg.alpha * observed + (1.0 - cfg.alpha) * prior,
        None => observed,
    };

    if !rate.is_finite() || rate <= 0.0 {
        return fallback(prior_rate, now, cfg);
    }

    let interval_hours =
        (cfg.lead_factor / rate).clamp(cfg.min_interval_hours, cfg.max_interval_hours);

    PollPlan {
        next_fetch_at: now + hours(interval_hours),
        rate_per_hour: Some(rate),
    }
}

fn fallback(prior_rate: Option<f64>, now: DateTime<Utc>, cfg: &PollConfig) -> PollPlan {
    PollPlan {
        next_fetch_at: now + hours(cfg.default_interval_hours),
        rate_per_hour: prior_rate,
    }
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * MILLIS_PER_HOUR).round() as i64)
}
