//! Configuration loaded from the environment.

use figment::providers::Env;
use figment::value::UncasedStr;
use figment::Figment;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

/// Legacy name for [`Config::backend_url`] from the browser-facing deployment.
const BACKEND_URL_ALIAS: &str = "NEXT_PUBLIC_BACKEND_URL";

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    /// Base level for this crate's logs; `RUST_LOG` overrides the whole filter.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the Backend API.
    pub backend_url: Url,
    /// How long in-flight requests get to finish after a shutdown signal.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Per-request timeout for ordinary backend calls.
    #[serde(
        default = "default_upstream_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub upstream_timeout: Duration,
    /// Upper bound on one college-list or activity generation.
    #[serde(
        default = "default_generation_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub generation_timeout: Duration,
    /// Router-level timeout for every route except the generation routes.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// Require an active subscription on the paid feature routes.
    #[serde(default = "default_subscription_gate")]
    pub subscription_gate: bool,
}

impl Config {
    /// Build the figment used to load [`Config`].
    ///
    /// `BACKEND_URL` wins over `NEXT_PUBLIC_BACKEND_URL` when both are set, and
    /// Railway's draining window maps onto `SHUTDOWN_TIMEOUT`.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Env::raw().only(&[BACKEND_URL_ALIAS]).map(|_| "BACKEND_URL".into()))
            .merge(Env::raw().ignore(&[BACKEND_URL_ALIAS]).map(|k| {
                if k == UncasedStr::new("RAILWAY_DEPLOYMENT_DRAINING_SECONDS") {
                    "SHUTDOWN_TIMEOUT".into()
                } else {
                    k.into()
                }
            }))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_generation_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_subscription_gate() -> bool {
    true
}

/// Parse a human duration such as `250ms`, `8s`, `5m` or `1h`. A bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ]);
    let parsed = parser
        .parse(raw.trim())
        .map_err(|e| format!("invalid duration '{raw}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SecondsOrText {
        Seconds(u64),
        Text(String),
    }

    match SecondsOrText::deserialize(deserializer)? {
        SecondsOrText::Seconds(secs) => Ok(Duration::from_secs(secs)),
        SecondsOrText::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
