use crate::catalog::ScanMode;
use crate::fetch::{FailurePolicy, MAX_STREAMS_PER_REQUEST};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_request_timeout", with = "duration_format")]
    pub request_timeout: Option<Duration>,
    #[serde(default = "default_query_timeout", with = "duration_format")]
    pub query_timeout: Option<Duration>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub scan_mode: ScanMode,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            request_timeout: default_request_timeout(),
            query_timeout: default_query_timeout(),
            max_concurrency: None,
            failure_policy: FailurePolicy::default(),
            scan_mode: ScanMode::default(),
        }
    }
}

fn default_max_batch_size() -> usize {
    MAX_STREAMS_PER_REQUEST
}

fn default_request_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_query_timeout() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff", with = "required_duration")]
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

// Optional durations: "<n><unit>" or "infinite"
mod duration_format {
    use crate::query::window::{format_duration, parse_relative_duration};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_str("infinite"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "infinite" {
            Ok(None)
        } else {
            parse_relative_duration(&s)
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

mod required_duration {
    use crate::query::window::{format_duration, parse_relative_duration};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_relative_duration(&s).map_err(serde::de::Error::custom)
    }
}
