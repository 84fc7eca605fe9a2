//! Dashboard configuration.
//!
//! The store base URL and device identifier are fixed per deployment; the
//! defaults point at the production tracker. Everything can be overridden by
//! a JSON document handed to [`crate::Event::Configure`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::{HttpError, ValidatedUrl};
use crate::event::ResourceKind;
use crate::{
    DEFAULT_DATABASE_URL, DEFAULT_DEVICE_ID, DEFAULT_HISTORY_LIMIT, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_UTC_OFFSET_MINUTES, ONLINE_THRESHOLD_MS,
};

pub const POLL_INTERVAL_RANGE_MS: RangeInclusive<u64> = 1_000..=3_600_000;
pub const REQUEST_TIMEOUT_RANGE_MS: RangeInclusive<u64> = 100..=300_000;
pub const HISTORY_LIMIT_RANGE: RangeInclusive<usize> = 1..=100;
pub const UTC_OFFSET_RANGE_MINUTES: RangeInclusive<i32> = -720..=840;

/// Characters the realtime database refuses in a key.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] HttpError),

    #[error("invalid device id {id:?}: {reason}")]
    InvalidDeviceId { id: String, reason: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::InvalidDeviceId {
                id,
                reason: "must not be empty",
            });
        }
        if id.contains(FORBIDDEN_KEY_CHARS) {
            return Err(ConfigError::InvalidDeviceId {
                id,
                reason: "must not contain '/', '.', '#', '$', '[' or ']'",
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ConfigError::InvalidDeviceId {
                id,
                reason: "must not contain control characters",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happens to a published facet when its resource yields nothing usable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Keep showing the last good value.
    #[default]
    Retain,
    /// Drop the facet so the shell shows its "waiting for data" placeholder.
    Clear,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub database_url: ValidatedUrl,
    pub device_id: DeviceId,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub online_threshold_ms: u64,
    pub history_limit: usize,
    pub stale_policy: StalePolicy,
    pub utc_offset_minutes: i32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            database_url: ValidatedUrl::from_static(DEFAULT_DATABASE_URL),
            device_id: DeviceId(DEFAULT_DEVICE_ID.to_string()),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            online_threshold_ms: ONLINE_THRESHOLD_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            stale_policy: StalePolicy::Retain,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl DashboardConfig {
    pub fn new(database_url: &str, device_id: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: ValidatedUrl::new(database_url)?,
            device_id: DeviceId::new(device_id)?,
            ..Self::default()
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("poll_interval_ms", self.poll_interval_ms, &POLL_INTERVAL_RANGE_MS)?;
        check_range(
            "request_timeout_ms",
            self.request_timeout_ms,
            &REQUEST_TIMEOUT_RANGE_MS,
        )?;
        check_range("online_threshold_ms", self.online_threshold_ms, &(1..=u64::MAX))?;
        check_range("history_limit", self.history_limit, &HISTORY_LIMIT_RANGE)?;
        check_range(
            "utc_offset_minutes",
            self.utc_offset_minutes,
            &UTC_OFFSET_RANGE_MINUTES,
        )?;
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `{base}/tracking/{device}/{document}` plus the timestamp query where needed.
    pub fn resource_url(&self, resource: ResourceKind) -> Result<ValidatedUrl, ConfigError> {
        let mut url = self.database_url.parse()?;
        url.path_segments_mut()
            .map_err(|()| {
                ConfigError::InvalidUrl(HttpError::InvalidUrl {
                    url: self.database_url.to_string(),
                    reason: "URL cannot be a base".to_string(),
                })
            })?
            .pop_if_empty()
            .extend(["tracking", self.device_id.as_str(), resource.document()]);

        if let Some(limit) = resource.limit_to_last(self.history_limit) {
            url.query_pairs_mut()
                .append_pair("orderBy", "\"timestamp\"")
                .append_pair("limitToLast", &limit.to_string());
        }

        Ok(ValidatedUrl::new(url.to_string())?)
    }
}

fn check_range<T>(field: &'static str, value: T, range: &RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + Copy + TryInto<i64>,
{
    if range.contains(&value) {
        return Ok(());
    }
    let widen = |v: T| v.try_into().unwrap_or(i64::MAX);
    Err(ConfigError::OutOfRange {
        field,
        value: widen(value),
        min: widen(*range.start()),
        max: widen(*range.end()),
    })
}
