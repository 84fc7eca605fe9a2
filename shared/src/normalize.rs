//! Schema validation for the four payload kinds read from the store.
//!
//! Every payload goes through the same two steps: the body is parsed as
//! JSON, then each record is checked by its [`Record`] implementation. The
//! result is a [`Validation`], never a panic or a partially filled record.
//! Required numeric fields must be JSON numbers; optional fields of the
//! wrong type are treated as absent.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::event::ResourceKind;
use crate::model::{Coordinate, EmergencyRecord, LocationSample, StatsSnapshot, UnixTimeMs};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no data stored yet")]
    Empty,

    #[error("payload is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("field `{0}` is missing")]
    MissingField(&'static str),

    #[error("field `{0}` is not a finite number")]
    NotANumber(&'static str),

    #[error("none of the {0} records is valid")]
    NoValidRecord(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Rejection),
}

impl<T> Validation<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Invalid(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(rejection) => Err(rejection),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validation<U> {
        match self {
            Self::Valid(value) => Validation::Valid(f(value)),
            Self::Invalid(rejection) => Validation::Invalid(rejection),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

impl<T> From<Result<T, Rejection>> for Validation<T> {
    fn from(result: Result<T, Rejection>) -> Self {
        match result {
            Ok(value) => Self::Valid(value),
            Err(rejection) => Self::Invalid(rejection),
        }
    }
}

pub trait Record: Sized {
    const NAME: &'static str;

    fn from_object(object: &Map<String, Value>) -> Result<Self, Rejection>;

    fn validate(value: &Value) -> Validation<Self> {
        match value {
            Value::Null => Validation::Invalid(Rejection::Empty),
            Value::Object(object) if object.is_empty() => Validation::Invalid(Rejection::Empty),
            Value::Object(object) => Self::from_object(object).into(),
            _ => Validation::Invalid(Rejection::NotAnObject),
        }
    }
}

/// Records that can be ordered on the timeline.
pub trait Timestamped {
    fn timestamp(&self) -> Option<UnixTimeMs>;
}

impl Record for LocationSample {
    const NAME: &'static str = "location";

    fn from_object(object: &Map<String, Value>) -> Result<Self, Rejection> {
        Ok(Self {
            position: coordinate(object)?,
            timestamp: timestamp(object, "timestamp"),
            accuracy_m: optional_f64(object, "accuracy"),
            satellites: optional_u64(object, "satellites"),
            speed_kmh: optional_f64(object, "speed"),
            is_emergency: flag(object, "isEmergency"),
            device_id: text(object, "deviceId"),
        })
    }
}

impl Timestamped for LocationSample {
    fn timestamp(&self) -> Option<UnixTimeMs> {
        self.timestamp
    }
}

impl Record for StatsSnapshot {
    const NAME: &'static str = "stats";

    fn from_object(object: &Map<String, Value>) -> Result<Self, Rejection> {
        Ok(Self {
            today_distance_km: required_f64(object, "todayDistance")?,
            location_count: optional_u64(object, "locationCount"),
            last_update: timestamp(object, "lastUpdate"),
            device_id: text(object, "deviceId"),
            wifi_connected: flag(object, "wifiConnected"),
            gsm_connected: flag(object, "gsmConnected"),
        })
    }
}

impl Record for EmergencyRecord {
    const NAME: &'static str = "emergency";

    fn from_object(object: &Map<String, Value>) -> Result<Self, Rejection> {
        Ok(Self {
            activated: flag(object, "activated"),
            timestamp: timestamp(object, "timestamp"),
            position: coordinate(object)?,
            device_id: text(object, "deviceId"),
            processed: flag(object, "processed"),
        })
    }
}

/// A validated payload, tagged with the resource it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    LatestLocation(LocationSample),
    Stats(StatsSnapshot),
    Emergency(EmergencyRecord),
    History(Vec<LocationSample>),
}

impl Payload {
    pub fn resource(&self) -> ResourceKind {
        match self {
            Self::LatestLocation(_) => ResourceKind::LatestLocation,
            Self::Stats(_) => ResourceKind::Stats,
            Self::Emergency(_) => ResourceKind::Emergency,
            Self::History(_) => ResourceKind::History,
        }
    }
}

#[instrument(level = "debug", skip(body), fields(bytes = body.len()))]
pub fn normalize(resource: ResourceKind, body: &[u8], history_limit: usize) -> Validation<Payload> {
    match resource {
        ResourceKind::LatestLocation => latest::<LocationSample>(body).map(Payload::LatestLocation),
        ResourceKind::Stats => single::<StatsSnapshot>(body).map(Payload::Stats),
        ResourceKind::Emergency => single::<EmergencyRecord>(body).map(Payload::Emergency),
        ResourceKind::History => {
            collection::<LocationSample>(body, history_limit).map(Payload::History)
        }
    }
}

/// A single object document such as `stats.json`.
pub fn single<T: Record>(body: &[u8]) -> Validation<T> {
    match parse_body(body) {
        Ok(value) => T::validate(&value),
        Err(rejection) => Validation::Invalid(rejection),
    }
}

/// The newest valid record of a keyed collection.
pub fn latest<T: Record + Timestamped>(body: &[u8]) -> Validation<T> {
    let value = match parse_body(body) {
        Ok(value) => value,
        Err(rejection) => return Validation::Invalid(rejection),
    };
    match partition::<T>(&value) {
        Ok((valid, rejected)) => {
            let total = valid.len() + rejected.len();
            match newest_first(valid).into_iter().next() {
                Some(record) => Validation::Valid(record),
                None if total == 1 => Validation::Invalid(
                    rejected.into_iter().next().unwrap_or(Rejection::NoValidRecord(1)),
                ),
                None => Validation::Invalid(Rejection::NoValidRecord(total)),
            }
        }
        Err(rejection) => Validation::Invalid(rejection),
    }
}

/// Valid records of a keyed collection, newest first, at most `limit`.
///
/// A non-empty collection whose records are all invalid is still `Valid`
/// (and empty): the store answered, it just had nothing usable.
pub fn collection<T: Record + Timestamped>(body: &[u8], limit: usize) -> Validation<Vec<T>> {
    let value = match parse_body(body) {
        Ok(value) => value,
        Err(rejection) => return Validation::Invalid(rejection),
    };
    match partition::<T>(&value) {
        Ok((valid, rejected)) => {
            if !rejected.is_empty() {
                debug!(
                    record = T::NAME,
                    kept = valid.len(),
                    dropped = rejected.len(),
                    "dropped malformed records"
                );
            }
            let mut records = newest_first(valid);
            records.truncate(limit);
            Validation::Valid(records)
        }
        Err(rejection) => Validation::Invalid(rejection),
    }
}

fn parse_body(body: &[u8]) -> Result<Value, Rejection> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Rejection::Empty);
    }
    serde_json::from_slice(body).map_err(|e| Rejection::MalformedJson(e.to_string()))
}

/// Splits a record-ID map (or a sparse array) into valid records and rejections.
/// Key order is ignored.
fn partition<T: Record>(value: &Value) -> Result<(Vec<T>, Vec<Rejection>), Rejection> {
    let entries: Vec<&Value> = match value {
        Value::Null => return Err(Rejection::Empty),
        Value::Object(map) if map.is_empty() => return Err(Rejection::Empty),
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        _ => return Err(Rejection::NotAnObject),
    };
    if entries.is_empty() {
        return Err(Rejection::Empty);
    }

    let mut valid = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    for entry in entries {
        match T::validate(entry) {
            Validation::Valid(record) => valid.push(record),
            Validation::Invalid(rejection) => rejected.push(rejection),
        }
    }
    Ok((valid, rejected))
}

/// Stable sort, newest first; records without a timestamp go last.
fn newest_first<T: Timestamped>(mut records: Vec<T>) -> Vec<T> {
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    records
}

// --- Field extraction ---

fn coordinate(object: &Map<String, Value>) -> Result<Coordinate, Rejection> {
    let lat = required_f64(object, "lat")?;
    let lng = required_f64(object, "lng")?;
    Coordinate::new(lat, lng).map_err(|_| Rejection::NotANumber("lat"))
}

fn required_f64(object: &Map<String, Value>, key: &'static str) -> Result<f64, Rejection> {
    match object.get(key) {
        None | Some(Value::Null) => Err(Rejection::MissingField(key)),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or(Rejection::NotANumber(key)),
    }
}

fn optional_f64(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn optional_u64(object: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = object.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n < u64::MAX as f64)
            .map(|n| n as u64)
    })
}

/// Zero is how the firmware reports "clock not set yet".
fn timestamp(object: &Map<String, Value>, key: &str) -> Option<UnixTimeMs> {
    optional_u64(object, key).filter(|t| *t > 0).map(UnixTimeMs)
}

fn flag(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn text(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}
