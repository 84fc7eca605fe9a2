//! Derived display values: online flag, relative and absolute times,
//! coordinates, map links, distance and speed.

use chrono::{DateTime, FixedOffset, Utc};

use crate::model::{LocationSample, UnixTimeMs};

pub const INVALID_TIME: &str = "Waktu tidak valid";
pub const INVALID_COORDINATES: &str = "Koordinat tidak valid";
pub const NOT_AVAILABLE: &str = "N/A";
pub const INERT_LINK: &str = "#";

const MAPS_BASE_URL: &str = "https://maps.google.com/?q=";
const ABSOLUTE_TIME_FORMAT: &str = "%d/%m/%Y, %H.%M.%S";
const MS_PER_MINUTE: u64 = 60_000;

/// True when the latest sample is younger than `threshold_ms`.
pub fn is_online(latest: Option<&LocationSample>, now: UnixTimeMs, threshold_ms: u64) -> bool {
    latest
        .and_then(|sample| sample.timestamp)
        .is_some_and(|ts| now.elapsed_since(ts) < threshold_ms)
}

/// "3 menit yang lalu", "1 jam 1 menit yang lalu". Future timestamps count as now.
pub fn format_time_since(timestamp: Option<UnixTimeMs>, now: UnixTimeMs) -> String {
    let Some(ts) = timestamp.filter(|t| t.0 > 0) else {
        return INVALID_TIME.into();
    };

    let minutes = now.elapsed_since(ts) / MS_PER_MINUTE;
    let hours = minutes / 60;
    if hours > 0 {
        return format!("{hours} jam {} menit yang lalu", minutes % 60);
    }
    format!("{minutes} menit yang lalu")
}

/// `dd/mm/yyyy, HH.MM.SS` at a fixed UTC offset.
pub fn format_timestamp(timestamp: Option<UnixTimeMs>, utc_offset_minutes: i32) -> String {
    let Some(ts) = timestamp.filter(|t| t.0 > 0) else {
        return INVALID_TIME.into();
    };
    let Ok(millis) = i64::try_from(ts.0) else {
        return INVALID_TIME.into();
    };
    let Some(offset) = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
    else {
        return INVALID_TIME.into();
    };

    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(utc) => utc
            .with_timezone(&offset)
            .format(ABSOLUTE_TIME_FORMAT)
            .to_string(),
        None => INVALID_TIME.into(),
    }
}

/// Compact `"lat, lng"` at four decimals.
pub fn format_coordinates(lat: f64, lng: f64) -> String {
    if !lat.is_finite() || !lng.is_finite() {
        return INVALID_COORDINATES.into();
    }
    format!("{lat:.4}, {lng:.4}")
}

/// One coordinate at six decimals.
pub fn format_coordinate(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:.6}"),
        None => NOT_AVAILABLE.into(),
    }
}

pub fn maps_url(lat: f64, lng: f64) -> String {
    if !lat.is_finite() || !lng.is_finite() {
        return INERT_LINK.into();
    }
    format!("{MAPS_BASE_URL}{lat},{lng}")
}

pub fn format_distance_km(distance: Option<f64>) -> String {
    format!("{:.1} km", distance.filter(|d| d.is_finite()).unwrap_or(0.0))
}

/// `None` when the tracker reports no speed or is standing still.
pub fn format_speed(speed_kmh: Option<f64>) -> Option<String> {
    speed_kmh
        .filter(|s| s.is_finite() && *s != 0.0)
        .map(|s| format!("{s:.1} km/h"))
}

pub fn format_location_count(count: Option<u64>) -> String {
    format!("{} titik lokasi", count.unwrap_or(0))
}

pub const fn online_label(online: bool) -> &'static str {
    if online {
        "Online"
    } else {
        "Offline"
    }
}

pub const fn link_label(connected: bool) -> &'static str {
    if connected {
        "Connected"
    } else {
        "Disconnected"
    }
}
