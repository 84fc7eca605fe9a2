// lib.rs - GPS tracker dashboard core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod model;
pub mod normalize;
pub mod view;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ConfigError, DashboardConfig, DeviceId, StalePolicy};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, ErrorKind, ErrorSeverity};
pub use event::{CycleId, CycleTrigger, Event, ResourceKind, TimerId};
pub use model::{
    Coordinate, EmergencyRecord, LocationSample, Model, PollerPhase, StatsSnapshot, UnixTimeMs,
    ViewState,
};
pub use normalize::{Rejection, Validation};
pub use view::ViewModel;

pub const DEFAULT_DATABASE_URL: &str =
    "https://esp32-tracker-5-default-rtdb.asia-southeast1.firebasedatabase.app";
pub const DEFAULT_DEVICE_ID: &str = "ESP32_TRACKER_001";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const ONLINE_THRESHOLD_MS: u64 = 120_000;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// WIB, the tracker's home time zone.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;
/// Extra time the core waits past the shell's own request timeout.
pub const CYCLE_DEADLINE_GRACE_MS: u64 = 1_000;

#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
