use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::HttpError;
use crate::config::DashboardConfig;
use crate::error::AppError;
use crate::event::{CycleId, CycleTrigger, ResourceKind, TimerId};

/// Explicit timestamp unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(crate::get_current_time_ms())
    }

    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub const fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub const fn sub_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_sub(ms))
    }
}

// --- Coordinate: finite, NaN-safe ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("latitude is not a finite number")]
    NonFiniteLatitude,
    #[error("longitude is not a finite number")]
    NonFiniteLongitude,
}

/// Finite lat/lng pair as reported by the tracker.
///
/// Only finiteness is enforced; the GPS module is the authority on range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() {
            return Err(CoordinateError::NonFiniteLatitude);
        }
        if !lng.is_finite() {
            return Err(CoordinateError::NonFiniteLongitude);
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = CoordinateError;

    fn try_from((lat, lng): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lng)
    }
}

// --- Records read from the remote store ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LocationSample {
    pub position: Coordinate,
    pub timestamp: Option<UnixTimeMs>,
    pub accuracy_m: Option<f64>,
    pub satellites: Option<u64>,
    pub speed_kmh: Option<f64>,
    pub is_emergency: bool,
    pub device_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatsSnapshot {
    pub today_distance_km: f64,
    pub location_count: Option<u64>,
    pub last_update: Option<UnixTimeMs>,
    pub device_id: String,
    pub wifi_connected: bool,
    pub gsm_connected: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EmergencyRecord {
    pub activated: bool,
    pub timestamp: Option<UnixTimeMs>,
    pub position: Coordinate,
    pub device_id: String,
    pub processed: bool,
}

// --- Published view-state ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollerPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Everything the presentation reads. Rebuilt field by field each cycle.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    pub phase: PollerPhase,
    pub current_location: Option<LocationSample>,
    pub stats: Option<StatsSnapshot>,
    pub emergency: Option<EmergencyRecord>,
    /// Newest first, never longer than the configured history limit.
    pub history: Vec<LocationSample>,
    pub online: bool,
    pub last_fetch_error: Option<String>,
    pub is_loading: bool,
    pub is_refreshing: bool,
}

impl ViewState {
    #[must_use]
    pub fn last_update(&self) -> Option<UnixTimeMs> {
        self.current_location.as_ref().and_then(|l| l.timestamp)
    }

    #[must_use]
    pub fn has_any_data(&self) -> bool {
        self.current_location.is_some() || self.stats.is_some() || self.emergency.is_some()
    }

    pub fn clear(&mut self, resource: ResourceKind) {
        match resource {
            ResourceKind::LatestLocation => self.current_location = None,
            ResourceKind::Stats => self.stats = None,
            ResourceKind::Emergency => self.emergency = None,
            ResourceKind::History => self.history.clear(),
        }
    }
}

// --- Poller and cycle bookkeeping ---

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Poller {
    pub running: bool,
    pub interval_timer: Option<TimerId>,
    last_timer: TimerId,
}

impl Poller {
    pub fn allocate_timer(&mut self) -> TimerId {
        self.last_timer = self.last_timer.next();
        self.last_timer
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cycle {
    pub id: CycleId,
    pub trigger: CycleTrigger,
    pub deadline: TimerId,
    outstanding: Vec<ResourceKind>,
    pub failure: Option<HttpError>,
}

impl Cycle {
    #[must_use]
    pub fn new(id: CycleId, trigger: CycleTrigger, deadline: TimerId) -> Self {
        Self {
            id,
            trigger,
            deadline,
            outstanding: ResourceKind::ALL.to_vec(),
            failure: None,
        }
    }

    /// Marks `resource` as answered. Returns `false` for a duplicate answer.
    pub fn settle(&mut self, resource: ResourceKind) -> bool {
        let before = self.outstanding.len();
        self.outstanding.retain(|r| *r != resource);
        self.outstanding.len() != before
    }

    pub fn settle_all(&mut self) {
        self.outstanding.clear();
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outstanding.is_empty()
    }

    #[must_use]
    pub fn outstanding(&self) -> &[ResourceKind] {
        &self.outstanding
    }

    /// First transport failure wins; later ones are only logged.
    pub fn fail(&mut self, error: HttpError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Ready { cycle: CycleId, trigger: CycleTrigger },
    Failed { cycle: CycleId, trigger: CycleTrigger, error: AppError },
}

impl CycleOutcome {
    #[must_use]
    pub const fn cycle(&self) -> CycleId {
        match self {
            Self::Ready { cycle, .. } | Self::Failed { cycle, .. } => *cycle,
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: DashboardConfig,
    pub view_state: ViewState,
    pub poller: Poller,
    pub cycle: Option<Cycle>,
    /// At most one follow-up cycle waits behind the one in flight.
    pub queued_cycle: bool,
    pub last_outcome: Option<CycleOutcome>,
    pub cycles_completed: u64,
    pub now: UnixTimeMs,
    last_cycle: CycleId,
}

impl Model {
    #[must_use]
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn update_timestamp(&mut self) {
        self.now = UnixTimeMs::now();
    }

    pub fn allocate_cycle(&mut self) -> CycleId {
        self.last_cycle = self.last_cycle.next();
        self.last_cycle
    }
}
