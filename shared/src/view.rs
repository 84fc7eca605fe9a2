//! Render-ready view of the dashboard. Every string the shell shows is
//! produced here so shells only lay it out.

use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::format::{
    format_coordinate, format_coordinates, format_distance_km, format_location_count,
    format_speed, format_time_since, format_timestamp, link_label, maps_url, online_label,
    NOT_AVAILABLE,
};
use crate::model::{
    EmergencyRecord, LocationSample, Model, PollerPhase, StatsSnapshot, UnixTimeMs, ViewState,
};

pub const AWAITING_GPS: &str = "Menunggu data GPS...";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCards {
    pub device_status: String,
    /// Compact position and age of the latest fix, or the waiting placeholder.
    pub device_detail: Vec<String>,
    pub today_distance: String,
    pub location_count: String,
    pub emergency_status: String,
    pub emergency_since: Option<String>,
    pub wifi: String,
    pub gsm: String,
    pub speed: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationPanel {
    pub address: String,
    pub maps_url: String,
    pub latitude: String,
    pub longitude: String,
    pub satellites: Option<String>,
    pub speed: Option<String>,
    pub accuracy: Option<String>,
    pub time_since: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsPanel {
    pub device_id: String,
    pub total_distance: String,
    pub location_count: String,
    pub last_update: String,
    pub wifi: String,
    pub gsm: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryItem {
    pub address: String,
    pub precise: String,
    pub speed: Option<String>,
    pub time: String,
    pub time_since: String,
    pub is_emergency: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyPanel {
    pub activated: bool,
    pub headline: String,
    pub description: String,
    pub time: String,
    pub address: String,
    pub badge: String,
    pub maps_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetupPanel {
    pub database_url: String,
    pub firmware_url_line: String,
    pub firmware_device_line: String,
    pub device_connected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub database_url: String,
    pub can_retry: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub phase: PollerPhase,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub is_polling: bool,
    pub online: bool,
    pub error: Option<ErrorBanner>,
    pub last_update: Option<String>,
    /// Nothing has been received for any facet yet.
    pub awaiting_data: bool,
    pub cards: StatusCards,
    pub location: Option<LocationPanel>,
    pub stats: Option<StatsPanel>,
    pub history: Vec<HistoryItem>,
    pub emergency: Option<EmergencyPanel>,
    pub setup: SetupPanel,
}

impl ViewModel {
    pub fn build(model: &Model) -> Self {
        let state = &model.view_state;
        let config = &model.config;
        let now = model.now;

        Self {
            phase: state.phase,
            is_loading: state.is_loading,
            is_refreshing: state.is_refreshing,
            is_polling: model.poller.running,
            online: state.online,
            error: state.last_fetch_error.as_ref().map(|message| ErrorBanner {
                message: message.clone(),
                database_url: display_url(config),
                can_retry: true,
            }),
            last_update: state.last_update().map(|ts| {
                format!(
                    "Update terakhir: {} ({})",
                    format_timestamp(Some(ts), config.utc_offset_minutes),
                    format_time_since(Some(ts), now)
                )
            }),
            awaiting_data: !state.has_any_data() && !state.is_loading,
            cards: status_cards(state, now),
            location: state
                .current_location
                .as_ref()
                .map(|sample| location_panel(sample, now)),
            stats: state.stats.as_ref().map(|stats| stats_panel(stats, now)),
            history: state
                .history
                .iter()
                .map(|sample| history_item(sample, now, config.utc_offset_minutes))
                .collect(),
            emergency: state
                .emergency
                .as_ref()
                .map(|record| emergency_panel(record, config.utc_offset_minutes)),
            setup: setup_panel(config, state),
        }
    }
}

fn status_cards(state: &ViewState, now: UnixTimeMs) -> StatusCards {
    let stats = state.stats.as_ref();
    let emergency = state.emergency.as_ref();

    let device_detail = match &state.current_location {
        Some(sample) => vec![
            format_coordinates(sample.position.lat(), sample.position.lng()),
            format_time_since(sample.timestamp, now),
        ],
        None => vec![AWAITING_GPS.to_string()],
    };

    StatusCards {
        device_status: online_label(state.online).to_string(),
        device_detail,
        today_distance: format_distance_km(stats.map(|s| s.today_distance_km)),
        location_count: format_location_count(stats.and_then(|s| s.location_count)),
        emergency_status: if emergency.is_some_and(|e| e.activated) {
            "AKTIF".into()
        } else {
            "Normal".into()
        },
        emergency_since: emergency
            .and_then(|e| e.timestamp)
            .map(|ts| format_time_since(Some(ts), now)),
        wifi: link_label(stats.is_some_and(|s| s.wifi_connected)).to_string(),
        gsm: link_label(stats.is_some_and(|s| s.gsm_connected)).to_string(),
        speed: state
            .current_location
            .as_ref()
            .and_then(|s| format_speed(s.speed_kmh)),
    }
}

fn location_panel(sample: &LocationSample, now: UnixTimeMs) -> LocationPanel {
    let (lat, lng) = (sample.position.lat(), sample.position.lng());
    LocationPanel {
        address: format_coordinates(lat, lng),
        maps_url: maps_url(lat, lng),
        latitude: format_coordinate(Some(lat)),
        longitude: format_coordinate(Some(lng)),
        satellites: sample
            .satellites
            .filter(|n| *n > 0)
            .map(|n| n.to_string()),
        speed: format_speed(sample.speed_kmh),
        accuracy: sample.accuracy_m.map(|a| format!("{a:.1} m")),
        time_since: format_time_since(sample.timestamp, now),
    }
}

fn stats_panel(stats: &StatsSnapshot, now: UnixTimeMs) -> StatsPanel {
    StatsPanel {
        device_id: if stats.device_id.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            stats.device_id.clone()
        },
        total_distance: format_distance_km(Some(stats.today_distance_km)),
        location_count: stats
            .location_count
            .map_or_else(|| NOT_AVAILABLE.to_string(), |n| n.to_string()),
        last_update: match stats.last_update {
            Some(ts) => format_time_since(Some(ts), now),
            None => NOT_AVAILABLE.to_string(),
        },
        wifi: link_label(stats.wifi_connected).to_string(),
        gsm: link_label(stats.gsm_connected).to_string(),
    }
}

fn history_item(sample: &LocationSample, now: UnixTimeMs, utc_offset_minutes: i32) -> HistoryItem {
    let (lat, lng) = (sample.position.lat(), sample.position.lng());
    HistoryItem {
        address: format_coordinates(lat, lng),
        precise: format!(
            "{}, {}",
            format_coordinate(Some(lat)),
            format_coordinate(Some(lng))
        ),
        speed: format_speed(sample.speed_kmh).map(|s| format!("Kecepatan: {s}")),
        time: format_timestamp(sample.timestamp, utc_offset_minutes),
        time_since: format_time_since(sample.timestamp, now),
        is_emergency: sample.is_emergency,
    }
}

fn emergency_panel(record: &EmergencyRecord, utc_offset_minutes: i32) -> EmergencyPanel {
    let (lat, lng) = (record.position.lat(), record.position.lng());
    let (headline, description, badge) = if record.activated {
        ("DARURAT AKTIF!", "Tombol darurat telah ditekan!", "Aktif")
    } else {
        ("Status Normal", "Tidak ada aktivasi darurat", "Selesai")
    };
    EmergencyPanel {
        activated: record.activated,
        headline: headline.into(),
        description: description.into(),
        time: format_timestamp(record.timestamp, utc_offset_minutes),
        address: format_coordinates(lat, lng),
        badge: badge.into(),
        maps_url: maps_url(lat, lng),
    }
}

fn setup_panel(config: &DashboardConfig, state: &ViewState) -> SetupPanel {
    let database_url = display_url(config);
    SetupPanel {
        firmware_url_line: format!("const char* firebaseURL = \"{database_url}\";"),
        firmware_device_line: format!("const char* deviceId = \"{}\";", config.device_id),
        database_url,
        device_connected: state.current_location.is_some(),
    }
}

/// The base URL as an operator would type it, without the root slash.
fn display_url(config: &DashboardConfig) -> String {
    config
        .database_url
        .as_str()
        .trim_end_matches('/')
        .to_string()
}
