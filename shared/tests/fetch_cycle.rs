mod common;

use assert_matches::assert_matches;
use common::*;
use serde_json::{json, Map, Value};
use shared::model::CycleOutcome;
use shared::{CycleTrigger, DashboardConfig, Event, Model, PollerPhase, StalePolicy, UnixTimeMs};

fn history(count: u64, bad_index: Option<u64>) -> Reply {
    let base = now_ms() - count * 30_000;
    let map: Map<String, Value> = (0..count)
        .map(|i| {
            let lat = if Some(i) == bad_index {
                json!("bad")
            } else {
                json!(-6.2 - i as f64 * 0.001)
            };
            (format!("-Nrec{i:02}"), location(base + i * 30_000, lat))
        })
        .collect();
    Reply::Json(Value::Object(map))
}

#[test]
fn first_cycle_publishes_every_facet() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        latest: latest_at(now_ms() - 60_000),
        stats: stats(3.26),
        emergency: Reply::Json(json!({
            "activated": false, "timestamp": now_ms() - 600_000,
            "lat": -6.2, "lng": 106.8, "deviceId": DEVICE, "processed": true
        })),
        history: history(3, None),
    };
    start_and_serve(&app, &mut model, &store);

    let state = &model.view_state;
    assert_eq!(state.phase, PollerPhase::Ready);
    assert!(!state.is_loading);
    assert!(!state.is_refreshing);
    assert!(state.online);
    assert_eq!(state.last_fetch_error, None);
    assert!(state.current_location.is_some());
    assert_eq!(state.history.len(), 3);
    assert_matches!(model.last_outcome, Some(CycleOutcome::Ready { trigger: CycleTrigger::Start, .. }));

    let view = app.view(&model);
    assert_eq!(view.cards.device_status, "Online");
    assert_eq!(view.cards.today_distance, "3.3 km");
    assert_eq!(view.cards.location_count, "42 titik lokasi");
    assert_eq!(view.cards.wifi, "Connected");
    assert_eq!(view.cards.gsm, "Disconnected");
    assert_eq!(view.cards.speed.as_deref(), Some("24.0 km/h"));
    assert_eq!(view.emergency.expect("emergency panel").badge, "Selesai");
    assert!(!view.awaiting_data);
    assert!(view
        .last_update
        .expect("last update line")
        .ends_with("(1 menit yang lalu)"));
}

#[test]
fn stats_server_error_does_not_block_location() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        latest: latest_at(now_ms() - 60_000),
        stats: Reply::Status(500, "internal error"),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &store);

    let state = &model.view_state;
    assert!(state.current_location.is_some());
    assert!(state.stats.is_none());
    assert_eq!(state.last_fetch_error, None);
    assert!(state.online);
    assert_eq!(state.phase, PollerPhase::Ready);
}

#[test]
fn transport_failure_forces_offline_but_keeps_partial_data() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        latest: latest_at(now_ms() - 10_000),
        emergency: Reply::Hang,
        ..Store::default()
    };
    refresh_and_expire(&app, &mut model, &store);

    let state = &model.view_state;
    assert!(!state.online);
    assert!(state.current_location.is_some());
    assert_eq!(state.phase, PollerPhase::Failed);
    assert_eq!(
        state.last_fetch_error.as_deref(),
        Some("Gagal mengambil data dari Firebase: request timed out after 10000ms")
    );
    assert_matches!(model.last_outcome, Some(CycleOutcome::Failed { .. }));
}

#[test]
fn next_successful_cycle_clears_the_error() {
    let app = Tester::default();
    let mut model = Model::default();

    let failing = Store {
        stats: Reply::Hang,
        ..Store::default()
    };
    refresh_and_expire(&app, &mut model, &failing);
    assert!(model.view_state.last_fetch_error.is_some());

    refresh_and_serve(&app, &mut model, &Store::default());
    assert_eq!(model.view_state.last_fetch_error, None);
    assert_eq!(model.view_state.phase, PollerPhase::Ready);
}

#[test]
fn unchanged_store_yields_identical_view_state() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        latest: latest_at(now_ms() - 30_000),
        stats: stats(1.5),
        history: history(5, None),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &store);
    let first = model.view_state.clone();

    refresh_and_serve(&app, &mut model, &store);
    assert_eq!(model.view_state, first);
    assert_eq!(model.cycles_completed, 2);
}

#[test]
fn history_drops_invalid_records_newest_first() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        history: history(10, Some(4)),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &store);

    let stamps: Vec<UnixTimeMs> = model
        .view_state
        .history
        .iter()
        .map(|l| l.timestamp.expect("timestamp"))
        .collect();
    assert_eq!(stamps.len(), 9);
    assert!(stamps.windows(2).all(|w| w[0] > w[1]));

    let view = app.view(&model);
    assert_eq!(view.history.len(), 9);
}

#[test]
fn non_finite_coordinates_are_excluded_everywhere() {
    let app = Tester::default();
    let mut model = Model::default();

    // NaN has no JSON spelling; the firmware's serializer emits null.
    let store = Store {
        latest: Reply::Json(json!({"-N1": {"lat": null, "lng": 10.0, "timestamp": now_ms()}})),
        history: Reply::Json(json!({
            "-N1": {"lat": null, "lng": 10.0, "timestamp": now_ms()},
            "-N2": location(now_ms() - 1_000, json!(-6.2)),
        })),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &store);

    assert!(model.view_state.current_location.is_none());
    assert_eq!(model.view_state.history.len(), 1);
    assert!(!model.view_state.online);
}

#[test]
fn online_flag_follows_two_minute_threshold() {
    let app = Tester::default();

    let mut fresh = Model::default();
    let store = Store {
        latest: latest_at(now_ms() - 60_000),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut fresh, &store);
    assert!(fresh.view_state.online);

    let mut stale = Model::default();
    let store = Store {
        latest: latest_at(now_ms() - 180_000),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut stale, &store);
    assert!(!stale.view_state.online);

    let mut empty = Model::default();
    refresh_and_serve(&app, &mut empty, &Store::default());
    assert!(!empty.view_state.online);
    assert!(app.view(&empty).awaiting_data);
}

#[test]
fn retain_policy_keeps_last_good_value() {
    let app = Tester::default();
    let mut model = Model::default();

    let good = Store {
        stats: stats(2.0),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &good);
    assert!(model.view_state.stats.is_some());

    let broken = Store {
        stats: Reply::Json(json!({"todayDistance": "two"})),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &broken);
    assert!(model.view_state.stats.is_some());
}

#[test]
fn clear_policy_drops_missing_facets() {
    let app = Tester::default();
    let mut model = Model::default();

    let mut config = DashboardConfig::default();
    config.stale_policy = StalePolicy::Clear;
    update(&app, &mut model, Event::Configure(Box::new(config)));

    let good = Store {
        stats: stats(2.0),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &good);
    assert!(model.view_state.stats.is_some());

    let missing = Store {
        stats: Reply::Status(404, "null"),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &missing);
    assert!(model.view_state.stats.is_none());
}

#[test]
fn transport_failure_never_clears_data() {
    let app = Tester::default();
    let mut model = Model::default();

    let mut config = DashboardConfig::default();
    config.stale_policy = StalePolicy::Clear;
    update(&app, &mut model, Event::Configure(Box::new(config)));

    refresh_and_serve(
        &app,
        &mut model,
        &Store {
            stats: stats(2.0),
            ..Store::default()
        },
    );
    refresh_and_expire(
        &app,
        &mut model,
        &Store {
            stats: Reply::Hang,
            ..Store::default()
        },
    );
    assert!(model.view_state.stats.is_some());
}

#[test]
fn triggers_during_a_cycle_are_coalesced() {
    let app = Tester::default();
    let mut model = Model::default();

    let mut pending = update(&app, &mut model, Event::Refresh);
    let first = model.cycle.as_ref().expect("cycle in flight").id;

    let second = update(&app, &mut model, Event::Refresh);
    let third = update(&app, &mut model, Event::Refresh);
    assert!(second.http.is_empty());
    assert!(third.http.is_empty());
    assert!(model.queued_cycle);

    let next = serve(&app, &mut model, &mut pending, &Store::default());
    assert_eq!(next.http.len(), 4, "exactly one follow-up cycle");
    assert!(!model.queued_cycle);

    let follow_up = model.cycle.as_ref().expect("follow-up in flight");
    assert_ne!(follow_up.id, first);
    assert_eq!(follow_up.trigger, CycleTrigger::Queued);
}

#[test]
fn stop_drops_the_queued_cycle() {
    let app = Tester::default();
    let mut model = Model::default();

    let mut pending = update(&app, &mut model, Event::Start);
    update(&app, &mut model, Event::Refresh);
    assert!(model.queued_cycle);

    update(&app, &mut model, Event::Stop);
    assert!(!model.queued_cycle);

    let next = serve(&app, &mut model, &mut pending, &Store::default());
    assert!(next.http.is_empty());
    assert!(model.cycle.is_none());
}

#[test]
fn malformed_body_is_treated_as_absent() {
    let app = Tester::default();
    let mut model = Model::default();

    let store = Store {
        latest: Reply::Status(200, "{not json"),
        ..Store::default()
    };
    refresh_and_serve(&app, &mut model, &store);

    assert!(model.view_state.current_location.is_none());
    assert_eq!(model.view_state.last_fetch_error, None);
    assert_eq!(model.view_state.phase, PollerPhase::Ready);
}
