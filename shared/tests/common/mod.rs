#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use serde_json::{json, Value};
use shared::capabilities::{TimerOperation, TimerOutput};
use shared::{App, Effect, Event, Model, ResourceKind, TimerId};

pub type Tester = AppTester<App, Effect>;

pub const DEVICE: &str = "ESP32_TRACKER_001";

#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    Status(u16, &'static str),
    /// Never answered; the cycle can only end through its deadline.
    Hang,
}

#[derive(Clone, Debug)]
pub struct Store {
    pub latest: Reply,
    pub stats: Reply,
    pub emergency: Reply,
    pub history: Reply,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            latest: Reply::Json(Value::Null),
            stats: Reply::Json(Value::Null),
            emergency: Reply::Json(Value::Null),
            history: Reply::Json(Value::Null),
        }
    }
}

impl Store {
    pub fn reply(&self, resource: ResourceKind) -> &Reply {
        match resource {
            ResourceKind::LatestLocation => &self.latest,
            ResourceKind::Stats => &self.stats,
            ResourceKind::Emergency => &self.emergency,
            ResourceKind::History => &self.history,
        }
    }
}

pub fn now_ms() -> u64 {
    shared::get_current_time_ms()
}

pub fn location(timestamp: u64, lat: Value) -> Value {
    json!({
        "lat": lat,
        "lng": 106.8456,
        "timestamp": timestamp,
        "accuracy": 3.5,
        "satellites": 8,
        "speed": 24.0,
        "isEmergency": false,
        "deviceId": DEVICE
    })
}

/// A store keyed the way the realtime database answers `limitToLast=1`.
pub fn latest_at(timestamp: u64) -> Reply {
    Reply::Json(json!({ "-Nlatest": location(timestamp, json!(-6.2088)) }))
}

pub fn stats(distance: f64) -> Reply {
    Reply::Json(json!({
        "todayDistance": distance,
        "locationCount": 42,
        "lastUpdate": now_ms() - 30_000,
        "deviceId": DEVICE,
        "wifiConnected": true,
        "gsmConnected": false
    }))
}

pub fn resource_for(url: &str) -> ResourceKind {
    if url.contains("/stats.json") {
        ResourceKind::Stats
    } else if url.contains("/emergency.json") {
        ResourceKind::Emergency
    } else if url.ends_with("limitToLast=1") {
        ResourceKind::LatestLocation
    } else {
        ResourceKind::History
    }
}

#[derive(Default)]
pub struct Effects {
    pub http: Vec<Request<HttpRequest>>,
    pub timers: Vec<Request<TimerOperation>>,
    pub renders: usize,
}

impl Effects {
    pub fn new(effects: Vec<Effect>) -> Self {
        let mut out = Self::default();
        out.extend(effects);
        out
    }

    pub fn extend(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Http(request) => self.http.push(request),
                Effect::Timer(request) => self.timers.push(request),
                Effect::Render(_) => self.renders += 1,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.timers.is_empty() && self.renders == 0
    }

    pub fn timer_starts(&self) -> Vec<(TimerId, u64)> {
        self.timers
            .iter()
            .filter_map(|r| match r.operation {
                TimerOperation::Start { id, millis } => Some((id, millis)),
                TimerOperation::Cancel { .. } => None,
            })
            .collect()
    }

    pub fn timer_cancels(&self) -> Vec<TimerId> {
        self.timers
            .iter()
            .filter_map(|r| match r.operation {
                TimerOperation::Cancel { id } => Some(id),
                TimerOperation::Start { .. } => None,
            })
            .collect()
    }

    pub fn take_timer(&mut self, id: TimerId) -> Option<Request<TimerOperation>> {
        let index = self
            .timers
            .iter()
            .position(|r| matches!(r.operation, TimerOperation::Start { id: started, .. } if started == id))?;
        Some(self.timers.remove(index))
    }

    pub fn take_http(&mut self, resource: ResourceKind) -> Option<Request<HttpRequest>> {
        let index = self
            .http
            .iter()
            .position(|r| resource_for(&r.operation.url) == resource)?;
        Some(self.http.remove(index))
    }

    pub fn urls(&self) -> Vec<String> {
        self.http.iter().map(|r| r.operation.url.clone()).collect()
    }
}

pub fn update(app: &Tester, model: &mut Model, event: Event) -> Effects {
    Effects::new(app.update(event, model).effects)
}

/// Resolves one HTTP request and feeds the resulting events back into the app.
pub fn answer(
    app: &Tester,
    model: &mut Model,
    mut request: Request<HttpRequest>,
    response: HttpResponse,
) -> Effects {
    let update = app.resolve(&mut request, HttpResult::Ok(response)).expect("http request resolves");
    let mut out = Effects::default();
    for event in update.events {
        out.extend(app.update(event, model).effects);
    }
    out
}

/// Fires or cancels a timer and feeds the resulting event back into the app.
pub fn fire(
    app: &Tester,
    model: &mut Model,
    mut request: Request<TimerOperation>,
    output: TimerOutput,
) -> Effects {
    let update = app.resolve(&mut request, output).expect("timer request resolves");
    let mut out = Effects::default();
    for event in update.events {
        out.extend(app.update(event, model).effects);
    }
    out
}

/// Answers every pending read from `store` and returns what the app asked for next.
pub fn serve(app: &Tester, model: &mut Model, pending: &mut Effects, store: &Store) -> Effects {
    let mut out = Effects::default();
    for request in std::mem::take(&mut pending.http) {
        let resource = resource_for(&request.operation.url);
        let response = match store.reply(resource) {
            Reply::Json(value) => HttpResponse::ok().body(value.to_string()).build(),
            Reply::Status(status, body) => HttpResponse::status(*status).body(*body).build(),
            Reply::Hang => {
                pending.http.push(request);
                continue;
            }
        };
        let next = answer(app, model, request, response);
        out.http.extend(next.http);
        out.timers.extend(next.timers);
        out.renders += next.renders;
    }
    out
}

/// Starts polling and completes the first cycle against `store`.
pub fn start_and_serve(app: &Tester, model: &mut Model, store: &Store) -> Effects {
    let mut started = update(app, model, Event::Start);
    let mut next = serve(app, model, &mut started, store);
    next.timers.extend(started.timers);
    next
}

/// Runs a manual refresh to completion against `store`.
pub fn refresh_and_serve(app: &Tester, model: &mut Model, store: &Store) -> Effects {
    let mut pending = update(app, model, Event::Refresh);
    let mut next = serve(app, model, &mut pending, store);
    next.timers.extend(pending.timers);
    next
}

/// Runs a manual refresh whose unanswered reads outlive the cycle deadline.
pub fn refresh_and_expire(app: &Tester, model: &mut Model, store: &Store) -> Effects {
    let mut pending = update(app, model, Event::Refresh);
    serve(app, model, &mut pending, store);
    let deadline = model.cycle.as_ref().expect("cycle still in flight").deadline;
    let timer = pending.take_timer(deadline).expect("deadline armed");
    fire(app, model, timer, TimerOutput::Fired { id: deadline })
}
