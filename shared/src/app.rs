use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capabilities::{classify, Capabilities, Fetched, HttpError, HttpResult, TimerOutput};
use crate::config::{DashboardConfig, StalePolicy};
use crate::error::AppError;
use crate::event::{CycleId, CycleTrigger, Event, ResourceKind, TimerId};
use crate::format::is_online;
use crate::model::{Cycle, CycleOutcome, Model, PollerPhase, ViewState};
use crate::normalize::{normalize, Payload, Rejection, Validation};
use crate::view::ViewModel;
use crate::CYCLE_DEADLINE_GRACE_MS;

#[derive(Default)]
pub struct App;

impl App {
    fn arm_interval(model: &mut Model, caps: &Capabilities) {
        let timer = model.poller.allocate_timer();
        model.poller.interval_timer = Some(timer);
        caps.timer
            .start(timer, model.config.poll_interval(), move |output| Event::Tick {
                timer,
                output,
            });
    }

    /// Starts a cycle, or queues one behind the cycle already in flight.
    fn begin_cycle(trigger: CycleTrigger, model: &mut Model, caps: &Capabilities) {
        if let Some(current) = &model.cycle {
            if !model.queued_cycle {
                debug!(cycle = %current.id, ?trigger, "cycle in flight, queueing follow-up");
            }
            model.queued_cycle = true;
            return;
        }

        let id = model.allocate_cycle();
        let deadline = model.poller.allocate_timer();
        let timeout = model.config.request_timeout();

        let mut cycle = Cycle::new(id, trigger, deadline);
        for resource in ResourceKind::ALL {
            match model.config.resource_url(resource) {
                Ok(url) => {
                    let request_id = Uuid::new_v4();
                    debug!(cycle = %id, %resource, %request_id, %url, "fetching");
                    caps.http
                        .get(url.as_str())
                        .send(move |result| Event::ResourceFetched {
                            cycle: id,
                            resource,
                            result: Box::new(result),
                        });
                }
                Err(e) => {
                    warn!(cycle = %id, %resource, error = %e, "cannot build resource url");
                    cycle.settle(resource);
                }
            }
        }

        model.view_state.is_refreshing = true;
        model.view_state.last_fetch_error = None;
        model.view_state.phase = PollerPhase::Loading;
        info!(cycle = %id, ?trigger, "cycle started");

        if cycle.is_settled() {
            model.cycle = Some(cycle);
            Self::finish_cycle(model, caps, false);
            return;
        }

        let wait = timeout + Duration::from_millis(CYCLE_DEADLINE_GRACE_MS);
        caps.timer
            .start(deadline, wait, move |output| Event::CycleDeadline { cycle: id, output });
        model.cycle = Some(cycle);
        caps.render.render();
    }

    fn on_resource_fetched(
        cycle_id: CycleId,
        resource: ResourceKind,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let Some(cycle) = model.cycle.as_mut().filter(|c| c.id == cycle_id) else {
            debug!(cycle = %cycle_id, %resource, "discarding response for a finished cycle");
            return;
        };
        if !cycle.settle(resource) {
            debug!(cycle = %cycle_id, %resource, "duplicate response ignored");
            return;
        }

        match classify(result) {
            Ok(Fetched::Body(body)) => {
                match normalize(resource, &body, model.config.history_limit) {
                    Validation::Valid(payload) => Self::apply(payload, &mut model.view_state),
                    Validation::Invalid(rejection) => {
                        Self::mark_absent(resource, &rejection, model);
                    }
                }
            }
            Ok(Fetched::Status(status)) => {
                debug!(cycle = %cycle_id, %resource, status, "no data this cycle");
                if model.config.stale_policy == StalePolicy::Clear {
                    model.view_state.clear(resource);
                }
            }
            Err(error) => {
                warn!(cycle = %cycle_id, %resource, %error, "transport failure");
                cycle.fail(error);
            }
        }

        if model.cycle.as_ref().is_some_and(Cycle::is_settled) {
            Self::finish_cycle(model, caps, true);
        }
    }

    fn on_cycle_deadline(
        cycle_id: CycleId,
        output: TimerOutput,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !output.has_fired() {
            return;
        }
        let Some(cycle) = model.cycle.as_mut().filter(|c| c.id == cycle_id) else {
            return;
        };

        warn!(
            cycle = %cycle_id,
            outstanding = ?cycle.outstanding(),
            "cycle deadline reached"
        );
        cycle.fail(HttpError::Timeout {
            timeout_ms: model.config.request_timeout_ms,
        });
        cycle.settle_all();
        Self::finish_cycle(model, caps, false);
    }

    fn apply(payload: Payload, state: &mut ViewState) {
        match payload {
            Payload::LatestLocation(sample) => state.current_location = Some(sample),
            Payload::Stats(stats) => state.stats = Some(stats),
            Payload::Emergency(record) => state.emergency = Some(record),
            Payload::History(history) => state.history = history,
        }
    }

    fn mark_absent(resource: ResourceKind, rejection: &Rejection, model: &mut Model) {
        if *rejection == Rejection::Empty {
            debug!(%resource, "no data stored yet");
        } else {
            debug!(%resource, %rejection, "payload rejected");
        }
        if model.config.stale_policy == StalePolicy::Clear {
            model.view_state.clear(resource);
        }
    }

    fn finish_cycle(model: &mut Model, caps: &Capabilities, cancel_deadline: bool) {
        let Some(cycle) = model.cycle.take() else {
            return;
        };
        if cancel_deadline {
            caps.timer.cancel(cycle.deadline);
        }

        let state = &mut model.view_state;
        state.is_loading = false;
        state.is_refreshing = false;

        let outcome = match cycle.failure {
            Some(error) => {
                let error = AppError::from(error).with_context("cycle", cycle.id.to_string());
                warn!(cycle = %cycle.id, code = error.code(), "cycle failed");
                state.online = false;
                state.last_fetch_error = Some(error.user_facing_message());
                state.phase = PollerPhase::Failed;
                CycleOutcome::Failed {
                    cycle: cycle.id,
                    trigger: cycle.trigger,
                    error,
                }
            }
            None => {
                state.online = is_online(
                    state.current_location.as_ref(),
                    model.now,
                    model.config.online_threshold_ms,
                );
                state.last_fetch_error = None;
                state.phase = PollerPhase::Ready;
                info!(
                    cycle = %cycle.id,
                    online = state.online,
                    history = state.history.len(),
                    "cycle complete"
                );
                CycleOutcome::Ready {
                    cycle: cycle.id,
                    trigger: cycle.trigger,
                }
            }
        };

        model.last_outcome = Some(outcome);
        model.cycles_completed += 1;
        caps.render.render();

        if std::mem::take(&mut model.queued_cycle) {
            Self::begin_cycle(CycleTrigger::Queued, model, caps);
        }
    }

    fn on_tick(timer: TimerId, output: TimerOutput, model: &mut Model, caps: &Capabilities) {
        let current = model.poller.running && model.poller.interval_timer == Some(timer);
        if !current || !output.has_fired() {
            debug!(%timer, "ignoring stale tick");
            return;
        }
        Self::arm_interval(model, caps);
        Self::begin_cycle(CycleTrigger::Interval, model, caps);
    }

    fn on_configure(config: DashboardConfig, model: &mut Model, caps: &Capabilities) {
        if model.poller.running {
            warn!("configuration change ignored while polling; stop first");
            return;
        }
        match config.validate() {
            Ok(()) => {
                info!(
                    device = %config.device_id,
                    interval_ms = config.poll_interval_ms,
                    "configuration applied"
                );
                // Answers read under the old configuration must not land in the new view.
                if let Some(abandoned) = model.cycle.take() {
                    debug!(cycle = %abandoned.id, "abandoning in-flight cycle");
                    caps.timer.cancel(abandoned.deadline);
                }
                model.config = config;
                model.view_state = ViewState::default();
                model.queued_cycle = false;
                model.last_outcome = None;
            }
            Err(e) => {
                warn!(error = %e, "configuration rejected");
                model.view_state.last_fetch_error = Some(AppError::from(e).user_facing_message());
            }
        }
        caps.render.render();
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();

        let event_name = event.name();
        if event.is_user_initiated() {
            debug!(event = event_name, "user action");
        }

        match event {
            Event::Start => {
                if model.poller.running {
                    debug!("poller already running");
                    return;
                }
                model.poller.running = true;
                if model.cycles_completed == 0 {
                    model.view_state.is_loading = true;
                }
                info!(interval_ms = model.config.poll_interval_ms, "poller started");
                Self::arm_interval(model, caps);
                Self::begin_cycle(CycleTrigger::Start, model, caps);
            }

            Event::Stop => {
                if !model.poller.running {
                    debug!("poller already stopped");
                    return;
                }
                model.poller.running = false;
                model.queued_cycle = false;
                if let Some(timer) = model.poller.interval_timer.take() {
                    caps.timer.cancel(timer);
                }
                info!("poller stopped");
                caps.render.render();
            }

            Event::Configure(config) => Self::on_configure(*config, model, caps),

            Event::Refresh => Self::begin_cycle(CycleTrigger::Manual, model, caps),

            Event::Tick { timer, output } => Self::on_tick(timer, output, model, caps),

            Event::ResourceFetched {
                cycle,
                resource,
                result,
            } => Self::on_resource_fetched(cycle, resource, *result, model, caps),

            Event::CycleDeadline { cycle, output } => {
                Self::on_cycle_deadline(cycle, output, model, caps);
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::build(model)
    }
}
