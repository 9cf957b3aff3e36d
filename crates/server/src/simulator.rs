//! The simulation state machine.
//!
//! One logical timeline: at most one step task exists, it re-checks the
//! phase at every step boundary, and the control operations either flip the
//! phase (`pause`), abort the pending task (`stop`), or spawn a fresh task
//! from the retained indices (`start`, `resume`). Waits happen between
//! dispatches, so the control surface stays responsive throughout a run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use shuttle_sim_core::path::{build_path, stop_index};
use shuttle_sim_core::trip::segment_between;
use shuttle_sim_core::{Coordinate, Stop, event};

use crate::config::{ConfigOverrides, SimConfig};
use crate::error::{Result, SimulatorError};
use crate::sink::{BroadcastSink, CouchStore, Dispatcher, DocumentStore, SinkError};
use crate::source::{SourceFetcher, load_sources};

/// Settle delay between arriving at a stop and ending the trip.
const STOP_SETTLE: Duration = Duration::from_millis(500);
/// Delay between closing the doors and departing.
const DEPARTURE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Immutable per-run data, rebuilt on every start.
struct RunContext {
    route: Vec<Coordinate>,
    stops: Vec<Stop>,
    path: Vec<Coordinate>,
}

struct Inner {
    config: SimConfig,
    phase: Phase,
    step: usize,
    lap: i64,
    context: Option<Arc<RunContext>>,
    /// Segment currently being traversed; retained across pauses so
    /// position events keep their distances after a resume.
    trip: Arc<Vec<Coordinate>>,
    dispatcher: Dispatcher,
    task: Option<JoinHandle<()>>,
}

/// Builds the document store for a run from the effective configuration.
pub type StoreBuilder = Box<dyn Fn(&SimConfig) -> Arc<dyn DocumentStore> + Send + Sync>;

struct Shared {
    state: Mutex<Inner>,
    fetcher: Arc<dyn SourceFetcher>,
    broadcast: Arc<BroadcastSink>,
    store_builder: StoreBuilder,
}

/// Cheaply cloneable handle to the one simulation timeline.
#[derive(Clone)]
pub struct Simulator {
    shared: Arc<Shared>,
}

/// Read-only state snapshot returned by `info`; never fails.
#[derive(Serialize)]
pub struct SimulatorInfo {
    pub phase: Phase,
    pub step: usize,
    pub lap: i64,
    pub config: SimConfig,
}

impl Simulator {
    pub fn new(config: SimConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self::with_store_builder(
            config,
            fetcher,
            Box::new(|config| Arc::new(CouchStore::from_target(&config.target_db))),
        )
    }

    /// Same as [`Simulator::new`] with the document store swapped out, for
    /// deployments with a different store (and for tests).
    pub fn with_store_builder(
        config: SimConfig,
        fetcher: Arc<dyn SourceFetcher>,
        store_builder: StoreBuilder,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    config,
                    phase: Phase::Idle,
                    step: 0,
                    lap: 0,
                    context: None,
                    trip: Arc::new(Vec::new()),
                    dispatcher: Dispatcher::default(),
                    task: None,
                }),
                fetcher,
                broadcast: Arc::new(BroadcastSink::new()),
                store_builder,
            }),
        }
    }

    /// Subscribe to the broadcast channel; `None` before the first start.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        self.shared.broadcast.subscribe()
    }

    /// Load sources, initialize sinks, build the travel path, and begin
    /// stepping. Allowed from idle, stopped, or paused (a paused simulator
    /// restarts as a fresh run); rejected while actively running.
    pub async fn start(&self, overrides: ConfigOverrides) -> Result<()> {
        let config = {
            let mut state = self.shared.state.lock().await;
            if state.phase == Phase::Running {
                return Err(SimulatorError::AlreadyRunning);
            }
            state.config.apply(overrides);
            state.config.clone()
        };

        // Everything fallible happens before any state transition.
        let (route, stops) = load_sources(self.shared.fetcher.as_ref(), &config).await?;

        self.shared.broadcast.open();
        let store = (self.shared.store_builder)(&config);
        let store = match store.check().await {
            Ok(()) => {
                info!(store = %store.describe(), "document store connected");
                Some(store)
            }
            Err(err) => {
                warn!(
                    store = %store.describe(),
                    %err,
                    "document store unavailable, continuing without it"
                );
                None
            }
        };
        let dispatcher = Dispatcher::new(Some(Arc::clone(&self.shared.broadcast)), store);

        let path = build_path(&route, &stops, config.precision_m);
        let context = Arc::new(RunContext { route, stops, path });

        dispatcher
            .dispatch(&event::route_info(&context.route, &context.stops))
            .await?;

        let mut state = self.shared.state.lock().await;
        if state.phase == Phase::Running {
            // Lost a race against a concurrent start.
            return Err(SimulatorError::AlreadyRunning);
        }
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.phase = Phase::Running;
        state.step = 0;
        state.lap = 0;
        state.trip = Arc::new(Vec::new());
        state.context = Some(Arc::clone(&context));
        state.dispatcher = dispatcher;
        state.task = Some(tokio::spawn(run_loop(Arc::clone(&self.shared))));
        info!(
            path = context.path.len(),
            stops = context.stops.len(),
            "simulator started"
        );
        Ok(())
    }

    /// Halt stepping at the next step boundary, retaining position.
    pub async fn pause(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        match state.phase {
            Phase::Running => {
                state.phase = Phase::Paused;
                info!(step = state.step, lap = state.lap, "simulator paused");
                Ok(())
            }
            _ => Err(SimulatorError::NotRunning),
        }
    }

    /// Resume a paused run from the retained step and lap.
    pub async fn resume(&self) -> Result<()> {
        let previous = {
            let mut state = self.shared.state.lock().await;
            match state.phase {
                Phase::Paused => {}
                Phase::Running => return Err(SimulatorError::NotPaused),
                Phase::Idle | Phase::Stopped => return Err(SimulatorError::NotStarted),
            }
            state.task.take()
        };

        // Let an in-flight step drain before stepping again: the old task
        // exits at its next boundary because the phase is no longer Running.
        if let Some(task) = previous {
            let _ = task.await;
        }

        let mut state = self.shared.state.lock().await;
        if state.phase != Phase::Paused {
            // Stopped (or restarted) while we waited.
            return Err(SimulatorError::NotPaused);
        }
        state.phase = Phase::Running;
        state.task = Some(tokio::spawn(run_loop(Arc::clone(&self.shared))));
        info!(step = state.step, lap = state.lap, "simulator resumed");
        Ok(())
    }

    /// End the run: cancel the pending step and release sink connections.
    pub async fn stop(&self) -> Result<()> {
        let dispatcher = {
            let mut state = self.shared.state.lock().await;
            match state.phase {
                Phase::Idle | Phase::Stopped => return Err(SimulatorError::NotRunning),
                Phase::Running | Phase::Paused => {}
            }
            if let Some(task) = state.task.take() {
                task.abort();
            }
            state.phase = Phase::Stopped;
            state.context = None;
            std::mem::take(&mut state.dispatcher)
        };
        dispatcher.close().await;
        info!("simulator stopped");
        Ok(())
    }

    /// Current phase, position and (masked) configuration.
    pub async fn info(&self) -> SimulatorInfo {
        let state = self.shared.state.lock().await;
        SimulatorInfo {
            phase: state.phase,
            step: state.step,
            lap: state.lap,
            config: state.config.masked(),
        }
    }
}

/// The step loop. Exits when the phase leaves `Running`, when the run
/// completes, or when a dispatch fails.
async fn run_loop(shared: Arc<Shared>) {
    loop {
        let (context, dispatcher, config, step, lap, trip) = {
            let state = shared.state.lock().await;
            if state.phase != Phase::Running {
                return;
            }
            let Some(context) = state.context.clone() else {
                return;
            };
            (
                context,
                state.dispatcher.clone(),
                state.config.clone(),
                state.step,
                state.lap,
                Arc::clone(&state.trip),
            )
        };

        if context.path.is_empty() {
            warn!("travel path is empty, nothing to simulate");
            finish_run(&shared).await;
            return;
        }

        if step >= context.path.len() {
            // Lap boundary.
            if config.laps < 1 && dispatcher.live_subscribers() == 0 {
                info!("no live subscribers on an unbounded run, stopping");
                finish_run(&shared).await;
                return;
            }
            if config.laps < 1 || lap + 1 < config.laps {
                let mut state = shared.state.lock().await;
                state.step = 0;
                state.lap = lap + 1;
                continue;
            }
            info!(laps = config.laps, "all laps complete");
            finish_run(&shared).await;
            return;
        }

        match run_step(&shared, &context, &dispatcher, &config, step, trip).await {
            Ok(next_step) => {
                let mut state = shared.state.lock().await;
                state.step = next_step;
            }
            Err(err) => {
                error!(%err, "event dispatch failed, ending run");
                finish_run(&shared).await;
                return;
            }
        }
    }
}

/// Execute one step of the timeline and return the step to advance to.
async fn run_step(
    shared: &Arc<Shared>,
    context: &RunContext,
    dispatcher: &Dispatcher,
    config: &SimConfig,
    step: usize,
    trip: Arc<Vec<Coordinate>>,
) -> std::result::Result<usize, SinkError> {
    let path = &context.path;
    let stops = &context.stops;
    let current = &path[step];

    // The stop after this one, wrapping past the last stop to the first.
    let at_stop = stop_index(stops, current);
    let next = at_stop
        .map(|i| stops[(i + 1) % stops.len()].coordinates.clone())
        .unwrap_or_else(|| current.clone());

    if step == 0 {
        begin_trip(shared, path, current, &next, stops, dispatcher).await?;
        sleep(config.interval()).await;
        return Ok(step + 1);
    }

    if at_stop.is_some() {
        dispatcher
            .dispatch(&event::geo_position(current, Some(trip.as_slice())))
            .await?;
        sleep(STOP_SETTLE).await;
        dispatcher.dispatch(&event::trip_end(&trip, stops)).await?;
        dispatcher.dispatch(&event::door_open()).await?;
        sleep(config.stop_duration()).await;
        dispatcher.dispatch(&event::door_close()).await?;
        sleep(DEPARTURE_DELAY).await;

        let next_step = step + 1;
        if next_step < path.len() {
            begin_trip(shared, path, current, &next, stops, dispatcher).await?;
            sleep(config.interval()).await;
        }
        return Ok(next_step);
    }

    dispatcher
        .dispatch(&event::geo_position(current, Some(trip.as_slice())))
        .await?;
    sleep(config.interval()).await;
    Ok(step + 1)
}

/// Compute the next trip segment, retain it for subsequent position events,
/// and emit the departure pair.
async fn begin_trip(
    shared: &Arc<Shared>,
    path: &[Coordinate],
    current: &Coordinate,
    next: &Coordinate,
    stops: &[Stop],
    dispatcher: &Dispatcher,
) -> std::result::Result<(), SinkError> {
    let trip = Arc::new(segment_between(path, current, next));
    {
        let mut state = shared.state.lock().await;
        state.trip = Arc::clone(&trip);
    }
    dispatcher.dispatch(&event::trip_start(&trip, stops)).await?;
    dispatcher
        .dispatch(&event::geo_position(current, Some(trip.as_slice())))
        .await?;
    Ok(())
}

/// Natural end of a run: from inside the step task itself, so the task is
/// not aborted, just released.
async fn finish_run(shared: &Arc<Shared>) {
    let dispatcher = {
        let mut state = shared.state.lock().await;
        state.phase = Phase::Stopped;
        state.context = None;
        state.task = None;
        std::mem::take(&mut state.dispatcher)
    };
    dispatcher.close().await;
    info!("simulator run ended");
}
