//! Presentation state: one record, changed only through [`Action`]s.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use crate::model::{CityCandidate, Coordinate, ForecastSeries, WeatherSnapshot};

const CHANNEL_CAPACITY: usize = 64;

/// Where the location workflow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Geolocating,
    AwaitingSelection,
    Resolved,
    /// Search found nothing or failed. Not terminal; any new action moves on.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub phase: Phase,
    pub position: Option<Coordinate>,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSeries>,
    pub loading: bool,
    pub forecast_loading: bool,
    pub search_loading: bool,
    pub geolocating: bool,
    pub forecast_open: bool,
    pub error: Option<String>,
    pub forecast_error: Option<String>,
    /// Informational message that survives position changes (e.g. geolocation unsupported).
    pub notice: Option<String>,
    pub candidates: Vec<CityCandidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    GeolocationStarted,
    GeolocationFinished,
    Notice(String),

    SearchStarted,
    CandidatesFound(Vec<CityCandidate>),
    SearchFailed(String),
    SearchSettled,

    /// A coordinate was chosen: click, search hit, candidate pick or startup.
    PositionChanged(Coordinate),

    WeatherRequested,
    WeatherLoaded(WeatherSnapshot),
    WeatherFailed(String),
    WeatherSettled,

    ForecastOpened,
    ForecastClosed,
    ForecastRequested,
    ForecastLoaded(ForecastSeries),
    ForecastFailed(String),
    ForecastSettled,
}

/// Apply one action. Pure; no I/O.
pub fn reduce(state: &mut AppState, action: Action) {
    match action {
        Action::GeolocationStarted => {
            state.phase = Phase::Geolocating;
            state.geolocating = true;
        }
        Action::GeolocationFinished => state.geolocating = false,
        Action::Notice(message) => state.notice = Some(message),

        Action::SearchStarted => {
            state.search_loading = true;
            state.candidates.clear();
            if state.phase == Phase::AwaitingSelection {
                state.phase = Phase::Idle;
            }
        }
        Action::CandidatesFound(candidates) => {
            state.phase = Phase::AwaitingSelection;
            state.candidates = candidates;
        }
        Action::SearchFailed(message) => {
            state.phase = Phase::Failed;
            state.candidates.clear();
            state.error = Some(message);
        }
        Action::SearchSettled => state.search_loading = false,

        Action::PositionChanged(coordinate) => {
            state.phase = Phase::Resolved;
            state.position = Some(coordinate);
            state.candidates.clear();
            state.error = None;
        }

        Action::WeatherRequested => {
            state.loading = true;
            state.error = None;
        }
        Action::WeatherLoaded(snapshot) => {
            state.weather = Some(snapshot);
            state.error = None;
        }
        Action::WeatherFailed(message) => {
            state.weather = None;
            state.error = Some(message);
        }
        Action::WeatherSettled => state.loading = false,

        Action::ForecastOpened => {
            state.forecast_open = true;
        }
        Action::ForecastClosed => {
            state.forecast_open = false;
            state.forecast = None;
            state.forecast_error = None;
        }
        Action::ForecastRequested => {
            state.forecast_loading = true;
            state.forecast_error = None;
        }
        Action::ForecastLoaded(series) => {
            // A response arriving after the view was closed is dropped.
            if state.forecast_open {
                state.forecast = Some(series);
                state.forecast_error = None;
            }
        }
        Action::ForecastFailed(message) => {
            state.forecast = None;
            if state.forecast_open {
                state.forecast_error = Some(message);
            }
        }
        Action::ForecastSettled => state.forecast_loading = false,
    }
}

/// What the info panel shows, in priority order loading > error > data > empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Panel<'a> {
    Loading,
    Error(&'a str),
    Weather(&'a WeatherSnapshot),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForecastPanel<'a> {
    Loading,
    Error(&'a str),
    Forecast(&'a ForecastSeries),
}

impl AppState {
    pub fn panel(&self) -> Panel<'_> {
        if self.loading {
            Panel::Loading
        } else if let Some(error) = self.error.as_deref() {
            Panel::Error(error)
        } else if let Some(weather) = &self.weather {
            Panel::Weather(weather)
        } else {
            Panel::Empty
        }
    }

    /// `None` while the forecast view is closed, or open with nothing to show yet.
    pub fn forecast_panel(&self) -> Option<ForecastPanel<'_>> {
        if !self.forecast_open {
            return None;
        }
        if self.forecast_loading {
            Some(ForecastPanel::Loading)
        } else if let Some(error) = self.forecast_error.as_deref() {
            Some(ForecastPanel::Error(error))
        } else {
            self.forecast.as_ref().map(ForecastPanel::Forecast)
        }
    }
}

/// Holds the current [`AppState`] and broadcasts every new version to subscribers.
#[derive(Debug)]
pub struct Store {
    state: Mutex<AppState>,
    tx: broadcast::Sender<AppState>,
}

impl Default for Store {
    fn default() -> Self {
        Self::with_state(AppState::default())
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AppState) -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(state),
            tx,
        }
    }

    pub fn dispatch(&self, action: Action) {
        trace!(?action, "dispatch");
        let mut state = self.state.lock();
        reduce(&mut state, action);
        // Sent under the lock so subscribers observe states in dispatch order.
        let _ = self.tx.send(state.clone());
    }

    pub fn snapshot(&self) -> AppState {
        self.state.lock().clone()
    }

    /// Receive every state produced after this call. Slow receivers skip ahead (`Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<AppState> {
        self.tx.subscribe()
    }
}
