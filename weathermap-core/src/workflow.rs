//! Location resolution: turns user actions into a coordinate and a weather fetch.
//!
//! Every operation reflects its progress into the shared [`Store`]. Requests are not
//! cancelled or sequenced: when two overlap, whichever response lands last wins.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::{GeolocationError, WorkflowError},
    geolocation::{self, GeolocationOptions, Geolocator},
    model::{CityCandidate, Coordinate},
    provider::{Geocoder, WeatherProvider, openweather_from_config},
    state::{Action, Phase, Store},
};

pub const GEOLOCATION_UNSUPPORTED_NOTICE: &str = "Geolocation is not supported on this system";

/// Result of a place-name search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Query was blank; nothing was requested.
    Blank,
    NotFound,
    /// Exactly one match; weather was fetched for it.
    Resolved(CityCandidate),
    /// Several matches; waiting for [`LocationWorkflow::select`].
    Ambiguous(Vec<CityCandidate>),
}

/// Dispatches `action` when dropped, so settle actions run on every exit path.
struct SettleGuard<'a> {
    store: &'a Store,
    action: Option<Action>,
}

impl<'a> SettleGuard<'a> {
    fn new(store: &'a Store, action: Action) -> Self {
        Self {
            store,
            action: Some(action),
        }
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            self.store.dispatch(action);
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationWorkflow {
    store: Arc<Store>,
    weather: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
    geolocator: Arc<dyn Geolocator>,
    options: GeolocationOptions,
    default_position: Coordinate,
    search_limit: usize,
}

impl LocationWorkflow {
    pub fn new(
        store: Arc<Store>,
        weather: Arc<dyn WeatherProvider>,
        geocoder: Arc<dyn Geocoder>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Self {
        Self {
            store,
            weather,
            geocoder,
            geolocator,
            options: GeolocationOptions::default(),
            default_position: crate::config::DEFAULT_POSITION,
            search_limit: crate::config::DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Wire up OpenWeather and the configured geolocator.
    pub fn from_config(config: &Config, store: Arc<Store>) -> anyhow::Result<Self> {
        let client = Arc::new(openweather_from_config(config)?);
        let geolocator = geolocation::geolocator_from_config(&config.geolocation);

        Ok(Self::new(store, client.clone(), client, geolocator)
            .with_options(config.geolocation.options())
            .with_default_position(config.default_position)
            .with_search_limit(config.search_limit))
    }

    pub fn with_options(mut self, options: GeolocationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default_position(mut self, position: Coordinate) -> Self {
        self.default_position = position;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Startup: locate the user, or fall back to the default position, then fetch weather.
    pub async fn start(&self) -> Result<Coordinate, WorkflowError> {
        self.store.dispatch(Action::GeolocationStarted);

        let position = match geolocation::locate(self.geolocator.as_ref(), &self.options).await {
            Ok(position) => {
                info!(%position, "geolocation succeeded");
                position
            }
            Err(err) => {
                warn!(error = %err, fallback = %self.default_position, "geolocation failed, using default position");
                if err == GeolocationError::Unsupported {
                    self.store
                        .dispatch(Action::Notice(GEOLOCATION_UNSUPPORTED_NOTICE.to_string()));
                }
                self.default_position
            }
        };

        self.store.dispatch(Action::GeolocationFinished);
        self.resolve(position).await?;
        Ok(position)
    }

    /// Direct map click. Always wins over any pending search or selection.
    pub async fn map_click(&self, coordinate: Coordinate) -> Result<(), WorkflowError> {
        debug!(%coordinate, "map click");
        self.resolve(coordinate).await
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, WorkflowError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Blank);
        }

        self.store.dispatch(Action::SearchStarted);
        let _settle = SettleGuard::new(&self.store, Action::SearchSettled);

        let mut candidates = match self.geocoder.search(query, self.search_limit).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, query, "geocoding failed");
                self.store.dispatch(Action::SearchFailed(err.user_message()));
                return Err(err.into());
            }
        };

        debug!(query, found = candidates.len(), "geocoding finished");

        match candidates.len() {
            0 => {
                self.store
                    .dispatch(Action::SearchFailed(format!("City \"{query}\" not found")));
                Ok(SearchOutcome::NotFound)
            }
            1 => {
                let candidate = candidates.remove(0);
                self.resolve(candidate.coordinate).await?;
                Ok(SearchOutcome::Resolved(candidate))
            }
            _ => {
                self.store.dispatch(Action::CandidatesFound(candidates.clone()));
                Ok(SearchOutcome::Ambiguous(candidates))
            }
        }
    }

    /// Pick one of the candidates offered by the last ambiguous search.
    pub async fn select(&self, index: usize) -> Result<CityCandidate, WorkflowError> {
        let candidate = {
            let state = self.store.snapshot();
            if state.phase != Phase::AwaitingSelection {
                return Err(WorkflowError::NoPendingSelection);
            }
            state.candidates.get(index).cloned().ok_or(
                WorkflowError::CandidateOutOfRange {
                    index,
                    available: state.candidates.len(),
                },
            )?
        };

        debug!(candidate = %candidate, "candidate selected");
        self.resolve(candidate.coordinate).await?;
        Ok(candidate)
    }

    /// Open the forecast view and fetch the forecast for the current position.
    pub async fn open_forecast(&self) -> Result<(), WorkflowError> {
        self.store.dispatch(Action::ForecastOpened);

        let Some(position) = self.store.snapshot().position else {
            self.store
                .dispatch(Action::ForecastFailed("Select a location first".to_string()));
            return Err(WorkflowError::NoPosition);
        };

        self.fetch_forecast(position).await
    }

    pub fn close_forecast(&self) {
        self.store.dispatch(Action::ForecastClosed);
    }

    /// Fetch current weather, reflecting loading/error/data into the store.
    pub async fn fetch_weather(&self, coordinate: Coordinate) -> Result<(), WorkflowError> {
        self.store.dispatch(Action::WeatherRequested);
        let _settle = SettleGuard::new(&self.store, Action::WeatherSettled);

        match self.weather.current_weather(coordinate).await {
            Ok(snapshot) => {
                debug!(location = snapshot.display_name(), "weather loaded");
                self.store.dispatch(Action::WeatherLoaded(snapshot));
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, %coordinate, "weather fetch failed");
                self.store.dispatch(Action::WeatherFailed(err.user_message()));
                Err(err.into())
            }
        }
    }

    pub async fn fetch_forecast(&self, coordinate: Coordinate) -> Result<(), WorkflowError> {
        self.store.dispatch(Action::ForecastRequested);
        let _settle = SettleGuard::new(&self.store, Action::ForecastSettled);

        match self.weather.forecast(coordinate).await {
            Ok(series) => {
                debug!(entries = series.entries.len(), "forecast loaded");
                self.store.dispatch(Action::ForecastLoaded(series));
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, %coordinate, "forecast fetch failed");
                self.store
                    .dispatch(Action::ForecastFailed(err.forecast_user_message()));
                Err(err.into())
            }
        }
    }

    async fn resolve(&self, coordinate: Coordinate) -> Result<(), WorkflowError> {
        self.store.dispatch(Action::PositionChanged(coordinate));
        self.fetch_weather(coordinate).await
    }
}
