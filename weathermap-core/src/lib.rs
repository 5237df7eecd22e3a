//! Core library for the `weathermap` tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - OpenWeather clients for current weather, forecasts and geocoding
//! - Startup geolocation with fallback to a default position
//! - The presentation state container and the location resolution workflow
//! - The persisted light/dark theme flag
//!
//! It is used by `weathermap-cli`, but any other front end can drive the same workflow.

pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod state;
pub mod theme;
pub mod workflow;

pub use config::{Config, GeolocationConfig, GeolocationSource};
pub use error::{GeocodingError, GeolocationError, WeatherFetchError, WorkflowError};
pub use geolocation::{GeolocationOptions, Geolocator};
pub use model::{
    CityCandidate, Condition, Coordinate, DailySummary, ForecastEntry, ForecastSeries,
    WeatherSnapshot,
};
pub use provider::{Geocoder, WeatherProvider, openweather::OpenWeatherClient};
pub use state::{Action, AppState, ForecastPanel, Panel, Phase, Store};
pub use theme::{FileThemeStorage, Palette, Theme, ThemeStore, TileSource};
pub use workflow::{LocationWorkflow, SearchOutcome};
