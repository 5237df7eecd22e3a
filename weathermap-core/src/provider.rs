use crate::{
    Config,
    error::{GeocodingError, WeatherFetchError},
    model::{CityCandidate, Coordinate, ForecastSeries, WeatherSnapshot},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of current weather and forecasts by coordinate.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherFetchError>;

    async fn forecast(&self, coordinate: Coordinate) -> Result<ForecastSeries, WeatherFetchError>;
}

/// Forward geocoding of free text into at most `limit` candidates.
///
/// An empty result means "not found" and is not an error.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn search(
        &self,
        place_name: &str,
        limit: usize,
    ) -> Result<Vec<CityCandidate>, GeocodingError>;
}

/// Construct the OpenWeather client from config (API key + base URL).
pub fn openweather_from_config(config: &Config) -> anyhow::Result<OpenWeatherClient> {
    let api_key = config.api_key()?;
    Ok(OpenWeatherClient::with_base_url(api_key, config.api_base_url.clone()))
}
