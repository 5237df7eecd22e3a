use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::{
    error::{GeocodingError, WeatherFetchError, message_from_body},
    model::{
        CityCandidate, Condition, Coordinate, ForecastCity, ForecastEntry, ForecastSeries,
        WeatherSnapshot,
    },
};

use super::{Geocoder, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const GEOCODING_PATH: &str = "/geo/1.0/direct";

/// Client for the OpenWeather current weather, 5 day / 3 hour forecast and direct geocoding APIs.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

/// Why a single GET failed, before it is mapped onto the caller's error type.
#[derive(Debug)]
enum RequestFailure {
    Status(StatusCode, Option<String>),
    Transport(reqwest::Error),
    Parse(serde_json::Error),
}

impl From<RequestFailure> for WeatherFetchError {
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::Status(status, message) => Self::Provider { status, message },
            RequestFailure::Transport(e) => Self::Transport(e),
            RequestFailure::Parse(e) => Self::Parse(e),
        }
    }
}

impl From<RequestFailure> for GeocodingError {
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::Status(status, message) => Self::Provider { status, message },
            RequestFailure::Transport(e) => Self::Transport(e),
            RequestFailure::Parse(e) => Self::Parse(e),
        }
    }
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host, e.g. a proxy or a mock server.
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            api_key,
            base_url,
            http: Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestFailure> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(RequestFailure::Transport)?;

        let status = res.status();
        let body = res.text().await.map_err(RequestFailure::Transport)?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "OpenWeather request failed");
            return Err(RequestFailure::Status(status, message_from_body(&body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            debug!(error = %e, body = %truncate_body(&body), "OpenWeather response did not parse");
            RequestFailure::Parse(e)
        })
    }

    fn coordinate_query(coordinate: Coordinate) -> [(&'static str, String); 3] {
        [
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
            ("units", "metric".to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

impl From<OwCoord> for Coordinate {
    fn from(c: OwCoord) -> Self {
        Coordinate::new(c.lat, c.lon)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    description: String,
}

impl From<OwWeather> for Condition {
    fn from(w: OwWeather) -> Self {
        Condition {
            code: w.id,
            icon: w.icon,
            description: w.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    dt: i64,
    coord: OwCoord,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    visibility: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    coord: OwCoord,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    visibility: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    state: Option<String>,
    #[serde(default)]
    country: String,
    lat: f64,
    lon: f64,
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(parsed: OwCurrentResponse) -> Self {
        WeatherSnapshot {
            location_name: parsed.name,
            coordinate: parsed.coord.into(),
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            pressure_hpa: parsed.main.pressure,
            wind_speed_mps: parsed.wind.speed,
            visibility_m: parsed.visibility,
            conditions: parsed.weather.into_iter().map(Condition::from).collect(),
            observation_time: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
        }
    }
}

impl From<OwForecastEntry> for ForecastEntry {
    fn from(entry: OwForecastEntry) -> Self {
        ForecastEntry {
            time: unix_to_utc(entry.dt).unwrap_or_else(Utc::now),
            temperature_c: entry.main.temp,
            feels_like_c: entry.main.feels_like,
            humidity_pct: entry.main.humidity,
            pressure_hpa: entry.main.pressure,
            wind_speed_mps: entry.wind.speed,
            visibility_m: entry.visibility,
            conditions: entry.weather.into_iter().map(Condition::from).collect(),
        }
    }
}

impl From<OwForecastResponse> for ForecastSeries {
    fn from(parsed: OwForecastResponse) -> Self {
        ForecastSeries {
            city: ForecastCity {
                name: parsed.city.name,
                country: parsed.city.country,
                coordinate: parsed.city.coord.into(),
                utc_offset_secs: parsed.city.timezone,
            },
            entries: parsed.list.into_iter().map(ForecastEntry::from).collect(),
        }
    }
}

impl From<OwGeoEntry> for CityCandidate {
    fn from(g: OwGeoEntry) -> Self {
        CityCandidate {
            name: g.name,
            state: g.state,
            country: g.country,
            coordinate: Coordinate::new(g.lat, g.lon),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), level = "debug")]
    async fn current_weather(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherFetchError> {
        let parsed: OwCurrentResponse = self
            .get_json(CURRENT_PATH, &Self::coordinate_query(coordinate))
            .await?;
        Ok(parsed.into())
    }

    #[instrument(skip(self), level = "debug")]
    async fn forecast(&self, coordinate: Coordinate) -> Result<ForecastSeries, WeatherFetchError> {
        let parsed: OwForecastResponse = self
            .get_json(FORECAST_PATH, &Self::coordinate_query(coordinate))
            .await?;
        debug!(entries = parsed.list.len(), "forecast received");
        Ok(parsed.into())
    }
}

#[async_trait]
impl Geocoder for OpenWeatherClient {
    #[instrument(skip(self), level = "debug")]
    async fn search(
        &self,
        place_name: &str,
        limit: usize,
    ) -> Result<Vec<CityCandidate>, GeocodingError> {
        let query = [("q", place_name.to_string()), ("limit", limit.to_string())];
        let parsed: Vec<OwGeoEntry> = self.get_json(GEOCODING_PATH, &query).await?;

        // The provider honours `limit`, but the contract holds regardless.
        Ok(parsed.into_iter().take(limit).map(CityCandidate::from).collect())
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": 28.1859, "lat": -25.7458},
            "weather": [{"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}],
            "main": {"temp": 24.3, "feels_like": 24.1, "pressure": 1018, "humidity": 48},
            "visibility": 10000,
            "wind": {"speed": 3.6, "deg": 40},
            "dt": 1_704_100_000,
            "name": "Pretoria"
        })
    }

    #[tokio::test]
    async fn current_weather_sends_metric_query_and_parses() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "-25.7458"))
            .and(query_param("lon", "28.1859"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let snapshot = client
            .current_weather(Coordinate::new(-25.7458, 28.1859))
            .await
            .unwrap();

        assert_eq!(snapshot.location_name, "Pretoria");
        assert_eq!(snapshot.humidity_pct, 48);
        assert_eq!(snapshot.pressure_hpa, 1018.0);
        assert_eq!(snapshot.visibility_m, Some(10_000));
        assert_eq!(snapshot.condition().unwrap().icon, "02d");
        assert!(snapshot.coordinate.same_display_position(&Coordinate::new(-25.7458, 28.1859)));
    }

    #[tokio::test]
    async fn provider_message_is_carried_on_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
            })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("BAD".into(), mock_server.uri());
        let err = client.current_weather(Coordinate::new(0.0, 0.0)).await.unwrap_err();

        assert!(matches!(err, WeatherFetchError::Provider { status, .. } if status == StatusCode::UNAUTHORIZED));
        assert!(err.user_message().starts_with("Invalid API key"));
    }

    #[tokio::test]
    async fn failure_without_message_falls_back() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let err = client.forecast(Coordinate::new(0.0, 0.0)).await.unwrap_err();

        assert_eq!(err.provider_message(), None);
        assert_eq!(err.forecast_user_message(), "Failed to fetch forecast data");
    }

    #[tokio::test]
    async fn malformed_payload_is_a_parse_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "x"})))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let err = client.current_weather(Coordinate::new(0.0, 0.0)).await.unwrap_err();

        assert!(matches!(err, WeatherFetchError::Parse(_)));
    }

    #[tokio::test]
    async fn forecast_parses_city_and_entries() {
        let mock_server = MockServer::start().await;

        let entry = |dt: i64, temp: f64| {
            serde_json::json!({
                "dt": dt,
                "main": {"temp": temp, "feels_like": temp, "pressure": 1010, "humidity": 60},
                "weather": [{"id": 500, "description": "light rain", "icon": "10d"}],
                "wind": {"speed": 2.1},
                "visibility": 9000
            })
        };

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": "200",
                "list": [entry(1_704_067_200, 19.5), entry(1_704_078_000, 22.0)],
                "city": {
                    "name": "London",
                    "country": "GB",
                    "coord": {"lat": 51.505, "lon": -0.09},
                    "timezone": 0
                }
            })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let series = client.forecast(Coordinate::new(51.505, -0.09)).await.unwrap();

        assert_eq!(series.city.name, "London");
        assert_eq!(series.entries.len(), 2);
        assert_eq!(series.entries[1].temperature_c, 22.0);
        assert_eq!(series.daily_summaries().len(), 1);
    }

    #[tokio::test]
    async fn search_returns_all_candidates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Springfield"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Springfield", "state": "Illinois", "country": "US", "lat": 39.7990, "lon": -89.6440},
                {"name": "Springfield", "state": "Missouri", "country": "US", "lat": 37.2153, "lon": -93.2982},
                {"name": "Springfield", "country": "AU", "lat": -33.6, "lon": 151.0}
            ])))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let found = client.search("Springfield", 5).await.unwrap();

        assert_eq!(found.len(), 3);
        assert_eq!(found[1].state.as_deref(), Some("Missouri"));
        assert_eq!(found[2].state, None);
    }

    #[tokio::test]
    async fn search_with_no_match_is_empty_not_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        assert!(client.search("Nowhereville", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_geocoding_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::with_base_url("KEY".into(), mock_server.uri());
        let err = client.search("Paris", 5).await.unwrap_err();
        assert!(matches!(err, GeocodingError::Provider { .. }));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenWeatherClient::with_base_url("KEY".into(), "http://localhost:1234/");
        assert_eq!(client.base_url, "http://localhost:1234");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
