//! Startup position lookup.
//!
//! A [`Geolocator`] plays the part of the browser geolocation capability. The timeout in
//! [`GeolocationOptions`] is enforced by [`locate`], not by the implementations.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    config::{GeolocationConfig, GeolocationSource},
    error::GeolocationError,
    model::Coordinate,
};

const IP_API_URL: &str = "http://ip-api.com/json/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix that may be reused. Zero means always ask for a fresh one.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn current_position(
        &self,
        options: &GeolocationOptions,
    ) -> Result<Coordinate, GeolocationError>;
}

/// Ask `geolocator` for a position, giving up after `options.timeout`.
pub async fn locate(
    geolocator: &dyn Geolocator,
    options: &GeolocationOptions,
) -> Result<Coordinate, GeolocationError> {
    match tokio::time::timeout(options.timeout, geolocator.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(GeolocationError::Timeout),
    }
}

/// No geolocation capability on this system.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

#[async_trait]
impl Geolocator for Unsupported {
    async fn current_position(
        &self,
        _options: &GeolocationOptions,
    ) -> Result<Coordinate, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator(pub Coordinate);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(
        &self,
        _options: &GeolocationOptions,
    ) -> Result<Coordinate, GeolocationError> {
        Ok(self.0)
    }
}

/// Coarse position from the caller's public IP address (ip-api.com).
///
/// High accuracy cannot be honoured by this source; the flag is only logged.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    http: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::with_endpoint(IP_API_URL)
    }
}

impl IpGeolocator {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(
        &self,
        options: &GeolocationOptions,
    ) -> Result<Coordinate, GeolocationError> {
        if options.enable_high_accuracy {
            debug!("high accuracy requested; IP lookup is city-level at best");
        }

        let unavailable = |e: reqwest::Error| GeolocationError::PositionUnavailable(e.to_string());

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[("fields", "status,message,lat,lon")])
            .timeout(options.timeout)
            .send()
            .await
            .map_err(unavailable)?;

        let status = res.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(GeolocationError::PermissionDenied);
        }
        if !status.is_success() {
            return Err(GeolocationError::PositionUnavailable(format!(
                "lookup returned status {status}"
            )));
        }

        let body: IpApiResponse = res.json().await.map_err(unavailable)?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
            _ => Err(GeolocationError::PositionUnavailable(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            )),
        }
    }
}

/// Build the geolocator selected in config.
pub fn geolocator_from_config(config: &GeolocationConfig) -> Arc<dyn Geolocator> {
    match (config.source, config.position) {
        (GeolocationSource::Ip, _) => Arc::new(IpGeolocator::default()),
        (GeolocationSource::Fixed, Some(position)) => Arc::new(FixedGeolocator(position)),
        (GeolocationSource::Fixed, None) => {
            warn!("geolocation source is `fixed` but no position is configured");
            Arc::new(Unsupported)
        }
        (GeolocationSource::None, _) => Arc::new(Unsupported),
    }
}
