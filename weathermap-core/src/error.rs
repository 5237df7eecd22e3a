//! Error types surfaced by the provider clients and the location workflow.

use reqwest::StatusCode;
use thiserror::Error;

pub const WEATHER_FALLBACK_MESSAGE: &str = "Failed to fetch weather data";
pub const FORECAST_FALLBACK_MESSAGE: &str = "Failed to fetch forecast data";
pub const SEARCH_FALLBACK_MESSAGE: &str = "Failed to search for location";

#[derive(Debug, Error)]
pub enum WeatherFetchError {
    #[error("weather provider returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Provider {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("request to weather provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed weather provider response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl WeatherFetchError {
    /// Message from the provider's error payload, if it sent one.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Self::Provider { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// User-facing text for a failed current-weather request.
    pub fn user_message(&self) -> String {
        self.provider_message().unwrap_or(WEATHER_FALLBACK_MESSAGE).to_string()
    }

    /// User-facing text for a failed forecast request.
    pub fn forecast_user_message(&self) -> String {
        self.provider_message().unwrap_or(FORECAST_FALLBACK_MESSAGE).to_string()
    }
}

#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("geocoding provider returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Provider {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("request to geocoding provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed geocoding response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GeocodingError {
    pub fn user_message(&self) -> String {
        SEARCH_FALLBACK_MESSAGE.to_string()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("geolocation is not supported")]
    Unsupported,

    #[error("geolocation permission denied")]
    PermissionDenied,

    #[error("geolocation request timed out")]
    Timeout,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

/// Failure of a workflow operation. State has already been updated when one of these is returned.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Weather(#[from] WeatherFetchError),

    #[error(transparent)]
    Geocoding(#[from] GeocodingError),

    #[error("no candidate selection is pending")]
    NoPendingSelection,

    #[error("candidate {index} does not exist ({available} available)")]
    CandidateOutOfRange { index: usize, available: usize },

    #[error("no location selected yet")]
    NoPosition,
}

/// Extract `message` from a provider error body such as `{"cod":401,"message":"Invalid API key"}`.
pub(crate) fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
