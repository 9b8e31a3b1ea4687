//! Weather polling port.
//!
//! Forecasting is an external collaborator. The sweep only needs a
//! yes/no per location with enough detail to word the alert.

use async_trait::async_trait;

use reefbook_core::error::DomainError;

/// An adverse-weather report for one location.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    /// Provider-reported severity, e.g. `"moderate"` or `"severe"`.
    pub severity: String,
    /// Short description of the expected conditions.
    pub conditions: String,
    /// Expected wind speed, when reported.
    pub wind_speed: Option<String>,
    /// Expected wave height, when reported.
    pub wave_height: Option<String>,
}

/// Read-only access to weather forecasts.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Check one location. `Ok(None)` means no alert-worthy weather.
    async fn check(&self, location: &str) -> Result<Option<WeatherReport>, DomainError>;
}

/// A provider that never raises alerts, for deployments without a
/// weather integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

#[async_trait]
impl WeatherProvider for NoWeather {
    async fn check(&self, _location: &str) -> Result<Option<WeatherReport>, DomainError> {
        Ok(None)
    }
}
