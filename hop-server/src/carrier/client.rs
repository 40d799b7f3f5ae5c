//! Carrier HTTP client.
//!
//! Talks to the pass pages' private JSON endpoints using a session exported
//! from the browser. The session is cached in the page namespace and dropped
//! as soon as the carrier rejects it.

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TtlCache};
use crate::domain::{AirportCode, FlightLeg, RouteMap};
use crate::planner::{AvailabilitySource, RouteSource};

use super::convert::{convert_flights, convert_route_map};
use super::error::CarrierError;
use super::session::{CarrierSession, SessionSource};
use super::types::{
    ApiErrorBody, AvailabilityRequest, AvailabilityResponse, CODE_NOT_AVAILABLE,
    CODE_SEARCH_EXCEPTION, RouteMapResponse,
};

/// Default maximum concurrent requests across all searches.
const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Configuration for the carrier client.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }
}

impl CarrierConfig {
    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Carrier API client.
pub struct CarrierClient<S> {
    http: reqwest::Client,
    source: S,
    cache: TtlCache,
    semaphore: Arc<Semaphore>,
}

impl<S: SessionSource> CarrierClient<S> {
    /// Create a new client.
    pub fn new(source: S, cache: TtlCache, config: CarrierConfig) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            source,
            cache,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Fetch the whole route map.
    pub async fn fetch_route_map(&self) -> Result<RouteMap, CarrierError> {
        let session = self.session().await?;
        let _permit = self.permit().await?;

        info!("Fetching route map");
        let response = self
            .http
            .get(&session.routes_url)
            .headers(session.header_map()?)
            .send()
            .await?;

        let status = response.status();
        self.check_session_status(status)?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CarrierError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CarrierError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let routes: RouteMapResponse = parse_json(&body)?;
        let map = convert_route_map(&routes);
        info!(airports = map.len(), "Route map loaded");
        Ok(map)
    }

    /// Query one-way availability for a single route and date.
    ///
    /// HTTP 400 comes back as [`CarrierError::NotAvailable`]; the caller
    /// decides that it means "no flights".
    pub async fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> Result<Vec<FlightLeg>, CarrierError> {
        let session = self.session().await?;
        let _permit = self.permit().await?;

        let request = AvailabilityRequest::one_way(
            origin.as_str(),
            destination.as_str(),
            &date.format("%Y-%m-%d").to_string(),
        );

        let response = self
            .http
            .post(&session.availability_url)
            .headers(session.header_map()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        self.check_session_status(status)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CarrierError::RateLimited);
        }

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ApiErrorBody>(&body)
                .unwrap_or_default()
                .code;
            match code.as_deref() {
                Some(CODE_NOT_AVAILABLE) => {
                    debug!(%origin, %destination, %date, "Flight not available");
                }
                Some(CODE_SEARCH_EXCEPTION) => {
                    info!(%origin, %destination, %date, body = %body, "Carrier search exception");
                }
                _ => {
                    warn!(%origin, %destination, %date, body = %body, "Unknown availability error");
                }
            }
            return Err(CarrierError::NotAvailable { code });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CarrierError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let parsed: AvailabilityResponse = parse_json(&body)?;
        let flights = parsed.flights_outbound.unwrap_or_default();
        Ok(convert_flights(&flights, date))
    }

    async fn session(&self) -> Result<CarrierSession, CarrierError> {
        if let Some((session, _)) = self.cache.get_value::<CarrierSession>(&CacheKey::Session) {
            return Ok(session);
        }

        info!("Loading carrier session");
        let session = self.source.load().await?;
        if let Err(e) = self.cache.set(&CacheKey::Session, &session) {
            warn!(error = %e, "Failed to cache carrier session");
        }
        Ok(session)
    }

    fn check_session_status(&self, status: StatusCode) -> Result<(), CarrierError> {
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return Ok(());
        }

        warn!(status = status.as_u16(), "Carrier rejected the session");
        if let Err(e) = self.cache.invalidate(&CacheKey::Session) {
            warn!(error = %e, "Failed to drop cached session");
        }
        Err(CarrierError::SessionUnavailable(format!(
            "carrier rejected the session (HTTP {}); log in to the pass page and export the session again",
            status.as_u16()
        )))
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, CarrierError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| CarrierError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, CarrierError> {
    serde_json::from_str(body).map_err(|e| CarrierError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })
}

impl<S: SessionSource> RouteSource for CarrierClient<S> {
    async fn fetch_route_map(&self) -> Result<RouteMap, CarrierError> {
        CarrierClient::fetch_route_map(self).await
    }
}

impl<S: SessionSource> AvailabilitySource for CarrierClient<S> {
    async fn fetch_availability(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> Result<Vec<FlightLeg>, CarrierError> {
        CarrierClient::fetch_availability(self, origin, destination, date).await
    }
}
