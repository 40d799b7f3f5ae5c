//! Carrier session context.
//!
//! The pass pages only answer requests that carry the headers of a logged
//! in browser session, and the availability endpoint URL changes between
//! deployments. Both are exported from the browser into a JSON file that
//! this module reads.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::error::CarrierError;

/// Everything needed to talk to the carrier on behalf of a logged in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSession {
    /// URL of the route map document.
    pub routes_url: String,
    /// URL the availability POST goes to.
    pub availability_url: String,
    /// Headers copied from the browser session.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl CarrierSession {
    /// Check the session is usable and build its header map.
    pub fn header_map(&self) -> Result<HeaderMap, CarrierError> {
        if self.routes_url.trim().is_empty() || self.availability_url.trim().is_empty() {
            return Err(CarrierError::SessionUnavailable(
                "session has no carrier URLs".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                CarrierError::SessionUnavailable(format!("invalid header name: {name}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                CarrierError::SessionUnavailable(format!("invalid value for header {name}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Where sessions come from.
pub trait SessionSource: Send + Sync {
    /// Load the current session.
    ///
    /// Fails with [`CarrierError::SessionUnavailable`] when no usable session
    /// exists; callers surface that verbatim instead of retrying.
    fn load(&self) -> impl Future<Output = Result<CarrierSession, CarrierError>> + Send;
}

/// Reads the session from a JSON file exported from the browser.
#[derive(Debug, Clone)]
pub struct FileSession {
    path: PathBuf,
}

impl FileSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionSource for FileSession {
    async fn load(&self) -> Result<CarrierSession, CarrierError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CarrierError::SessionUnavailable(format!(
                "cannot read session file {}: {e}; log in to the pass page and export the session",
                self.path.display()
            ))
        })?;

        let session: CarrierSession = serde_json::from_str(&contents).map_err(|e| {
            CarrierError::SessionUnavailable(format!(
                "invalid session file {}: {e}",
                self.path.display()
            ))
        })?;

        session.header_map()?;
        Ok(session)
    }
}

/// A fixed session, for wiring tests and programmatic setups.
#[derive(Debug, Clone)]
pub struct StaticSession(pub CarrierSession);

impl SessionSource for StaticSession {
    async fn load(&self) -> Result<CarrierSession, CarrierError> {
        self.0.header_map()?;
        Ok(self.0.clone())
    }
}
