//! Carrier client error types.

/// Errors from the carrier HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization failed
    #[error("JSON parse error: {message}{}", .body.as_ref().map(|b| format!(" (body: {b})")).unwrap_or_default())]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an unexpected status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP 400: no flights for this route and date
    #[error("flight not available ({})", .code.as_deref().unwrap_or("no code"))]
    NotAvailable { code: Option<String> },

    /// Rate limited by the carrier (HTTP 429)
    #[error("rate limited by carrier (429)")]
    RateLimited,

    /// No usable session: the exported session file is missing, invalid or
    /// was rejected
    #[error("session unavailable: {0}")]
    SessionUnavailable(String),
}

impl CarrierError {
    /// Whether this error means the carrier is throttling us.
    ///
    /// Besides a typed 429, upstream error text mentioning 429 or rate
    /// limiting counts.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            CarrierError::RateLimited => true,
            CarrierError::Api { status: 429, .. } => true,
            other => {
                let text = other.to_string().to_ascii_lowercase();
                text.contains("429") || text.contains("rate limited")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CarrierError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = CarrierError::Json {
            message: "expected string".into(),
            body: Some("{}".into()),
        };
        assert_eq!(err.to_string(), "JSON parse error: expected string (body: {})");

        let err = CarrierError::NotAvailable {
            code: Some("error.availability".into()),
        };
        assert_eq!(err.to_string(), "flight not available (error.availability)");

        let err = CarrierError::SessionUnavailable("no session file".into());
        assert_eq!(err.to_string(), "session unavailable: no session file");
    }

    #[test]
    fn rate_limit_detection() {
        assert!(CarrierError::RateLimited.is_rate_limit());
        assert!(
            CarrierError::Api {
                status: 429,
                message: String::new()
            }
            .is_rate_limit()
        );
        assert!(
            CarrierError::Api {
                status: 503,
                message: "Rate limited, try later".into()
            }
            .is_rate_limit()
        );
        assert!(
            !CarrierError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_rate_limit()
        );
        assert!(!CarrierError::NotAvailable { code: None }.is_rate_limit());
    }
}
