use thiserror::Error;

use crate::error::FetchError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Weather lookup failed: {0}")]
    Generic(String),

    #[error("Invalid location: {0}")]
    InvalidQuery(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl From<FetchError> for WeatherError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => WeatherError::Network(msg),
            other => WeatherError::Generic(other.to_string()),
        }
    }
}

impl WeatherError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    /// 404 means the location is unknown; any other non-2xx is a generic failure.
    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            404 => WeatherError::NotFound(truncated),
            _ => WeatherError::Generic(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Message suitable for showing to the person searching.
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::NotFound(_) => "City not found. Please try a different name (e.g. 'London').",
            WeatherError::Network(_) => "Network error. Check your connection and try again.",
            WeatherError::Generic(_) => "Unable to fetch weather. Try again later.",
            WeatherError::InvalidQuery(_) => {
                "Please enter a valid city name (letters, numbers, commas, dashes)."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(WeatherError::from_status(404, "city not found"), WeatherError::NotFound(_)));
        assert!(matches!(WeatherError::from_status(401, "bad key"), WeatherError::Generic(_)));
        assert!(matches!(WeatherError::from_status(503, ""), WeatherError::Generic(_)));
    }

    #[test]
    fn test_truncates_long_bodies() {
        let body = "x".repeat(2000);
        match WeatherError::from_status(404, &body) {
            WeatherError::NotFound(msg) => {
                assert!(msg.len() < 600);
                assert!(msg.ends_with("(truncated, 2000 total bytes)"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_network_fetch_error_maps_to_network() {
        let err: WeatherError = FetchError::Network("offline".to_string()).into();
        assert_eq!(err, WeatherError::Network("offline".to_string()));
        assert!(err.user_message().starts_with("Network error"));
    }
}
