//! Error taxonomy shared by the daemon and its collaborators.
//!
//! None of these are retried automatically; recovery is driven by the
//! next lifecycle event or client connection.

use thiserror::Error;

use crate::Domain;

/// A resource provider call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No account cookie was configured.
    #[error("no credentials configured for {domain}")]
    MissingCredentials { domain: Domain },

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status} for {domain}")]
    Status { domain: Domain, status: u16 },

    /// The endpoint answered with a non-zero `retcode`.
    #[error("API error {retcode} for {domain}: {message}")]
    Api {
        domain: Domain,
        retcode: i64,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode response for {domain}: {reason}")]
    Decode { domain: Domain, reason: String },
}

/// A process event subscription could not be opened or has ended.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The underlying notification mechanism is unavailable or misconfigured.
    #[error("process event source unavailable: {0}")]
    Unavailable(String),

    /// An open stream failed and will not yield further events.
    #[error("process event stream ended: {0}")]
    StreamEnded(String),
}

/// An update could not be delivered to the transport sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Nobody is listening anymore.
    #[error("update sink closed")]
    Closed,

    #[error("failed to encode update: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Api {
            domain: Domain::StarRail,
            retcode: 10001,
            message: "Please login".to_string(),
        };
        assert_eq!(err.to_string(), "API error 10001 for hkrpg: Please login");

        let err = FetchError::Status {
            domain: Domain::Zzz,
            status: 502,
        };
        assert_eq!(err.to_string(), "unexpected HTTP status 502 for zzz");

        let err = FetchError::MissingCredentials {
            domain: Domain::Genshin,
        };
        assert_eq!(err.to_string(), "no credentials configured for genshin");
    }

    #[test]
    fn test_subscription_error_display() {
        let err = SubscriptionError::Unavailable("WMI locator".to_string());
        assert!(err.to_string().contains("WMI locator"));
    }

    #[test]
    fn test_publish_error_display() {
        assert_eq!(PublishError::Closed.to_string(), "update sink closed");
    }
}
