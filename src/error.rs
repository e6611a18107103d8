use crate::connection_string::ConnectionStringError;
use opentelemetry_sdk::error::OTelSdkError;
use std::error::Error as StdError;

/// Errors that occurred while setting up or running live metrics.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    /// The `APPLICATIONINSIGHTS_CONNECTION_STRING` environment variable is not set or not
    /// valid unicode.
    #[error("reading connection string from environment failed with {0}")]
    MissingConnectionString(#[from] std::env::VarError),

    /// Live metrics data failed to serialize to JSON.
    ///
    /// Note: This is an error in this crate. If you spot this, please open an issue.
    #[error("serializing live metrics request failed with {0}")]
    SerializeRequest(serde_json::Error),

    /// Live metrics data failed to compress.
    ///
    /// Note: This is an error in this crate. If you spot this, please open an issue.
    #[error("compressing live metrics request failed with {0}")]
    CompressRequest(std::io::Error),

    /// The live metrics request could not be built, usually because the endpoint is not a
    /// valid URI.
    #[error("building live metrics request failed with {0}")]
    BuildRequest(http::Error),

    /// Could not complete the HTTP request to the live metrics service.
    #[error("sending live metrics request failed with {0}")]
    Connection(Box<dyn StdError + Send + Sync + 'static>),

    /// The live metrics service answered with a non-success status code.
    #[error("live metrics {operation} failed with status {status_code}")]
    Status {
        /// `ping` or `post`
        operation: &'static str,
        /// HTTP status code
        status_code: u16,
    },

    /// Shutting down the meter provider failed.
    #[error("shutting down live metrics failed with {0}")]
    Shutdown(#[source] OTelSdkError),
}

impl From<Error> for OTelSdkError {
    fn from(err: Error) -> Self {
        OTelSdkError::InternalFailure(err.to_string())
    }
}
