use std::{collections::HashMap, str::FromStr};

pub(crate) const DEFAULT_LIVE_ENDPOINT: &str = "https://rt.services.visualstudio.com/";
const FIELDS_SEPARATOR: char = ';';
const FIELD_KEY_VALUE_SEPARATOR: char = '=';

/// The parts of an Application Insights connection string live metrics cares about.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConnectionString {
    pub(crate) live_endpoint: http::Uri,
    pub(crate) instrumentation_key: String,
}

/// Errors while parsing a connection string.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConnectionStringError {
    /// A field is not of the form `Key=Value`.
    #[error("invalid format")]
    InvalidFormat,
    /// The `InstrumentationKey` field is missing.
    #[error("missing instrumentation key")]
    MissingInstrumentationKey,
    /// The `Authorization` field is set to something other than `ikey`.
    #[error("unsupported authorization; only \"ikey\" is supported")]
    UnsupportedAuthorization,
    /// The live endpoint is not a valid URI.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(http::uri::InvalidUri),
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    /// Parse the given connection string.
    ///
    /// Field names are case insensitive and unknown fields are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result: HashMap<String, String> = s
            .split(FIELDS_SEPARATOR)
            .filter(|kv| !kv.trim().is_empty())
            .map(|kv| {
                let parts: Vec<&str> = kv.split(FIELD_KEY_VALUE_SEPARATOR).collect();
                if parts.len() == 2 {
                    Ok((parts[0].trim().to_lowercase(), parts[1].to_string()))
                } else {
                    Err(ConnectionStringError::InvalidFormat)
                }
            })
            .collect::<Result<_, _>>()?;

        let live_endpoint = if let Some(live_endpoint) = result.remove("liveendpoint") {
            sanitize_url(live_endpoint)?
        } else if let Some(endpoint_suffix) = result.remove("endpointsuffix") {
            let location_prefix = result
                .remove("location")
                .map(|x| format!("{}.", x))
                .unwrap_or_default();
            sanitize_url(format!(
                "https://{}live.{}",
                location_prefix,
                endpoint_suffix.trim()
            ))?
        } else {
            http::Uri::from_static(DEFAULT_LIVE_ENDPOINT)
        };

        if let Some(authorization) = result.remove("authorization") {
            if !authorization.eq_ignore_ascii_case("ikey") {
                return Err(ConnectionStringError::UnsupportedAuthorization);
            }
        }
        let instrumentation_key = result
            .remove("instrumentationkey")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConnectionStringError::MissingInstrumentationKey)?;

        Ok(ConnectionString {
            live_endpoint,
            instrumentation_key,
        })
    }
}

/// Endpoints are kept as given apart from surrounding whitespace. Plain `http` is upgraded to
/// `https` since the service does not accept anything else.
fn sanitize_url(url: String) -> Result<http::Uri, ConnectionStringError> {
    let url = url.trim();
    let url = match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    };

    url.parse().map_err(ConnectionStringError::InvalidEndpoint)
}
