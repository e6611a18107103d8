use crate::{models::QuickPulseEnvelope, Error};
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use http::{HeaderName, Request, Uri};
use opentelemetry_http::HttpClient;
use std::{
    convert::TryFrom,
    fmt,
    io::Write,
    time::{Duration, SystemTime},
};

// Allow interior mutability. See https://github.com/hyperium/http/issues/599
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_TRANSMISSION_TIME: HeaderName =
    HeaderName::from_static("x-ms-qps-transmission-time");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_STREAM_ID: HeaderName = HeaderName::from_static("x-ms-qps-stream-id");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_MACHINE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-machine-name");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_INSTANCE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-instance-name");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_ROLE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-role-name");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_INVARIANT_VERSION: HeaderName =
    HeaderName::from_static("x-ms-qps-invariant-version");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_SUBSCRIBED: HeaderName = HeaderName::from_static("x-ms-qps-subscribed");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_REDIRECT: HeaderName =
    HeaderName::from_static("x-ms-qps-service-endpoint-redirect-v2");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_INTERVAL_HINT: HeaderName =
    HeaderName::from_static("x-ms-qps-service-endpoint-interval-hint");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PostOrPing {
    Post,
    Ping,
}

impl PostOrPing {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            PostOrPing::Post => "post",
            PostOrPing::Ping => "ping",
        }
    }
}

impl fmt::Display for PostOrPing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the live metrics service told us in response to a ping or post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QuickPulseResponse {
    /// Somebody is watching the dashboard and telemetry should be posted.
    pub(crate) should_post: bool,
    /// Endpoint to use for all following requests.
    pub(crate) redirected_host: Option<Uri>,
    /// How often the service wants to be pinged.
    pub(crate) polling_interval_hint: Option<Duration>,
}

/// Send a single ping or post to `uri`.
pub(crate) async fn send(
    client: &dyn HttpClient,
    uri: Uri,
    post_or_ping: PostOrPing,
    envelope: &QuickPulseEnvelope<'_>,
) -> Result<QuickPulseResponse, Error> {
    let payload = serialize_envelope(envelope, post_or_ping)?;

    let mut request_builder = Request::post(uri)
        .header(http::header::EXPECT, "100-continue")
        .header(
            QPS_TRANSMISSION_TIME,
            quick_pulse_transmission_time(SystemTime::now()),
        )
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::CONTENT_ENCODING, "gzip");
    if post_or_ping == PostOrPing::Ping {
        let data_point = envelope.monitoring_data_point;
        request_builder = request_builder
            .header(QPS_STREAM_ID, data_point.stream_id())
            .header(QPS_MACHINE_NAME, data_point.machine_name())
            .header(QPS_INSTANCE_NAME, data_point.instance())
            .header(QPS_INVARIANT_VERSION, data_point.invariant_version());
        if !data_point.role_name().is_empty() {
            request_builder = request_builder.header(QPS_ROLE_NAME, data_point.role_name());
        }
    }

    let request = request_builder
        .body(Bytes::from(payload))
        .map_err(Error::BuildRequest)?;

    let response = client
        .send_bytes(request)
        .await
        .map_err(Error::Connection)?;

    if !response.status().is_success() {
        return Err(Error::Status {
            operation: post_or_ping.as_str(),
            status_code: response.status().as_u16(),
        });
    }

    let headers = response.headers();
    let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    Ok(QuickPulseResponse {
        should_post: header(QPS_SUBSCRIBED)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        redirected_host: header(QPS_REDIRECT)
            .filter(|v| !v.is_empty())
            .and_then(|v| Uri::try_from(v).ok()),
        polling_interval_hint: header(QPS_INTERVAL_HINT)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis),
    })
}

fn serialize_envelope(
    envelope: &QuickPulseEnvelope<'_>,
    post_or_ping: PostOrPing,
) -> Result<Vec<u8>, Error> {
    let serialized = match post_or_ping {
        PostOrPing::Post => serde_json::to_vec(&[envelope]),
        PostOrPing::Ping => serde_json::to_vec(envelope),
    }
    .map_err(Error::SerializeRequest)?;
    let mut gzip_encoder = GzEncoder::new(Vec::new(), Compression::default());
    gzip_encoder
        .write_all(&serialized)
        .map_err(Error::CompressRequest)?;
    gzip_encoder.finish().map_err(Error::CompressRequest)
}

/// Time the request was made.
///
/// Expressed as the number of 100-nanosecond intervals elapsed since 12:00 midnight, January 1,
/// 0001, like .NET's `System.DateTimeOffset.Ticks`.
fn quick_pulse_transmission_time(now: SystemTime) -> String {
    let nanos_between_0001_and_epoch = 62135596800000000000u128;
    let nanos_since_epoch = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    ((nanos_between_0001_and_epoch + nanos_since_epoch) / 100).to_string()
}
