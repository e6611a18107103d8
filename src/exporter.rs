use crate::{
    connection_string::ConnectionString,
    models::QuickPulseEnvelope,
    uploader::{self, PostOrPing, QuickPulseResponse},
    Error,
};
use http::Uri;
use opentelemetry_http::HttpClient;
use std::{convert::TryFrom, fmt, sync::Arc};

/// Sends pings and posts to the live metrics service.
#[derive(Clone)]
pub struct QuickPulseExporter {
    client: Arc<dyn HttpClient>,
    live_endpoint: Uri,
    instrumentation_key: String,
}

impl fmt::Debug for QuickPulseExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickPulseExporter")
            .field("client", &self.client)
            .field("live_endpoint", &self.live_endpoint)
            .field("instrumentation_key", &self.instrumentation_key)
            .finish()
    }
}

impl QuickPulseExporter {
    pub(crate) fn new(client: Arc<dyn HttpClient>, connection_string: ConnectionString) -> Self {
        QuickPulseExporter {
            client,
            live_endpoint: connection_string.live_endpoint,
            instrumentation_key: connection_string.instrumentation_key,
        }
    }

    /// Live metrics endpoint from the connection string.
    pub fn live_endpoint(&self) -> &Uri {
        &self.live_endpoint
    }

    /// Instrumentation key from the connection string.
    pub fn instrumentation_key(&self) -> &str {
        &self.instrumentation_key
    }

    /// Tell the service this process exists and ask whether anybody is watching.
    ///
    /// `endpoint` overrides the live endpoint, e.g. after the service redirected us.
    pub(crate) async fn ping(
        &self,
        endpoint: Option<&Uri>,
        envelope: &QuickPulseEnvelope<'_>,
    ) -> Result<QuickPulseResponse, Error> {
        self.send(endpoint, PostOrPing::Ping, envelope).await
    }

    /// Send collected metrics and documents.
    pub(crate) async fn post(
        &self,
        endpoint: Option<&Uri>,
        envelope: &QuickPulseEnvelope<'_>,
    ) -> Result<QuickPulseResponse, Error> {
        self.send(endpoint, PostOrPing::Post, envelope).await
    }

    async fn send(
        &self,
        endpoint: Option<&Uri>,
        post_or_ping: PostOrPing,
        envelope: &QuickPulseEnvelope<'_>,
    ) -> Result<QuickPulseResponse, Error> {
        let uri = service_uri(
            endpoint.unwrap_or(&self.live_endpoint),
            post_or_ping,
            &self.instrumentation_key,
        )?;
        uploader::send(self.client.as_ref(), uri, post_or_ping, envelope).await
    }
}

fn service_uri(
    endpoint: &Uri,
    post_or_ping: PostOrPing,
    instrumentation_key: &str,
) -> Result<Uri, Error> {
    let endpoint = endpoint.to_string();
    Uri::try_from(format!(
        "{}/QuickPulseService.svc/{}?ikey={}",
        endpoint.trim_end_matches('/'),
        post_or_ping,
        instrumentation_key
    ))
    .map_err(|err| Error::BuildRequest(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://rt.services.visualstudio.com/", PostOrPing::Ping, "https://rt.services.visualstudio.com/QuickPulseService.svc/ping?ikey=ikey" ; "ping")]
    #[test_case("https://rt.services.visualstudio.com/", PostOrPing::Post, "https://rt.services.visualstudio.com/QuickPulseService.svc/post?ikey=ikey" ; "post")]
    #[test_case("https://live.example/prefix", PostOrPing::Ping, "https://live.example/prefix/QuickPulseService.svc/ping?ikey=ikey" ; "path prefix")]
    fn uri(endpoint: &'static str, post_or_ping: PostOrPing, expected: &'static str) {
        let endpoint = Uri::from_static(endpoint);
        assert_eq!(
            expected,
            service_uri(&endpoint, post_or_ping, "ikey")
                .unwrap()
                .to_string()
        );
    }

    #[test]
    fn invalid_key_is_an_error() {
        let endpoint = Uri::from_static("https://live.example/");
        assert!(matches!(
            service_uri(&endpoint, PostOrPing::Ping, "not a key"),
            Err(Error::BuildRequest(_))
        ));
    }
}
