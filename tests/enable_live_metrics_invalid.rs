//! A failed first call must not occupy the process wide manager. Own test binary, see
//! `enable_live_metrics.rs`.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use opentelemetry::KeyValue;
use opentelemetry_http::{HttpClient, HttpError};
use opentelemetry_live_metrics::{enable_live_metrics, global_manager, Error, QuickPulseState};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions as semcov;
use std::sync::Arc;

const CONNECTION_STRING: &str =
    "InstrumentationKey=0fdcec70-0ce5-4085-89d9-9ae8ead9af66;LiveEndpoint=https://live.example/";

#[derive(Debug)]
struct NotSubscribedClient;

#[async_trait]
impl HttpClient for NotSubscribedClient {
    async fn send_bytes(&self, _req: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        Ok(Response::builder()
            .status(200)
            .header("x-ms-qps-subscribed", "false")
            .body(Bytes::new())
            .expect("response is well formed"))
    }
}

fn resource(instance: &'static str) -> Resource {
    Resource::builder_empty()
        .with_attributes(vec![
            KeyValue::new(semcov::resource::SERVICE_INSTANCE_ID, instance),
            KeyValue::new(semcov::resource::SERVICE_NAME, "test_service"),
        ])
        .build()
}

#[test]
fn invalid_connection_string_leaves_singleton_unset() {
    let result = enable_live_metrics(
        "LiveEndpoint=https://live.example/",
        resource("first"),
        NotSubscribedClient,
    );
    assert!(matches!(result, Err(Error::InvalidConnectionString(_))));
    assert!(global_manager().is_none());

    let manager = enable_live_metrics(CONNECTION_STRING, resource("second"), NotSubscribedClient)
        .expect("connection string is valid");
    assert_eq!("second", manager.base_monitoring_data_point().instance());
    assert_eq!(QuickPulseState::PingShort, manager.state().get());

    let global = global_manager().expect("live metrics are enabled");
    assert!(Arc::ptr_eq(&manager, &global));
    manager.shutdown().expect("shutdown succeeds");
}
