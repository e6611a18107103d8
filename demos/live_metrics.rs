use opentelemetry::{
    logs::{LogRecord as _, Logger as _, LoggerProvider as _, Severity},
    trace::{Span as _, SpanKind, Status, Tracer as _, TracerProvider as _},
    KeyValue,
};
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider, Resource};
use opentelemetry_semantic_conventions as semcov;
use std::{error::Error, thread, time::Duration};

fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let manager = opentelemetry_live_metrics::enable_live_metrics(
        std::env::var("APPLICATIONINSIGHTS_CONNECTION_STRING")?,
        Resource::builder().with_service_name("live-metrics-demo").build(),
        reqwest::blocking::Client::new(),
    )?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_span_processor(manager.span_processor())
        .build();
    let tracer = tracer_provider.tracer("demo");
    let logger_provider = SdkLoggerProvider::builder()
        .with_log_processor(manager.log_processor())
        .build();
    let logger = logger_provider.logger("demo");

    println!("Simulating requests. Open live metrics in the Azure portal. Press Ctrl+C to stop.");

    for i in 0u64.. {
        let success = i % 10 != 0;
        let status = if success {
            Status::Ok
        } else {
            Status::error("")
        };
        let mut request = tracer
            .span_builder("GET /hello/world")
            .with_kind(SpanKind::Server)
            .with_status(status.clone())
            .with_attributes(vec![
                KeyValue::new(semcov::trace::HTTP_REQUEST_METHOD, "GET"),
                KeyValue::new(semcov::trace::HTTP_ROUTE, "/hello/world"),
                KeyValue::new(
                    semcov::trace::HTTP_RESPONSE_STATUS_CODE,
                    if success { 200 } else { 500 },
                ),
            ])
            .start(&tracer);
        let mut db = tracer
            .span_builder("SELECT greetings")
            .with_kind(SpanKind::Client)
            .with_status(status)
            .with_attributes(vec![
                KeyValue::new(semcov::trace::DB_SYSTEM_NAME, "postgresql"),
                KeyValue::new(semcov::trace::SERVER_ADDRESS, "db.example"),
            ])
            .start(&tracer);
        thread::sleep(Duration::from_millis(5));
        db.end();

        if !success {
            let mut record = logger.create_log_record();
            record.set_severity_number(Severity::Error);
            record.add_attribute(semcov::trace::EXCEPTION_TYPE, "DemoError");
            record.add_attribute(semcov::trace::EXCEPTION_MESSAGE, "every tenth request fails");
            logger.emit(record);
        }
        request.end();

        thread::sleep(Duration::from_millis(100));
    }

    manager.shutdown()?;
    Ok(())
}
