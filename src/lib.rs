//! A live metrics ([QuickPulse]) exporter for [OpenTelemetry Rust].
//!
//! [QuickPulse]: https://learn.microsoft.com/en-us/azure/azure-monitor/app/live-stream
//! [OpenTelemetry Rust]: https://github.com/open-telemetry/opentelemetry-rust
//!
//! **Disclaimer**: This is not an official Microsoft product.
//!
//! Live metrics shows requests, dependencies, exceptions and a sample of telemetry of a running
//! process in the Azure portal with a latency of about one second. This crate pings the live
//! metrics service in the background. As soon as somebody opens the dashboard, it starts
//! collecting spans and log records and posts aggregated metrics every second.
//!
//! # Usage
//!
//! Enable live metrics once per process and register the span and log processors:
//!
//! ```no_run
//! # #[cfg(feature = "reqwest-blocking-client")]
//! # {
//! use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider, Resource};
//!
//! let connection_string = std::env::var("APPLICATIONINSIGHTS_CONNECTION_STRING").unwrap();
//! let manager = opentelemetry_live_metrics::enable_live_metrics(
//!     connection_string,
//!     Resource::builder().with_service_name("example").build(),
//!     reqwest::blocking::Client::new(),
//! )
//! .expect("valid connection string");
//!
//! let tracer_provider = SdkTracerProvider::builder()
//!     .with_span_processor(manager.span_processor())
//!     .build();
//! let logger_provider = SdkLoggerProvider::builder()
//!     .with_log_processor(manager.log_processor())
//!     .build();
//! # }
//! ```
//!
//! Metrics are collected by a [`PeriodicReader`], which exports on a background thread without
//! an async runtime. Use a blocking HTTP client, e.g. `reqwest::blocking::Client` with the
//! `reqwest-blocking-client` feature.
//!
//! [`PeriodicReader`]: opentelemetry_sdk::metrics::PeriodicReader
//!
//! # States
//!
//! | State       | Request                       | Telemetry collected |
//! | ----------- | ----------------------------- | ------------------- |
//! | `Offline`   | none                          | no                  |
//! | `PingShort` | ping every 5 s (or as hinted) | no                  |
//! | `PingLong`  | ping every 60 s               | no                  |
//! | `PostShort` | post every second             | yes                 |
//! | `PostLong`  | post every 5 s                | yes                 |
//!
//! A subscribed ping moves to `PostShort`. An unsubscribed post, or 20 seconds of failed posts,
//! moves back to `PingShort`. After a minute of unsubscribed pings, pinging slows down to
//! `PingLong`.
//!
//! # Metrics
//!
//! | Live metrics counter                              | Source                                   |
//! | ------------------------------------------------- | ---------------------------------------- |
//! | `\ApplicationInsights\Requests/Sec`               | `SERVER` spans without error status      |
//! | `\ApplicationInsights\Requests Failed/Sec`        | `SERVER` spans with error status         |
//! | `\ApplicationInsights\Request Duration`           | average duration of `SERVER` spans       |
//! | `\ApplicationInsights\Dependency Calls/Sec`       | other spans without error status         |
//! | `\ApplicationInsights\Dependency Calls Failed/Sec` | other spans with error status           |
//! | `\ApplicationInsights\Dependency Call Duration`   | average duration of other spans          |
//! | `\ApplicationInsights\Exceptions/Sec`             | log records with `exception.*` attributes |
//! | `\Processor(_Total)\% Processor Time`             | CPU usage of this machine                |
//! | `\Memory\Committed Bytes`                         | used memory of this machine              |
//!
//! Both the classification of spans ([`SpanClassifier`]) and the documents shown in the sample
//! telemetry view ([`DocumentBuilder`]) can be replaced using [`QuickPulseManagerBuilder`].
#![doc(html_root_url = "https://docs.rs/opentelemetry-live-metrics/0.1.0")]
#![deny(missing_docs, unreachable_pub, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

macro_rules! live_debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "internal-logs")]
        tracing::debug!(target: "opentelemetry_live_metrics", $($arg)+);
        #[cfg(not(feature = "internal-logs"))]
        let _ = || format!($($arg)+);
    };
}

macro_rules! live_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "internal-logs")]
        tracing::warn!(target: "opentelemetry_live_metrics", $($arg)+);
        #[cfg(not(feature = "internal-logs"))]
        let _ = || format!($($arg)+);
    };
}

mod buffer;
mod connection_string;
mod convert;
mod document;
mod error;
mod exporter;
mod manager;
mod metrics;
mod models;
mod processor;
mod reader;
mod recorder;
mod state;
mod tags;
mod uploader;

pub use buffer::{DocumentBuffer, DEFAULT_DOCUMENT_CAPACITY};
pub use connection_string::ConnectionStringError;
pub use document::{DefaultDocumentBuilder, DocumentBuilder};
pub use error::Error;
pub use exporter::QuickPulseExporter;
pub use manager::{
    enable_live_metrics, global_manager, QuickPulseManager, QuickPulseManagerBuilder,
    SDK_VERSION,
};
pub use models::{
    MonitoringDataPoint, QuickPulseDocument, QuickPulseDocumentProperty, QuickPulseDocumentType,
    SeverityLevel,
};
pub use opentelemetry_http::HttpClient;
pub use processor::{LiveMetricsLogProcessor, LiveMetricsSpanProcessor};
pub use reader::QuickPulseMetricReader;
pub use recorder::{DefaultSpanClassifier, LiveMetricsRecorder, SpanClass, SpanClassifier};
pub use state::{LiveMetricsState, QuickPulseState};
