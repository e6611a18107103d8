use crate::{
    buffer::DocumentBuffer,
    document::{
        get_duration, is_exception, is_span_success, DefaultDocumentBuilder, DocumentBuilder,
    },
    metrics::LiveMetricsInstruments,
    state::LiveMetricsState,
};
use opentelemetry::{metrics::Meter, trace::SpanKind};
use opentelemetry_sdk::{logs::SdkLogRecord, trace::SpanData};
use std::{fmt::Debug, sync::Arc};

/// Live metrics category of a finished span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanClass {
    /// Incoming request handled by this process.
    Request {
        /// Whether the request succeeded.
        success: bool,
    },
    /// Outgoing call to another component.
    Dependency {
        /// Whether the call succeeded.
        success: bool,
    },
}

/// Decides whether a span counts as request or dependency.
pub trait SpanClassifier: Debug + Send + Sync {
    /// Classify a finished span.
    fn classify_span(&self, span: &SpanData) -> SpanClass;
}

/// Server spans are requests, everything else is a dependency. A span is successful unless
/// its status is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSpanClassifier;

impl SpanClassifier for DefaultSpanClassifier {
    fn classify_span(&self, span: &SpanData) -> SpanClass {
        let success = is_span_success(span);
        if span.span_kind == SpanKind::Server {
            SpanClass::Request { success }
        } else {
            SpanClass::Dependency { success }
        }
    }
}

/// Turns finished spans and emitted log records into live metrics and documents.
///
/// Nothing is recorded unless the shared [`LiveMetricsState`] is in a post state, i.e. while
/// somebody is looking at the live metrics dashboard.
#[derive(Debug, Clone)]
pub struct LiveMetricsRecorder {
    state: LiveMetricsState,
    documents: DocumentBuffer,
    instruments: LiveMetricsInstruments,
    classifier: Arc<dyn SpanClassifier>,
    document_builder: Arc<dyn DocumentBuilder>,
}

impl LiveMetricsRecorder {
    /// Create a recorder registering its instruments on `meter`.
    pub fn new(meter: &Meter, state: LiveMetricsState, documents: DocumentBuffer) -> Self {
        LiveMetricsRecorder {
            state,
            documents,
            instruments: LiveMetricsInstruments::new(meter),
            classifier: Arc::new(DefaultSpanClassifier),
            document_builder: Arc::new(DefaultDocumentBuilder),
        }
    }

    /// Use a different strategy to tell requests from dependencies.
    pub fn with_span_classifier(mut self, classifier: Arc<dyn SpanClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a different strategy to build documents.
    pub fn with_document_builder(mut self, document_builder: Arc<dyn DocumentBuilder>) -> Self {
        self.document_builder = document_builder;
        self
    }

    /// Record a finished span.
    pub fn record_span(&self, span: &SpanData) {
        if !self.state.is_post_state() {
            return;
        }

        let class = self.classifier.classify_span(span);
        self.documents
            .append(self.document_builder.span_document(span, class));

        let duration = get_duration(span).as_secs_f64();
        let instruments = &self.instruments;
        match class {
            SpanClass::Request { success } => {
                if success {
                    instruments.request_rate.add(1, &[]);
                } else {
                    instruments.request_failed_rate.add(1, &[]);
                }
                instruments.request_duration.record(duration, &[]);
            }
            SpanClass::Dependency { success } => {
                if success {
                    instruments.dependency_rate.add(1, &[]);
                } else {
                    instruments.dependency_failed_rate.add(1, &[]);
                }
                instruments.dependency_duration.record(duration, &[]);
            }
        }
    }

    /// Record an emitted log record.
    pub fn record_log_record(&self, record: &SdkLogRecord) {
        if !self.state.is_post_state() {
            return;
        }

        self.documents.append(self.document_builder.log_document(record));

        if is_exception(record) {
            self.instruments.exception_rate.add(1, &[]);
        }
    }

    /// Shared state gating the recording.
    pub fn state(&self) -> &LiveMetricsState {
        &self.state
    }

    /// Queue receiving the documents.
    pub fn documents(&self) -> &DocumentBuffer {
        &self.documents
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        metrics::{
            DEPENDENCY_DURATION, DEPENDENCY_FAILED_RATE, DEPENDENCY_RATE, EXCEPTION_RATE,
            REQUEST_DURATION, REQUEST_FAILED_RATE, REQUEST_RATE,
        },
        models::QuickPulseDocumentType,
        state::QuickPulseState,
    };
    use opentelemetry::{
        logs::{LogRecord as _, Logger as _, LoggerProvider as _},
        metrics::MeterProvider as _,
        trace::{Span as _, Status, Tracer as _, TracerProvider as _},
    };
    use opentelemetry_sdk::{
        logs::SdkLoggerProvider,
        metrics::{
            data::{AggregatedMetrics, MetricData},
            InMemoryMetricExporter, PeriodicReader, SdkMeterProvider,
        },
        trace::{InMemorySpanExporter, SdkTracerProvider},
    };
    use opentelemetry_semantic_conventions as semcov;
    use std::time::{Duration, SystemTime};

    /// Finish a span of the given kind that took 5 nanoseconds.
    pub(crate) fn finished_span(kind: SpanKind, status: Status) -> SpanData {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("test");
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1596665700);
        let mut span = tracer
            .span_builder("operation")
            .with_kind(kind)
            .with_start_time(start)
            .start(&tracer);
        span.set_status(status);
        span.end_with_timestamp(start + Duration::from_nanos(5));
        let mut spans = exporter.get_finished_spans().unwrap();
        assert_eq!(1, spans.len());
        spans.remove(0)
    }

    pub(crate) fn exception_log_record() -> SdkLogRecord {
        let provider = SdkLoggerProvider::builder().build();
        let mut record = provider.logger("test").create_log_record();
        record.add_attribute(semcov::trace::EXCEPTION_TYPE, "exc_type");
        record.add_attribute(semcov::trace::EXCEPTION_MESSAGE, "exc_msg");
        record
    }

    struct Harness {
        exporter: InMemoryMetricExporter,
        provider: SdkMeterProvider,
        recorder: LiveMetricsRecorder,
    }

    impl Harness {
        fn new(state: QuickPulseState) -> Self {
            let exporter = InMemoryMetricExporter::default();
            let provider = SdkMeterProvider::builder()
                .with_reader(PeriodicReader::builder(exporter.clone()).build())
                .build();
            let recorder = LiveMetricsRecorder::new(
                &provider.meter("test"),
                LiveMetricsState::new(state),
                DocumentBuffer::default(),
            );
            Harness {
                exporter,
                provider,
                recorder,
            }
        }

        fn value<T>(
            &self,
            name: &str,
            read: impl Fn(&AggregatedMetrics) -> Option<T>,
        ) -> Option<T> {
            self.provider.force_flush().unwrap();
            let metrics = self.exporter.get_finished_metrics().unwrap();
            metrics
                .iter()
                .flat_map(|rm| rm.scope_metrics())
                .flat_map(|sm| sm.metrics())
                .filter(|m| m.name() == name)
                .filter_map(|m| read(m.data()))
                .last()
        }

        fn counter(&self, name: &str) -> u64 {
            self.value(name, |data| match data {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                    Some(sum.data_points().map(|p| p.value()).sum())
                }
                _ => None,
            })
            .unwrap_or(0)
        }

        fn histogram_sum(&self, name: &str) -> Option<f64> {
            self.value(name, |data| match data {
                AggregatedMetrics::F64(MetricData::Histogram(histogram)) => {
                    Some(histogram.data_points().map(|p| p.sum()).sum())
                }
                _ => None,
            })
        }
    }

    #[test]
    fn server_span_ok() {
        let harness = Harness::new(QuickPulseState::PostShort);
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Server, Status::Ok));

        assert_eq!(1, harness.counter(REQUEST_RATE));
        assert_eq!(0, harness.counter(REQUEST_FAILED_RATE));
        assert_eq!(Some(5.0 / 1e9), harness.histogram_sum(REQUEST_DURATION));
        let documents = harness.recorder.documents().drain();
        assert_eq!(1, documents.len());
        assert!(matches!(
            documents[0].document_type(),
            QuickPulseDocumentType::Request {
                success: Some(true),
                ..
            }
        ));
    }

    #[test]
    fn server_span_error() {
        let harness = Harness::new(QuickPulseState::PostShort);
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Server, Status::error("boom")));

        assert_eq!(0, harness.counter(REQUEST_RATE));
        assert_eq!(1, harness.counter(REQUEST_FAILED_RATE));
        assert_eq!(Some(5.0 / 1e9), harness.histogram_sum(REQUEST_DURATION));
        assert_eq!(1, harness.recorder.documents().len());
    }

    #[test]
    fn client_span_ok() {
        let harness = Harness::new(QuickPulseState::PostLong);
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Client, Status::Unset));

        assert_eq!(1, harness.counter(DEPENDENCY_RATE));
        assert_eq!(0, harness.counter(DEPENDENCY_FAILED_RATE));
        assert_eq!(Some(5.0 / 1e9), harness.histogram_sum(DEPENDENCY_DURATION));
        assert_eq!(0, harness.counter(REQUEST_RATE));
        let documents = harness.recorder.documents().drain();
        assert_eq!(1, documents.len());
        assert!(matches!(
            documents[0].document_type(),
            QuickPulseDocumentType::Dependency { .. }
        ));
    }

    #[test]
    fn client_span_error() {
        let harness = Harness::new(QuickPulseState::PostShort);
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Client, Status::error("boom")));

        assert_eq!(0, harness.counter(DEPENDENCY_RATE));
        assert_eq!(1, harness.counter(DEPENDENCY_FAILED_RATE));
        assert_eq!(Some(5.0 / 1e9), harness.histogram_sum(DEPENDENCY_DURATION));
    }

    #[test]
    fn exception_log() {
        let harness = Harness::new(QuickPulseState::PostShort);
        harness.recorder.record_log_record(&exception_log_record());

        assert_eq!(1, harness.counter(EXCEPTION_RATE));
        let documents = harness.recorder.documents().drain();
        assert_eq!(1, documents.len());
        assert!(matches!(
            documents[0].document_type(),
            QuickPulseDocumentType::Exception { .. }
        ));
    }

    #[test]
    fn plain_log_is_not_an_exception() {
        let harness = Harness::new(QuickPulseState::PostShort);
        let provider = SdkLoggerProvider::builder().build();
        let mut record = provider.logger("test").create_log_record();
        record.set_body("hello".into());
        harness.recorder.record_log_record(&record);

        assert_eq!(0, harness.counter(EXCEPTION_RATE));
        assert_eq!(1, harness.recorder.documents().len());
    }

    #[test]
    fn nothing_recorded_outside_post_state() {
        let harness = Harness::new(QuickPulseState::PingShort);
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Server, Status::Ok));
        harness
            .recorder
            .record_span(&finished_span(SpanKind::Client, Status::error("boom")));
        harness.recorder.record_log_record(&exception_log_record());

        assert_eq!(0, harness.counter(REQUEST_RATE));
        assert_eq!(0, harness.counter(DEPENDENCY_FAILED_RATE));
        assert_eq!(0, harness.counter(EXCEPTION_RATE));
        assert_eq!(None, harness.histogram_sum(REQUEST_DURATION));
        assert!(harness.recorder.documents().is_empty());
    }

    #[derive(Debug)]
    struct EverythingIsADependency;

    impl SpanClassifier for EverythingIsADependency {
        fn classify_span(&self, _span: &SpanData) -> SpanClass {
            SpanClass::Dependency { success: true }
        }
    }

    #[test]
    fn custom_classifier() {
        let harness = Harness::new(QuickPulseState::PostShort);
        let recorder = harness
            .recorder
            .clone()
            .with_span_classifier(Arc::new(EverythingIsADependency));
        recorder.record_span(&finished_span(SpanKind::Server, Status::error("boom")));

        assert_eq!(1, harness.counter(DEPENDENCY_RATE));
        assert_eq!(0, harness.counter(REQUEST_FAILED_RATE));
        let documents = recorder.documents().drain();
        assert_eq!(1, documents.len());
        assert!(matches!(
            documents[0].document_type(),
            QuickPulseDocumentType::Dependency {
                success: Some(true),
                ..
            }
        ));
    }

    #[test]
    fn default_classifier() {
        let classifier = DefaultSpanClassifier;
        assert_eq!(
            SpanClass::Request { success: true },
            classifier.classify_span(&finished_span(SpanKind::Server, Status::Unset))
        );
        assert_eq!(
            SpanClass::Dependency { success: false },
            classifier.classify_span(&finished_span(SpanKind::Producer, Status::error("")))
        );
    }
}
