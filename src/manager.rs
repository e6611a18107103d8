use crate::{
    buffer::{DocumentBuffer, DEFAULT_DOCUMENT_CAPACITY},
    connection_string::ConnectionString,
    document::{DefaultDocumentBuilder, DocumentBuilder},
    exporter::QuickPulseExporter,
    metrics::{COMMITTED_MEMORY, METER_NAME, PROCESSOR_TIME},
    models::MonitoringDataPoint,
    processor::{LiveMetricsLogProcessor, LiveMetricsSpanProcessor},
    reader::QuickPulseMetricReader,
    recorder::{DefaultSpanClassifier, LiveMetricsRecorder, SpanClassifier},
    state::{LiveMetricsState, QuickPulseState},
    tags::get_cloud_role,
    Error,
};
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Meter, MeterProvider as _, ObservableGauge};
use opentelemetry_http::HttpClient;
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    trace::{IdGenerator, RandomIdGenerator},
    Resource,
};
use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};
use sysinfo::System;

/// Version reported to the live metrics service.
pub const SDK_VERSION: &str = concat!("rust:ext", env!("CARGO_PKG_VERSION"));

const CONNECTION_STRING_ENV: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";
const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(1);
const UNKNOWN_MACHINE_NAME: &str = "Unknown";

static GLOBAL_MANAGER: OnceCell<Arc<QuickPulseManager>> = OnceCell::new();

/// Enable live metrics for this process.
///
/// The first successful call creates the process wide [`QuickPulseManager`]. Every later call
/// returns that same manager and ignores its arguments, so the identity reported to the
/// service never changes.
///
/// ```no_run
/// # fn example(client: impl opentelemetry_http::HttpClient + 'static) -> Result<(), opentelemetry_live_metrics::Error> {
/// let manager = opentelemetry_live_metrics::enable_live_metrics(
///     "InstrumentationKey=...;LiveEndpoint=https://westeurope.livediagnostics.monitor.azure.com/",
///     opentelemetry_sdk::Resource::builder().with_service_name("example").build(),
///     client,
/// )?;
/// let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
///     .with_span_processor(manager.span_processor())
///     .build();
/// # Ok(())
/// # }
/// ```
pub fn enable_live_metrics(
    connection_string: impl AsRef<str>,
    resource: Resource,
    client: impl HttpClient + 'static,
) -> Result<Arc<QuickPulseManager>, Error> {
    GLOBAL_MANAGER
        .get_or_try_init(|| {
            QuickPulseManager::builder(connection_string, client)
                .with_resource(resource)
                .build()
                .map(Arc::new)
        })
        .cloned()
}

/// Process wide manager created by [`enable_live_metrics`], if any.
pub fn global_manager() -> Option<Arc<QuickPulseManager>> {
    GLOBAL_MANAGER.get().cloned()
}

/// Owns everything live metrics needs: the exporter, the identity of this process, the
/// metric reader running the ping/post state machine and the recorder fed by the span and
/// log processors.
pub struct QuickPulseManager {
    exporter: QuickPulseExporter,
    data_point: Arc<MonitoringDataPoint>,
    reader: QuickPulseMetricReader,
    meter_provider: SdkMeterProvider,
    state: LiveMetricsState,
    documents: DocumentBuffer,
    recorder: LiveMetricsRecorder,
    _system_gauges: SystemGauges,
}

impl fmt::Debug for QuickPulseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickPulseManager")
            .field("exporter", &self.exporter)
            .field("data_point", &self.data_point)
            .field("state", &self.state)
            .field("documents", &self.documents)
            .finish_non_exhaustive()
    }
}

impl QuickPulseManager {
    /// Create a manager with default settings.
    ///
    /// The manager starts pinging right away.
    pub fn new(
        connection_string: impl AsRef<str>,
        resource: Resource,
        client: impl HttpClient + 'static,
    ) -> Result<Self, Error> {
        Self::builder(connection_string, client)
            .with_resource(resource)
            .build()
    }

    /// Create a manager.
    ///
    /// Reads connection string from `APPLICATIONINSIGHTS_CONNECTION_STRING` environment variable.
    pub fn new_from_env(
        resource: Resource,
        client: impl HttpClient + 'static,
    ) -> Result<Self, Error> {
        let connection_string = std::env::var(CONNECTION_STRING_ENV)?;
        Self::new(connection_string, resource, client)
    }

    /// Configure a manager.
    pub fn builder(
        connection_string: impl AsRef<str>,
        client: impl HttpClient + 'static,
    ) -> QuickPulseManagerBuilder {
        QuickPulseManagerBuilder {
            connection_string: connection_string.as_ref().to_string(),
            client: Arc::new(client),
            resource: Resource::builder_empty().build(),
            id_generator: Box::new(RandomIdGenerator::default()),
            span_classifier: Arc::new(DefaultSpanClassifier),
            document_builder: Arc::new(DefaultDocumentBuilder),
            export_interval: DEFAULT_EXPORT_INTERVAL,
            document_capacity: DEFAULT_DOCUMENT_CAPACITY,
        }
    }

    /// Exporter talking to the live metrics service.
    pub fn exporter(&self) -> &QuickPulseExporter {
        &self.exporter
    }

    /// Identity of this process.
    pub fn base_monitoring_data_point(&self) -> &Arc<MonitoringDataPoint> {
        &self.data_point
    }

    /// Metric reader running the ping/post state machine.
    pub fn reader(&self) -> &QuickPulseMetricReader {
        &self.reader
    }

    /// Meter provider collecting the live metrics instruments.
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// Current state, shared with the reader and the recorder.
    pub fn state(&self) -> &LiveMetricsState {
        &self.state
    }

    /// Documents waiting for the next post.
    pub fn documents(&self) -> &DocumentBuffer {
        &self.documents
    }

    /// Recorder turning spans and log records into live metrics.
    pub fn recorder(&self) -> &LiveMetricsRecorder {
        &self.recorder
    }

    /// Span processor to register with a tracer provider.
    pub fn span_processor(&self) -> LiveMetricsSpanProcessor {
        LiveMetricsSpanProcessor::new(self.recorder.clone())
    }

    /// Log processor to register with a logger provider.
    pub fn log_processor(&self) -> LiveMetricsLogProcessor {
        LiveMetricsLogProcessor::new(self.recorder.clone())
    }

    /// Stop sending and collecting.
    ///
    /// The state goes offline before the meter provider shuts down, so no final ping or post
    /// is sent.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.state.set(QuickPulseState::Offline);
        self.meter_provider
            .shutdown()
            .map_err(Error::Shutdown)
    }
}

/// Builder for [`QuickPulseManager`].
pub struct QuickPulseManagerBuilder {
    connection_string: String,
    client: Arc<dyn HttpClient>,
    resource: Resource,
    id_generator: Box<dyn IdGenerator>,
    span_classifier: Arc<dyn SpanClassifier>,
    document_builder: Arc<dyn DocumentBuilder>,
    export_interval: Duration,
    document_capacity: usize,
}

impl fmt::Debug for QuickPulseManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickPulseManagerBuilder")
            .field("client", &self.client)
            .field("resource", &self.resource)
            .field("id_generator", &self.id_generator)
            .field("span_classifier", &self.span_classifier)
            .field("document_builder", &self.document_builder)
            .field("export_interval", &self.export_interval)
            .field("document_capacity", &self.document_capacity)
            .finish_non_exhaustive()
    }
}

impl QuickPulseManagerBuilder {
    /// Resource describing this process. `service.name`, `service.namespace` and
    /// `service.instance.id` determine the role name and instance shown in live metrics.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    /// Generator for the stream id.
    ///
    /// Default: [`RandomIdGenerator`]
    pub fn with_id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Box::new(id_generator);
        self
    }

    /// Strategy deciding whether a span is a request or a dependency.
    pub fn with_span_classifier(mut self, span_classifier: impl SpanClassifier + 'static) -> Self {
        self.span_classifier = Arc::new(span_classifier);
        self
    }

    /// Strategy building the documents sent for spans and log records.
    pub fn with_document_builder(
        mut self,
        document_builder: impl DocumentBuilder + 'static,
    ) -> Self {
        self.document_builder = Arc::new(document_builder);
        self
    }

    /// How often metrics are collected and the state machine ticks.
    ///
    /// Default: 1 second. The ping and post intervals are counted in ticks, so only change this
    /// in tests.
    pub fn with_export_interval(mut self, export_interval: Duration) -> Self {
        self.export_interval = export_interval;
        self
    }

    /// Maximum number of documents kept between two posts.
    ///
    /// Default: 1000
    pub fn with_document_capacity(mut self, document_capacity: usize) -> Self {
        self.document_capacity = document_capacity;
        self
    }

    /// Create the manager and start pinging.
    pub fn build(self) -> Result<QuickPulseManager, Error> {
        let connection_string: ConnectionString = self.connection_string.parse()?;
        let exporter = QuickPulseExporter::new(self.client, connection_string);

        let machine_name =
            System::host_name().unwrap_or_else(|| UNKNOWN_MACHINE_NAME.to_string());
        let cloud_role = get_cloud_role(&self.resource, &machine_name);
        let data_point = Arc::new(MonitoringDataPoint {
            version: SDK_VERSION.to_string(),
            invariant_version: MonitoringDataPoint::INVARIANT_VERSION,
            instance: cloud_role.instance,
            role_name: cloud_role.role_name,
            machine_name,
            stream_id: format!("{:032x}", self.id_generator.new_trace_id()),
        });

        let state = LiveMetricsState::default();
        let documents = DocumentBuffer::new(self.document_capacity);
        let reader = QuickPulseMetricReader::new(
            exporter.clone(),
            data_point.clone(),
            state.clone(),
            documents.clone(),
        );
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(
                PeriodicReader::builder(reader.clone())
                    .with_interval(self.export_interval)
                    .build(),
            )
            .with_resource(self.resource)
            .build();
        let meter = meter_provider.meter(METER_NAME);
        let recorder = LiveMetricsRecorder::new(&meter, state.clone(), documents.clone())
            .with_span_classifier(self.span_classifier)
            .with_document_builder(self.document_builder);
        let system_gauges = SystemGauges::register(&meter);

        state.set(QuickPulseState::PingShort);
        live_debug!(
            "live metrics enabled for stream {} at {}",
            data_point.stream_id(),
            exporter.live_endpoint()
        );

        Ok(QuickPulseManager {
            exporter,
            data_point,
            reader,
            meter_provider,
            state,
            documents,
            recorder,
            _system_gauges: system_gauges,
        })
    }
}

/// Processor time and committed memory of this machine, observed on every collection.
struct SystemGauges {
    _processor_time: ObservableGauge<f64>,
    _committed_memory: ObservableGauge<u64>,
}

impl SystemGauges {
    fn register(meter: &Meter) -> Self {
        let cpu = Mutex::new(System::new());
        let memory = Mutex::new(System::new());
        SystemGauges {
            _processor_time: meter
                .f64_observable_gauge(PROCESSOR_TIME)
                .with_unit("%")
                .with_callback(move |observer| {
                    if let Ok(mut system) = cpu.lock() {
                        system.refresh_cpu_usage();
                        observer.observe(f64::from(system.global_cpu_usage()), &[]);
                    }
                })
                .build(),
            _committed_memory: meter
                .u64_observable_gauge(COMMITTED_MEMORY)
                .with_unit("By")
                .with_callback(move |observer| {
                    if let Ok(mut system) = memory.lock() {
                        system.refresh_memory();
                        observer.observe(system.used_memory(), &[]);
                    }
                })
                .build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::QuickPulseDocumentType,
        reader::tests::{Reply, ScriptedClient},
        recorder::tests::{exception_log_record, finished_span},
    };
    use opentelemetry::{
        trace::{SpanId, SpanKind, Status, TraceId},
        KeyValue,
    };
    use opentelemetry_sdk::trace::SpanProcessor as _;
    use opentelemetry_semantic_conventions as semcov;

    const CONNECTION_STRING: &str =
        "InstrumentationKey=0ddf3ac4-0aa8-4c4a-8d5b-0d7c4a6a8a9f;LiveEndpoint=https://eastus.livediagnostics.monitor.azure.com/";

    #[derive(Debug)]
    struct FixedIdGenerator;

    impl IdGenerator for FixedIdGenerator {
        fn new_trace_id(&self) -> TraceId {
            TraceId::from_bytes(314u128.to_be_bytes())
        }

        fn new_span_id(&self) -> SpanId {
            SpanId::from_bytes(1u64.to_be_bytes())
        }
    }

    fn manager(resource: Resource) -> QuickPulseManager {
        QuickPulseManager::builder(CONNECTION_STRING, ScriptedClient::new(Reply::NotSubscribed))
            .with_resource(resource)
            .with_id_generator(FixedIdGenerator)
            .with_export_interval(Duration::from_secs(3600))
            .build()
            .unwrap()
    }

    #[test]
    fn init() {
        let resource = Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(semcov::resource::SERVICE_INSTANCE_ID, "test_instance"),
                KeyValue::new(semcov::resource::SERVICE_NAME, "test_service"),
            ])
            .build();
        let manager = manager(resource);

        assert_eq!(QuickPulseState::PingShort, manager.state().get());
        assert_eq!(
            "0ddf3ac4-0aa8-4c4a-8d5b-0d7c4a6a8a9f",
            manager.exporter().instrumentation_key()
        );
        assert_eq!(
            "https://eastus.livediagnostics.monitor.azure.com/",
            manager.exporter().live_endpoint().to_string()
        );

        let data_point = manager.base_monitoring_data_point();
        assert_eq!(1, data_point.invariant_version());
        assert_eq!(SDK_VERSION, data_point.version());
        assert_eq!("test_instance", data_point.instance());
        assert_eq!("test_service", data_point.role_name());
        assert_eq!(
            System::host_name().unwrap_or_else(|| UNKNOWN_MACHINE_NAME.to_string()),
            data_point.machine_name()
        );
        assert_eq!("0000000000000000000000000000013a", data_point.stream_id());

        assert!(Arc::ptr_eq(
            data_point,
            manager.reader().base_monitoring_data_point()
        ));
        manager.shutdown().unwrap();
    }

    #[test]
    fn instance_defaults_to_machine_name() {
        let manager = manager(Resource::builder_empty().build());
        let data_point = manager.base_monitoring_data_point();
        assert_eq!(data_point.machine_name(), data_point.instance());
        assert_eq!("", data_point.role_name());
        manager.shutdown().unwrap();
    }

    #[test]
    fn invalid_connection_string() {
        let result = QuickPulseManager::new(
            "LiveEndpoint=https://live.example/",
            Resource::builder_empty().build(),
            ScriptedClient::new(Reply::NotSubscribed),
        );
        assert!(matches!(result, Err(Error::InvalidConnectionString(_))));
    }

    #[test]
    fn components_share_state() {
        let manager = manager(Resource::builder_empty().build());
        manager.state().set(QuickPulseState::PostShort);
        assert!(manager.reader().state().is_post_state());
        assert!(manager.recorder().state().is_post_state());

        manager
            .span_processor()
            .on_end(finished_span(SpanKind::Client, Status::Ok));
        manager.recorder().record_log_record(&exception_log_record());

        let documents = manager.documents().drain();
        assert_eq!(2, documents.len());
        assert!(matches!(
            documents[0].document_type(),
            QuickPulseDocumentType::Dependency { .. }
        ));
        assert!(matches!(
            documents[1].document_type(),
            QuickPulseDocumentType::Exception { .. }
        ));
        manager.shutdown().unwrap();
    }

    #[test]
    fn shutdown_goes_offline() {
        let manager = manager(Resource::builder_empty().build());
        manager.shutdown().unwrap();
        assert_eq!(QuickPulseState::Offline, manager.state().get());
        assert!(!manager.recorder().state().is_post_state());
    }
}
