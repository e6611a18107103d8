use crate::recorder::LiveMetricsRecorder;
use opentelemetry::{Context, InstrumentationScope};
use opentelemetry_sdk::{
    error::OTelSdkResult,
    logs::{LogProcessor, SdkLogRecord},
    trace::{Span, SpanData, SpanProcessor},
};
use std::time::Duration;

/// Span processor feeding finished spans into live metrics.
///
/// ```no_run
/// # fn example(manager: &opentelemetry_live_metrics::QuickPulseManager) {
/// let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
///     .with_span_processor(manager.span_processor())
///     .build();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LiveMetricsSpanProcessor {
    recorder: LiveMetricsRecorder,
}

impl LiveMetricsSpanProcessor {
    /// Create a span processor recording into `recorder`.
    pub fn new(recorder: LiveMetricsRecorder) -> Self {
        LiveMetricsSpanProcessor { recorder }
    }
}

impl SpanProcessor for LiveMetricsSpanProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    fn on_end(&self, span: SpanData) {
        self.recorder.record_span(&span);
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }
}

/// Log processor feeding emitted log records into live metrics.
#[derive(Debug, Clone)]
pub struct LiveMetricsLogProcessor {
    recorder: LiveMetricsRecorder,
}

impl LiveMetricsLogProcessor {
    /// Create a log processor recording into `recorder`.
    pub fn new(recorder: LiveMetricsRecorder) -> Self {
        LiveMetricsLogProcessor { recorder }
    }
}

impl LogProcessor for LiveMetricsLogProcessor {
    fn emit(&self, record: &mut SdkLogRecord, _instrumentation: &InstrumentationScope) {
        self.recorder.record_log_record(record);
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }
}
