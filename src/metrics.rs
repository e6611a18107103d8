use crate::models::QuickPulseMetric;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
use std::fmt;

pub(crate) const METER_NAME: &str = "opentelemetry-live-metrics";

pub(crate) const REQUEST_RATE: &str = "azure.monitor.request.rate";
pub(crate) const REQUEST_FAILED_RATE: &str = "azure.monitor.request.failed.rate";
pub(crate) const REQUEST_DURATION: &str = "azure.monitor.request.duration";
pub(crate) const DEPENDENCY_RATE: &str = "azure.monitor.dependency.rate";
pub(crate) const DEPENDENCY_FAILED_RATE: &str = "azure.monitor.dependency.failed.rate";
pub(crate) const DEPENDENCY_DURATION: &str = "azure.monitor.dependency.duration";
pub(crate) const EXCEPTION_RATE: &str = "azure.monitor.exception.rate";
pub(crate) const PROCESSOR_TIME: &str = "azure.monitor.process.cpu";
pub(crate) const COMMITTED_MEMORY: &str = "azure.monitor.memory.committed";

/// Name the live metrics service expects for one of our instruments.
pub(crate) fn quick_pulse_metric_name(instrument: &str) -> Option<&'static str> {
    Some(match instrument {
        REQUEST_RATE => "\\ApplicationInsights\\Requests/Sec",
        REQUEST_FAILED_RATE => "\\ApplicationInsights\\Requests Failed/Sec",
        REQUEST_DURATION => "\\ApplicationInsights\\Request Duration",
        DEPENDENCY_RATE => "\\ApplicationInsights\\Dependency Calls/Sec",
        DEPENDENCY_FAILED_RATE => "\\ApplicationInsights\\Dependency Calls Failed/Sec",
        DEPENDENCY_DURATION => "\\ApplicationInsights\\Dependency Call Duration",
        EXCEPTION_RATE => "\\ApplicationInsights\\Exceptions/Sec",
        PROCESSOR_TIME => "\\Processor(_Total)\\% Processor Time",
        COMMITTED_MEMORY => "\\Memory\\Committed Bytes",
        _ => return None,
    })
}

/// Counters and histograms fed by the recording paths.
#[derive(Clone)]
pub(crate) struct LiveMetricsInstruments {
    pub(crate) request_rate: Counter<u64>,
    pub(crate) request_failed_rate: Counter<u64>,
    pub(crate) request_duration: Histogram<f64>,
    pub(crate) dependency_rate: Counter<u64>,
    pub(crate) dependency_failed_rate: Counter<u64>,
    pub(crate) dependency_duration: Histogram<f64>,
    pub(crate) exception_rate: Counter<u64>,
}

impl LiveMetricsInstruments {
    pub(crate) fn new(meter: &Meter) -> Self {
        LiveMetricsInstruments {
            request_rate: meter
                .u64_counter(REQUEST_RATE)
                .with_description("live metrics request rate")
                .build(),
            request_failed_rate: meter
                .u64_counter(REQUEST_FAILED_RATE)
                .with_description("live metrics failed request rate")
                .build(),
            request_duration: meter
                .f64_histogram(REQUEST_DURATION)
                .with_unit("s")
                .with_description("live metrics request duration")
                .build(),
            dependency_rate: meter
                .u64_counter(DEPENDENCY_RATE)
                .with_description("live metrics dependency rate")
                .build(),
            dependency_failed_rate: meter
                .u64_counter(DEPENDENCY_FAILED_RATE)
                .with_description("live metrics failed dependency rate")
                .build(),
            dependency_duration: meter
                .f64_histogram(DEPENDENCY_DURATION)
                .with_unit("s")
                .with_description("live metrics dependency duration")
                .build(),
            exception_rate: meter
                .u64_counter(EXCEPTION_RATE)
                .with_description("live metrics exception rate")
                .build(),
        }
    }
}

impl fmt::Debug for LiveMetricsInstruments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveMetricsInstruments").finish_non_exhaustive()
    }
}

/// Convert collected metrics into the shape the live metrics service expects.
///
/// Counters are exported with delta temporality once per second, so their sum is a per-second
/// rate. Durations are recorded in seconds and sent as average milliseconds.
pub(crate) fn to_quick_pulse_metrics(metrics: &ResourceMetrics) -> Vec<QuickPulseMetric> {
    let mut result = Vec::new();
    for scope_metrics in metrics.scope_metrics() {
        for metric in scope_metrics.metrics() {
            let Some(name) = quick_pulse_metric_name(metric.name()) else {
                continue;
            };
            let value = match metric.data() {
                AggregatedMetrics::U64(data) => metric_data_value(data, |v| v as f64),
                AggregatedMetrics::I64(data) => metric_data_value(data, |v| v as f64),
                AggregatedMetrics::F64(data) => metric_data_value(data, |v| v),
            };
            if let Some(value) = value {
                result.push(QuickPulseMetric {
                    name,
                    value,
                    weight: 1,
                });
            }
        }
    }
    result
}

fn metric_data_value<T: Copy>(data: &MetricData<T>, to_f64: impl Fn(T) -> f64) -> Option<f64> {
    match data {
        MetricData::Sum(sum) => Some(sum.data_points().map(|p| to_f64(p.value())).sum()),
        MetricData::Gauge(gauge) => gauge.data_points().last().map(|p| to_f64(p.value())),
        MetricData::Histogram(histogram) => {
            let (sum, count) = histogram
                .data_points()
                .fold((0.0, 0u64), |(sum, count), p| {
                    (sum + to_f64(p.sum()), count + p.count())
                });
            Some(if count > 0 {
                sum / count as f64 * 1000.0
            } else {
                0.0
            })
        }
        MetricData::ExponentialHistogram(_) => None,
    }
}
