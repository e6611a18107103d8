use crate::{
    buffer::DocumentBuffer,
    convert::time_to_quick_pulse_timestamp,
    exporter::QuickPulseExporter,
    metrics::to_quick_pulse_metrics,
    models::{MonitoringDataPoint, QuickPulseDocument, QuickPulseEnvelope, QuickPulseMetric},
    state::{LiveMetricsState, QuickPulseState},
    uploader::QuickPulseResponse,
};
use http::Uri;
use opentelemetry_sdk::{
    error::OTelSdkResult,
    metrics::{data::ResourceMetrics, exporter::PushMetricExporter, Temporality},
};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime},
};

/// Seconds without a subscribed ping after which pinging slows down.
const PING_LONG_AFTER_SECONDS: u64 = 60;
/// Seconds of failed posts after which we go back to pinging.
const MAX_POST_FAILURE_SECONDS: u64 = 20;

#[derive(Debug, Default)]
struct TickState {
    elapsed_seconds: u64,
    failed_post_seconds: u64,
    redirected_host: Option<Uri>,
    polling_interval_hint: Option<Duration>,
}

#[derive(Debug)]
struct ReaderInner {
    exporter: QuickPulseExporter,
    data_point: Arc<MonitoringDataPoint>,
    state: LiveMetricsState,
    documents: DocumentBuffer,
    tick_state: Mutex<TickState>,
}

/// Drives the ping/post state machine.
///
/// Register it with a [`PeriodicReader`] exporting once a second. Every export is one tick:
/// depending on the current [`QuickPulseState`] and the seconds elapsed in it, the reader
/// pings the service, posts the collected metrics and documents, or does nothing.
///
/// [`PeriodicReader`]: opentelemetry_sdk::metrics::PeriodicReader
#[derive(Debug, Clone)]
pub struct QuickPulseMetricReader {
    inner: Arc<ReaderInner>,
}

impl QuickPulseMetricReader {
    pub(crate) fn new(
        exporter: QuickPulseExporter,
        data_point: Arc<MonitoringDataPoint>,
        state: LiveMetricsState,
        documents: DocumentBuffer,
    ) -> Self {
        QuickPulseMetricReader {
            inner: Arc::new(ReaderInner {
                exporter,
                data_point,
                state,
                documents,
                tick_state: Mutex::new(TickState::default()),
            }),
        }
    }

    /// Exporter used to talk to the service.
    pub fn exporter(&self) -> &QuickPulseExporter {
        &self.inner.exporter
    }

    /// Identity sent with every request. The same instance the manager holds.
    pub fn base_monitoring_data_point(&self) -> &Arc<MonitoringDataPoint> {
        &self.inner.data_point
    }

    /// Shared state this reader moves through.
    pub fn state(&self) -> &LiveMetricsState {
        &self.inner.state
    }

    /// Endpoint the service redirected us to, if any.
    pub fn redirected_host(&self) -> Option<Uri> {
        self.lock().redirected_host.clone()
    }

    #[cfg(test)]
    pub(crate) fn elapsed_seconds(&self) -> u64 {
        self.lock().elapsed_seconds
    }

    /// Run one second of the state machine.
    pub(crate) async fn tick(&self, metrics: Vec<QuickPulseMetric>) {
        let state = self.inner.state.get();
        if state == QuickPulseState::Offline {
            return;
        }

        let (elapsed, interval, endpoint) = {
            let tick_state = self.lock();
            (
                tick_state.elapsed_seconds,
                interval_seconds(state, tick_state.polling_interval_hint),
                tick_state.redirected_host.clone(),
            )
        };

        if elapsed % interval == 0 {
            if state.is_ping() {
                self.ping(state, elapsed, endpoint.as_ref()).await;
            } else {
                self.post(interval, metrics, endpoint.as_ref()).await;
            }
        }

        self.lock().elapsed_seconds += 1;
    }

    async fn ping(&self, state: QuickPulseState, elapsed: u64, endpoint: Option<&Uri>) {
        let envelope = self.envelope(Vec::new(), Vec::new());
        let subscribed = match self.inner.exporter.ping(endpoint, &envelope).await {
            Ok(response) => {
                let subscribed = response.should_post;
                self.apply_hints(response);
                subscribed
            }
            Err(err) => {
                live_warn!("live metrics ping failed: {}", err);
                false
            }
        };
        if self.is_shut_down() {
            return;
        }

        if subscribed {
            self.transition(QuickPulseState::PostShort);
        } else if state == QuickPulseState::PingShort && elapsed >= PING_LONG_AFTER_SECONDS {
            self.inner.state.set(QuickPulseState::PingLong);
        }
    }

    async fn post(&self, interval: u64, metrics: Vec<QuickPulseMetric>, endpoint: Option<&Uri>) {
        let envelope = self.envelope(metrics, self.inner.documents.drain());
        let result = self.inner.exporter.post(endpoint, &envelope).await;
        if self.is_shut_down() {
            return;
        }
        match result {
            Ok(response) => {
                let subscribed = response.should_post;
                self.apply_hints(response);
                if subscribed {
                    self.lock().failed_post_seconds = 0;
                } else {
                    self.transition(QuickPulseState::PingShort);
                }
            }
            Err(err) => {
                live_warn!("live metrics post failed: {}", err);
                let give_up = {
                    let mut tick_state = self.lock();
                    tick_state.failed_post_seconds += interval;
                    tick_state.failed_post_seconds >= MAX_POST_FAILURE_SECONDS
                };
                if give_up {
                    self.transition(QuickPulseState::PingShort);
                }
            }
        }
    }

    fn envelope(
        &self,
        metrics: Vec<QuickPulseMetric>,
        documents: Vec<QuickPulseDocument>,
    ) -> QuickPulseEnvelope<'_> {
        QuickPulseEnvelope {
            documents,
            monitoring_data_point: &self.inner.data_point,
            instrumentation_key: self.inner.exporter.instrumentation_key(),
            metrics,
            timestamp: time_to_quick_pulse_timestamp(SystemTime::now()),
        }
    }

    fn apply_hints(&self, response: QuickPulseResponse) {
        let mut tick_state = self.lock();
        if let Some(redirected_host) = response.redirected_host {
            live_debug!("live metrics redirected to {}", redirected_host);
            tick_state.redirected_host = Some(redirected_host);
        }
        if let Some(hint) = response.polling_interval_hint {
            tick_state.polling_interval_hint = Some(hint);
        }
    }

    /// Enter `state` and restart the elapsed seconds counter.
    ///
    /// Documents still queued when posting stops are discarded.
    fn transition(&self, state: QuickPulseState) {
        {
            let mut tick_state = self.lock();
            tick_state.elapsed_seconds = 0;
            tick_state.failed_post_seconds = 0;
        }
        self.inner.state.set(state);
        if !state.is_post() {
            let dropped = self.inner.documents.drain().len();
            if dropped > 0 {
                live_debug!("live metrics dropped {} unsent documents", dropped);
            }
        }
    }

    /// Shutdown may happen while a request is in flight. Its response must not revive us.
    fn is_shut_down(&self) -> bool {
        self.inner.state.get() == QuickPulseState::Offline
    }

    fn lock(&self) -> MutexGuard<'_, TickState> {
        self.inner
            .tick_state
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}

/// Seconds between two requests. Never zero.
fn interval_seconds(state: QuickPulseState, polling_interval_hint: Option<Duration>) -> u64 {
    let interval = match (state, polling_interval_hint) {
        (QuickPulseState::PingShort, Some(hint)) => hint,
        _ => state.interval().unwrap_or(Duration::from_secs(1)),
    };
    interval.as_secs().max(1)
}

impl PushMetricExporter for QuickPulseMetricReader {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        // Pings and posts fail regularly, e.g. when offline. Failures drive the state machine
        // and are not reported to the SDK.
        self.tick(to_quick_pulse_metrics(metrics)).await;
        Ok(())
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        self.inner.state.set(QuickPulseState::Offline);
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Delta
    }
}
