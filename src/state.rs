use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

/// Current state of the live metrics connection.
///
/// In the ping states the service is only told that this process exists. In the post states
/// somebody is watching the live metrics dashboard and telemetry is collected and sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum QuickPulseState {
    /// Nothing is sent and nothing is collected.
    #[default]
    Offline = 0,
    /// Ping every 5 seconds (or as often as the service asks for).
    PingShort = 1,
    /// Ping every 60 seconds after a minute without subscription.
    PingLong = 2,
    /// Post collected telemetry every second.
    PostShort = 3,
    /// Post collected telemetry every 5 seconds.
    PostLong = 4,
}

impl QuickPulseState {
    /// Whether telemetry is collected in this state.
    pub fn is_post(self) -> bool {
        matches!(self, QuickPulseState::PostShort | QuickPulseState::PostLong)
    }

    /// Whether the service is pinged in this state.
    pub fn is_ping(self) -> bool {
        matches!(self, QuickPulseState::PingShort | QuickPulseState::PingLong)
    }

    /// How often a request is sent in this state. `None` for [`QuickPulseState::Offline`].
    pub fn interval(self) -> Option<Duration> {
        match self {
            QuickPulseState::Offline => None,
            QuickPulseState::PingShort => Some(Duration::from_secs(5)),
            QuickPulseState::PingLong => Some(Duration::from_secs(60)),
            QuickPulseState::PostShort => Some(Duration::from_secs(1)),
            QuickPulseState::PostLong => Some(Duration::from_secs(5)),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => QuickPulseState::PingShort,
            2 => QuickPulseState::PingLong,
            3 => QuickPulseState::PostShort,
            4 => QuickPulseState::PostLong,
            _ => QuickPulseState::Offline,
        }
    }
}

impl fmt::Display for QuickPulseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuickPulseState::Offline => "offline",
            QuickPulseState::PingShort => "ping-short",
            QuickPulseState::PingLong => "ping-long",
            QuickPulseState::PostShort => "post-short",
            QuickPulseState::PostLong => "post-long",
        })
    }
}

/// Shared handle to the live metrics state.
///
/// Clones refer to the same state. The recording paths read it before every span and log
/// record, the reader writes it on every transition.
#[derive(Clone, Default)]
pub struct LiveMetricsState(Arc<AtomicU8>);

impl LiveMetricsState {
    /// Create a new state handle.
    pub fn new(initial: QuickPulseState) -> Self {
        LiveMetricsState(Arc::new(AtomicU8::new(initial as u8)))
    }

    /// Current state.
    pub fn get(&self) -> QuickPulseState {
        QuickPulseState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to a new state.
    pub fn set(&self, state: QuickPulseState) {
        let previous = QuickPulseState::from_u8(self.0.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            live_debug!("live metrics state {} -> {}", previous, state);
        }
    }

    /// Whether spans and log records should be recorded right now.
    pub fn is_post_state(&self) -> bool {
        self.get().is_post()
    }
}

impl fmt::Debug for LiveMetricsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveMetricsState").field(&self.get()).finish()
    }
}
