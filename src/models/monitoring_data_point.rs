use serde::Serialize;

/// Identity of this process as seen by the live metrics service.
///
/// Sent with every ping and post. Created once per [`QuickPulseManager`] and never changed
/// afterwards.
///
/// [`QuickPulseManager`]: crate::QuickPulseManager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoringDataPoint {
    pub(crate) version: String,
    pub(crate) invariant_version: u32,
    pub(crate) instance: String,
    pub(crate) role_name: String,
    pub(crate) machine_name: String,
    pub(crate) stream_id: String,
}

impl MonitoringDataPoint {
    /// Protocol version understood by this crate.
    pub const INVARIANT_VERSION: u32 = 1;

    /// SDK version string reported to the service.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Protocol version. Always [`MonitoringDataPoint::INVARIANT_VERSION`].
    pub fn invariant_version(&self) -> u32 {
        self.invariant_version
    }

    /// Cloud role instance.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Cloud role name.
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Host name of this machine.
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Random id identifying this process' stream of live metrics.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }
}
