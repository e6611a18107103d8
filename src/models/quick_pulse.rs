use crate::models::{MonitoringDataPoint, SeverityLevel};
use serde::Serialize;

/// Snapshot of a single span or log record shown in the live metrics sample telemetry view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuickPulseDocument {
    #[serde(rename = "__type")]
    pub(crate) type_: &'static str,
    #[serde(flatten)]
    pub(crate) document_type: QuickPulseDocumentType,
    pub(crate) version: &'static str,
    pub(crate) operation_id: String,
    pub(crate) properties: Vec<QuickPulseDocumentProperty>,
}

impl QuickPulseDocument {
    pub(crate) const VERSION: &'static str = "1.0";

    /// Create a document. The `__type` name is derived from the document type.
    pub fn new(
        document_type: QuickPulseDocumentType,
        operation_id: impl Into<String>,
        properties: Vec<QuickPulseDocumentProperty>,
    ) -> Self {
        QuickPulseDocument {
            type_: document_type.type_name(),
            document_type,
            version: Self::VERSION,
            operation_id: operation_id.into(),
            properties,
        }
    }

    /// Type specific content of the document.
    pub fn document_type(&self) -> &QuickPulseDocumentType {
        &self.document_type
    }

    /// Trace id of the operation this document belongs to.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Custom properties.
    pub fn properties(&self) -> &[QuickPulseDocumentProperty] {
        &self.properties
    }
}

/// Type specific content of a [`QuickPulseDocument`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "DocumentType", rename_all_fields = "PascalCase")]
#[allow(missing_docs)]
pub enum QuickPulseDocumentType {
    Request {
        name: String,
        success: Option<bool>,
        duration: String,
        response_code: String,
        operation_name: String,
    },
    Dependency {
        name: String,
        target: String,
        success: Option<bool>,
        duration: String,
        result_code: String,
        command_name: String,
        dependency_type_name: String,
        operation_name: String,
    },
    Exception {
        exception: String,
        exception_message: String,
        exception_type: String,
    },
    Trace {
        message: String,
        severity_level: SeverityLevel,
    },
}

impl QuickPulseDocumentType {
    fn type_name(&self) -> &'static str {
        match self {
            QuickPulseDocumentType::Request { .. } => "RequestTelemetryDocument",
            QuickPulseDocumentType::Dependency { .. } => "DependencyTelemetryDocument",
            QuickPulseDocumentType::Exception { .. } => "ExceptionTelemetryDocument",
            QuickPulseDocumentType::Trace { .. } => "TraceTelemetryDocument",
        }
    }
}

/// Custom property of a [`QuickPulseDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickPulseDocumentProperty {
    pub(crate) key: String,
    pub(crate) value: String,
}

impl QuickPulseDocumentProperty {
    /// Create a property.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        QuickPulseDocumentProperty {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct QuickPulseMetric {
    pub(crate) name: &'static str,
    pub(crate) value: f64,
    pub(crate) weight: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct QuickPulseEnvelope<'a> {
    pub(crate) documents: Vec<QuickPulseDocument>,
    #[serde(flatten)]
    pub(crate) monitoring_data_point: &'a MonitoringDataPoint,
    pub(crate) instrumentation_key: &'a str,
    pub(crate) metrics: Vec<QuickPulseMetric>,
    pub(crate) timestamp: String,
}
