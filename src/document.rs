use crate::{
    convert::{
        any_value_to_string, attrs_to_properties, duration_to_string, log_attrs_to_properties,
    },
    models::{QuickPulseDocument, QuickPulseDocumentType, SeverityLevel},
    recorder::SpanClass,
};
use opentelemetry::{
    trace::{SpanKind, Status},
    Value,
};
use opentelemetry_sdk::{logs::SdkLogRecord, trace::SpanData};
use opentelemetry_semantic_conventions as semcov;
use std::{collections::HashMap, fmt::Debug, time::Duration};

/// Builds the documents shown in the live metrics sample telemetry view.
///
/// Plug in a custom implementation with
/// [`QuickPulseManagerBuilder::with_document_builder`](crate::QuickPulseManagerBuilder::with_document_builder)
/// to control what is sent for every span and log record.
pub trait DocumentBuilder: Debug + Send + Sync {
    /// Document for a finished span, already classified by the configured
    /// [`SpanClassifier`](crate::SpanClassifier).
    fn span_document(&self, span: &SpanData, class: SpanClass) -> QuickPulseDocument;

    /// Document for an emitted log record.
    fn log_document(&self, record: &SdkLogRecord) -> QuickPulseDocument;
}

/// Maps spans to request and dependency documents and log records to exception and trace
/// documents, following the OpenTelemetry semantic conventions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDocumentBuilder;

impl DocumentBuilder for DefaultDocumentBuilder {
    fn span_document(&self, span: &SpanData, class: SpanClass) -> QuickPulseDocument {
        let attrs: HashMap<&str, &Value> = span
            .attributes
            .iter()
            .map(|kv| (kv.key.as_str(), &kv.value))
            .collect();
        let duration = duration_to_string(get_duration(span));

        let document_type = match class {
            SpanClass::Request { success } => {
                let name = match attrs.get(semcov::trace::HTTP_REQUEST_METHOD) {
                    Some(method) => match attrs.get(semcov::trace::HTTP_ROUTE) {
                        Some(route) => format!("{} {}", method.as_str(), route.as_str()),
                        None => method.as_str().into_owned(),
                    },
                    None => span.name.to_string(),
                };
                QuickPulseDocumentType::Request {
                    operation_name: name.clone(),
                    name,
                    success: Some(success),
                    duration,
                    response_code: result_code(&attrs, &span.status),
                }
            }
            SpanClass::Dependency { success } => QuickPulseDocumentType::Dependency {
                name: span.name.to_string(),
                target: dependency_target(&attrs).unwrap_or_default(),
                success: Some(success),
                duration,
                result_code: result_code(&attrs, &span.status),
                command_name: attrs
                    .get(semcov::trace::URL_FULL)
                    .or_else(|| attrs.get(semcov::attribute::DB_QUERY_TEXT))
                    .map(|v| v.as_str().into_owned())
                    .unwrap_or_default(),
                dependency_type_name: dependency_type(span.span_kind.clone(), &attrs),
                operation_name: span.name.to_string(),
            },
        };

        QuickPulseDocument::new(
            document_type,
            span.span_context.trace_id().to_string(),
            attrs_to_properties(span.attributes.iter().map(|kv| (&kv.key, &kv.value))),
        )
    }

    fn log_document(&self, record: &SdkLogRecord) -> QuickPulseDocument {
        let operation_id = record
            .trace_context()
            .map(|cx| cx.trace_id.to_string())
            .unwrap_or_default();

        if is_exception(record) {
            let get = |key: &str| {
                record
                    .attributes_iter()
                    .find(|(k, _)| k.as_str() == key)
                    .map(|(_, v)| any_value_to_string(v))
                    .unwrap_or_default()
            };
            let document_type = QuickPulseDocumentType::Exception {
                exception: get(semcov::trace::EXCEPTION_STACKTRACE),
                exception_message: get(semcov::trace::EXCEPTION_MESSAGE),
                exception_type: get(semcov::trace::EXCEPTION_TYPE),
            };
            let properties = log_attrs_to_properties(record.attributes_iter().filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    semcov::trace::EXCEPTION_TYPE
                        | semcov::trace::EXCEPTION_MESSAGE
                        | semcov::trace::EXCEPTION_STACKTRACE
                )
            }));
            QuickPulseDocument::new(document_type, operation_id, properties)
        } else {
            let document_type = QuickPulseDocumentType::Trace {
                message: record.body().map(any_value_to_string).unwrap_or_default(),
                severity_level: record
                    .severity_number()
                    .map(Into::into)
                    .unwrap_or(SeverityLevel::Information),
            };
            QuickPulseDocument::new(
                document_type,
                operation_id,
                log_attrs_to_properties(record.attributes_iter()),
            )
        }
    }
}

pub(crate) fn get_duration(span: &SpanData) -> Duration {
    span.end_time
        .duration_since(span.start_time)
        .unwrap_or_default()
}

/// Everything but an explicit error counts as success.
pub(crate) fn is_span_success(span: &SpanData) -> bool {
    !matches!(span.status, Status::Error { .. })
}

pub(crate) fn is_exception(record: &SdkLogRecord) -> bool {
    record.attributes_iter().any(|(k, _)| {
        k.as_str() == semcov::trace::EXCEPTION_TYPE
            || k.as_str() == semcov::trace::EXCEPTION_MESSAGE
    })
}

fn status_to_result_code(status: &Status) -> i32 {
    // Since responseCode is a required field for RequestData, we map the span status to a
    // number the same way the Application Insights exporter does.
    match status {
        Status::Unset => 0,
        Status::Ok => 1,
        Status::Error { .. } => 2,
    }
}

fn result_code(attrs: &HashMap<&str, &Value>, status: &Status) -> String {
    attrs
        .get(semcov::trace::HTTP_RESPONSE_STATUS_CODE)
        .map(|v| v.as_str().into_owned())
        .unwrap_or_else(|| status_to_result_code(status).to_string())
}

fn dependency_target(attrs: &HashMap<&str, &Value>) -> Option<String> {
    if let Some(address) = attrs.get(semcov::trace::SERVER_ADDRESS) {
        Some(match attrs.get(semcov::trace::SERVER_PORT) {
            Some(port) => format!("{}:{}", address.as_str(), port.as_str()),
            None => address.as_str().into_owned(),
        })
    } else {
        attrs
            .get(semcov::attribute::DB_NAMESPACE)
            .map(|v| v.as_str().into_owned())
    }
}

fn dependency_type(kind: SpanKind, attrs: &HashMap<&str, &Value>) -> String {
    if kind == SpanKind::Internal {
        "InProc".into()
    } else if let Some(system) = attrs
        .get(semcov::trace::DB_SYSTEM_NAME)
        .or_else(|| attrs.get(semcov::attribute::MESSAGING_SYSTEM))
        .or_else(|| attrs.get(semcov::trace::RPC_SYSTEM))
    {
        system.as_str().into_owned()
    } else if attrs.keys().any(|k| k.starts_with("http.")) {
        "HTTP".into()
    } else {
        String::new()
    }
}
