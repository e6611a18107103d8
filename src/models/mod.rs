mod monitoring_data_point;
mod quick_pulse;
mod severity_level;

pub use monitoring_data_point::*;
pub use quick_pulse::*;
pub use severity_level::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn data_point() -> MonitoringDataPoint {
        MonitoringDataPoint {
            version: "rust:ext0.1.0".into(),
            invariant_version: 1,
            instance: "instance".into(),
            role_name: "role".into(),
            machine_name: "machine".into(),
            stream_id: "0000000000000000000000000000013a".into(),
        }
    }

    #[test]
    fn serialization_format() {
        let data_point = data_point();
        let envelope = QuickPulseEnvelope {
            documents: vec![QuickPulseDocument::new(
                QuickPulseDocumentType::Trace {
                    message: "hello world".into(),
                    severity_level: SeverityLevel::Information,
                },
                "operation",
                vec![QuickPulseDocumentProperty::new("key", "value")],
            )],
            monitoring_data_point: &data_point,
            instrumentation_key: "ikey",
            metrics: vec![QuickPulseMetric {
                name: "\\ApplicationInsights\\Requests/Sec",
                value: 2.0,
                weight: 1,
            }],
            timestamp: "/Date(1596665700000)/".into(),
        };
        let serialized = serde_json::to_string(&envelope).unwrap();
        let expected = concat!(
            "{\"Documents\":[{\"__type\":\"TraceTelemetryDocument\",\"DocumentType\":\"Trace\",",
            "\"Message\":\"hello world\",\"SeverityLevel\":\"Information\",\"Version\":\"1.0\",",
            "\"OperationId\":\"operation\",\"Properties\":[{\"key\":\"key\",\"value\":\"value\"}]}],",
            "\"Version\":\"rust:ext0.1.0\",\"InvariantVersion\":1,\"Instance\":\"instance\",",
            "\"RoleName\":\"role\",\"MachineName\":\"machine\",",
            "\"StreamId\":\"0000000000000000000000000000013a\",\"InstrumentationKey\":\"ikey\",",
            "\"Metrics\":[{\"Name\":\"\\\\ApplicationInsights\\\\Requests/Sec\",\"Value\":2.0,\"Weight\":1}],",
            "\"Timestamp\":\"/Date(1596665700000)/\"}",
        );
        assert_eq!(expected, serialized);
    }

    #[test]
    fn dependency_document_format() {
        let document = QuickPulseDocument::new(
            QuickPulseDocumentType::Dependency {
                name: "GET /".into(),
                target: "example.com:8080".into(),
                success: Some(false),
                duration: "0.00:00:00.000005".into(),
                result_code: "500".into(),
                command_name: "https://example.com:8080/".into(),
                dependency_type_name: "HTTP".into(),
                operation_name: "GET /".into(),
            },
            "operation",
            Vec::new(),
        );
        let serialized = serde_json::to_value(&document).unwrap();
        assert_eq!("DependencyTelemetryDocument", serialized["__type"]);
        assert_eq!("Dependency", serialized["DocumentType"]);
        assert_eq!("example.com:8080", serialized["Target"]);
        assert_eq!(false, serialized["Success"]);
        assert_eq!("HTTP", serialized["DependencyTypeName"]);
        assert_eq!("1.0", serialized["Version"]);
    }
}
