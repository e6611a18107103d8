use crate::models::QuickPulseDocumentProperty;
use chrono::{DateTime, Utc};
use opentelemetry::{logs::AnyValue, Key, Value};
use std::time::{Duration, SystemTime};

const MAX_PROPERTY_KEY_LEN: usize = 150;
const MAX_PROPERTY_VALUE_LEN: usize = 8192;

pub(crate) fn duration_to_string(duration: Duration) -> String {
    let micros = duration.as_micros();
    let s = micros / 1_000_000 % 60;
    let m = micros / 1_000_000 / 60 % 60;
    let h = micros / 1_000_000 / 60 / 60 % 24;
    let d = micros / 1_000_000 / 60 / 60 / 24;
    let micros_remaining = micros % 1_000_000;
    format!(
        "{}.{:0>2}:{:0>2}:{:0>2}.{:0>6}",
        d, h, m, s, micros_remaining
    )
}

/// Live metrics timestamps use the .NET JSON date format: `/Date(<unix millis>)/`.
pub(crate) fn time_to_quick_pulse_timestamp(time: SystemTime) -> String {
    format!("/Date({})/", DateTime::<Utc>::from(time).timestamp_millis())
}

pub(crate) fn any_value_to_string(value: &AnyValue) -> String {
    match value {
        AnyValue::Int(v) => v.to_string(),
        AnyValue::Double(v) => v.to_string(),
        AnyValue::String(v) => v.as_str().to_string(),
        AnyValue::Boolean(v) => v.to_string(),
        AnyValue::Bytes(bytes) => serde_json::to_string(bytes.as_slice()).unwrap_or_default(),
        AnyValue::ListAny(list) => format!(
            "[{}]",
            list.iter()
                .map(any_value_to_string)
                .collect::<Vec<_>>()
                .join(",")
        ),
        AnyValue::Map(map) => {
            let mut entries: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", k.as_str(), any_value_to_string(v)))
                .collect();
            entries.sort();
            format!("{{{}}}", entries.join(","))
        }
        _ => String::new(),
    }
}

pub(crate) fn attrs_to_properties<'a, T>(attrs: T) -> Vec<QuickPulseDocumentProperty>
where
    T: IntoIterator<Item = (&'a Key, &'a Value)>,
{
    attrs
        .into_iter()
        .map(|(k, v)| property(k.as_str(), v.as_str().into_owned()))
        .collect()
}

pub(crate) fn log_attrs_to_properties<'a, T>(attrs: T) -> Vec<QuickPulseDocumentProperty>
where
    T: IntoIterator<Item = &'a (Key, AnyValue)>,
{
    attrs
        .into_iter()
        .map(|(k, v)| property(k.as_str(), any_value_to_string(v)))
        .collect()
}

fn property(key: &str, value: String) -> QuickPulseDocumentProperty {
    QuickPulseDocumentProperty::new(
        truncate(key.to_string(), MAX_PROPERTY_KEY_LEN),
        truncate(value, MAX_PROPERTY_VALUE_LEN),
    )
}

/// Truncate to at most `max_len` bytes without splitting a character.
pub(crate) fn truncate(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}
