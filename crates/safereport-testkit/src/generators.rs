//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use safereport_core::{DeviceKey, EnvelopeAlgorithm};

use crate::fixtures::IncidentReport;

/// Generate a random device key.
pub fn device_key() -> impl Strategy<Value = DeviceKey> {
    any::<[u8; 32]>().prop_map(DeviceKey::from_bytes)
}

/// Generate a random key in its 64-character hex form.
pub fn key_hex() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(hex::encode)
}

/// Generate an envelope algorithm.
pub fn algorithm() -> impl Strategy<Value = EnvelopeAlgorithm> {
    prop_oneof![
        Just(EnvelopeAlgorithm::Aes256Cbc),
        Just(EnvelopeAlgorithm::Aes256Gcm),
    ]
}

/// Generate a JSON scalar.
///
/// Floats are short binary fractions so they print and parse back exactly.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1_000_000i32..1_000_000)
            .prop_filter_map("finite", |n| Number::from_f64(f64::from(n) / 8.0).map(Value::Number)),
        ".{0,24}".prop_map(Value::String),
    ]
}

/// Generate an arbitrary JSON value, nested up to a few levels.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_][a-zA-Z0-9_]{0,11}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Generate an incident report.
pub fn incident_report() -> impl Strategy<Value = IncidentReport> {
    (
        ".{1,32}",
        "20[0-9]{2}-[01][0-9]-[0-3][0-9]",
        ".{1,48}",
        ".{0,256}",
        prop::option::of("file:///[a-z0-9/]{1,24}\\.jpg"),
    )
        .prop_map(
            |(reporter_name, incident_date, location, description, image)| IncidentReport {
                reporter_name,
                created_at: format!("{}T00:00:00.000Z", incident_date),
                incident_date,
                location,
                description,
                image,
            },
        )
}
