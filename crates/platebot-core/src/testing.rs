//! Testing helpers and mock utilities.
//!
//! Builders for raw datastore records and mocked transports.

use crate::upstream::{FetchFault, MockDatastoreTransport, Record};
use serde_json::{json, Value};

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// A registry record for `plate` with the usual fields filled in.
#[must_use]
pub fn vehicle_record(plate: &str) -> Record {
    object(json!({
        "mispar_rechev": plate.parse::<u64>().map_or_else(|_| json!(plate), |n| json!(n)),
        "tozeret_nm": "MAZDA JAPAN",
        "kinuy_mishari": "MAZDA 3",
        "shnat_yitzur": 2018,
        "tzeva_rechev": "WHITE",
        "sug_delek_nm": "GASOLINE",
        "tokef_dt": "2025-06-30",
        "moed_aliya_lakvish": "2018-4"
    }))
}

/// A disability permit record for `plate`.
#[must_use]
pub fn permit_record(plate: &str) -> Record {
    object(json!({ "MISPAR RECHEV": plate, "SUG TAV": "1" }))
}

/// A transport that always fails with `fault`.
#[must_use]
pub fn mock_transport_failing(fault: FetchFault) -> MockDatastoreTransport {
    let mut mock = MockDatastoreTransport::new();
    mock.expect_search().returning(move |_| Err(fault.clone()));
    mock
}

/// A transport that always returns `records`.
#[must_use]
pub fn mock_transport_records(records: Vec<Record>) -> MockDatastoreTransport {
    let mut mock = MockDatastoreTransport::new();
    mock.expect_search().returning(move |_| Ok(records.clone()));
    mock
}
