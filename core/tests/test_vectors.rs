//! Verify the response normalizer against JSON test vectors in `test-vectors/`.
//!
//! Each vector describes a raw HTTP outcome (status code plus body, or a
//! transport failure) and either the records it should normalize to or the
//! error type it should be classified as. Records are compared as parsed
//! JSON, so key order in the vectors does not matter.

use ontap_core::{unmarshal_response, ErrorType, RawResponse, TransportError, TransportFailure};
use serde_json::Value;

#[test]
fn normalize_test_vectors() {
    let raw = include_str!("../../test-vectors/normalize.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status_code = case["status_code"].as_i64().unwrap() as i32;
        let expected = &case["expected"];

        let outcome = match case.get("transport_error").and_then(Value::as_str) {
            Some(message) => Err(TransportFailure::new(
                status_code,
                TransportError::Scripted(message.to_string()),
            )),
            None => Ok(RawResponse {
                status_code,
                body: case["body"].as_str().unwrap().as_bytes().to_vec(),
            }),
        };
        let result = unmarshal_response(outcome);

        if let Some(error_type) = expected.get("error_type") {
            let expected_type: ErrorType = serde_json::from_value(error_type.clone()).unwrap();
            let err = result.expect_err(name);
            assert_eq!(err.error_type(), Some(expected_type), "{name}: error type");
            assert_eq!(err.status_code(), status_code, "{name}: status code");
            if let Some(response) = err.response() {
                assert_eq!(response.error_type, Some(expected_type), "{name}: tagged response");
            }
            continue;
        }

        let response = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
        assert_eq!(response.status_code, status_code, "{name}: status code");
        assert_eq!(response.error_type, None, "{name}: error type");
        assert_eq!(
            response.num_records,
            expected["num_records"].as_u64().unwrap() as usize,
            "{name}: num_records"
        );
        assert_eq!(response.num_records, response.records.len(), "{name}: count invariant");

        let records: Vec<Value> = response.records.iter().cloned().map(Value::Object).collect();
        assert_eq!(Value::Array(records), expected["records"], "{name}: records");

        if let Some(job_uuids) = expected.get("job_uuids") {
            let expected_uuids: Vec<String> = serde_json::from_value(job_uuids.clone()).unwrap();
            assert_eq!(response.job_uuids().unwrap(), expected_uuids, "{name}: job uuids");
        }
    }
}
