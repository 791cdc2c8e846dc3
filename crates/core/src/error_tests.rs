// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializable_error_roundtrips_through_json() {
    let error = SerializableError::new("PermanentFailure", "Action failed after 3 attempts.")
        .with_dml_errors(vec![DmlError {
            record_index: 0,
            status_code: "FIELD_CUSTOM_VALIDATION_EXCEPTION".to_string(),
            status_message: "amount must be positive".to_string(),
            fields: vec!["Amount__c".to_string()],
        }]);

    let json = serde_json::to_string(&error).unwrap();
    let parsed: SerializableError = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, error);
}

#[test]
fn serializable_error_cause_chain_roundtrips() {
    let inner = SerializableError::new("IoError", "disk full");
    let outer = SerializableError {
        type_name: "PermanentFailure".to_string(),
        message: "Action failed after 3 attempts.".to_string(),
        stack: Vec::new(),
        dml_errors: Vec::new(),
        cause: Some(Box::new(inner.clone())),
    };

    let json = serde_json::to_string(&outer).unwrap();
    let parsed: SerializableError = serde_json::from_str(&json).unwrap();
    assert_eq!(*parsed.cause.unwrap(), inner);
}

#[test]
fn step_initialization_not_found_message_has_class_prefix() {
    let error = StepInitializationError::NotFound("charge_card".to_string());
    assert_eq!(error.to_string(), "Could not find class charge_card");
}

#[test]
fn step_initialization_errors_map_to_permanent_failure() {
    let error = StepInitializationError::NotFound("missing_step".to_string());
    let permanent: PermanentFailure = error.into();
    assert!(permanent.0.message.contains("missing_step"));
}

#[test]
fn validation_error_maps_to_permanent_failure() {
    let error = ValidationError("JobState must not be null".to_string());
    let permanent: PermanentFailure = error.into();
    assert!(permanent.0.message.contains("JobState must not be null"));
}

#[test]
fn permanent_failure_new_wraps_message() {
    let failure = PermanentFailure::new("Action failed after 3 attempts.");
    assert_eq!(failure.to_string(), "PermanentFailure: Action failed after 3 attempts.");
}
