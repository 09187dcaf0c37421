use planbook::error::{exit_codes, Error, JsonError};
use uuid::Uuid;

#[test]
fn exit_codes_map_correctly() {
    let user = Error::TaskNotFound(Uuid::new_v4());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let user = Error::InvalidStateTransition {
        from: "Filed".to_string(),
        to: "Doing".to_string(),
    };
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let policy = Error::TaskDeletionDisabled;
    assert_eq!(policy.exit_code(), exit_codes::POLICY_BLOCKED);

    let policy = Error::DependencyCycle(Uuid::new_v4());
    assert_eq!(policy.exit_code(), exit_codes::POLICY_BLOCKED);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code() {
    let id = Uuid::new_v4();
    let err = Error::StoryNotFound(id);
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Story not found"));
}

#[test]
fn transition_error_names_allowed_set() {
    let err = Error::InvalidStateTransition {
        from: "Finished".to_string(),
        to: "Failed".to_string(),
    };
    let message = err.to_string();
    for state in ["Finished", "Failed", "Deferred", "Removed"] {
        assert!(message.contains(state), "missing {state} in: {message}");
    }

    let details = err.details().expect("transition errors carry details");
    assert_eq!(details["allowed"].as_array().unwrap().len(), 4);
}
