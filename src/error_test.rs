use super::*;

#[test]
fn error_codes_are_distinct() {
    let errors = [
        SyncError::network("create", "offline"),
        SyncError::not_found("note", "abc"),
        SyncError::Validation("bad".into()),
        SyncError::UnknownNote(NoteId::confirmed("abc")),
    ];
    let codes: Vec<&str> = errors.iter().map(ErrorCode::error_code).collect();
    assert_eq!(codes, vec!["E_NETWORK", "E_NOT_FOUND", "E_VALIDATION", "E_UNKNOWN_NOTE"]);
}

#[test]
fn only_network_errors_are_retryable() {
    assert!(SyncError::network("update", "timeout").retryable());
    assert!(!SyncError::not_found("note", "x").retryable());
    assert!(!SyncError::Validation("x".into()).retryable());
    assert!(!SyncError::UnknownNote(NoteId::confirmed("x")).retryable());
}

#[test]
fn display_includes_operation_and_message() {
    let err = SyncError::network("delete", "connection reset");
    assert_eq!(err.to_string(), "delete failed: connection reset");
}

#[test]
fn display_not_found_names_the_entity() {
    let err = SyncError::not_found("presence", "user-1");
    assert_eq!(err.to_string(), "presence not found: user-1");
}
