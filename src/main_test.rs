use super::*;

#[test]
fn declined_confirmation_exits_cleanly() {
    assert!(settle(Err(CliError::Engine(EngineError::UserAbort))).is_ok());
}

#[test]
fn real_failures_still_surface() {
    let err = settle(Err(CliError::Engine(EngineError::InvalidState("no completed image to commit")))).unwrap_err();
    assert_eq!(err.to_string(), "no completed image to commit");
    assert!(settle(Err(CliError::NoCard)).is_err());
    assert!(settle(Ok(())).is_ok());
}
