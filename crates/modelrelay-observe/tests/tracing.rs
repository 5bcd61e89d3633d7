use modelrelay_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[test]
fn init_tracing_installs_once() {
    assert!(init_tracing(false).is_ok());
    assert!(init_tracing(false).is_err());

    tracing::info!(target: "modelrelay::test", "subscriber installed");
    shutdown_tracing();
}
