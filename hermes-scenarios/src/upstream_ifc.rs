//! Scenarios that listen for a peer's upstream (board-sending) interface --
//! this harness plays the downstream role.
//!
//! Grounded on `examples/original_source/.../test_cases/test_upstream_ifc.py`.

use hermes_message::Tag;
use hermes_runtime::{
    validate_service_description, CbEvt, DownstreamContext, Environment, ScenarioError,
    TestRegistry,
};
use hermes_transport::RECEIVE_TIMEOUT;

pub(crate) fn register(registry: &mut TestRegistry) {
    registry.register(
        "start_shutdown_n_times",
        module_path!(),
        "Start and shut down the listening server 10 times. Any received ServiceDescription is ignored.",
        start_shutdown_n_times,
    );
    registry.register(
        "exchange_service_description_shutdown_n_times",
        module_path!(),
        "Accept a connection, receive ServiceDescription, shut down -- 10 times.",
        exchange_service_description_shutdown_n_times,
    );
    registry.register(
        "start_handshake_shutdown",
        module_path!(),
        "Accept a connection, receive and fully validate ServiceDescription, shut down.",
        start_handshake_shutdown,
    );
}

fn start_shutdown_n_times(env: &Environment) -> Result<(), ScenarioError> {
    for _ in 0..10 {
        DownstreamContext::open(env)?;
    }
    Ok(())
}

fn exchange_service_description_shutdown_n_times(env: &Environment) -> Result<(), ScenarioError> {
    for _ in 0..10 {
        let mut ctxt = DownstreamContext::open(env)?;
        env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
        ctxt.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
    }
    Ok(())
}

fn start_handshake_shutdown(env: &Environment) -> Result<(), ScenarioError> {
    let mut ctxt = DownstreamContext::open(env)?;
    env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
    let msg = ctxt.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
    validate_service_description(env, &msg)?;
    Ok(())
}
