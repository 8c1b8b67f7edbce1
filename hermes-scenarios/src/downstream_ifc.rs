//! Scenarios that dial out to a peer's downstream (board-receiving)
//! interface -- this harness plays the upstream role.
//!
//! Grounded on `examples/original_source/.../test_cases/test_downstream_ifc.py`.
//! That file's own header diagram applies here: the system under test
//! receives boards, so this harness's `UpstreamContext` is the side doing
//! the connecting.

use hermes_message::{Message, NotificationCode, SeverityType, Tag};
use hermes_runtime::{
    validate_notification, validate_service_description, CbEvt, Environment, ScenarioError,
    TestRegistry, UpstreamContext,
};
use hermes_transport::{MAX_MESSAGE_SIZE, RECEIVE_TIMEOUT};

pub(crate) fn register(registry: &mut TestRegistry) {
    registry.register(
        "connect_disconnect_n_times",
        module_path!(),
        "Connect and disconnect 10 times. No ServiceDescription sent.",
        connect_disconnect_n_times,
    );
    registry.register(
        "connect_service_description_disconnect_n_times",
        module_path!(),
        "Connect and disconnect 10 times, sending ServiceDescription but never waiting for the answer.",
        connect_service_description_disconnect_n_times,
    );
    registry.register(
        "connect_handshake_disconnect",
        module_path!(),
        "Connect, exchange ServiceDescription, validate the peer's, disconnect.",
        connect_handshake_disconnect,
    );
    registry.register(
        "connect_2_times",
        module_path!(),
        "A second concurrent connection is refused with Notification(ConnectionRefused) while the first keeps working.",
        connect_2_times,
    );
    registry.register(
        "maximum_message_size",
        module_path!(),
        "Send a ServiceDescription padded to exactly the maximum message size with an unknown attribute.",
        maximum_message_size,
    );
    registry.register(
        "multiple_messages_per_packet",
        module_path!(),
        "Send CheckAlive, ServiceDescription, CheckAlive coalesced into one write; only ServiceDescription is answered.",
        multiple_messages_per_packet,
    );
}

fn connect_disconnect_n_times(env: &Environment) -> Result<(), ScenarioError> {
    for _ in 0..10 {
        UpstreamContext::open(env)?;
    }
    Ok(())
}

fn connect_service_description_disconnect_n_times(env: &Environment) -> Result<(), ScenarioError> {
    for _ in 0..10 {
        let mut ctxt = UpstreamContext::open(env)?;
        ctxt.send_msg(&env.service_description_message())?;
    }
    Ok(())
}

fn connect_handshake_disconnect(env: &Environment) -> Result<(), ScenarioError> {
    let mut ctxt = UpstreamContext::open(env)?;
    ctxt.send_msg(&env.service_description_message())?;
    env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
    let msg = ctxt.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
    validate_service_description(env, &msg)?;
    Ok(())
}

fn connect_2_times(env: &Environment) -> Result<(), ScenarioError> {
    let mut ctxt1 = UpstreamContext::open(env)?;
    {
        let mut ctxt2 = UpstreamContext::open(env)?;
        let msg = ctxt2.expect_message(&Tag::Notification, RECEIVE_TIMEOUT)?;
        validate_notification(env, &msg, NotificationCode::ConnectionRefused, SeverityType::Error)?;
        // ctxt2 closes here, having never done anything else -- the point
        // of this sub-test is solely that ctxt1 below still works.
    }
    ctxt1.send_msg(&env.service_description_message())?;
    Ok(())
}

/// Splice `MAX_MESSAGE_SIZE - len` `x` characters into an unknown
/// attribute's value, and insert that attribute ahead of `LaneId`, so the
/// wire message is exactly `MAX_MESSAGE_SIZE` bytes -- reproduces
/// `test_maximum_message_size` byte-for-byte.
fn maximum_message_size(env: &Environment) -> Result<(), ScenarioError> {
    let mut ctxt = UpstreamContext::open(env)?;
    let msg = Message::service_description("DownstreamId", env.lane_id, None, &env.version, &[]);
    let mut bytes = msg.to_bytes();

    let split_at = find_subslice(&bytes, b"LaneId=")
        .expect("ServiceDescription always carries a LaneId attribute");
    let dummy_attr = b"HermesAcceptanceTestDummyAttributeId=\"\" ";
    bytes.splice(split_at..split_at, dummy_attr.iter().copied());

    // Position just inside the dummy attribute's empty quoted value -- two
    // bytes before the end of `dummy_attr` land between its two `"`s.
    let fill_at = split_at + dummy_attr.len() - 2;
    let extend_by = MAX_MESSAGE_SIZE - bytes.len();
    bytes.splice(fill_at..fill_at, std::iter::repeat(b'x').take(extend_by));
    assert_eq!(bytes.len(), MAX_MESSAGE_SIZE);

    ctxt.send_tag_and_bytes(msg.tag(), &bytes)?;
    env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
    ctxt.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
    Ok(())
}

fn multiple_messages_per_packet(env: &Environment) -> Result<(), ScenarioError> {
    let mut ctxt = UpstreamContext::open(env)?;
    let check_alive = Message::check_alive(None, None);
    let service_description = Message::service_description("DownstreamId", env.lane_id, None, &env.version, &[]);
    let mut coalesced = check_alive.to_bytes();
    coalesced.extend_from_slice(&service_description.to_bytes());
    coalesced.extend_from_slice(&check_alive.to_bytes());

    ctxt.send_tag_and_bytes(service_description.tag(), &coalesced)?;
    env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
    ctxt.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
    Ok(())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
