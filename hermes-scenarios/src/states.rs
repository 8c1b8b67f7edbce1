//! Scenarios that inject a protocol-illegal message once the peer has
//! settled into `NotAvailableNotReady` and confirm the peer both notifies
//! and then closes the socket, in both roles.
//!
//! Grounded on `test_terminate_on_wrong_message_in_not_available_not_ready`
//! in both `test_downstream_ifc.py` (this harness as upstream) and
//! `test_upstream_ifc.py` (this harness as downstream, there named
//! `..._ready2`), plus `test_downstream_ifc_states.py`'s handshake-context
//! variant of the same sub-test.

use hermes_message::{Message, NotificationCode, SeverityType, TransferState};
use hermes_runtime::{
    validate_notification, DownstreamContextWithHandshake, Environment, ScenarioError,
    TestRegistry, UpstreamContextWithHandshake,
};
use hermes_transport::{ConnectionLost, RECEIVE_TIMEOUT};

pub(crate) fn register(registry: &mut TestRegistry) {
    registry.register(
        "terminate_on_wrong_message_in_not_available_not_ready",
        module_path!(),
        "After handshake, each of ServiceDescription/RevokeMachineReady/StartTransport/StopTransport \
         sent as upstream gets Notification(ProtocolError, Fatal) then a closed socket.",
        terminate_on_wrong_message_in_not_available_not_ready,
    );
    registry.register(
        "terminate_on_wrong_message_in_not_available_not_ready2",
        module_path!(),
        "As above, driven from the downstream role with ServiceDescription/RevokeBoardAvailable/TransportFinished.",
        terminate_on_wrong_message_in_not_available_not_ready2,
    );
}

/// Sending `illegal` must provoke `Notification(ProtocolError, Fatal)` and
/// then a closed socket -- verified by a subsequent send failing with
/// `ConnectionLost`.
fn assert_illegal_message_closes_socket(
    env: &Environment,
    send: impl FnOnce(&Message) -> Result<(), ConnectionLost>,
    expect_notification: impl FnOnce() -> Result<Message, ConnectionLost>,
    send_again: impl FnOnce(&Message) -> Result<(), ConnectionLost>,
    illegal: &Message,
) -> Result<(), ScenarioError> {
    send(illegal)?;
    let notification = expect_notification()?;
    validate_notification(env, &notification, NotificationCode::ProtocolError, SeverityType::Fatal)?;

    let probe = Message::notification(NotificationCode::MachineShutdown, SeverityType::Information, "this should fail");
    match send_again(&probe) {
        Err(_) => Ok(()),
        Ok(()) => Err(format!(
            "peer did not close the connection after illegal {}",
            illegal.tag()
        )
        .into()),
    }
}

fn terminate_on_wrong_message_in_not_available_not_ready(env: &Environment) -> Result<(), ScenarioError> {
    let illegal_messages = [
        env.service_description_message(),
        Message::revoke_machine_ready(),
        Message::start_transport("some_guid", None),
        Message::stop_transport(TransferState::Complete, &uuid::Uuid::new_v4().to_string()),
    ];

    for illegal in &illegal_messages {
        let mut ctxt = UpstreamContextWithHandshake::open(env)?;
        // These sends are deliberately illegal in the post-handshake state;
        // strict mode would have the state machine reject them locally
        // before a single byte reaches the peer, per §4.D "strict-send-off".
        ctxt.set_strict(false);
        assert_illegal_message_closes_socket(
            env,
            |m| ctxt.send_msg(m),
            || ctxt.expect_message(&hermes_message::Tag::Notification, RECEIVE_TIMEOUT),
            |m| ctxt.send_msg(m),
            illegal,
        )?;
    }
    Ok(())
}

fn terminate_on_wrong_message_in_not_available_not_ready2(env: &Environment) -> Result<(), ScenarioError> {
    let illegal_messages = [
        env.service_description_message(),
        Message::revoke_board_available(),
        Message::transport_finished(TransferState::Complete, "some_guid"),
    ];

    for illegal in &illegal_messages {
        let mut ctxt = DownstreamContextWithHandshake::open(env)?;
        ctxt.set_strict(false);
        assert_illegal_message_closes_socket(
            env,
            |m| ctxt.send_msg(m),
            || ctxt.expect_message(&hermes_message::Tag::Notification, RECEIVE_TIMEOUT),
            |m| ctxt.send_msg(m),
            illegal,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    //! `xtest_terminate_on_illegal_message` from the original, preserved as
    //! an `#[ignore]`d test rather than a registered scenario: §9 leaves
    //! open whether a peer receiving an unrecognized top-level tag must
    //! *close* the connection or may merely *notify*, pending the
    //! authoritative standard text. Enable once that is resolved.

    use hermes_message::Tag;
    use hermes_runtime::{Environment, UpstreamContext, UpstreamContextWithHandshake};
    use hermes_transport::RECEIVE_TIMEOUT;

    const ILLEGAL_BYTES: &[u8] =
        b"<Hermes Timestamp=\"2020-04-28T10:01:20.768\"><ThisIsUnknownMessage /></Hermes>";

    fn illegal_tag() -> Tag {
        Tag::Other("ThisIsUnknownMessage".to_string())
    }

    #[test]
    #[ignore = "peer close-vs-notify behavior on an unknown tag is unresolved, see DESIGN.md"]
    fn terminate_on_illegal_message() {
        let env = Environment::for_test();

        let mut ctxt = UpstreamContext::open(&env).expect("connect");
        ctxt.send_tag_and_bytes(&illegal_tag(), ILLEGAL_BYTES).expect("send");
        assert!(
            ctxt.expect_message(&Tag::Notification, RECEIVE_TIMEOUT).is_err(),
            "peer should have closed instead of answering"
        );

        let mut ctxt = UpstreamContextWithHandshake::open(&env).expect("connect with handshake");
        ctxt.send_tag_and_bytes(&illegal_tag(), ILLEGAL_BYTES).expect("send");
        assert!(
            ctxt.expect_message(&Tag::Notification, RECEIVE_TIMEOUT).is_err(),
            "peer should have closed instead of answering, even post-handshake"
        );
    }
}
