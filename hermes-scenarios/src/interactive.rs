//! Scenarios that drive a complete board transfer and need an external
//! agent (the callback channel) to decide when a board becomes available,
//! when the machine signals ready, and so on -- these cannot run
//! unattended the way the other modules' scenarios do.
//!
//! Grounded on `test_downstream_ifc_interactive.py`, `test_upstream_ifc_interactive.py`
//! and `test_bothstream_interactive.py`.

use hermes_message::{BoardAttributes, Message, Tag, TransferState};
use hermes_runtime::{
    CbEvt, DownstreamContextWithHandshake, Environment, ScenarioError, TestRegistry,
    UpstreamContextWithHandshake,
};
use hermes_transport::RECEIVE_TIMEOUT;

pub(crate) fn register(registry: &mut TestRegistry) {
    registry.register(
        "complete_board_transfer_from_sut",
        module_path!(),
        "Receive a complete board transfer from the system under test's downstream interface.",
        complete_board_transfer_from_sut,
    );
    registry.register(
        "complete_bamr_board_transfer_to_sut",
        module_path!(),
        "Send a complete board transfer to the system under test's upstream interface, BoardAvailable before MachineReady.",
        |env| complete_bamr_board_transfer_to_sut(env, false).map(|_| ()),
    );
    registry.register(
        "complete_mrba_board_transfer_to_sut",
        module_path!(),
        "As complete_bamr_board_transfer_to_sut, but MachineReady arrives before BoardAvailable.",
        |env| complete_mrba_board_transfer_to_sut(env, false).map(|_| ()),
    );
    registry.register(
        "complete_mrba_board_transfer_to_sut_with_unknown_msg",
        module_path!(),
        "As complete_mrba_board_transfer_to_sut, interleaved with unrecognized messages the peer must ignore.",
        |env| complete_mrba_board_transfer_to_sut(env, true).map(|_| ()),
    );
    registry.register(
        "pass_through",
        module_path!(),
        "A board transferred in on the upstream interface reappears, with the same BoardId, on the downstream interface.",
        pass_through,
    );
}

/// This harness plays the upstream (board-sending) role and waits for the
/// system under test to run the receiving half of the handshake.
fn complete_board_transfer_from_sut(env: &Environment) -> Result<String, ScenarioError> {
    let mut ctxt = UpstreamContextWithHandshake::open(env)?;

    ctxt.send_msg(&Message::machine_ready(None, None, BoardAttributes::default()))?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::MachineReady.to_string() })?;
    let board_available = ctxt.expect_message(&Tag::BoardAvailable, RECEIVE_TIMEOUT)?;
    let board_id = board_available
        .get("BoardId")
        .ok_or("BoardAvailable is missing BoardId")?
        .to_string();

    ctxt.send_msg(&Message::start_transport(&board_id, None))?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::MachineReady.to_string() })?;
    let transport_finished = ctxt.expect_message(&Tag::TransportFinished, RECEIVE_TIMEOUT)?;
    let board_id2 = transport_finished
        .get("BoardId")
        .ok_or("TransportFinished is missing BoardId")?;
    if board_id != board_id2 {
        return Err(format!("board id mismatch: sent {board_id}, transport finished for {board_id2}").into());
    }

    ctxt.send_msg(&Message::stop_transport(TransferState::Complete, &board_id))?;
    Ok(board_id)
}

/// This harness plays the downstream (board-receiving) role. `send_unexpected_msg`
/// interleaves unrecognized messages the peer must silently ignore, per
/// `test_complete_mrba_board_transfer_to_sut_with_unknown_msg` -- it is not
/// legal to forward such a message onward, which is covered separately by
/// the `states` module.
fn complete_mrba_board_transfer_to_sut(
    env: &Environment,
    send_unexpected_msg: bool,
) -> Result<(String, Message), ScenarioError> {
    let mut ctxt = DownstreamContextWithHandshake::open(env)?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::MachineReady.to_string() })?;
    ctxt.expect_message(&Tag::MachineReady, RECEIVE_TIMEOUT)?;

    if send_unexpected_msg {
        let unknown = Tag::Other("ThisIsFirstUnknown".to_string());
        ctxt.send_tag_and_bytes(
            &unknown,
            b"<Hermes Timestamp=\"2020-04-28T10:01:20.768\"><ThisIsFirstUnknown /></Hermes>",
        )?;
    }

    let board_id = uuid::Uuid::new_v4().to_string();
    let board_available = Message::board_available(&board_id, &env.machine_id, BoardAttributes::default());
    ctxt.send_msg(&board_available)?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::StartTransport.to_string() })?;
    ctxt.expect_message(&Tag::StartTransport, RECEIVE_TIMEOUT)?;

    if send_unexpected_msg {
        let unknown = Tag::Other("ThisIsSecondUnknown".to_string());
        ctxt.send_tag_and_bytes(
            &unknown,
            b"<Hermes Timestamp=\"2020-04-28T10:01:20.768\"><ThisIsSecondUnknown /></Hermes>",
        )?;
    }

    ctxt.send_msg(&Message::transport_finished(TransferState::Complete, &board_id))?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::StopTransport.to_string() })?;
    ctxt.expect_message(&Tag::StopTransport, RECEIVE_TIMEOUT)?;

    Ok((board_id, board_available))
}

/// As [`complete_mrba_board_transfer_to_sut`], with `BoardAvailable` sent
/// before `MachineReady` is ever awaited.
fn complete_bamr_board_transfer_to_sut(
    env: &Environment,
    send_unexpected_msg: bool,
) -> Result<(String, Message), ScenarioError> {
    let mut ctxt = DownstreamContextWithHandshake::open(env)?;

    let board_id = uuid::Uuid::new_v4().to_string();
    let board_available = Message::board_available(&board_id, &env.machine_id, BoardAttributes::default());
    ctxt.send_msg(&board_available)?;

    let _ = send_unexpected_msg; // original's bamr ordering carries no unknown-message variant

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::MachineReady.to_string() })?;
    ctxt.expect_message(&Tag::MachineReady, RECEIVE_TIMEOUT)?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::StartTransport.to_string() })?;
    ctxt.expect_message(&Tag::StartTransport, RECEIVE_TIMEOUT)?;

    ctxt.send_msg(&Message::transport_finished(TransferState::Complete, &board_id))?;

    env.run_callback(CbEvt::WaitForMsg { tag: Tag::StopTransport.to_string() })?;
    ctxt.expect_message(&Tag::StopTransport, RECEIVE_TIMEOUT)?;

    Ok((board_id, board_available))
}

/// Drives both interfaces of the system under test in one scenario: a board
/// goes in on its upstream port and must come back out, under the same
/// `BoardId`, on its downstream port.
fn pass_through(env: &Environment) -> Result<(), ScenarioError> {
    let (sent_board_id, _) = complete_bamr_board_transfer_to_sut(env, false)?;
    let received_board_id = complete_board_transfer_from_sut(env)?;
    if sent_board_id != received_board_id {
        return Err(format!(
            "board id mismatch across the system under test: sent {sent_board_id}, received {received_board_id}"
        )
        .into());
    }
    Ok(())
}
