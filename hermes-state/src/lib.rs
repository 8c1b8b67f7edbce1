// Copyright © 2024 Nathaniel Hardesty
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

//! # IPC-HERMES-9852 HORIZONTAL CHANNEL STATE MACHINE
//!
//! Copyright © 2024 Nathaniel Hardesty, Licensed under the MIT License
//!
//! Two views of the same nine-state machine: the upstream machine's send
//! table is the downstream machine's receive table and vice versa, since
//! whatever one side transmits is exactly what the other receives.

use hermes_message::Tag;
use thiserror::Error;

/// Horizontal channel state, shared by both ends of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    NotConnected,
    ServiceDescriptionDownstream,
    NotAvailableNotReady,
    BoardAvailable,
    AvailableAndReady,
    MachineReady,
    Transporting,
    TransportFinished,
    TransportStopped,
}

/// A message tag was sent or received while in a state IPC-HERMES-9852
/// does not allow it in.
#[derive(Debug, Error)]
#[error("illegal {tag} in state {state:?}")]
pub struct StateMachineError {
    pub state: State,
    pub tag: Tag,
}

/// Table-driven transition lookup. Returns `None` when the tag does not
/// participate in state transitions at all (e.g. `Notification`,
/// `CheckAlive`) -- those are legal in every state and never move it.
/// Returns `Some(None)` would be wrong here: a tag that does participate
/// but has no entry for the current state is exactly the illegal case, so
/// absence of a `(tag, state)` entry in a participating table is distinct
/// from the tag not participating at all. Two small per-direction lookup
/// functions keep that distinction explicit instead of overloading `None`.
fn upstream_send(tag: &Tag, state: State) -> TransitionLookup {
    use State::*;
    match tag {
        Tag::ServiceDescription => TransitionLookup::Participates(match state {
            NotConnected => Some(ServiceDescriptionDownstream),
            _ => None,
        }),
        Tag::MachineReady => TransitionLookup::Participates(match state {
            NotAvailableNotReady => Some(MachineReady),
            BoardAvailable => Some(AvailableAndReady),
            _ => None,
        }),
        Tag::RevokeMachineReady => TransitionLookup::Participates(match state {
            MachineReady => Some(NotAvailableNotReady),
            AvailableAndReady => Some(BoardAvailable),
            _ => None,
        }),
        Tag::StartTransport => TransitionLookup::Participates(match state {
            AvailableAndReady => Some(Transporting),
            MachineReady => Some(Transporting),
            _ => None,
        }),
        Tag::StopTransport => TransitionLookup::Participates(match state {
            Transporting => Some(TransportStopped),
            TransportFinished => Some(NotAvailableNotReady),
            _ => None,
        }),
        _ => TransitionLookup::DoesNotParticipate,
    }
}

fn downstream_send(tag: &Tag, state: State) -> TransitionLookup {
    use State::*;
    match tag {
        Tag::ServiceDescription => TransitionLookup::Participates(match state {
            ServiceDescriptionDownstream => Some(NotAvailableNotReady),
            _ => None,
        }),
        Tag::BoardAvailable => TransitionLookup::Participates(match state {
            NotAvailableNotReady => Some(BoardAvailable),
            MachineReady => Some(AvailableAndReady),
            Transporting => Some(Transporting),
            TransportStopped => Some(TransportStopped),
            _ => None,
        }),
        Tag::RevokeBoardAvailable => TransitionLookup::Participates(match state {
            BoardAvailable => Some(NotAvailableNotReady),
            AvailableAndReady => Some(MachineReady),
            Transporting => Some(Transporting),
            TransportStopped => Some(TransportStopped),
            _ => None,
        }),
        Tag::TransportFinished => TransitionLookup::Participates(match state {
            Transporting => Some(TransportFinished),
            TransportStopped => Some(NotAvailableNotReady),
            _ => None,
        }),
        Tag::BoardForecast => TransitionLookup::Participates(match state {
            NotAvailableNotReady => Some(NotAvailableNotReady),
            MachineReady => Some(MachineReady),
            Transporting => Some(Transporting),
            TransportStopped => Some(TransportStopped),
            _ => None,
        }),
        _ => TransitionLookup::DoesNotParticipate,
    }
}

enum TransitionLookup {
    DoesNotParticipate,
    Participates(Option<State>),
}

/// Generic state machine; use [`UpstreamStateMachine`] or
/// [`DownstreamStateMachine`] rather than constructing this directly.
pub struct StateMachine {
    state: State,
    send_table: fn(&Tag, State) -> TransitionLookup,
    recv_table: fn(&Tag, State) -> TransitionLookup,
    strict: bool,
}

impl StateMachine {
    fn new(send_table: fn(&Tag, State) -> TransitionLookup, recv_table: fn(&Tag, State) -> TransitionLookup) -> Self {
        StateMachine {
            state: State::NotConnected,
            send_table,
            recv_table,
            strict: true,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Strict mode (the default) makes [`Self::on_send_tag`] return
    /// [`StateMachineError`] for an illegal send. Turning it off allows a
    /// scenario to deliberately send a protocol-violating message while
    /// still tracking (and logging) the violation.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn on_send_tag(&mut self, tag: &Tag) -> Result<(), StateMachineError> {
        match (self.send_table)(tag, self.state) {
            TransitionLookup::DoesNotParticipate => Ok(()),
            TransitionLookup::Participates(Some(new_state)) => {
                if new_state != self.state {
                    tracing::info!(from = ?self.state, to = ?new_state, %tag, "state transition (send)");
                    self.state = new_state;
                }
                Ok(())
            }
            TransitionLookup::Participates(None) => {
                if self.strict {
                    Err(StateMachineError { state: self.state, tag: tag.clone() })
                } else {
                    tracing::debug!(state = ?self.state, %tag, "illegal message sent, strict mode off");
                    Ok(())
                }
            }
        }
    }

    pub fn on_recv(&mut self, tag: &Tag) -> Result<(), StateMachineError> {
        match (self.recv_table)(tag, self.state) {
            TransitionLookup::DoesNotParticipate => Ok(()),
            TransitionLookup::Participates(Some(new_state)) => {
                if new_state != self.state {
                    tracing::info!(from = ?self.state, to = ?new_state, %tag, "state transition (recv)");
                    self.state = new_state;
                }
                Ok(())
            }
            TransitionLookup::Participates(None) => {
                Err(StateMachineError { state: self.state, tag: tag.clone() })
            }
        }
    }
}

/// State machine as seen by the upstream (board-sending) machine: its own
/// sends follow the upstream table, what it receives follows the
/// downstream table.
pub struct UpstreamStateMachine(StateMachine);

impl UpstreamStateMachine {
    pub fn new() -> Self {
        UpstreamStateMachine(StateMachine::new(upstream_send, downstream_send))
    }
}

impl Default for UpstreamStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for UpstreamStateMachine {
    type Target = StateMachine;
    fn deref(&self) -> &StateMachine {
        &self.0
    }
}

impl std::ops::DerefMut for UpstreamStateMachine {
    fn deref_mut(&mut self) -> &mut StateMachine {
        &mut self.0
    }
}

/// State machine as seen by the downstream (board-receiving) machine.
pub struct DownstreamStateMachine(StateMachine);

impl DownstreamStateMachine {
    pub fn new() -> Self {
        DownstreamStateMachine(StateMachine::new(downstream_send, upstream_send))
    }
}

impl Default for DownstreamStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for DownstreamStateMachine {
    type Target = StateMachine;
    fn deref(&self) -> &StateMachine {
        &self.0
    }
}

impl std::ops::DerefMut for DownstreamStateMachine {
    fn deref_mut(&mut self) -> &mut StateMachine {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_handshake_then_board_transfer() {
        let mut upstream = UpstreamStateMachine::new();
        assert_eq!(upstream.state(), State::NotConnected);
        upstream.on_send_tag(&Tag::ServiceDescription).unwrap();
        assert_eq!(upstream.state(), State::ServiceDescriptionDownstream);
        upstream.on_recv(&Tag::ServiceDescription).unwrap();
        assert_eq!(upstream.state(), State::NotAvailableNotReady);
        upstream.on_recv(&Tag::BoardAvailable).unwrap();
        assert_eq!(upstream.state(), State::BoardAvailable);
        upstream.on_send_tag(&Tag::MachineReady).unwrap();
        assert_eq!(upstream.state(), State::AvailableAndReady);
        upstream.on_send_tag(&Tag::StartTransport).unwrap();
        assert_eq!(upstream.state(), State::Transporting);
    }

    #[test]
    fn illegal_send_is_rejected_in_strict_mode() {
        let mut upstream = UpstreamStateMachine::new();
        let err = upstream.on_send_tag(&Tag::StartTransport).unwrap_err();
        assert_eq!(err.state, State::NotConnected);
    }

    #[test]
    fn strict_mode_off_allows_illegal_send_without_moving_state() {
        let mut upstream = UpstreamStateMachine::new();
        upstream.set_strict(false);
        upstream.on_send_tag(&Tag::StartTransport).unwrap();
        assert_eq!(upstream.state(), State::NotConnected);
    }

    #[test]
    fn board_forecast_self_loops_are_preserved_verbatim() {
        let mut downstream = DownstreamStateMachine::new();
        downstream.on_recv(&Tag::ServiceDescription).unwrap();
        downstream.on_send_tag(&Tag::ServiceDescription).unwrap();
        assert_eq!(downstream.state(), State::NotAvailableNotReady);
        downstream.on_send_tag(&Tag::BoardForecast).unwrap();
        assert_eq!(downstream.state(), State::NotAvailableNotReady);
    }

    #[test]
    fn untracked_tags_never_move_state() {
        let mut upstream = UpstreamStateMachine::new();
        upstream.on_send_tag(&Tag::CheckAlive).unwrap();
        assert_eq!(upstream.state(), State::NotConnected);
    }
}
