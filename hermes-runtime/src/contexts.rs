//! Scoped connection contexts, per §4.E "Contexts".
//!
//! The original expresses these as `@contextmanager`-decorated generator
//! functions: connect (and, for the handshake variants, exchange
//! `ServiceDescription`), `yield` the connection to the test body, then
//! close on every exit path including an exception. The idiomatic Rust
//! replacement is an RAII guard whose constructor does the setup and whose
//! `Drop` does the teardown -- `?` propagating out of a scenario body runs
//! `Drop`s on the way out exactly like the original's `try/except: close();
//! raise`.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use hermes_message::Tag;
use hermes_transport::{ConnectionLost, DownstreamConnection, UpstreamConnection, RECEIVE_TIMEOUT};

use crate::environment::ScenarioSkipped;
use crate::{CbEvt, Environment};

/// §4.D/§4.E default for `DownstreamConnection::wait_for_peer` when a
/// scenario does not request the shorter one used for the handshake
/// variant.
const WAIT_FOR_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Either side of a context construction can fail: the transport layer
/// (connect refused, peer never showed up, a protocol violation during the
/// handshake) or the callback channel (a `WAIT_FOR_MSG`/`CLIENT_CONNECTED`
/// prompt with no callback registered, per §4.E).
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Connection(#[from] ConnectionLost),

    #[error(transparent)]
    Skipped(#[from] ScenarioSkipped),
}

/// `DownstreamConnection::peer_addr` is only populated once a peer has
/// actually been accepted, which is always true by the time a context calls
/// this -- the fallback exists only so a display string is never absent.
fn client_connected_address(conn: &DownstreamConnection) -> String {
    conn.peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// An upstream (client) connection to the configured peer, closed on every
/// exit path including an early return or a propagated error.
pub struct UpstreamContext(UpstreamConnection);

impl UpstreamContext {
    pub fn open(env: &Environment) -> Result<Self, ContextError> {
        let conn = UpstreamConnection::connect(&env.peer_host, env.peer_port)?;
        Ok(UpstreamContext(conn))
    }
}

impl Deref for UpstreamContext {
    type Target = UpstreamConnection;
    fn deref(&self) -> &UpstreamConnection {
        &self.0
    }
}

impl DerefMut for UpstreamContext {
    fn deref_mut(&mut self) -> &mut UpstreamConnection {
        &mut self.0
    }
}

impl Drop for UpstreamContext {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// An upstream connection that has already completed the
/// `ServiceDescription` handshake: sends ours, emits `WAIT_FOR_MSG`, then
/// waits for the peer's.
pub struct UpstreamContextWithHandshake(UpstreamConnection);

impl UpstreamContextWithHandshake {
    pub fn open(env: &Environment) -> Result<Self, ContextError> {
        let mut conn = UpstreamConnection::connect(&env.peer_host, env.peer_port)?;
        conn.send_msg(&env.service_description_message())?;
        env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
        conn.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
        Ok(UpstreamContextWithHandshake(conn))
    }
}

impl Deref for UpstreamContextWithHandshake {
    type Target = UpstreamConnection;
    fn deref(&self) -> &UpstreamConnection {
        &self.0
    }
}

impl DerefMut for UpstreamContextWithHandshake {
    fn deref_mut(&mut self) -> &mut UpstreamConnection {
        &mut self.0
    }
}

impl Drop for UpstreamContextWithHandshake {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// A downstream (server) connection: binds, listens, and blocks until the
/// peer under test connects (10 s, per §4.E), then emits
/// `CLIENT_CONNECTED`.
pub struct DownstreamContext(DownstreamConnection);

impl DownstreamContext {
    pub fn open(env: &Environment) -> Result<Self, ContextError> {
        let mut conn = DownstreamConnection::listen(env.listening_port)?;
        conn.wait_for_peer(WAIT_FOR_CONNECTION_TIMEOUT)?;
        env.run_callback(CbEvt::ClientConnected { address: client_connected_address(&conn) })?;
        Ok(DownstreamContext(conn))
    }
}

impl Deref for DownstreamContext {
    type Target = DownstreamConnection;
    fn deref(&self) -> &DownstreamConnection {
        &self.0
    }
}

impl DerefMut for DownstreamContext {
    fn deref_mut(&mut self) -> &mut DownstreamConnection {
        &mut self.0
    }
}

impl Drop for DownstreamContext {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// As [`DownstreamContext`], then expects the peer's `ServiceDescription`
/// before sending ours -- the downstream side answers second, per §4.B's
/// `ServiceDescription` transition table.
pub struct DownstreamContextWithHandshake(DownstreamConnection);

impl DownstreamContextWithHandshake {
    pub fn open(env: &Environment) -> Result<Self, ContextError> {
        let mut conn = DownstreamConnection::listen(env.listening_port)?;
        conn.wait_for_peer(WAIT_FOR_CONNECTION_TIMEOUT)?;
        env.run_callback(CbEvt::ClientConnected { address: client_connected_address(&conn) })?;
        env.run_callback(CbEvt::WaitForMsg { tag: Tag::ServiceDescription.to_string() })?;
        conn.expect_message(&Tag::ServiceDescription, RECEIVE_TIMEOUT)?;
        conn.send_msg(&env.service_description_message())?;
        Ok(DownstreamContextWithHandshake(conn))
    }
}

impl Deref for DownstreamContextWithHandshake {
    type Target = DownstreamConnection;
    fn deref(&self) -> &DownstreamConnection {
        &self.0
    }
}

impl DerefMut for DownstreamContextWithHandshake {
    fn deref_mut(&mut self) -> &mut DownstreamConnection {
        &mut self.0
    }
}

impl Drop for DownstreamContextWithHandshake {
    fn drop(&mut self) {
        self.0.close();
    }
}
