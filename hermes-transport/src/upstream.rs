use std::collections::VecDeque;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hermes_message::{Message, Tag};
use hermes_state::UpstreamStateMachine;

use crate::error::ConnectionLost;
use crate::reader;

/// Per-address connect timeout, per §4.D "sets a socket timeout (default 20 s)".
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(20);
/// Default `expect_message` wall-clock timeout, per §5.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(20);
/// Listener read-loop poll granularity, per §4.D "Listener loop ... 500 ms poll".
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// `send_msg` pause before checking for a captured background error, per
/// §4.D "writes bytes, sleeps 20 ms to let the peer respond".
const POST_SEND_DELAY: Duration = Duration::from_millis(20);

/// The upstream side of a horizontal channel: dials out to the
/// board-sending neighbor's listening port. Sends `MachineReady`,
/// `RevokeMachineReady`, `StartTransport`, `StopTransport`; receives
/// `BoardAvailable`, `RevokeBoardAvailable`, `TransportFinished`,
/// `BoardForecast` -- the machine reaching upstream for a board is the one
/// that ends up receiving it.
pub struct UpstreamConnection {
    stream: TcpStream,
    state_machine: UpstreamStateMachine,
    deque: VecDeque<Message>,
    rx: Receiver<Result<Vec<u8>, ConnectionLost>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl UpstreamConnection {
    /// Resolve `host:port` and connect, the way `ipc_hermes.connections.
    /// UpstreamConnection.connect` tries every resolved address in turn.
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectionLost> {
        let mut last_err = None;
        let mut connected = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, SOCKET_TIMEOUT) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(err) => last_err = Some(err),
            }
        }
        let stream = match connected {
            Some(stream) => stream,
            None => return Err(last_err.map(ConnectionLost::Io).unwrap_or(ConnectionLost::NotConnected)),
        };

        tracing::debug!(%host, %port, "connection to downstream interface successfully opened");
        let stop = Arc::new(AtomicBool::new(false));
        let (rx, reader) = reader::spawn(stream.try_clone()?, POLL_INTERVAL, stop.clone());

        Ok(UpstreamConnection {
            stream,
            state_machine: UpstreamStateMachine::new(),
            deque: VecDeque::new(),
            rx,
            stop,
            reader: Some(reader),
        })
    }

    pub fn state(&self) -> hermes_state::State {
        self.state_machine.state()
    }

    /// Allow a deliberately protocol-violating send to go out without
    /// returning an error -- scenario bodies that test the peer's own
    /// illegal-message handling need this.
    pub fn set_strict(&mut self, strict: bool) {
        self.state_machine.set_strict(strict);
    }

    pub fn send_msg(&mut self, msg: &Message) -> Result<(), ConnectionLost> {
        tracing::debug!(tag = %msg.tag(), "sending");
        self.state_machine.on_send_tag(msg.tag())?;
        self.stream.write_all(&msg.to_bytes())?;
        self.settle_after_send()
    }

    /// Send raw bytes under a given tag without the `Message` wrapper
    /// round-trip -- for deliberately malformed wire content in negative
    /// tests only.
    pub fn send_tag_and_bytes(&mut self, tag: &Tag, bytes: &[u8]) -> Result<(), ConnectionLost> {
        tracing::debug!(%tag, "sending raw bytes");
        self.state_machine.on_send_tag(tag)?;
        self.stream.write_all(bytes)?;
        self.settle_after_send()
    }

    /// Give the peer a moment to react, then surface any error the
    /// background listener already captured -- a dead or misbehaving peer
    /// must not silently hang the next `expect_message` instead of failing
    /// the send that should have noticed it, per §4.D.
    fn settle_after_send(&mut self) -> Result<(), ConnectionLost> {
        std::thread::sleep(POST_SEND_DELAY);
        self.drain_available_nonblocking()
    }

    /// Pull every frame the listener has already queued without blocking,
    /// applying the receive-side state transition to each as
    /// `expect_message` would. Returns the first captured background I/O
    /// error, if any -- this is the only place besides `expect_message`
    /// that a dead connection surfaces outside of a blocking wait.
    fn drain_available_nonblocking(&mut self) -> Result<(), ConnectionLost> {
        loop {
            match self.rx.try_recv() {
                Ok(Ok(raw)) => {
                    let msg = Message::parse(&raw)?;
                    tracing::debug!(tag = %msg.tag(), "received");
                    self.state_machine.on_recv(msg.tag())?;
                    self.deque.push_back(msg);
                }
                Ok(Err(err)) => return Err(err),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Wait for a message with the given tag, buffering and ignoring any
    /// others received meanwhile, the way the original's `expect_message`
    /// drains its deque before blocking on the socket again.
    pub fn expect_message(&mut self, tag: &Tag, timeout: Duration) -> Result<Message, ConnectionLost> {
        tracing::debug!(%tag, "waiting for");
        let start = Instant::now();

        while let Some(front) = self.deque.pop_front() {
            if front.tag() == tag {
                return Ok(front);
            }
            tracing::debug!(tag = %front.tag(), expected = %tag, "discarding buffered non-matching message");
        }

        loop {
            let remaining = timeout
                .checked_sub(start.elapsed())
                .ok_or_else(|| ConnectionLost::Timeout { tag: tag.to_string(), waited: timeout })?;

            match self.rx.recv_timeout(remaining) {
                Ok(Ok(raw)) => {
                    let msg = Message::parse(&raw)?;
                    tracing::debug!(tag = %msg.tag(), "received");
                    self.state_machine.on_recv(msg.tag())?;
                    if msg.tag() == tag {
                        return Ok(msg);
                    }
                    self.deque.push_back(msg);
                }
                Ok(Err(err)) => return Err(err),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ConnectionLost::Timeout { tag: tag.to_string(), waited: timeout })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ConnectionLost::ClosedWhileWaiting { tag: tag.to_string() })
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        tracing::debug!("connection to downstream interface closed");
    }
}

impl Drop for UpstreamConnection {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.close();
        }
    }
}
