use std::collections::VecDeque;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hermes_message::{Message, NotificationCode, SeverityType, Tag};
use hermes_state::DownstreamStateMachine;

use crate::error::ConnectionLost;
use crate::reader;
use crate::upstream::POLL_INTERVAL;

/// `send_msg` pause before checking for a captured background error, per
/// §4.D "writes bytes, sleeps 20 ms to let the peer respond".
const POST_SEND_DELAY: Duration = Duration::from_millis(20);

/// The downstream side of a horizontal channel: listens for its downstream
/// neighbor's connection and sends it boards (`BoardAvailable`,
/// `RevokeBoardAvailable`, `TransportFinished`, `BoardForecast`), receiving
/// `MachineReady`/`RevokeMachineReady`/`StartTransport`/`StopTransport` in
/// return.
///
/// Only one peer is served at a time. A second concurrent connection
/// attempt receives `Notification(ConnectionRefused)` and is closed
/// immediately, matching end-to-end scenario 4 -- the accept loop never
/// stops running just because a primary peer is already active.
pub struct DownstreamConnection {
    primary: Arc<Mutex<Option<TcpStream>>>,
    state_machine: DownstreamStateMachine,
    deque: VecDeque<Message>,
    rx: Receiver<Result<Vec<u8>, ConnectionLost>>,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    connected: Receiver<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl DownstreamConnection {
    /// Bind and start accepting. Does not block -- call
    /// [`Self::wait_for_peer`] to block until the first peer has connected.
    pub fn listen(port: u16) -> Result<Self, ConnectionLost> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        let primary: Arc<Mutex<Option<TcpStream>>> = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = mpsc::channel();
        let (connected_tx, connected_rx) = mpsc::channel();

        let acceptor = {
            let primary = primary.clone();
            let stop = stop.clone();
            std::thread::spawn(move || accept_loop(listener, primary, stop, frame_tx, connected_tx))
        };

        Ok(DownstreamConnection {
            primary,
            state_machine: DownstreamStateMachine::new(),
            deque: VecDeque::new(),
            rx: frame_rx,
            stop,
            acceptor: Some(acceptor),
            connected: connected_rx,
            peer_addr: None,
        })
    }

    pub fn wait_for_peer(&mut self, timeout: Duration) -> Result<(), ConnectionLost> {
        let addr = self
            .connected
            .recv_timeout(timeout)
            .map_err(|_| ConnectionLost::Timeout { tag: "<connection>".to_string(), waited: timeout })?;
        self.peer_addr = Some(addr);
        Ok(())
    }

    /// The address of the peer accepted by [`Self::wait_for_peer`], if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn state(&self) -> hermes_state::State {
        self.state_machine.state()
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.state_machine.set_strict(strict);
    }

    pub fn send_msg(&mut self, msg: &Message) -> Result<(), ConnectionLost> {
        tracing::debug!(tag = %msg.tag(), "sending");
        self.state_machine.on_send_tag(msg.tag())?;
        {
            let mut guard = self.primary.lock().expect("primary mutex poisoned");
            let stream = guard.as_mut().ok_or(ConnectionLost::NotConnected)?;
            stream.write_all(&msg.to_bytes())?;
        }
        self.settle_after_send()
    }

    pub fn send_tag_and_bytes(&mut self, tag: &Tag, bytes: &[u8]) -> Result<(), ConnectionLost> {
        tracing::debug!(%tag, "sending raw bytes");
        self.state_machine.on_send_tag(tag)?;
        {
            let mut guard = self.primary.lock().expect("primary mutex poisoned");
            let stream = guard.as_mut().ok_or(ConnectionLost::NotConnected)?;
            stream.write_all(bytes)?;
        }
        self.settle_after_send()
    }

    /// As `UpstreamConnection::settle_after_send` -- see §4.D.
    fn settle_after_send(&mut self) -> Result<(), ConnectionLost> {
        std::thread::sleep(POST_SEND_DELAY);
        self.drain_available_nonblocking()
    }

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
        if let Some(stream) = self.primary.lock().expect("primary mutex poisoned").as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
        tracing::debug!("connection to upstream interface closed");
    }
}

impl Drop for DownstreamConnection {
    fn drop(&mut self) {
        if self.acceptor.is_some() {
            self.close();
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    primary: Arc<Mutex<Option<TcpStream>>>,
    stop: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<Result<Vec<u8>, ConnectionLost>>,
    connected_tx: mpsc::Sender<SocketAddr>,
) {
    // Non-blocking accept with a short poll so `stop` is noticed promptly
    // instead of parking forever inside `accept()` with nothing incoming.
    if listener.set_nonblocking(true).is_err() {
        return;
    }
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let (stream, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(_) => continue,
        };
        let _ = stream.set_nonblocking(false);

        let mut guard = primary.lock().expect("primary mutex poisoned");
        if guard.is_some() {
            drop(guard);
            reject_second_connection(stream);
            continue;
        }

        let reader_clone = match stream.try_clone() {
            Ok(clone) => clone,
            Err(_) => continue,
        };
        *guard = Some(stream);
        drop(guard);

        reader::spawn_with_sender(reader_clone, POLL_INTERVAL, stop.clone(), frame_tx.clone());
        let _ = connected_tx.send(addr);
    }
}

fn reject_second_connection(mut stream: TcpStream) {
    tracing::warn!("rejecting concurrent connection attempt");
    let notification = Message::notification(
        NotificationCode::ConnectionRefused,
        SeverityType::Error,
        "a peer is already connected on this channel",
    );
    let _ = stream.write_all(&notification.to_bytes());
    let _ = stream.shutdown(Shutdown::Both);
}
