use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ConnectionLost;
use crate::frame::{FrameDecoder, BUFFER_SIZE};

/// Background read loop shared by the upstream and downstream sides: read
/// what's available, hand complete frames to the foreground over a
/// channel, and keep polling until told to stop or the peer goes away.
///
/// Modeled on the teacher's `PrimitiveClient::rx_handle` -- a plain
/// blocking read on its own thread, a read timeout standing in for OS-level
/// poll readiness, and a graceful `TimedOut` that just loops again.
pub(crate) fn spawn(
    stream: TcpStream,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) -> (Receiver<Result<Vec<u8>, ConnectionLost>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = spawn_with_sender(stream, poll_interval, stop, tx);
    (rx, handle)
}

/// Same read loop, but feeding an externally-owned sender -- used when the
/// channel has to outlive any one peer connection (the downstream listener
/// rebinds a fresh reader to the same outward channel on reconnect).
pub(crate) fn spawn_with_sender(
    mut stream: TcpStream,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<Result<Vec<u8>, ConnectionLost>>,
) -> JoinHandle<()> {
    let handle = thread::spawn(move || {
        if let Err(err) = stream.set_read_timeout(Some(poll_interval)) {
            let _ = tx.send(Err(ConnectionLost::Io(err)));
            return;
        }
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; BUFFER_SIZE];
        loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            match stream.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(Err(ConnectionLost::PeerClosed));
                    return;
                }
                Ok(n) => match decoder.push(&buf[..n]) {
                    Ok(frames) => {
                        for frame in frames {
                            if tx.send(Ok(frame)).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        return;
                    }
                },
                Err(err) if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock => {
                    continue;
                }
                Err(err) => {
                    let _ = tx.send(Err(ConnectionLost::Io(err)));
                    return;
                }
            }
        }
    });
    handle
}
