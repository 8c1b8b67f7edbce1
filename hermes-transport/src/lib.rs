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

//! # IPC-HERMES-9852 HORIZONTAL CHANNEL TRANSPORT
//!
//! Copyright © 2024 Nathaniel Hardesty, Licensed under the MIT License
//!
//! A horizontal channel is a plain TCP socket carrying XML documents
//! terminated by the literal string `</Hermes>`. [`UpstreamConnection`]
//! connects out to a downstream machine's listening port; the much rarer
//! [`DownstreamConnection`] plays the opposite, listening role so this
//! harness can exercise a system under test's own upstream interface.
//!
//! Both sides run their socket reads on a background thread (see
//! `reader.rs`) and hand fully-framed messages to the foreground over a
//! channel, the way `semi_e37::primitive::PrimitiveClient` runs its own
//! receive loop on a dedicated thread rather than multiplexing readiness
//! with an async runtime.

mod downstream;
mod error;
mod frame;
mod reader;
mod upstream;

pub use downstream::DownstreamConnection;
pub use error::ConnectionLost;
pub use frame::{FrameDecoder, BUFFER_SIZE, ENDTAG, MAX_MESSAGE_SIZE};
pub use upstream::{UpstreamConnection, POLL_INTERVAL, RECEIVE_TIMEOUT, SOCKET_TIMEOUT};

#[cfg(test)]
mod tests {
    //! Loopback tests driving both ends of a real TCP socket -- the
    //! narrow slice of §8's testable properties that a single-crate unit
    //! test can exercise without the scenario runtime.

    use std::net::TcpListener;
    use std::time::Duration;

    use hermes_message::{Message, Tag};

    use super::*;

    /// Bind on an ephemeral port so concurrent test runs never collide.
    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn handshake_round_trips_over_a_real_socket() {
        let port = free_port();
        let server = std::thread::spawn(move || {
            let mut downstream = DownstreamConnection::listen(port).unwrap();
            downstream.wait_for_peer(Duration::from_secs(5)).unwrap();
            let msg = downstream
                .expect_message(&Tag::ServiceDescription, Duration::from_secs(5))
                .unwrap();
            assert_eq!(msg.get("MachineId"), Some("Upstream"));
            downstream
                .send_msg(&Message::service_description("Downstream", 1, None, "1.2", &[]))
                .unwrap();
        });

        std::thread::sleep(Duration::from_millis(50));
        let mut upstream = UpstreamConnection::connect("127.0.0.1", port).unwrap();
        upstream
            .send_msg(&Message::service_description("Upstream", 1, None, "1.2", &[]))
            .unwrap();
        let reply = upstream
            .expect_message(&Tag::ServiceDescription, Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply.get("MachineId"), Some("Downstream"));
        assert_eq!(upstream.state(), hermes_state::State::NotAvailableNotReady);

        server.join().unwrap();
    }

    #[test]
    fn second_concurrent_connection_is_refused_while_first_keeps_working() {
        let port = free_port();
        let mut downstream = DownstreamConnection::listen(port).unwrap();

        let mut first = UpstreamConnection::connect("127.0.0.1", port).unwrap();
        downstream.wait_for_peer(Duration::from_secs(5)).unwrap();

        let mut second = UpstreamConnection::connect("127.0.0.1", port).unwrap();
        let notification = second
            .expect_message(&Tag::Notification, Duration::from_secs(5))
            .unwrap();
        assert_eq!(notification.get("NotificationCode"), Some("2"));

        first
            .send_msg(&Message::service_description("Upstream", 1, None, "1.2", &[]))
            .unwrap();
    }

    #[test]
    fn send_after_peer_closes_surfaces_connection_lost() {
        let port = free_port();
        let mut downstream = DownstreamConnection::listen(port).unwrap();
        let mut upstream = UpstreamConnection::connect("127.0.0.1", port).unwrap();
        downstream.wait_for_peer(Duration::from_secs(5)).unwrap();
        downstream.close();

        std::thread::sleep(Duration::from_millis(200));
        let mut last = Ok(());
        for _ in 0..20 {
            last = upstream.send_msg(&Message::check_alive(None, None));
            if last.is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(last.is_err(), "expected the dead peer to surface as ConnectionLost");
    }
}
