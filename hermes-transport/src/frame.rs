//! Framing by terminator string rather than a length prefix.
//!
//! IPC-HERMES-9852 never sends a length-prefixed header the way HSMS does;
//! a message ends when the literal bytes `</Hermes>` appear. A socket read
//! can therefore contain zero, one, or several complete messages, or a
//! prefix of one still waiting on more bytes -- all four cases show up in
//! the conformance scenarios (packet coalescing deliberately produces the
//! multi-message-per-read case; a deliberately oversized message exercises
//! the size limit below).

use crate::error::ConnectionLost;

pub const ENDTAG: &[u8] = b"</Hermes>";
pub const MAX_MESSAGE_SIZE: usize = 65536;
pub const BUFFER_SIZE: usize = 4096;

/// Accumulates bytes read off a socket and slices out complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder { pending: Vec::new() }
    }

    /// Feed newly-read bytes in; get back every complete frame (including
    /// its terminator) that can now be sliced off the front of the buffer.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, ConnectionLost> {
        self.pending.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            let Some(index) = find_subslice(&self.pending, ENDTAG) else {
                break;
            };
            let split_at = index + ENDTAG.len();
            let remainder = self.pending.split_off(split_at);
            frames.push(std::mem::replace(&mut self.pending, remainder));
        }

        if self.pending.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionLost::FrameTooLarge { max: MAX_MESSAGE_SIZE });
        }

        Ok(frames)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_in_single_read() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"<Hermes Timestamp=\"t\"><CheckAlive/></Hermes>").unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].ends_with(ENDTAG));
    }

    #[test]
    fn message_split_across_two_reads() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"<Hermes Timestamp=\"t\"><CheckAlive").unwrap().is_empty());
        let frames = decoder.push(b"/></Hermes>").unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn multiple_messages_coalesced_into_one_read() {
        let mut decoder = FrameDecoder::new();
        let data = b"<Hermes Timestamp=\"t\"><CheckAlive/></Hermes><Hermes Timestamp=\"t\"><CheckAlive/></Hermes>";
        let frames = decoder.push(data).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn oversized_pending_buffer_without_terminator_is_rejected() {
        let mut decoder = FrameDecoder::new();
        let data = vec![b'a'; MAX_MESSAGE_SIZE + 1];
        let err = decoder.push(&data).unwrap_err();
        assert!(matches!(err, ConnectionLost::FrameTooLarge { .. }));
    }
}
