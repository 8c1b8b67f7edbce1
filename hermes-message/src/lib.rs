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

//! # IPC-HERMES-9852 MESSAGE MODEL
//!
//! Copyright © 2024 Nathaniel Hardesty, Licensed under the MIT License
//!
//! This software is created by a third-party and not endorsed or supported by
//! the IPC-HERMES-9852 standard's authors.
//!
//! IPC-HERMES-9852 is a horizontal channel protocol: a TCP/XML dialogue
//! between an upstream machine (the one handing off a circuit board) and a
//! downstream machine (the one receiving it) on an SMT line. Every message
//! is a single `<Hermes Timestamp="...">` element wrapping exactly one
//! tagged child element, terminated on the wire by the literal string
//! `</Hermes>` rather than a length prefix.
//!
//! This crate is the message layer only: [`Message`] construction,
//! serialization, and parsing. The state machine that decides which tags are
//! legal to send or receive in which state lives in `hermes-state`; framing
//! bytes off a socket lives in `hermes-transport`.

mod error;
mod message;
mod tag;

pub use error::ParseError;
pub use message::{BoardAttributes, Message};
pub use tag::{
    BoardQuality, CheckAliveType, FlippedBoard, NotificationCode, SeverityType, Tag,
    TransferState,
};
