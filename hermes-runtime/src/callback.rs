//! The callback channel a scenario uses to report progress to whatever is
//! driving it (a GUI, a CLI, or nothing at all).
//!
//! The original passes event tag plus `**kwargs` to an arbitrary Python
//! callable; a dynamically-typed keyword bag has no direct Rust
//! equivalent, so each event is instead its own tagged variant carrying
//! only the fields that event actually has. `render()` gives callers who
//! just want a line of text (a log sink, a simple CLI) a single rendering
//! without hand-matching every variant themselves.

use hermes_message::Message;

/// An event raised by a running scenario.
#[derive(Debug, Clone)]
pub enum CbEvt {
    Unknown,
    BeforeTestCase { name: String },
    AfterTestCase { name: String, passed: bool },
    Progress { text: String },
    WaitForMsg { tag: String },
    HermesVersion { version: String },
    ClientConnected { address: String },
    Warning { text: String },
    Error { text: String },
}

impl CbEvt {
    /// Plain-text rendering for a sink that only wants a log line.
    ///
    /// `ServiceDescription` is the one message the original never echoes
    /// through a generic "received message" callback (it has its own
    /// dedicated `HermesVersion` event instead) -- there is deliberately no
    /// separate "message received" variant here at all, so that
    /// suppression rule falls out naturally rather than needing a special
    /// case.
    pub fn render(&self) -> String {
        match self {
            CbEvt::Unknown => "unknown event".to_string(),
            CbEvt::BeforeTestCase { name } => format!("starting {name}"),
            CbEvt::AfterTestCase { name, passed } => {
                format!("{name} {}", if *passed { "passed" } else { "failed" })
            }
            CbEvt::Progress { text } => text.clone(),
            CbEvt::WaitForMsg { tag } => format!("waiting for {tag}"),
            CbEvt::HermesVersion { version } => format!("system under test IPC-Hermes version {version}"),
            CbEvt::ClientConnected { address } => format!("peer connected from {address}"),
            CbEvt::Warning { text } => format!("warning: {text}"),
            CbEvt::Error { text } => format!("error: {text}"),
        }
    }
}

/// A callback registered with an [`crate::Environment`]. Boxed so the
/// environment can hold one without a generic parameter leaking into every
/// scenario signature.
pub type Callback = Box<dyn Fn(CbEvt) + Send + Sync>;

/// Build the [`CbEvt::HermesVersion`] event out of a received
/// `ServiceDescription` message -- the one place a raw [`Message`] crosses
/// into callback-event construction, kept here rather than in the
/// validator so the validator stays free of callback-shape concerns.
pub fn hermes_version_event(msg: &Message) -> Option<CbEvt> {
    msg.get("Version").map(|version| CbEvt::HermesVersion { version: version.to_string() })
}
