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

//! # IPC-HERMES-9852 CONFORMANCE SCENARIO RUNTIME
//!
//! Copyright © 2024 Nathaniel Hardesty, Licensed under the MIT License
//!
//! Everything a scenario body (`hermes-scenarios`) needs besides the wire
//! protocol itself: a registry of named scenarios, a process identity and
//! callback channel ([`Environment`]), scoped connection contexts that
//! compose connect + handshake with guaranteed teardown, and a field
//! validator for received messages.
//!
//! Nothing in this crate speaks XML or TCP directly -- it is built on top
//! of `hermes-message`, `hermes-state`, and `hermes-transport`.

mod callback;
mod config;
mod contexts;
mod environment;
mod error;
mod registry;
mod validator;

pub use callback::{hermes_version_event, CbEvt, Callback};
pub use config::{HarnessConfig, LoggingConfig, SystemUnderTestConfig, TestManagerConfig};
pub use contexts::{
    ContextError, DownstreamContext, DownstreamContextWithHandshake, UpstreamContext,
    UpstreamContextWithHandshake,
};
pub use environment::{Environment, ScenarioSkipped};
pub use error::{ConfigError, ValidationError};
pub use registry::{ScenarioError, ScenarioFn, TestInfo, TestRegistry, TestResult, UnknownTest};
pub use validator::{validate_board_info, validate_notification, validate_service_description};
