//! Governor protocol integration on top of `serlink-core`.
//!
//! [`GovernorEngine`] is a small stand-in for the protocol library: it parses
//! register requests out of the byte stream and queues replies.
//! [`GovernorHarness`] is the application side. Its callbacks run in
//! interrupt context and only flip bits; the version reply is assembled
//! later by [`GovernorHarness::version_process`] on the mainline.

pub mod engine;
pub mod error;
pub mod firmware;
pub mod harness;

pub use engine::{
    register_cell, GovernorEngine, GovernorHooks, RegisterCell, SharedEngine, REGISTER_COUNT,
    REJECT_BUSY, REJECT_UNKNOWN_OP, REJECT_UNREGISTERED,
};
pub use error::GovernorError;
pub use firmware::FirmwareInfo;
pub use harness::{GovernorHarness, HarnessStats};
