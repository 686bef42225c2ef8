//! Policy core for the readyhook stdin readiness layer.
//!
//! Everything here is free of FFI: the ABI crate feeds it raw `st_mode`
//! bits, environment bytes and character streams, and gets back decisions.
//! Keeping the policy pure lets it be tested without preloading anything.

pub mod channel_spec;
pub mod config;
pub mod drain;
pub mod startup;
pub mod stream_kind;
pub mod symbols;

pub use channel_spec::{ChannelKind, ChannelSpec, ChannelSpecError, READY_PAYLOAD};
pub use config::{ChannelSetting, HookConfig, LogLevel};
pub use startup::{DisableReason, StartupPhase, StartupReport, StartupTracker};
pub use stream_kind::StreamKind;
pub use symbols::{Availability, RealSymbol};
