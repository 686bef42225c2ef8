//! LD_PRELOAD interposition layer that tells a controller when a process is
//! about to block reading standard input.
//!
//! Every blocking stdio input entry point is shadowed. A shadow sends one
//! readiness signal on the configured channel when the read targets stdin,
//! then forwards to the real function found with `dlsym(RTLD_NEXT, ...)`.
//! Symbols are only exported in release builds, so test binaries can call the
//! shadows without hijacking their own libc.

#![feature(c_variadic)]
#![allow(clippy::missing_safety_doc)]

pub mod channel_abi;
pub mod diag;
pub mod errno_abi;
pub mod hook_context;
pub mod input_abi;
pub mod real_fns;
pub mod scan_abi;
pub mod stdio_buffer;
pub mod wide_abi;

#[cfg(feature = "annex-k")]
pub mod annex_k_abi;

pub use channel_abi::{ChannelError, ReadinessChannel};
pub use hook_context::{HookContext, ReadyhookSnapshot, StartupInputs, WatchedStream};
pub use real_fns::RealFunctions;
