//! Startup state machine.
//!
//! ```text
//! Uninitialized -> Classifying -> Resolving -> Ready
//!                       |              |
//!                       +--------------+-----> Disabled
//! ```
//!
//! The machine runs once per process image, before any shadow is reachable.
//! `Ready` and `Disabled` are terminal. A process whose stdin is a regular
//! file, or which has no usable channel, ends in `Disabled`; its shadows
//! still forward every call.

use serde::Serialize;

use crate::channel_spec::{ChannelSpec, ChannelSpecError};
use crate::stream_kind::StreamKind;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupPhase {
    Uninitialized = 0,
    Classifying = 1,
    Resolving = 2,
    Ready = 3,
    Disabled = 4,
}

impl StartupPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Disabled)
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Allowed startup transitions.
pub const STARTUP_EDGES: &[(StartupPhase, StartupPhase)] = &[
    (StartupPhase::Uninitialized, StartupPhase::Classifying),
    (StartupPhase::Classifying, StartupPhase::Resolving),
    (StartupPhase::Classifying, StartupPhase::Disabled),
    (StartupPhase::Resolving, StartupPhase::Ready),
    (StartupPhase::Resolving, StartupPhase::Disabled),
];

#[must_use]
pub fn startup_path_is_valid(path: &[StartupPhase]) -> bool {
    if path.len() < 2 || path[0] != StartupPhase::Uninitialized {
        return false;
    }
    let Some(last) = path.last() else {
        return false;
    };
    last.is_terminal()
        && path
            .windows(2)
            .all(|pair| STARTUP_EDGES.contains(&(pair[0], pair[1])))
}

/// Why notification is off for this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisableReason {
    RegularFileStdin,
    StdinUnavailable,
    NoChannelConfigured,
    ChannelInvalid {
        key: &'static str,
        error: ChannelSpecError,
    },
    ChannelOpenFailed {
        channel: ChannelSpec,
        errno: i32,
    },
}

impl DisableReason {
    #[must_use]
    pub fn for_stream(kind: StreamKind) -> Option<Self> {
        match kind {
            StreamKind::RegularFile => Some(Self::RegularFileStdin),
            StreamKind::Unavailable => Some(Self::StdinUnavailable),
            _ => None,
        }
    }
}

/// Records the phases visited and rejects transitions outside [`STARTUP_EDGES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupTracker {
    path: Vec<StartupPhase>,
}

impl Default for StartupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: vec![StartupPhase::Uninitialized],
        }
    }

    #[must_use]
    pub fn current(&self) -> StartupPhase {
        self.path
            .last()
            .copied()
            .unwrap_or(StartupPhase::Uninitialized)
    }

    /// Move to `next`. Returns `false`, leaving the tracker unchanged, when
    /// the edge is not allowed.
    pub fn advance(&mut self, next: StartupPhase) -> bool {
        if !STARTUP_EDGES.contains(&(self.current(), next)) {
            return false;
        }
        self.path.push(next);
        true
    }

    #[must_use]
    pub fn path(&self) -> &[StartupPhase] {
        &self.path
    }

    #[must_use]
    pub fn into_path(self) -> Vec<StartupPhase> {
        self.path
    }
}

/// Outcome of one startup run, logged at debug level and kept in the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    pub phases: Vec<StartupPhase>,
    pub stdin_kind: StreamKind,
    pub need_notify: bool,
    pub channel: Option<ChannelSpec>,
    pub disabled: Option<DisableReason>,
    pub missing_symbols: Vec<&'static str>,
    pub stdout_unbuffered: bool,
}

impl StartupReport {
    #[must_use]
    pub fn phase(&self) -> StartupPhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(StartupPhase::Uninitialized)
    }

    /// True when shadows will send readiness signals.
    #[must_use]
    pub fn notifying(&self) -> bool {
        self.phase() == StartupPhase::Ready
    }
}
