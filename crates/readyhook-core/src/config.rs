//! Environment-derived configuration.
//!
//! The configuration is read exactly once at startup. Parsing works on a
//! key lookup closure so the same code serves the live `environ` table and
//! tests.

use serde::Serialize;

use crate::channel_spec::{ChannelSpec, ChannelSpecError};

/// System V semaphore key of the readiness channel.
pub const ENV_SEM_KEY: &str = "READYHOOK_SEMKEY";
/// POSIX message-queue name of the readiness channel.
pub const ENV_MQ_NAME: &str = "READYHOOK_MQNAME";
/// Diagnostic verbosity.
pub const ENV_LOG: &str = "READYHOOK_LOG";
/// Semaphore key under the name existing kernel-side controllers export.
pub const COMPAT_SEM_KEY: &str = "CK_SEMKEY";
/// Queue name under the name existing kernel-side controllers export.
pub const COMPAT_MQ_NAME: &str = "CK_MQNAME";

type ChannelParser = fn(&[u8]) -> Result<ChannelSpec, ChannelSpecError>;

/// Channel variables in precedence order: the native names first, then the
/// compatibility names, semaphore before queue within each pair.
const CHANNEL_SOURCES: [(&str, ChannelParser); 4] = [
    (ENV_SEM_KEY, ChannelSpec::parse_semaphore_key),
    (ENV_MQ_NAME, ChannelSpec::parse_queue_name),
    (COMPAT_SEM_KEY, ChannelSpec::parse_semaphore_key),
    (COMPAT_MQ_NAME, ChannelSpec::parse_queue_name),
];

/// Channel variable names in precedence order.
pub const CHANNEL_KEYS: [&str; 4] = [ENV_SEM_KEY, ENV_MQ_NAME, COMPAT_SEM_KEY, COMPAT_MQ_NAME];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    #[default]
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    /// Unrecognized values fall back to the default level.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let raw = raw.trim_ascii();
        let matches = |want: &[u8]| raw.eq_ignore_ascii_case(want);
        if matches(b"off") || matches(b"none") || matches(b"0") {
            Self::Off
        } else if matches(b"error") || matches(b"1") {
            Self::Error
        } else if matches(b"warn") || matches(b"warning") || matches(b"2") {
            Self::Warn
        } else if matches(b"info") || matches(b"3") {
            Self::Info
        } else if matches(b"debug") || matches(b"trace") || matches(b"4") {
            Self::Debug
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Off,
            1 => Self::Error,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Warn,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelSetting {
    Absent,
    Configured(ChannelSpec),
    Invalid {
        key: &'static str,
        error: ChannelSpecError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookConfig {
    pub channel: ChannelSetting,
    pub log_level: LogLevel,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSetting::Absent,
            log_level: LogLevel::default(),
        }
    }
}

impl HookConfig {
    /// Build the configuration from a variable lookup.
    ///
    /// The first channel variable present (see [`CHANNEL_KEYS`]) decides the
    /// channel, even when its value is malformed; a bad semaphore key does
    /// not fall through to the queue name.
    pub fn from_lookup<'a, F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<&'a [u8]>,
    {
        let log_level = lookup(ENV_LOG).map(LogLevel::parse).unwrap_or_default();

        let channel = CHANNEL_SOURCES
            .iter()
            .find_map(|&(key, parse)| {
                lookup(key).map(|raw| match parse(raw) {
                    Ok(spec) => ChannelSetting::Configured(spec),
                    Err(error) => ChannelSetting::Invalid { key, error },
                })
            })
            .unwrap_or(ChannelSetting::Absent);

        Self { channel, log_level }
    }
}
