//! Readiness channel identifiers.
//!
//! The controller names its channel to the child through the environment.
//! Two backends exist: a System V counting semaphore identified by its key,
//! and a POSIX message queue identified by its name.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Payload enqueued on a message-queue channel for every blocking read.
pub const READY_PAYLOAD: &[u8] = b"READY";

/// Longest queue name accepted by `mq_open`, excluding the leading slash.
pub const MQ_NAME_MAX: usize = 255;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Queue = 1,
    Semaphore = 2,
}

impl ChannelKind {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelSpec {
    Queue { name: String },
    Semaphore { key: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSpecError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier is not valid UTF-8")]
    NotUtf8,
    #[error("queue name must start with '/'")]
    MissingLeadingSlash,
    #[error("queue name may not contain '/' after the first byte")]
    EmbeddedSlash,
    #[error("queue name is {0} bytes, limit is 255")]
    NameTooLong(usize),
    #[error("semaphore key is not an integer")]
    InvalidKey,
    #[error("semaphore key is out of range for key_t")]
    KeyOutOfRange,
    #[error("semaphore key 0 (IPC_PRIVATE) cannot be shared")]
    PrivateKey,
}

impl ChannelSpec {
    /// Parse a POSIX message-queue name such as `/readyhook-1234`.
    pub fn parse_queue_name(raw: &[u8]) -> Result<Self, ChannelSpecError> {
        let raw = raw.trim_ascii();
        if raw.is_empty() {
            return Err(ChannelSpecError::Empty);
        }
        let name = std::str::from_utf8(raw).map_err(|_| ChannelSpecError::NotUtf8)?;
        let Some(rest) = name.strip_prefix('/') else {
            return Err(ChannelSpecError::MissingLeadingSlash);
        };
        if rest.is_empty() {
            return Err(ChannelSpecError::Empty);
        }
        if rest.contains('/') {
            return Err(ChannelSpecError::EmbeddedSlash);
        }
        if rest.len() > MQ_NAME_MAX {
            return Err(ChannelSpecError::NameTooLong(rest.len()));
        }
        Ok(Self::Queue {
            name: name.to_owned(),
        })
    }

    /// Parse a System V key: optionally signed decimal, or unsigned `0x`
    /// hexadecimal.
    ///
    /// Hex keys are read as the 32-bit pattern `ftok`/`ipcs` print, so
    /// `0xfffffffe` is the key `-2`.
    pub fn parse_semaphore_key(raw: &[u8]) -> Result<Self, ChannelSpecError> {
        let raw = raw.trim_ascii();
        if raw.is_empty() {
            return Err(ChannelSpecError::Empty);
        }
        let text = std::str::from_utf8(raw).map_err(|_| ChannelSpecError::NotUtf8)?;
        let (signed, negative, digits) = match text.as_bytes()[0] {
            b'-' => (true, true, &text[1..]),
            b'+' => (true, false, &text[1..]),
            _ => (false, false, text),
        };

        let key = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            // A hex key is a bit pattern; a sign on it has no meaning.
            if signed || hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ChannelSpecError::InvalidKey);
            }
            let bits = u32::from_str_radix(hex, 16).map_err(|_| ChannelSpecError::KeyOutOfRange)?;
            bits as i32
        } else {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ChannelSpecError::InvalidKey);
            }
            let magnitude: i64 = digits
                .parse()
                .map_err(|_| ChannelSpecError::KeyOutOfRange)?;
            let value = if negative { -magnitude } else { magnitude };
            i32::try_from(value).map_err(|_| ChannelSpecError::KeyOutOfRange)?
        };

        if key == 0 {
            return Err(ChannelSpecError::PrivateKey);
        }
        Ok(Self::Semaphore { key })
    }

    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::Queue { .. } => ChannelKind::Queue,
            Self::Semaphore { .. } => ChannelKind::Semaphore,
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue { name } => write!(f, "queue {name}"),
            Self::Semaphore { key } => write!(f, "semaphore key {key} ({:#010x})", *key as u32),
        }
    }
}
