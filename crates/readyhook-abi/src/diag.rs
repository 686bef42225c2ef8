//! Level-gated diagnostics on stderr.
//!
//! Each record is formatted into one buffer and handed to a single `write(2)`
//! on fd 2, so lines from concurrent threads never interleave mid-record and
//! nothing goes through the host's stdio buffers.

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use readyhook_core::LogLevel;

/// Call-time warnings emitted per process before going quiet.
pub const CALL_WARN_LIMIT: u32 = 32;

const PREFIX: &str = "readyhook";

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static CALL_WARNINGS: AtomicU32 = AtomicU32::new(0);

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

#[must_use]
pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

#[must_use]
pub fn enabled(at: LogLevel) -> bool {
    at != LogLevel::Off && at <= level()
}

/// `readyhook: [<level>] <message>\n`
#[must_use]
pub fn format_record(at: LogLevel, args: fmt::Arguments<'_>) -> String {
    let mut line = String::with_capacity(96);
    let _ = write!(line, "{PREFIX}: [{}] ", at.label());
    let _ = line.write_fmt(args);
    line.push('\n');
    line
}

pub fn emit(at: LogLevel, args: fmt::Arguments<'_>) {
    if !enabled(at) {
        return;
    }
    let line = format_record(at, args);
    // SAFETY: `line` is a live buffer of `line.len()` bytes.
    let _ = unsafe { libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), line.len()) };
}

/// Warning raised from inside a shadow. Capped at [`CALL_WARN_LIMIT`].
pub fn call_warn(args: fmt::Arguments<'_>) {
    if !enabled(LogLevel::Warn) {
        return;
    }
    let seen = CALL_WARNINGS.fetch_add(1, Ordering::Relaxed);
    if seen >= CALL_WARN_LIMIT {
        return;
    }
    emit(LogLevel::Warn, args);
    if seen + 1 == CALL_WARN_LIMIT {
        emit(
            LogLevel::Warn,
            format_args!("further readiness warnings suppressed"),
        );
    }
}

macro_rules! error {
    ($($arg:tt)*) => { $crate::diag::emit(readyhook_core::LogLevel::Error, format_args!($($arg)*)) };
}
macro_rules! warning {
    ($($arg:tt)*) => { $crate::diag::emit(readyhook_core::LogLevel::Warn, format_args!($($arg)*)) };
}
macro_rules! info {
    ($($arg:tt)*) => { $crate::diag::emit(readyhook_core::LogLevel::Info, format_args!($($arg)*)) };
}
macro_rules! debug {
    ($($arg:tt)*) => { $crate::diag::emit(readyhook_core::LogLevel::Debug, format_args!($($arg)*)) };
}

pub(crate) use {debug, error, info, warning};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_has_prefix_level_and_newline() {
        let line = format_record(LogLevel::Info, format_args!("stdin is {}", "a pipe"));
        assert_eq!(line, "readyhook: [info] stdin is a pipe\n");
    }

    #[test]
    fn off_is_never_enabled() {
        assert!(!enabled(LogLevel::Off));
    }

    #[test]
    fn level_macros_route_through_the_level_gate() {
        set_level(LogLevel::Off);
        error!("suppressed {}", 1);
        warning!("suppressed {}", 2);
        info!("suppressed");
        debug!("suppressed");
        assert_eq!(level(), LogLevel::Off);
        assert!(!enabled(LogLevel::Error));
    }
}
