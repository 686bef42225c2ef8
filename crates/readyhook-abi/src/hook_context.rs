//! Process-wide hook state, built once before `main`.
//!
//! The context holds the stdin classification, the real-function table and
//! the open channel. It is constructed by a load-time constructor; a shadow
//! that runs earlier (another library's constructor reading stdin) builds it
//! through the same once-cell.

use std::ffi::{CStr, c_char, c_int};
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use libc::FILE;
use readyhook_core::drain::{NEWLINE, WIDE_NEWLINE, drain_line, scan_result_allows_drain};
use readyhook_core::{
    Availability, ChannelSetting, DisableReason, HookConfig, StartupPhase, StartupReport,
    StartupTracker, StreamKind,
};

use crate::channel_abi::ReadinessChannel;
use crate::diag;
use crate::errno_abi::{preserving_errno, set_abi_errno};
use crate::real_fns::{RealFunctions, wint_t};
use crate::stdio_buffer::{self, StreamLock};

/// glibc `WEOF`.
pub const WEOF: wint_t = wint_t::MAX;

const MAX_ENV_SCAN: usize = 4096;

unsafe extern "C" {
    static mut environ: *mut *mut c_char;
    static mut stdin: *mut FILE;
    static mut stdout: *mut FILE;
}

/// The libc `stdin` stream as currently assigned.
#[inline]
#[must_use]
pub fn process_stdin() -> *mut FILE {
    // SAFETY: reads the pointer value; libc keeps `stdin` initialized.
    unsafe { stdin }
}

#[inline]
#[must_use]
pub fn process_stdout() -> *mut FILE {
    // SAFETY: as above.
    unsafe { stdout }
}

/// Look a variable up by walking `environ` directly.
///
/// # Safety
///
/// The returned slice borrows the environment block; it must not outlive a
/// later `setenv`/`putenv` that replaces the entry.
unsafe fn environ_value<'a>(key: &str) -> Option<&'a [u8]> {
    // SAFETY: `environ` is the process environment vector.
    let mut envp = unsafe { environ };
    if envp.is_null() {
        return None;
    }
    for _ in 0..MAX_ENV_SCAN {
        // SAFETY: `envp` is a null-terminated vector of C string pointers.
        let entry = unsafe { *envp };
        if entry.is_null() {
            return None;
        }
        // SAFETY: each entry is a NUL-terminated `KEY=value` string.
        let bytes = unsafe { CStr::from_ptr(entry) }.to_bytes();
        if let Some(value) = bytes
            .strip_prefix(key.as_bytes())
            .and_then(|rest| rest.strip_prefix(b"="))
        {
            return Some(value);
        }
        // SAFETY: advance to next env pointer slot.
        envp = unsafe { envp.add(1) };
    }
    None
}

fn stdin_mode() -> Option<u32> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `st` is valid for writes of one `stat`.
    if unsafe { libc::fstat(libc::STDIN_FILENO, st.as_mut_ptr()) } != 0 {
        return None;
    }
    // SAFETY: fstat succeeded and filled `st`.
    Some(unsafe { st.assume_init() }.st_mode)
}

/// Which stream the context treats as standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedStream {
    /// Whatever libc's `stdin` points at when the call is made.
    ProcessStdin,
    /// A fixed `FILE*`, by address.
    Fixed(usize),
}

impl WatchedStream {
    #[must_use]
    pub fn fixed(stream: *mut FILE) -> Self {
        Self::Fixed(stream as usize)
    }

    #[must_use]
    pub fn stream(self) -> *mut FILE {
        match self {
            Self::ProcessStdin => process_stdin(),
            Self::Fixed(addr) => addr as *mut FILE,
        }
    }
}

/// Everything startup depends on, gathered up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupInputs {
    /// `st_mode` of fd 0, `None` when `fstat` failed.
    pub stdin_mode: Option<u32>,
    pub config: HookConfig,
    pub watched: WatchedStream,
    pub unbuffer_stdout: bool,
}

impl StartupInputs {
    #[must_use]
    pub fn from_process() -> Self {
        // SAFETY: values are copied into the config before startup returns.
        let config = HookConfig::from_lookup(|key| unsafe { environ_value(key) });
        Self {
            stdin_mode: stdin_mode(),
            config,
            watched: WatchedStream::ProcessStdin,
            unbuffer_stdout: true,
        }
    }
}

/// C view of the context for controllers and test harnesses.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadyhookSnapshot {
    pub phase: u8,
    pub need_notify: u8,
    pub stdin_kind: u8,
    /// 0 when no channel is open.
    pub channel_kind: u8,
    pub missing_symbols: u32,
    pub signals_sent: u64,
    pub signals_failed: u64,
}

#[derive(Debug)]
pub struct HookContext {
    report: StartupReport,
    channel: Option<ReadinessChannel>,
    real: RealFunctions,
    watched: WatchedStream,
    signals_sent: AtomicU64,
    signals_failed: AtomicU64,
}

/// Switch `stream` to unbuffered mode. Returns false if `setvbuf` refused.
///
/// # Safety
///
/// `stream` must be null or a live `FILE` with no I/O performed on it yet.
pub unsafe fn unbuffer_stream(stream: *mut FILE) -> bool {
    if stream.is_null() {
        return false;
    }
    // SAFETY: `stream` is a live FILE; a null buffer selects unbuffered mode.
    unsafe { libc::setvbuf(stream, ptr::null_mut(), libc::_IONBF, 0) == 0 }
}

fn open_channel(setting: &ChannelSetting) -> Result<ReadinessChannel, DisableReason> {
    match setting {
        ChannelSetting::Absent => {
            diag::info!("no readiness channel configured; notification disabled");
            Err(DisableReason::NoChannelConfigured)
        }
        ChannelSetting::Invalid { key, error } => {
            diag::warning!("{key} is invalid ({error}); notification disabled");
            Err(DisableReason::ChannelInvalid {
                key: *key,
                error: *error,
            })
        }
        ChannelSetting::Configured(spec) => ReadinessChannel::open(spec).map_err(|err| {
            diag::warning!("{err}; notification disabled");
            DisableReason::ChannelOpenFailed {
                channel: spec.clone(),
                errno: err.errno(),
            }
        }),
    }
}

impl HookContext {
    /// Run the startup state machine.
    #[must_use]
    pub fn initialize(inputs: StartupInputs) -> Self {
        Self::initialize_with(inputs, RealFunctions::resolve)
    }

    /// [`Self::initialize`] with a caller-supplied real-function resolver.
    #[must_use]
    pub fn initialize_with(inputs: StartupInputs, resolve: impl FnOnce() -> RealFunctions) -> Self {
        diag::set_level(inputs.config.log_level);
        let mut tracker = StartupTracker::new();

        tracker.advance(StartupPhase::Classifying);
        let stdin_kind = StreamKind::from_fstat(inputs.stdin_mode);
        let need_notify = stdin_kind.needs_notify();
        diag::debug!("stdin is {}", stdin_kind.describe());

        let stdout_unbuffered = if inputs.unbuffer_stdout {
            // SAFETY: libc's stdout, before `main` has written to it.
            let ok = unsafe { unbuffer_stream(process_stdout()) };
            if !ok {
                diag::error!("could not make stdout unbuffered; output ordering is best effort");
            }
            ok
        } else {
            false
        };

        // Shadows forward whether or not notification ends up enabled.
        let real = resolve();
        for sym in real.missing() {
            match sym.availability() {
                Availability::Required => {
                    diag::warning!("real {} not found; its shadows return ENOSYS", sym.name());
                }
                Availability::Optional => diag::debug!("optional {} not found", sym.name()),
            }
        }

        let (channel, disabled) = match DisableReason::for_stream(stdin_kind) {
            Some(reason) => {
                tracker.advance(StartupPhase::Disabled);
                (None, Some(reason))
            }
            None => {
                tracker.advance(StartupPhase::Resolving);
                match open_channel(&inputs.config.channel) {
                    Ok(channel) => {
                        tracker.advance(StartupPhase::Ready);
                        (Some(channel), None)
                    }
                    Err(reason) => {
                        tracker.advance(StartupPhase::Disabled);
                        (None, Some(reason))
                    }
                }
            }
        };

        let report = StartupReport {
            phases: tracker.into_path(),
            stdin_kind,
            need_notify,
            channel: channel.as_ref().map(ReadinessChannel::spec),
            disabled,
            missing_symbols: real.missing().map(|sym| sym.name()).collect(),
            stdout_unbuffered,
        };
        if diag::enabled(readyhook_core::LogLevel::Debug) {
            match serde_json::to_string(&report) {
                Ok(json) => diag::debug!("startup {json}"),
                Err(err) => diag::debug!("startup report not serializable: {err}"),
            }
        }

        Self {
            report,
            channel,
            real,
            watched: inputs.watched,
            signals_sent: AtomicU64::new(0),
            signals_failed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn report(&self) -> &StartupReport {
        &self.report
    }

    #[must_use]
    pub fn real(&self) -> &RealFunctions {
        &self.real
    }

    #[must_use]
    pub fn channel(&self) -> Option<&ReadinessChannel> {
        self.channel.as_ref()
    }

    /// True in the `Ready` state: stdin needs notification and a channel is open.
    #[must_use]
    pub fn notifying(&self) -> bool {
        self.report.need_notify && self.channel.is_some()
    }

    /// The stream stdin-implicit shadows read from.
    #[must_use]
    pub fn stdin_stream(&self) -> *mut FILE {
        self.watched.stream()
    }

    #[must_use]
    pub fn is_watched(&self, stream: *mut FILE) -> bool {
        !stream.is_null() && stream == self.watched.stream()
    }

    #[must_use]
    pub fn signals_sent(&self) -> u64 {
        self.signals_sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn signals_failed(&self) -> u64 {
        self.signals_failed.load(Ordering::Relaxed)
    }

    /// Called by stream-taking shadows right before the real read.
    #[inline]
    pub fn before_read(&self, stream: *mut FILE) {
        if self.notifying() && self.is_watched(stream) {
            self.signal();
        }
    }

    /// Called by stdin-implicit shadows right before the real read.
    #[inline]
    pub fn before_stdin_read(&self) {
        if self.notifying() {
            self.signal();
        }
    }

    fn signal(&self) {
        let Some(channel) = &self.channel else {
            return;
        };
        preserving_errno(|| match channel.signal() {
            Ok(()) => {
                self.signals_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.signals_failed.fetch_add(1, Ordering::Relaxed);
                diag::call_warn(format_args!("readiness signal lost: {err}"));
            }
        });
    }

    fn should_drain(&self, stream: *mut FILE, result: c_int, eof: c_int) -> bool {
        self.notifying() && self.is_watched(stream) && scan_result_allows_drain(result, eof)
    }

    /// Discard the rest of the line a narrow scan stopped in.
    ///
    /// Only bytes already in the stream's buffer are consumed; if the scan
    /// took the newline itself nothing is read.
    pub fn drain_after_scan(&self, stream: *mut FILE, result: c_int) {
        if !self.should_drain(stream, result, libc::EOF) {
            return;
        }
        let Some(fgetc) = self.real.fgetc() else {
            return;
        };
        preserving_errno(|| {
            // SAFETY: `stream` is the caller's live FILE; the lock keeps the
            // get area stable between each peek and read.
            let _lock = unsafe { StreamLock::acquire(stream) };
            // SAFETY: as above.
            let last = unsafe { stdio_buffer::last_consumed_byte(stream) };
            drain_line(
                last.map(u32::from),
                || {
                    // SAFETY: as above.
                    if !unsafe { stdio_buffer::has_buffered_bytes(stream) } {
                        return None;
                    }
                    // SAFETY: a byte is buffered, so this read cannot block.
                    let ch = unsafe { fgetc(stream) };
                    (ch != libc::EOF).then_some(ch as u32)
                },
                NEWLINE,
            )
        });
    }

    /// Wide counterpart of [`Self::drain_after_scan`], stopping at `L'\n'`.
    pub fn drain_after_wide_scan(&self, stream: *mut FILE, result: c_int) {
        if !self.should_drain(stream, result, libc::EOF) {
            return;
        }
        let Some(fgetwc) = self.real.fgetwc() else {
            return;
        };
        preserving_errno(|| {
            // SAFETY: see `drain_after_scan`.
            let _lock = unsafe { StreamLock::acquire(stream) };
            // SAFETY: as above.
            let last = unsafe { stdio_buffer::last_consumed_wide(stream) };
            drain_line(
                last,
                || {
                    // SAFETY: as above.
                    if !unsafe { stdio_buffer::has_buffered_wide(stream) } {
                        return None;
                    }
                    // SAFETY: a converted unit is buffered; no read happens.
                    let wc = unsafe { fgetwc(stream) };
                    (wc != WEOF).then_some(wc)
                },
                WIDE_NEWLINE,
            )
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> ReadyhookSnapshot {
        ReadyhookSnapshot {
            phase: self.report.phase().code(),
            need_notify: u8::from(self.report.need_notify),
            stdin_kind: self.report.stdin_kind.code(),
            channel_kind: self.channel.as_ref().map_or(0, |ch| ch.kind().code()),
            missing_symbols: u32::try_from(self.report.missing_symbols.len()).unwrap_or(u32::MAX),
            signals_sent: self.signals_sent(),
            signals_failed: self.signals_failed(),
        }
    }
}

/// Set errno to `ENOSYS` and hand back the shadow's error value.
#[inline]
pub(crate) fn unresolved<T>(error_value: T) -> T {
    set_abi_errno(libc::ENOSYS);
    error_value
}

static CONTEXT: OnceLock<HookContext> = OnceLock::new();

/// The process context, built on first use.
pub fn global() -> &'static HookContext {
    CONTEXT.get_or_init(|| HookContext::initialize(StartupInputs::from_process()))
}

#[cfg(not(debug_assertions))]
#[ctor::ctor]
fn readyhook_startup() {
    let _ = global();
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn __readyhook_snapshot(out: *mut ReadyhookSnapshot) -> c_int {
    if out.is_null() {
        set_abi_errno(libc::EFAULT);
        return -1;
    }
    let snapshot = global().snapshot();
    // SAFETY: `out` is validated non-null above.
    unsafe { *out = snapshot };
    0
}
