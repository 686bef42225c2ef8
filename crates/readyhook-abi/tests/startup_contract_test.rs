#![cfg(target_os = "linux")]

//! Startup state machine, configuration intake and the introspection ABI.

mod common;

use std::ffi::c_int;
use std::ptr;
use std::sync::Mutex;

use common::{PipeStream, SysvSemaphore, inputs, pipe_context};
use readyhook_abi::errno_abi::{abi_errno, set_abi_errno};
use readyhook_abi::hook_context::{__readyhook_snapshot, unbuffer_stream};
use readyhook_abi::input_abi::fgetc_with;
use readyhook_abi::{HookContext, ReadyhookSnapshot, StartupInputs, WatchedStream};
use readyhook_core::config::{CHANNEL_KEYS, COMPAT_SEM_KEY, ENV_LOG, ENV_MQ_NAME, ENV_SEM_KEY};
use readyhook_core::startup::startup_path_is_valid;
use readyhook_core::stream_kind::{S_IFCHR, S_IFSOCK};
use readyhook_core::{
    ChannelKind, ChannelSetting, ChannelSpec, ChannelSpecError, DisableReason, LogLevel,
    StartupPhase, StreamKind,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn startup_is_idempotent_for_identical_inputs() {
    let sem = SysvSemaphore::create();
    let pipe = PipeStream::new();
    let first = pipe_context(sem.setting(), pipe.file);
    let second = pipe_context(sem.setting(), pipe.file);
    assert_eq!(first.report(), second.report());
    assert_eq!(first.report().phase(), StartupPhase::Ready);
    assert!(startup_path_is_valid(&first.report().phases));
}

#[test]
fn every_non_regular_kind_requests_notification() {
    let sem = SysvSemaphore::create();
    let pipe = PipeStream::new();
    for mode in [S_IFCHR | 0o620, S_IFSOCK | 0o777] {
        let ctx = HookContext::initialize(inputs(Some(mode), sem.setting(), pipe.file));
        assert!(ctx.report().need_notify);
        assert!(ctx.notifying(), "mode {mode:o}");
    }
}

#[test]
fn invalid_configuration_is_recorded() {
    let pipe = PipeStream::new();
    let ctx = pipe_context(
        ChannelSetting::Invalid {
            key: ENV_SEM_KEY,
            error: ChannelSpecError::InvalidKey,
        },
        pipe.file,
    );
    assert_eq!(
        ctx.report().disabled,
        Some(DisableReason::ChannelInvalid {
            key: ENV_SEM_KEY,
            error: ChannelSpecError::InvalidKey,
        })
    );
    assert_eq!(
        ctx.report().phases,
        vec![
            StartupPhase::Uninitialized,
            StartupPhase::Classifying,
            StartupPhase::Resolving,
            StartupPhase::Disabled,
        ]
    );
}

#[test]
fn snapshot_counts_signals_for_ready_context() {
    let sem = SysvSemaphore::create();
    let pipe = PipeStream::with_input(b"abc");
    let ctx = pipe_context(sem.setting(), pipe.file);
    for _ in 0..3 {
        // SAFETY: `pipe.file` is live.
        unsafe { fgetc_with(&ctx, pipe.file) };
    }
    let snap = ctx.snapshot();
    assert_eq!(snap.phase, StartupPhase::Ready.code());
    assert_eq!(snap.need_notify, 1);
    assert_eq!(snap.stdin_kind, StreamKind::Pipe.code());
    assert_eq!(snap.channel_kind, ChannelKind::Semaphore.code());
    assert_eq!(snap.signals_sent, 3);
    assert_eq!(snap.signals_failed, 0);
}

#[test]
fn snapshot_abi_rejects_null_with_efault() {
    set_abi_errno(0);
    // SAFETY: null is the case under test.
    let rc = unsafe { __readyhook_snapshot(ptr::null_mut()) };
    assert_eq!(rc, -1);
    assert_eq!(abi_errno(), libc::EFAULT);
}

#[test]
fn snapshot_abi_reports_a_terminal_phase() {
    // The first call builds the process context from environ.
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let mut snap = ReadyhookSnapshot::default();
    // SAFETY: `snap` is a valid out pointer.
    let rc: c_int = unsafe { __readyhook_snapshot(&mut snap) };
    assert_eq!(rc, 0);
    assert!(
        snap.phase == StartupPhase::Ready.code() || snap.phase == StartupPhase::Disabled.code()
    );
}

#[test]
fn process_inputs_come_from_environ() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by ENV_LOCK; no other test in this binary reads these.
    unsafe {
        std::env::set_var(ENV_SEM_KEY, "0x1234");
        std::env::set_var(ENV_MQ_NAME, "/ignored-when-key-set");
        std::env::set_var(ENV_LOG, "debug");
    }
    let inputs = StartupInputs::from_process();
    // SAFETY: as above.
    unsafe {
        std::env::remove_var(ENV_SEM_KEY);
        std::env::remove_var(ENV_MQ_NAME);
        std::env::remove_var(ENV_LOG);
    }

    assert_eq!(
        inputs.config.channel,
        ChannelSetting::Configured(ChannelSpec::Semaphore { key: 0x1234 })
    );
    assert_eq!(inputs.config.log_level, LogLevel::Debug);
    assert_eq!(inputs.watched, WatchedStream::ProcessStdin);
    assert!(inputs.unbuffer_stdout);
}

#[test]
fn process_inputs_without_variables_have_no_channel() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by ENV_LOCK.
    unsafe {
        for key in CHANNEL_KEYS {
            std::env::remove_var(key);
        }
    }
    let inputs = StartupInputs::from_process();
    assert_eq!(inputs.config.channel, ChannelSetting::Absent);
}

#[test]
fn process_inputs_accept_the_compatibility_key() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by ENV_LOCK.
    unsafe {
        for key in CHANNEL_KEYS {
            std::env::remove_var(key);
        }
        std::env::set_var(COMPAT_SEM_KEY, "424242");
    }
    let inputs = StartupInputs::from_process();
    // SAFETY: as above.
    unsafe { std::env::remove_var(COMPAT_SEM_KEY) };
    assert_eq!(
        inputs.config.channel,
        ChannelSetting::Configured(ChannelSpec::Semaphore { key: 424_242 })
    );
}

#[test]
fn unbuffered_output_is_visible_before_input_is_requested() {
    let mut fds = [0 as c_int; 2];
    // SAFETY: `fds` has room for both descriptors.
    assert_eq!(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) }, 0);
    // SAFETY: fds[1] is a fresh write descriptor.
    let out = unsafe { libc::fdopen(fds[1], c"w".as_ptr()) };
    assert!(!out.is_null());

    // SAFETY: `out` is fresh and untouched.
    assert!(unsafe { unbuffer_stream(out) });
    // SAFETY: `out` is live; no fflush follows.
    unsafe { libc::fputs(c"prompt> ".as_ptr(), out) };

    let mut buf = [0u8; 16];
    // SAFETY: `buf` is writable; the read end is non-blocking.
    let n = unsafe { libc::read(fds[0], buf.as_mut_ptr().cast(), buf.len()) };
    assert_eq!(n, 8);
    assert_eq!(&buf[..8], b"prompt> ");

    // SAFETY: both ends are owned here.
    unsafe {
        libc::fclose(out);
        libc::close(fds[0]);
    }
}

#[test]
fn startup_report_serializes_for_debug_output() {
    let sem = SysvSemaphore::create();
    let pipe = PipeStream::new();
    let ctx = pipe_context(sem.setting(), pipe.file);
    let json = serde_json::to_value(ctx.report()).expect("report serializes");
    assert_eq!(json["stdin_kind"], "pipe");
    assert_eq!(json["need_notify"], true);
    assert_eq!(json["channel"]["kind"], "semaphore");
    assert_eq!(json["channel"]["key"], sem.key);
    assert_eq!(json["phases"][3], "ready");
    assert!(json["disabled"].is_null());
}
