//! Fixtures shared by the integration tests: throwaway System V semaphores,
//! pipe-backed `FILE*` streams and contexts wired to them.

#![allow(dead_code)]

use std::ffi::{CStr, c_char, c_int};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};

use libc::FILE;
use readyhook_abi::hook_context::process_stdin;
use readyhook_abi::{HookContext, StartupInputs, WatchedStream};
use readyhook_core::stream_kind::S_IFIFO;
use readyhook_core::{ChannelSetting, ChannelSpec, HookConfig, LogLevel};

static NEXT_KEY: AtomicI32 = AtomicI32::new(0);

/// A private semaphore set with one semaphore, removed on drop.
pub struct SysvSemaphore {
    pub semid: c_int,
    pub key: i32,
}

impl SysvSemaphore {
    pub fn create() -> Self {
        let base = 0x5200_0000 | ((std::process::id() as i32 & 0xffff) << 8);
        loop {
            let key = base | (NEXT_KEY.fetch_add(1, Ordering::Relaxed) & 0xff);
            // SAFETY: plain syscall wrapper.
            let semid = unsafe {
                libc::semget(key, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o600)
            };
            if semid >= 0 {
                return Self { semid, key };
            }
            let errno = std::io::Error::last_os_error().raw_os_error();
            assert_eq!(errno, Some(libc::EEXIST), "semget failed: {errno:?}");
        }
    }

    pub fn value(&self) -> c_int {
        // SAFETY: GETVAL takes no fourth argument.
        unsafe { libc::semctl(self.semid, 0, libc::GETVAL) }
    }

    pub fn spec(&self) -> ChannelSpec {
        ChannelSpec::Semaphore { key: self.key }
    }

    pub fn setting(&self) -> ChannelSetting {
        ChannelSetting::Configured(self.spec())
    }

    pub fn remove(&mut self) {
        if self.semid >= 0 {
            // SAFETY: IPC_RMID takes no fourth argument.
            unsafe { libc::semctl(self.semid, 0, libc::IPC_RMID) };
            self.semid = -1;
        }
    }
}

impl Drop for SysvSemaphore {
    fn drop(&mut self) {
        self.remove();
    }
}

/// A pipe whose read end is wrapped in a `FILE*`.
pub struct PipeStream {
    pub file: *mut FILE,
    pub write_fd: c_int,
}

impl PipeStream {
    pub fn new() -> Self {
        let mut fds = [0 as c_int; 2];
        // SAFETY: `fds` has room for both descriptors.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        // SAFETY: fds[0] is a fresh read descriptor.
        let file = unsafe { libc::fdopen(fds[0], c"r".as_ptr()) };
        assert!(!file.is_null());
        Self {
            file,
            write_fd: fds[1],
        }
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let mut pipe = Self::new();
        pipe.feed(bytes);
        pipe.close_writer();
        pipe
    }

    pub fn feed(&self, bytes: &[u8]) {
        write_all(self.write_fd, bytes);
    }

    pub fn close_writer(&mut self) {
        if self.write_fd >= 0 {
            // SAFETY: descriptor owned by this fixture.
            unsafe { libc::close(self.write_fd) };
            self.write_fd = -1;
        }
    }
}

impl Drop for PipeStream {
    fn drop(&mut self) {
        self.close_writer();
        // SAFETY: `file` was opened by fdopen and is closed once here.
        unsafe { libc::fclose(self.file) };
    }
}

pub fn write_all(fd: c_int, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: `bytes` is a live buffer.
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        assert!(n > 0, "write to pipe failed");
        bytes = &bytes[n as usize..];
    }
}

/// A seekable temporary file holding `bytes`, rewound to the start.
pub fn regular_file_stream(bytes: &[u8]) -> *mut FILE {
    // SAFETY: tmpfile returns an owned stream; the test closes it.
    let file = unsafe { libc::tmpfile() };
    assert!(!file.is_null());
    // SAFETY: `file` is open for update.
    unsafe {
        assert_eq!(libc::fwrite(bytes.as_ptr().cast(), 1, bytes.len(), file), bytes.len());
        libc::rewind(file);
    }
    file
}

pub fn inputs(stdin_mode: Option<u32>, channel: ChannelSetting, watched: *mut FILE) -> StartupInputs {
    StartupInputs {
        stdin_mode,
        config: HookConfig {
            channel,
            log_level: LogLevel::Off,
        },
        watched: WatchedStream::fixed(watched),
        unbuffer_stdout: false,
    }
}

/// A context that treats `watched` as a pipe-backed stdin.
pub fn pipe_context(channel: ChannelSetting, watched: *mut FILE) -> HookContext {
    HookContext::initialize(inputs(Some(S_IFIFO | 0o600), channel, watched))
}

pub fn c_buf_str(buf: &[c_char]) -> &str {
    // SAFETY: the buffer was NUL-terminated by the read under test.
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_str()
        .expect("utf8 line")
}

unsafe extern "C" {
    fn clearerr(stream: *mut FILE);
    fn __fpurge(stream: *mut FILE);
}

pub static STDIN_LOCK: Mutex<()> = Mutex::new(());

/// Points fd 0 at a pipe holding `bytes` until dropped.
pub struct StdinSwap {
    saved: c_int,
}

impl StdinSwap {
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut fds = [0 as c_int; 2];
        // SAFETY: plain descriptor juggling on fds owned by this fixture.
        unsafe {
            assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
            write_all(fds[1], bytes);
            libc::close(fds[1]);
            let saved = libc::dup(0);
            assert!(saved >= 0);
            assert_eq!(libc::dup2(fds[0], 0), 0);
            libc::close(fds[0]);
            reset_stdin();
            Self { saved }
        }
    }
}

impl Drop for StdinSwap {
    fn drop(&mut self) {
        // SAFETY: restores the descriptor saved in `with_input`.
        unsafe {
            libc::dup2(self.saved, 0);
            libc::close(self.saved);
            reset_stdin();
        }
    }
}

unsafe fn reset_stdin() {
    let stream = process_stdin();
    // SAFETY: libc's stdin is always a live stream.
    unsafe {
        __fpurge(stream);
        clearerr(stream);
    }
}

/// A Ready context watching libc's own `stdin`.
pub fn stdin_context(sem: &SysvSemaphore) -> HookContext {
    HookContext::initialize(StartupInputs {
        stdin_mode: Some(S_IFIFO),
        config: HookConfig {
            channel: sem.setting(),
            log_level: LogLevel::Off,
        },
        watched: WatchedStream::ProcessStdin,
        unbuffer_stdout: false,
    })
}
