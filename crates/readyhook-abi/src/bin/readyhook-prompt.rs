//! Small interactive program for exercising the preload library end to end.
//!
//! Prompts three times on C `stdout`, reading a name with `fgets`, an age
//! with `scanf` and one more line with `fgets`, then prints what it read and
//! the signal count from `__readyhook_snapshot` when the library is loaded.

use std::ffi::{CStr, CString, c_char, c_int};
use std::process::ExitCode;

unsafe extern "C" {
    static mut stdin: *mut libc::FILE;
    static mut stdout: *mut libc::FILE;
    fn scanf(format: *const c_char, ...) -> c_int;
}

/// Field prefix of the library's `ReadyhookSnapshot`.
#[repr(C)]
#[derive(Default)]
struct Snapshot {
    phase: u8,
    need_notify: u8,
    stdin_kind: u8,
    channel_kind: u8,
    missing_symbols: u32,
    signals_sent: u64,
    signals_failed: u64,
}

type SnapshotFn = unsafe extern "C" fn(*mut Snapshot) -> c_int;

fn signals_sent() -> Option<u64> {
    // SAFETY: plain symbol lookup in the global scope.
    let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"__readyhook_snapshot".as_ptr()) };
    if addr.is_null() {
        return None;
    }
    // SAFETY: the exported symbol has this signature.
    let snapshot: SnapshotFn = unsafe { std::mem::transmute(addr) };
    let mut out = Snapshot::default();
    // SAFETY: `out` is a valid destination.
    (unsafe { snapshot(&mut out) } == 0).then_some(out.signals_sent)
}

fn line(buf: &[c_char]) -> String {
    // SAFETY: fgets NUL-terminated the buffer.
    let text = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy();
    text.strip_suffix('\n').unwrap_or(&text).to_owned()
}

fn main() -> ExitCode {
    // SAFETY: libc's standard streams are live for the whole program.
    let (input, output) = unsafe { (stdin, stdout) };
    let prompt = |text: &CStr| {
        // SAFETY: `output` is live; `text` is NUL-terminated.
        unsafe { libc::fputs(text.as_ptr(), output) };
    };

    let mut name = [0 as c_char; 64];
    prompt(c"name> ");
    // SAFETY: `name` holds 64 bytes.
    if unsafe { libc::fgets(name.as_mut_ptr(), 64, input) }.is_null() {
        return ExitCode::from(2);
    }

    let mut age: c_int = 0;
    prompt(c"age> ");
    // SAFETY: `%d` takes one `int*`.
    if unsafe { scanf(c"%d".as_ptr(), &mut age as *mut c_int) } != 1 {
        return ExitCode::from(3);
    }

    let mut next = [0 as c_char; 64];
    prompt(c"next> ");
    // SAFETY: `next` holds 64 bytes.
    if unsafe { libc::fgets(next.as_mut_ptr(), 64, input) }.is_null() {
        return ExitCode::from(4);
    }

    let signals = signals_sent().map_or_else(|| "none".to_owned(), |n| n.to_string());
    let report = format!(
        "\nname=[{}] age={age} next=[{}] signals={signals}\n",
        line(&name),
        line(&next)
    );
    let Ok(report) = CString::new(report) else {
        return ExitCode::from(5);
    };
    // SAFETY: `output` is live.
    unsafe {
        libc::fputs(report.as_ptr(), output);
        libc::fflush(output);
    }
    ExitCode::SUCCESS
}
