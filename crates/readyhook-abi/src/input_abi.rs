//! Shadows for character, line and delimited reads.
//!
//! Each shadow has a `*_with` form taking an explicit [`HookContext`] and an
//! exported wrapper bound to the process context.

use std::ffi::{c_char, c_int};
use std::ptr;

use libc::{FILE, size_t, ssize_t};

use crate::hook_context::{HookContext, global, unresolved};

macro_rules! stream_char_shadows {
    ($($export:literal: $name:ident, $with:ident => $slot:ident;)*) => {$(
        pub unsafe fn $with(ctx: &HookContext, stream: *mut FILE) -> c_int {
            let Some(real) = ctx.real().$slot() else {
                return unresolved(libc::EOF);
            };
            ctx.before_read(stream);
            unsafe { real(stream) }
        }

        #[doc = concat!("Shadow of `", $export, "`.")]
        #[cfg_attr(not(debug_assertions), unsafe(export_name = $export))]
        pub unsafe extern "C" fn $name(stream: *mut FILE) -> c_int {
            unsafe { $with(global(), stream) }
        }
    )*};
}

stream_char_shadows! {
    "fgetc": fgetc, fgetc_with => fgetc;
    "getc": getc, getc_with => getc;
    "_IO_getc": io_getc, io_getc_with => io_getc;
    "fgetc_unlocked": fgetc_unlocked, fgetc_unlocked_with => fgetc_unlocked;
    "getc_unlocked": getc_unlocked, getc_unlocked_with => getc_unlocked;
    "__uflow": uflow, uflow_with => uflow;
}

pub unsafe fn getchar_with(ctx: &HookContext) -> c_int {
    let Some(real) = ctx.real().getchar() else {
        return unresolved(libc::EOF);
    };
    ctx.before_stdin_read();
    unsafe { real() }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getchar() -> c_int {
    unsafe { getchar_with(global()) }
}

pub unsafe fn getchar_unlocked_with(ctx: &HookContext) -> c_int {
    let Some(real) = ctx.real().getchar_unlocked() else {
        return unresolved(libc::EOF);
    };
    ctx.before_stdin_read();
    unsafe { real() }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getchar_unlocked() -> c_int {
    unsafe { getchar_unlocked_with(global()) }
}

// --- bounded line reads ---

pub unsafe fn fgets_with(
    ctx: &HookContext,
    buf: *mut c_char,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    let Some(real) = ctx.real().fgets() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, n, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fgets(buf: *mut c_char, n: c_int, stream: *mut FILE) -> *mut c_char {
    unsafe { fgets_with(global(), buf, n, stream) }
}

pub unsafe fn fgets_unlocked_with(
    ctx: &HookContext,
    buf: *mut c_char,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    let Some(real) = ctx.real().fgets_unlocked() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, n, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fgets_unlocked(
    buf: *mut c_char,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    unsafe { fgets_unlocked_with(global(), buf, n, stream) }
}

pub unsafe fn fgets_chk_with(
    ctx: &HookContext,
    buf: *mut c_char,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    let Some(real) = ctx.real().fgets_chk() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, size, n, stream) }
}

/// glibc fortified `__fgets_chk`.
#[cfg_attr(not(debug_assertions), unsafe(export_name = "__fgets_chk"))]
pub unsafe extern "C" fn fgets_chk(
    buf: *mut c_char,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    unsafe { fgets_chk_with(global(), buf, size, n, stream) }
}

pub unsafe fn fgets_unlocked_chk_with(
    ctx: &HookContext,
    buf: *mut c_char,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    let Some(real) = ctx.real().fgets_unlocked_chk() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, size, n, stream) }
}

/// glibc fortified `__fgets_unlocked_chk`.
#[cfg_attr(not(debug_assertions), unsafe(export_name = "__fgets_unlocked_chk"))]
pub unsafe extern "C" fn fgets_unlocked_chk(
    buf: *mut c_char,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut c_char {
    unsafe { fgets_unlocked_chk_with(global(), buf, size, n, stream) }
}

// --- whole-line reads ---

pub unsafe fn gets_with(ctx: &HookContext, buf: *mut c_char) -> *mut c_char {
    let Some(real) = ctx.real().gets() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_stdin_read();
    unsafe { real(buf) }
}

/// Deprecated `gets`. Only reachable in programs linked against an old glibc.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn gets(buf: *mut c_char) -> *mut c_char {
    unsafe { gets_with(global(), buf) }
}

pub unsafe fn gets_chk_with(ctx: &HookContext, buf: *mut c_char, size: size_t) -> *mut c_char {
    let Some(real) = ctx.real().gets_chk() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_stdin_read();
    unsafe { real(buf, size) }
}

/// glibc fortified `__gets_chk`.
#[cfg_attr(not(debug_assertions), unsafe(export_name = "__gets_chk"))]
pub unsafe extern "C" fn gets_chk(buf: *mut c_char, size: size_t) -> *mut c_char {
    unsafe { gets_chk_with(global(), buf, size) }
}

// --- unbounded line reads ---

pub unsafe fn getline_with(
    ctx: &HookContext,
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    stream: *mut FILE,
) -> ssize_t {
    let Some(real) = ctx.real().getline() else {
        return unresolved(-1);
    };
    ctx.before_read(stream);
    unsafe { real(lineptr, n, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getline(
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    stream: *mut FILE,
) -> ssize_t {
    unsafe { getline_with(global(), lineptr, n, stream) }
}

pub unsafe fn getdelim_with(
    ctx: &HookContext,
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    delim: c_int,
    stream: *mut FILE,
) -> ssize_t {
    let Some(real) = ctx.real().getdelim() else {
        return unresolved(-1);
    };
    ctx.before_read(stream);
    unsafe { real(lineptr, n, delim, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getdelim(
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    delim: c_int,
    stream: *mut FILE,
) -> ssize_t {
    unsafe { getdelim_with(global(), lineptr, n, delim, stream) }
}

pub unsafe fn io_getdelim_with(
    ctx: &HookContext,
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    delim: c_int,
    stream: *mut FILE,
) -> ssize_t {
    let Some(real) = ctx.real().io_getdelim() else {
        return unresolved(-1);
    };
    ctx.before_read(stream);
    unsafe { real(lineptr, n, delim, stream) }
}

/// glibc internal alias `__getdelim`.
#[cfg_attr(not(debug_assertions), unsafe(export_name = "__getdelim"))]
pub unsafe extern "C" fn io_getdelim(
    lineptr: *mut *mut c_char,
    n: *mut size_t,
    delim: c_int,
    stream: *mut FILE,
) -> ssize_t {
    unsafe { io_getdelim_with(global(), lineptr, n, delim, stream) }
}
