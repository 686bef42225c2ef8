//! Wide-character read and scan shadows.

use std::ffi::{c_int, c_void};
use std::ptr;

use libc::{FILE, size_t, wchar_t};

use crate::hook_context::{HookContext, WEOF, global, unresolved};
use crate::real_fns::{WideScanFn, wint_t};
use crate::scan_abi::scan_family;

pub unsafe fn fgetwc_with(ctx: &HookContext, stream: *mut FILE) -> wint_t {
    let Some(real) = ctx.real().fgetwc() else {
        return unresolved(WEOF);
    };
    ctx.before_read(stream);
    unsafe { real(stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fgetwc(stream: *mut FILE) -> wint_t {
    unsafe { fgetwc_with(global(), stream) }
}

pub unsafe fn getwc_with(ctx: &HookContext, stream: *mut FILE) -> wint_t {
    let Some(real) = ctx.real().getwc() else {
        return unresolved(WEOF);
    };
    ctx.before_read(stream);
    unsafe { real(stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getwc(stream: *mut FILE) -> wint_t {
    unsafe { getwc_with(global(), stream) }
}

pub unsafe fn getwchar_with(ctx: &HookContext) -> wint_t {
    let Some(real) = ctx.real().getwchar() else {
        return unresolved(WEOF);
    };
    ctx.before_stdin_read();
    unsafe { real() }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn getwchar() -> wint_t {
    unsafe { getwchar_with(global()) }
}

pub unsafe fn fgetws_with(
    ctx: &HookContext,
    buf: *mut wchar_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut wchar_t {
    let Some(real) = ctx.real().fgetws() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, n, stream) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn fgetws(buf: *mut wchar_t, n: c_int, stream: *mut FILE) -> *mut wchar_t {
    unsafe { fgetws_with(global(), buf, n, stream) }
}

pub unsafe fn fgetws_chk_with(
    ctx: &HookContext,
    buf: *mut wchar_t,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut wchar_t {
    let Some(real) = ctx.real().fgetws_chk() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_read(stream);
    unsafe { real(buf, size, n, stream) }
}

/// glibc fortified `__fgetws_chk`.
#[cfg_attr(not(debug_assertions), unsafe(export_name = "__fgetws_chk"))]
pub unsafe extern "C" fn fgetws_chk(
    buf: *mut wchar_t,
    size: size_t,
    n: c_int,
    stream: *mut FILE,
) -> *mut wchar_t {
    unsafe { fgetws_chk_with(global(), buf, size, n, stream) }
}

/// Wide form of the scan pipeline; drains with the real `fgetwc`.
pub(crate) unsafe fn wide_scan_through(
    ctx: &HookContext,
    real: Option<WideScanFn>,
    stream: *mut FILE,
    format: *const wchar_t,
    ap: *mut c_void,
) -> c_int {
    let Some(real) = real else {
        return unresolved(libc::EOF);
    };
    ctx.before_read(stream);
    let rc = unsafe { real(stream, format, ap) };
    ctx.drain_after_wide_scan(stream, rc);
    rc
}

scan_family! {
    char: wchar_t,
    through: wide_scan_through,
    slot: vfwscanf,
    scanf: "wscanf" => wscanf,
    fscanf: "fwscanf" => fwscanf,
    vscanf: "vwscanf" => vwscanf, vwscanf_with,
    vfscanf: "vfwscanf" => vfwscanf, vfwscanf_with,
}

scan_family! {
    char: wchar_t,
    through: wide_scan_through,
    slot: isoc99_vfwscanf,
    scanf: "__isoc99_wscanf" => isoc99_wscanf,
    fscanf: "__isoc99_fwscanf" => isoc99_fwscanf,
    vscanf: "__isoc99_vwscanf" => isoc99_vwscanf, isoc99_vwscanf_with,
    vfscanf: "__isoc99_vfwscanf" => isoc99_vfwscanf, isoc99_vfwscanf_with,
}

scan_family! {
    char: wchar_t,
    through: wide_scan_through,
    slot: isoc23_vfwscanf,
    scanf: "__isoc23_wscanf" => isoc23_wscanf,
    fscanf: "__isoc23_fwscanf" => isoc23_fwscanf,
    vscanf: "__isoc23_vwscanf" => isoc23_vwscanf, isoc23_vwscanf_with,
    vfscanf: "__isoc23_vfwscanf" => isoc23_vfwscanf, isoc23_vfwscanf_with,
}
