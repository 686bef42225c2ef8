//! Formatted-scan shadows.
//!
//! Every variant of a family funnels into its real `v*fscanf`: the
//! stdin-implicit forms scan the watched stdin stream, the variadic forms
//! pass their argument list through as a `va_list`. After the scan returns
//! the rest of the current stdin line is drained.

use std::ffi::{c_char, c_int, c_void};

use libc::FILE;

use crate::hook_context::{HookContext, unresolved};
use crate::real_fns::ScanFn;

/// Signal, scan, drain. Returns the scan's result untouched.
pub(crate) unsafe fn scan_through(
    ctx: &HookContext,
    real: Option<ScanFn>,
    stream: *mut FILE,
    format: *const c_char,
    ap: *mut c_void,
) -> c_int {
    let Some(real) = real else {
        return unresolved(libc::EOF);
    };
    ctx.before_read(stream);
    let rc = unsafe { real(stream, format, ap) };
    ctx.drain_after_scan(stream, rc);
    rc
}

/// Generates the four members of one scan family around a real `v*fscanf`.
macro_rules! scan_family {
    (
        char: $ch:ty,
        through: $through:path,
        slot: $slot:ident,
        scanf: $scanf:literal => $scanf_fn:ident,
        fscanf: $fscanf:literal => $fscanf_fn:ident,
        vscanf: $vscanf:literal => $vscanf_fn:ident, $vscanf_with:ident,
        vfscanf: $vfscanf:literal => $vfscanf_fn:ident, $vfscanf_with:ident $(,)?
    ) => {
        pub unsafe fn $vfscanf_with(
            ctx: &$crate::hook_context::HookContext,
            stream: *mut libc::FILE,
            format: *const $ch,
            ap: *mut std::ffi::c_void,
        ) -> std::ffi::c_int {
            unsafe { $through(ctx, ctx.real().$slot(), stream, format, ap) }
        }

        pub unsafe fn $vscanf_with(
            ctx: &$crate::hook_context::HookContext,
            format: *const $ch,
            ap: *mut std::ffi::c_void,
        ) -> std::ffi::c_int {
            unsafe { $vfscanf_with(ctx, ctx.stdin_stream(), format, ap) }
        }

        #[doc = concat!("Shadow of `", $scanf, "`.")]
        #[cfg_attr(not(debug_assertions), unsafe(export_name = $scanf))]
        pub unsafe extern "C" fn $scanf_fn(format: *const $ch, mut args: ...) -> std::ffi::c_int {
            unsafe {
                $vscanf_with(
                    $crate::hook_context::global(),
                    format,
                    (&mut args) as *mut _ as *mut std::ffi::c_void,
                )
            }
        }

        #[doc = concat!("Shadow of `", $fscanf, "`.")]
        #[cfg_attr(not(debug_assertions), unsafe(export_name = $fscanf))]
        pub unsafe extern "C" fn $fscanf_fn(
            stream: *mut libc::FILE,
            format: *const $ch,
            mut args: ...
        ) -> std::ffi::c_int {
            unsafe {
                $vfscanf_with(
                    $crate::hook_context::global(),
                    stream,
                    format,
                    (&mut args) as *mut _ as *mut std::ffi::c_void,
                )
            }
        }

        #[doc = concat!("Shadow of `", $vscanf, "`.")]
        #[cfg_attr(not(debug_assertions), unsafe(export_name = $vscanf))]
        pub unsafe extern "C" fn $vscanf_fn(
            format: *const $ch,
            ap: *mut std::ffi::c_void,
        ) -> std::ffi::c_int {
            unsafe { $vscanf_with($crate::hook_context::global(), format, ap) }
        }

        #[doc = concat!("Shadow of `", $vfscanf, "`.")]
        #[cfg_attr(not(debug_assertions), unsafe(export_name = $vfscanf))]
        pub unsafe extern "C" fn $vfscanf_fn(
            stream: *mut libc::FILE,
            format: *const $ch,
            ap: *mut std::ffi::c_void,
        ) -> std::ffi::c_int {
            unsafe { $vfscanf_with($crate::hook_context::global(), stream, format, ap) }
        }
    };
}

pub(crate) use scan_family;

scan_family! {
    char: c_char,
    through: scan_through,
    slot: vfscanf,
    scanf: "scanf" => scanf,
    fscanf: "fscanf" => fscanf,
    vscanf: "vscanf" => vscanf, vscanf_with,
    vfscanf: "vfscanf" => vfscanf, vfscanf_with,
}

// C99-conforming variants glibc redirects scanf to under -std=c99 and later.
scan_family! {
    char: c_char,
    through: scan_through,
    slot: isoc99_vfscanf,
    scanf: "__isoc99_scanf" => isoc99_scanf,
    fscanf: "__isoc99_fscanf" => isoc99_fscanf,
    vscanf: "__isoc99_vscanf" => isoc99_vscanf, isoc99_vscanf_with,
    vfscanf: "__isoc99_vfscanf" => isoc99_vfscanf, isoc99_vfscanf_with,
}

// glibc 2.38+ with C23 `%b` support.
scan_family! {
    char: c_char,
    through: scan_through,
    slot: isoc23_vfscanf,
    scanf: "__isoc23_scanf" => isoc23_scanf,
    fscanf: "__isoc23_fscanf" => isoc23_fscanf,
    vscanf: "__isoc23_vscanf" => isoc23_vscanf, isoc23_vscanf_with,
    vfscanf: "__isoc23_vfscanf" => isoc23_vfscanf, isoc23_vfscanf_with,
}
