//! C11 Annex K bounds-checked readers, for libcs that provide them.
//!
//! These signal and drain exactly like their unchecked counterparts.

use std::ffi::c_char;
use std::ptr;

use libc::size_t;

use crate::hook_context::{HookContext, global, unresolved};
use crate::scan_abi::{scan_family, scan_through};

pub unsafe fn gets_s_with(ctx: &HookContext, buf: *mut c_char, n: size_t) -> *mut c_char {
    let Some(real) = ctx.real().gets_s() else {
        return unresolved(ptr::null_mut());
    };
    ctx.before_stdin_read();
    unsafe { real(buf, n) }
}

#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn gets_s(buf: *mut c_char, n: size_t) -> *mut c_char {
    unsafe { gets_s_with(global(), buf, n) }
}

scan_family! {
    char: c_char,
    through: scan_through,
    slot: vfscanf_s,
    scanf: "scanf_s" => scanf_s,
    fscanf: "fscanf_s" => fscanf_s,
    vscanf: "vscanf_s" => vscanf_s, vscanf_s_with,
    vfscanf: "vfscanf_s" => vfscanf_s, vfscanf_s_with,
}
