//! Thread-local errno access for code that must leave errno as it found it.

use std::ffi::c_int;

#[inline]
pub fn abi_errno() -> c_int {
    // SAFETY: `__errno_location` returns this thread's errno slot.
    unsafe { *libc::__errno_location() }
}

#[inline]
pub fn set_abi_errno(val: c_int) {
    // SAFETY: errno pointer is valid for writes on this thread.
    unsafe { *libc::__errno_location() = val };
}

/// Run `f` and restore errno to its value on entry.
#[inline]
pub fn preserving_errno<T>(f: impl FnOnce() -> T) -> T {
    let saved = abi_errno();
    let out = f();
    set_abi_errno(saved);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_is_restored_after_closure_clobbers_it() {
        set_abi_errno(libc::EAGAIN);
        let value = preserving_errno(|| {
            set_abi_errno(libc::EBADF);
            7
        });
        assert_eq!(value, 7);
        assert_eq!(abi_errno(), libc::EAGAIN);
    }
}
