//! Read-buffer inspection for glibc `FILE` streams.
//!
//! The post-scan drain may only consume what a stream already holds, so it
//! needs to see the stream's get area without reading. glibc declares the
//! leading members of `struct _IO_FILE` and `struct _IO_wide_data` in its
//! public `<bits/types/struct_FILE.h>`; the prefixes below mirror them. On
//! other libcs every query reports an empty buffer and the drain reads
//! nothing.

use libc::FILE;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod glibc {
    use std::ffi::{c_char, c_int, c_long, c_ushort, c_void};

    use libc::{FILE, wchar_t};

    /// Leading members of glibc's `struct _IO_FILE`, through `_wide_data`.
    #[allow(dead_code)]
    #[repr(C)]
    pub(super) struct IoFileHead {
        pub flags: c_int,
        pub read_ptr: *mut c_char,
        pub read_end: *mut c_char,
        pub read_base: *mut c_char,
        pub write_base: *mut c_char,
        pub write_ptr: *mut c_char,
        pub write_end: *mut c_char,
        pub buf_base: *mut c_char,
        pub buf_end: *mut c_char,
        pub save_base: *mut c_char,
        pub backup_base: *mut c_char,
        pub save_end: *mut c_char,
        pub markers: *mut c_void,
        pub chain: *mut c_void,
        pub fileno: c_int,
        pub flags2: c_int,
        pub old_offset: c_long,
        pub cur_column: c_ushort,
        pub vtable_offset: i8,
        pub shortbuf: [c_char; 1],
        pub lock: *mut c_void,
        pub offset: i64,
        pub codecvt: *mut c_void,
        pub wide_data: *mut IoWideHead,
    }

    /// Leading members of glibc's `struct _IO_wide_data`.
    #[allow(dead_code)]
    #[repr(C)]
    pub(super) struct IoWideHead {
        pub read_ptr: *mut wchar_t,
        pub read_end: *mut wchar_t,
        pub read_base: *mut wchar_t,
    }

    pub(super) unsafe fn head<'a>(stream: *mut FILE) -> Option<&'a IoFileHead> {
        // SAFETY: caller passes null or a live glibc FILE.
        unsafe { stream.cast::<IoFileHead>().as_ref() }
    }

    pub(super) unsafe fn wide_head<'a>(stream: *mut FILE) -> Option<&'a IoWideHead> {
        // SAFETY: `_wide_data` is null or points at the stream's wide area.
        unsafe { head(stream).and_then(|h| h.wide_data.as_ref()) }
    }
}

/// Holds the stream lock so the buffer cannot change between a peek and the
/// read that follows it.
pub struct StreamLock {
    stream: *mut FILE,
}

unsafe extern "C" {
    fn flockfile(stream: *mut FILE);
    fn funlockfile(stream: *mut FILE);
}

impl StreamLock {
    /// # Safety
    ///
    /// `stream` must be a live `FILE` for the lifetime of the guard.
    pub unsafe fn acquire(stream: *mut FILE) -> Self {
        // SAFETY: per the contract above; glibc stream locks are recursive.
        unsafe { flockfile(stream) };
        Self { stream }
    }
}

impl Drop for StreamLock {
    fn drop(&mut self) {
        // SAFETY: locked in `acquire`.
        unsafe { funlockfile(self.stream) };
    }
}

pub use imp::{has_buffered_bytes, has_buffered_wide, last_consumed_byte, last_consumed_wide};

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod imp {
    use libc::FILE;

    use super::glibc::{head, wide_head};

    /// True when the narrow get area still holds unread bytes.
    ///
    /// # Safety
    ///
    /// `stream` must be null or a live `FILE`.
    #[must_use]
    pub unsafe fn has_buffered_bytes(stream: *mut FILE) -> bool {
        // SAFETY: forwarded contract.
        unsafe { head(stream) }.is_some_and(|h| !h.read_ptr.is_null() && h.read_ptr < h.read_end)
    }

    /// The byte just before the narrow read position, if it is still in the
    /// get area.
    ///
    /// # Safety
    ///
    /// `stream` must be null or a live `FILE`.
    #[must_use]
    pub unsafe fn last_consumed_byte(stream: *mut FILE) -> Option<u8> {
        // SAFETY: forwarded contract.
        let h = unsafe { head(stream) }?;
        if h.read_base.is_null() || h.read_ptr <= h.read_base {
            return None;
        }
        // SAFETY: `read_base < read_ptr`, so `read_ptr - 1` is inside the area.
        Some(unsafe { *h.read_ptr.sub(1) } as u8)
    }

    /// True when the wide get area still holds unread units.
    ///
    /// Bytes still waiting in the narrow buffer are not counted: converting
    /// them could stop on an incomplete multibyte sequence and block.
    ///
    /// # Safety
    ///
    /// `stream` must be null or a live `FILE`.
    #[must_use]
    pub unsafe fn has_buffered_wide(stream: *mut FILE) -> bool {
        // SAFETY: forwarded contract.
        unsafe { wide_head(stream) }
            .is_some_and(|w| !w.read_ptr.is_null() && w.read_ptr < w.read_end)
    }

    /// Wide counterpart of [`last_consumed_byte`].
    ///
    /// # Safety
    ///
    /// `stream` must be null or a live `FILE`.
    #[must_use]
    pub unsafe fn last_consumed_wide(stream: *mut FILE) -> Option<u32> {
        // SAFETY: forwarded contract.
        let w = unsafe { wide_head(stream) }?;
        if w.read_base.is_null() || w.read_ptr <= w.read_base {
            return None;
        }
        // SAFETY: `read_base < read_ptr`.
        Some(unsafe { *w.read_ptr.sub(1) } as u32)
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
mod imp {
    #![allow(clippy::missing_safety_doc)]

    use libc::FILE;

    pub unsafe fn has_buffered_bytes(_stream: *mut FILE) -> bool {
        false
    }

    pub unsafe fn last_consumed_byte(_stream: *mut FILE) -> Option<u8> {
        None
    }

    pub unsafe fn has_buffered_wide(_stream: *mut FILE) -> bool {
        false
    }

    pub unsafe fn last_consumed_wide(_stream: *mut FILE) -> Option<u32> {
        None
    }
}
