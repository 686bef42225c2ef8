//! Table of the genuine input functions, resolved once with `RTLD_NEXT`.

use std::ffi::{c_char, c_int, c_void};

use libc::{FILE, size_t, ssize_t, wchar_t};
use readyhook_core::{Availability, RealSymbol};

/// glibc `wint_t` (`unsigned int`).
#[allow(non_camel_case_types)]
pub type wint_t = std::ffi::c_uint;

pub type StreamCharFn = unsafe extern "C" fn(*mut FILE) -> c_int;
pub type StdinCharFn = unsafe extern "C" fn() -> c_int;
pub type LineFn = unsafe extern "C" fn(*mut c_char, c_int, *mut FILE) -> *mut c_char;
pub type LineChkFn = unsafe extern "C" fn(*mut c_char, size_t, c_int, *mut FILE) -> *mut c_char;
pub type GetsFn = unsafe extern "C" fn(*mut c_char) -> *mut c_char;
pub type GetsChkFn = unsafe extern "C" fn(*mut c_char, size_t) -> *mut c_char;
pub type GetlineFn = unsafe extern "C" fn(*mut *mut c_char, *mut size_t, *mut FILE) -> ssize_t;
pub type GetdelimFn =
    unsafe extern "C" fn(*mut *mut c_char, *mut size_t, c_int, *mut FILE) -> ssize_t;
pub type ScanFn = unsafe extern "C" fn(*mut FILE, *const c_char, *mut c_void) -> c_int;
pub type WideCharFn = unsafe extern "C" fn(*mut FILE) -> wint_t;
pub type WideStdinCharFn = unsafe extern "C" fn() -> wint_t;
pub type WideLineFn = unsafe extern "C" fn(*mut wchar_t, c_int, *mut FILE) -> *mut wchar_t;
pub type WideLineChkFn =
    unsafe extern "C" fn(*mut wchar_t, size_t, c_int, *mut FILE) -> *mut wchar_t;
pub type WideScanFn = unsafe extern "C" fn(*mut FILE, *const wchar_t, *mut c_void) -> c_int;

/// One address per [`RealSymbol`]; zero means unresolved.
#[derive(Clone, PartialEq, Eq)]
pub struct RealFunctions {
    addrs: [usize; RealSymbol::COUNT],
}

impl std::fmt::Debug for RealFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFunctions")
            .field("resolved", &(RealSymbol::COUNT - self.missing().count()))
            .field("missing", &self.missing().map(RealSymbol::name).collect::<Vec<_>>())
            .finish()
    }
}

#[must_use]
pub const fn symbol_enabled(sym: RealSymbol) -> bool {
    !sym.is_annex_k() || cfg!(feature = "annex-k")
}

impl RealFunctions {
    /// Resolve every enabled symbol in the next object after this one.
    #[must_use]
    pub fn resolve() -> Self {
        // SAFETY: dlsym is given NUL-terminated names; the resulting addresses
        // are libc's own functions with the signatures named in this module.
        unsafe {
            Self::from_lookup(|sym| libc::dlsym(libc::RTLD_NEXT, sym.c_name().as_ptr()))
        }
    }

    /// Build a table from an arbitrary lookup.
    ///
    /// # Safety
    ///
    /// Every non-null address returned for a symbol must be a function with
    /// that symbol's C signature.
    pub unsafe fn from_lookup(mut lookup: impl FnMut(RealSymbol) -> *mut c_void) -> Self {
        let mut addrs = [0usize; RealSymbol::COUNT];
        for &sym in RealSymbol::ALL {
            if symbol_enabled(sym) {
                addrs[sym.index()] = lookup(sym) as usize;
            }
        }
        Self { addrs }
    }

    #[must_use]
    pub fn address(&self, sym: RealSymbol) -> Option<usize> {
        match self.addrs[sym.index()] {
            0 => None,
            addr => Some(addr),
        }
    }

    /// Enabled symbols that did not resolve.
    pub fn missing(&self) -> impl Iterator<Item = RealSymbol> + '_ {
        RealSymbol::ALL
            .iter()
            .copied()
            .filter(|sym| symbol_enabled(*sym) && self.address(*sym).is_none())
    }

    pub fn missing_with(&self, availability: Availability) -> impl Iterator<Item = RealSymbol> + '_ {
        self.missing()
            .filter(move |sym| sym.availability() == availability)
    }

    /// # Safety
    ///
    /// `F` must be the function pointer type matching `sym`.
    unsafe fn typed<F: Copy>(&self, sym: RealSymbol) -> Option<F> {
        debug_assert_eq!(size_of::<F>(), size_of::<usize>());
        let addr = self.address(sym)?;
        // SAFETY: caller guarantees `F` is the fn pointer type for `sym`.
        Some(unsafe { std::mem::transmute_copy::<usize, F>(&addr) })
    }
}

macro_rules! typed_slots {
    ($($method:ident: $sym:ident => $ty:ty;)*) => {
        impl RealFunctions {
            $(
                #[inline]
                #[must_use]
                pub fn $method(&self) -> Option<$ty> {
                    // SAFETY: the slot/type pairing for each symbol is fixed here.
                    unsafe { self.typed(RealSymbol::$sym) }
                }
            )*
        }
    };
}

typed_slots! {
    fgetc: Fgetc => StreamCharFn;
    getc: Getc => StreamCharFn;
    io_getc: IoGetc => StreamCharFn;
    getchar: Getchar => StdinCharFn;
    fgetc_unlocked: FgetcUnlocked => StreamCharFn;
    getc_unlocked: GetcUnlocked => StreamCharFn;
    getchar_unlocked: GetcharUnlocked => StdinCharFn;
    uflow: Uflow => StreamCharFn;
    fgets: Fgets => LineFn;
    fgets_unlocked: FgetsUnlocked => LineFn;
    fgets_chk: FgetsChk => LineChkFn;
    fgets_unlocked_chk: FgetsUnlockedChk => LineChkFn;
    gets: Gets => GetsFn;
    gets_chk: GetsChk => GetsChkFn;
    getline: Getline => GetlineFn;
    getdelim: Getdelim => GetdelimFn;
    io_getdelim: IoGetdelim => GetdelimFn;
    vfscanf: Vfscanf => ScanFn;
    isoc99_vfscanf: Isoc99Vfscanf => ScanFn;
    isoc23_vfscanf: Isoc23Vfscanf => ScanFn;
    fgetwc: Fgetwc => WideCharFn;
    getwc: Getwc => WideCharFn;
    getwchar: Getwchar => WideStdinCharFn;
    fgetws: Fgetws => WideLineFn;
    fgetws_chk: FgetwsChk => WideLineChkFn;
    vfwscanf: Vfwscanf => WideScanFn;
    isoc99_vfwscanf: Isoc99Vfwscanf => WideScanFn;
    isoc23_vfwscanf: Isoc23Vfwscanf => WideScanFn;
    gets_s: GetsS => GetsChkFn;
    vfscanf_s: VfscanfS => ScanFn;
}
