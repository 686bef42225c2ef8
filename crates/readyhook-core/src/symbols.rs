//! The real input functions the shadows delegate to.
//!
//! Each entry is resolved once with `dlsym(RTLD_NEXT, name)`. `Required`
//! symbols exist on every glibc this layer targets; `Optional` ones depend on
//! the glibc version or on a libc that ships C11 Annex K.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Required,
    Optional,
}

macro_rules! real_symbols {
    ($($variant:ident => $name:literal, $avail:ident;)*) => {
        /// Logical real function, one per slot of the real-function table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RealSymbol {
            $($variant,)*
        }

        impl RealSymbol {
            pub const ALL: &'static [RealSymbol] = &[$(RealSymbol::$variant,)*];
            pub const COUNT: usize = Self::ALL.len();

            /// Exported C symbol name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(RealSymbol::$variant => $name,)*
                }
            }

            /// NUL-terminated form of [`Self::name`] for `dlsym`.
            #[must_use]
            pub const fn c_name(self) -> &'static std::ffi::CStr {
                match self {
                    $(RealSymbol::$variant => {
                        match std::ffi::CStr::from_bytes_with_nul(concat!($name, "\0").as_bytes()) {
                            Ok(name) => name,
                            Err(_) => panic!("symbol name contains NUL"),
                        }
                    })*
                }
            }

            #[must_use]
            pub const fn availability(self) -> Availability {
                match self {
                    $(RealSymbol::$variant => Availability::$avail,)*
                }
            }
        }
    };
}

real_symbols! {
    Fgetc => "fgetc", Required;
    Getc => "getc", Required;
    IoGetc => "_IO_getc", Optional;
    Getchar => "getchar", Required;
    FgetcUnlocked => "fgetc_unlocked", Required;
    GetcUnlocked => "getc_unlocked", Required;
    GetcharUnlocked => "getchar_unlocked", Required;
    Uflow => "__uflow", Required;
    Fgets => "fgets", Required;
    FgetsUnlocked => "fgets_unlocked", Required;
    FgetsChk => "__fgets_chk", Required;
    FgetsUnlockedChk => "__fgets_unlocked_chk", Required;
    Gets => "gets", Optional;
    GetsChk => "__gets_chk", Required;
    Getline => "getline", Required;
    Getdelim => "getdelim", Required;
    IoGetdelim => "__getdelim", Required;
    Vfscanf => "vfscanf", Required;
    Isoc99Vfscanf => "__isoc99_vfscanf", Required;
    Isoc23Vfscanf => "__isoc23_vfscanf", Optional;
    Fgetwc => "fgetwc", Required;
    Getwc => "getwc", Required;
    Getwchar => "getwchar", Required;
    Fgetws => "fgetws", Required;
    FgetwsChk => "__fgetws_chk", Required;
    Vfwscanf => "vfwscanf", Required;
    Isoc99Vfwscanf => "__isoc99_vfwscanf", Required;
    Isoc23Vfwscanf => "__isoc23_vfwscanf", Optional;
    GetsS => "gets_s", Optional;
    VfscanfS => "vfscanf_s", Optional;
}

impl RealSymbol {
    /// Position of this symbol's slot in the real-function table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Annex K symbols are only resolved when that surface is compiled in.
    #[must_use]
    pub const fn is_annex_k(self) -> bool {
        matches!(self, Self::GetsS | Self::VfscanfS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = RealSymbol::ALL.iter().map(|sym| sym.name()).collect();
        assert_eq!(names.len(), RealSymbol::COUNT);
    }

    #[test]
    fn c_names_match_names() {
        for sym in RealSymbol::ALL {
            assert_eq!(sym.c_name().to_str().unwrap(), sym.name());
        }
    }

    #[test]
    fn index_is_position_in_table() {
        for (idx, sym) in RealSymbol::ALL.iter().enumerate() {
            assert_eq!(sym.index(), idx);
        }
    }

    #[test]
    fn version_dependent_symbols_are_optional() {
        assert_eq!(RealSymbol::Isoc23Vfscanf.availability(), Availability::Optional);
        assert_eq!(RealSymbol::Gets.availability(), Availability::Optional);
        assert_eq!(RealSymbol::Fgets.availability(), Availability::Required);
        assert!(
            RealSymbol::ALL
                .iter()
                .filter(|sym| sym.is_annex_k())
                .all(|sym| sym.availability() == Availability::Optional)
        );
    }
}
