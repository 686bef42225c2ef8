//! Drain-to-newline after a formatted scan.
//!
//! A scan stops at the first character that does not match its format and
//! leaves the rest of the line buffered. A controller that feeds input one
//! line per readiness signal would then see its next line land behind that
//! fragment, so the fragment is consumed and discarded here.
//!
//! The drain never reads past what the stream already holds. A scan such as
//! `%d%*c` consumes the newline itself, and the next line has not been
//! written yet: reading for it would block with no readiness signal sent.
//! Callers therefore pass the unit the scan consumed last and a source that
//! runs dry as soon as the read buffer is empty.

/// Narrow newline.
pub const NEWLINE: u32 = b'\n' as u32;
/// Wide newline, `L'\n'`.
pub const WIDE_NEWLINE: u32 = '\n' as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The scan consumed the terminator itself; nothing was read.
    AlreadyTerminated,
    /// The terminator was read; `discarded` excludes it.
    Terminator { discarded: usize },
    /// The buffer ran dry, or input ended, before a terminator.
    Dry { discarded: usize },
}

impl DrainOutcome {
    #[must_use]
    pub const fn discarded(self) -> usize {
        match self {
            Self::AlreadyTerminated => 0,
            Self::Terminator { discarded } | Self::Dry { discarded } => discarded,
        }
    }
}

/// Pull units from `next` until `terminator` or until `next` runs dry.
///
/// `last_consumed` is the unit just before the stream's read position, when
/// it is known. `next` returns `None` once nothing is buffered, at end of
/// input or on a read error; it must never block.
pub fn drain_line<F>(last_consumed: Option<u32>, mut next: F, terminator: u32) -> DrainOutcome
where
    F: FnMut() -> Option<u32>,
{
    if last_consumed == Some(terminator) {
        return DrainOutcome::AlreadyTerminated;
    }
    let mut discarded = 0usize;
    loop {
        match next() {
            Some(unit) if unit == terminator => return DrainOutcome::Terminator { discarded },
            Some(_) => discarded = discarded.saturating_add(1),
            None => return DrainOutcome::Dry { discarded },
        }
    }
}

/// Whether a scan's return value leaves anything worth draining.
///
/// A scan that returned `EOF` already hit end of input or an error; reading
/// again could block a second time on a terminal.
#[must_use]
pub const fn scan_result_allows_drain(result: i32, eof: i32) -> bool {
    result != eof
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(bytes: &'static [u8]) -> impl FnMut() -> Option<u32> {
        let mut iter = bytes.iter();
        move || iter.next().map(|b| u32::from(*b))
    }

    #[test]
    fn stops_after_first_newline() {
        let mut remaining: Vec<u8> = b" \nabc\n".to_vec();
        remaining.reverse();
        let outcome = drain_line(
            Some(u32::from(b'2')),
            || remaining.pop().map(u32::from),
            NEWLINE,
        );
        assert_eq!(outcome, DrainOutcome::Terminator { discarded: 1 });
        remaining.reverse();
        assert_eq!(remaining, b"abc\n");
    }

    #[test]
    fn immediate_newline_discards_nothing() {
        assert_eq!(
            drain_line(None, source(b"\nnext"), NEWLINE),
            DrainOutcome::Terminator { discarded: 0 }
        );
    }

    #[test]
    fn dry_source_without_terminator() {
        let outcome = drain_line(None, source(b"tail"), NEWLINE);
        assert_eq!(outcome, DrainOutcome::Dry { discarded: 4 });
        assert_eq!(outcome.discarded(), 4);
    }

    #[test]
    fn empty_buffer_is_dry() {
        assert_eq!(
            drain_line(None, source(b""), NEWLINE),
            DrainOutcome::Dry { discarded: 0 }
        );
    }

    #[test]
    fn consumed_terminator_reads_nothing() {
        let mut calls = 0;
        let outcome = drain_line(
            Some(NEWLINE),
            || {
                calls += 1;
                Some(u32::from(b'a'))
            },
            NEWLINE,
        );
        assert_eq!(outcome, DrainOutcome::AlreadyTerminated);
        assert_eq!(outcome.discarded(), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn unrelated_last_unit_still_drains() {
        assert_eq!(
            drain_line(Some(u32::from(b'x')), source(b"yz\nnext"), NEWLINE),
            DrainOutcome::Terminator { discarded: 2 }
        );
    }

    #[test]
    fn wide_units_use_wide_terminator() {
        let units = ['x' as u32, 0x00e9, 0x4e2d, WIDE_NEWLINE, 'y' as u32];
        let mut iter = units.into_iter();
        assert_eq!(
            drain_line(Some('w' as u32), || iter.next(), WIDE_NEWLINE),
            DrainOutcome::Terminator { discarded: 3 }
        );
        assert_eq!(iter.next(), Some('y' as u32));
    }

    #[test]
    fn eof_scan_result_skips_drain() {
        assert!(!scan_result_allows_drain(-1, -1));
        assert!(scan_result_allows_drain(0, -1));
        assert!(scan_result_allows_drain(2, -1));
    }
}
