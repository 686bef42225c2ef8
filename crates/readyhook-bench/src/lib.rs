//! Fixtures and reporting shared by the readyhook benchmarks.

use std::ffi::{c_int, c_short};
use std::time::Duration;

use libc::FILE;
use readyhook_abi::{HookContext, StartupInputs, WatchedStream};
use readyhook_core::stream_kind::S_IFIFO;
use readyhook_core::{ChannelSetting, ChannelSpec, HookConfig, LogLevel};

/// Per-sample timings of one shadow, with the readiness signals it sent.
#[derive(Default)]
pub struct ShadowStats {
    ns_per_call: Vec<f64>,
    calls: u64,
    signals_sent: u64,
    signals_failed: u64,
}

impl ShadowStats {
    /// Record one criterion sample of `calls` shadow calls.
    ///
    /// `signals` is the change in the context's sent/failed counters over
    /// the sample; pass `(0, 0)` for unshadowed baselines.
    pub fn record(&mut self, calls: u64, elapsed: Duration, signals: (u64, u64)) {
        self.calls = self.calls.saturating_add(calls);
        self.signals_sent = self.signals_sent.saturating_add(signals.0);
        self.signals_failed = self.signals_failed.saturating_add(signals.1);
        self.ns_per_call
            .push(elapsed.as_nanos() as f64 / calls.max(1) as f64);
    }

    /// Print one `READYHOOK_BENCH` line: median and tail latency per call,
    /// and how many signals each call produced.
    pub fn report(&self, label: &str) {
        if self.ns_per_call.is_empty() {
            return;
        }
        let mut sorted = self.ns_per_call.clone();
        sorted.sort_by(f64::total_cmp);
        let per_call = |count: u64| count as f64 / self.calls.max(1) as f64;
        println!(
            "READYHOOK_BENCH shadow={label} samples={} calls={} p50_ns_call={:.2} p99_ns_call={:.2} signals_per_call={:.4} failed_per_call={:.4}",
            sorted.len(),
            self.calls,
            quantile(&sorted, 0.50),
            quantile(&sorted, 0.99),
            per_call(self.signals_sent),
            per_call(self.signals_failed),
        );
    }
}

/// Nearest-rank quantile of an ascending slice; `0.0` when empty.
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let rank = (q.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(last)]
}

/// Counter deltas of `ctx` across `f`.
pub fn signal_delta<R>(ctx: &HookContext, f: impl FnOnce() -> R) -> (R, (u64, u64)) {
    let (sent, failed) = (ctx.signals_sent(), ctx.signals_failed());
    let out = f();
    (
        out,
        (ctx.signals_sent() - sent, ctx.signals_failed() - failed),
    )
}

/// A temporary file of `len` bytes (`'x'` with a newline every 64) opened for reading.
pub struct ByteStream {
    pub file: *mut FILE,
    pub len: usize,
}

impl ByteStream {
    pub fn new(len: usize) -> Self {
        let bytes: Vec<u8> = (0..len)
            .map(|i| if i % 64 == 63 { b'\n' } else { b'x' })
            .collect();
        // SAFETY: tmpfile returns an owned stream, closed on drop.
        let file = unsafe { libc::tmpfile() };
        assert!(!file.is_null(), "tmpfile failed");
        // SAFETY: `file` is open for update.
        unsafe {
            libc::fwrite(bytes.as_ptr().cast(), 1, bytes.len(), file);
            libc::rewind(file);
        }
        Self { file, len }
    }

    pub fn rewind(&self) {
        // SAFETY: `file` is live.
        unsafe { libc::rewind(self.file) };
    }
}

impl Drop for ByteStream {
    fn drop(&mut self) {
        // SAFETY: closed exactly once.
        unsafe { libc::fclose(self.file) };
    }
}

/// A System V semaphore the benchmarks post to, drained between batches.
pub struct BenchSemaphore {
    pub semid: c_int,
    pub key: i32,
}

impl BenchSemaphore {
    pub fn create() -> Option<Self> {
        let key = 0x5b00_0000 | (std::process::id() as i32 & 0x00ff_ffff);
        // SAFETY: plain syscall wrapper.
        let semid = unsafe { libc::semget(key, 1, libc::IPC_CREAT | libc::IPC_EXCL | 0o600) };
        (semid >= 0).then_some(Self { semid, key })
    }

    pub fn setting(&self) -> ChannelSetting {
        ChannelSetting::Configured(ChannelSpec::Semaphore { key: self.key })
    }

    /// Take back every posted unit so the count stays under `SEMVMX`.
    pub fn drain(&self) {
        // SAFETY: GETVAL takes no fourth argument.
        let value = unsafe { libc::semctl(self.semid, 0, libc::GETVAL) };
        if value <= 0 {
            return;
        }
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: -(value as c_short),
            sem_flg: libc::IPC_NOWAIT as c_short,
        };
        // SAFETY: `op` is one valid sembuf.
        unsafe { libc::semop(self.semid, &mut op, 1) };
    }
}

impl Drop for BenchSemaphore {
    fn drop(&mut self) {
        // SAFETY: IPC_RMID takes no fourth argument.
        unsafe { libc::semctl(self.semid, 0, libc::IPC_RMID) };
    }
}

/// A context that treats `watched` as pipe-backed stdin.
pub fn bench_context(channel: ChannelSetting, watched: *mut FILE) -> HookContext {
    HookContext::initialize(StartupInputs {
        stdin_mode: Some(S_IFIFO),
        config: HookConfig {
            channel,
            log_level: LogLevel::Off,
        },
        watched: WatchedStream::fixed(watched),
        unbuffer_stdout: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_uses_nearest_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.5), 2.0);
        assert_eq!(quantile(&sorted, 0.99), 4.0);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn disabled_context_sends_no_signals() {
        let stream = ByteStream::new(8);
        let ctx = bench_context(ChannelSetting::Absent, stream.file);
        let (_, delta) = signal_delta(&ctx, || {
            // SAFETY: `stream.file` is live.
            unsafe { readyhook_abi::input_abi::fgetc_with(&ctx, stream.file) }
        });
        assert_eq!(delta, (0, 0));
    }

    #[test]
    fn signalling_context_counts_one_signal_per_call() {
        let Some(sem) = BenchSemaphore::create() else {
            return;
        };
        let stream = ByteStream::new(8);
        let ctx = bench_context(sem.setting(), stream.file);
        let (_, delta) = signal_delta(&ctx, || {
            for _ in 0..3 {
                // SAFETY: `stream.file` is live.
                unsafe { readyhook_abi::input_abi::fgetc_with(&ctx, stream.file) };
            }
        });
        assert_eq!(delta, (3, 0));

        let mut stats = ShadowStats::default();
        stats.record(3, Duration::from_nanos(300), delta);
        assert_eq!(stats.signals_sent, 3);
        assert_eq!(stats.calls, 3);

        sem.drain();
        // SAFETY: GETVAL takes no fourth argument.
        assert_eq!(unsafe { libc::semctl(sem.semid, 0, libc::GETVAL) }, 0);
    }
}
