//! Runtime measurement
//!
//! A [`ThreadTimer`] brackets one matcher call and reports wall time plus
//! per-thread CPU and user time, so concurrent workers do not inflate each
//! other's measurements. Samples accumulate across repetitions and are
//! divided by the repetition count (rounded to nearest) on the final one.

use std::time::Instant;

/// Nanosecond runtime counters for one matcher call or an accumulation of
/// calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeSample {
    pub cpu_nanos: u64,
    pub user_nanos: u64,
    pub wall_nanos: u64,
}

impl RuntimeSample {
    pub fn accumulate(&mut self, other: RuntimeSample) {
        self.cpu_nanos += other.cpu_nanos;
        self.user_nanos += other.user_nanos;
        self.wall_nanos += other.wall_nanos;
    }

    /// Mean over `repetitions`, each field rounded to the nearest integer.
    pub fn mean(self, repetitions: u32) -> RuntimeSample {
        let n = u64::from(repetitions.max(1));
        let round = |sum: u64| (sum + n / 2) / n;
        RuntimeSample {
            cpu_nanos: round(self.cpu_nanos),
            user_nanos: round(self.user_nanos),
            wall_nanos: round(self.wall_nanos),
        }
    }
}

/// Per-thread CPU time since an unspecified start point.
#[cfg(unix)]
fn thread_cpu_nanos() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // safe: ts is a valid out pointer for the duration of the call
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return 0;
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

#[cfg(not(unix))]
fn thread_cpu_nanos() -> u64 {
    0
}

/// Per-thread user-mode CPU time.
#[cfg(target_os = "linux")]
fn thread_user_nanos() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_THREAD, &mut usage) };
    if rc != 0 {
        return 0;
    }
    usage.ru_utime.tv_sec as u64 * 1_000_000_000 + usage.ru_utime.tv_usec as u64 * 1_000
}

#[cfg(not(target_os = "linux"))]
fn thread_user_nanos() -> u64 {
    0
}

/// Snapshot of the current thread's clocks; `elapsed` yields the sample
/// since construction.
#[derive(Debug)]
pub struct ThreadTimer {
    wall: Instant,
    cpu_nanos: u64,
    user_nanos: u64,
}

impl ThreadTimer {
    pub fn start() -> Self {
        Self {
            wall: Instant::now(),
            cpu_nanos: thread_cpu_nanos(),
            user_nanos: thread_user_nanos(),
        }
    }

    pub fn elapsed(&self) -> RuntimeSample {
        RuntimeSample {
            cpu_nanos: thread_cpu_nanos().saturating_sub(self.cpu_nanos),
            user_nanos: thread_user_nanos().saturating_sub(self.user_nanos),
            wall_nanos: self.wall.elapsed().as_nanos() as u64,
        }
    }
}
