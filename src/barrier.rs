//! The many-operations/one-growth gate shared by [`Queue`](crate::Queue) and
//! [`HashMap`](crate::HashMap).

use std::fmt;
use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// How long a waiter sleeps between polls once spinning has stopped paying off.
pub const DEFAULT_SPIN_DELAY: Duration = Duration::from_micros(1);

/// Number of doubling spin rounds before a waiter starts sleeping.
const SPIN_LIMIT: u32 = 6;

static NCPU_INITIALIZER: Once = Once::new();
static NCPU: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn num_cpus() -> usize {
    NCPU_INITIALIZER.call_once(|| NCPU.store(num_cpus::get_physical(), Ordering::Relaxed));
    NCPU.load(Ordering::Relaxed)
}

/// Poll-and-retry pacing for every wait loop in the crate.
///
/// Spinning only helps when another core can make progress in the meantime, so on a single-CPU
/// machine we go straight to sleeping.
#[derive(Debug)]
pub(crate) struct Backoff {
    step: u32,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { step: 0, delay }
    }

    pub(crate) fn snooze(&mut self) {
        if self.step < SPIN_LIMIT && num_cpus() > 1 {
            for _ in 0..1 << self.step {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::sleep(self.delay);
        }
    }
}

/// A parity-gated reader count that lets any number of regular operations run side by side while
/// serializing the rare structural growth against all of them.
///
/// The counter holds twice the number of active [`SharedSection`]s. An odd value means a growth
/// has been announced (or is running) and no new shared section may start until it finishes.
///
/// Waiters poll with a short sleep rather than parking. Acquiring a shared section while no
/// growth is pending is a single compare-and-swap. There is no fairness: a grower can be starved
/// by a constant stream of shared sections.
///
/// A thread must never call [`GrowthBarrier::exclusive`] while it holds a [`SharedSection`] of the
/// same barrier; the growth would wait for that section forever.
pub struct GrowthBarrier {
    state: AtomicUsize,
    spin_delay: Duration,
}

impl fmt::Debug for GrowthBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowthBarrier")
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("spin_delay", &self.spin_delay)
            .finish()
    }
}

impl Default for GrowthBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl GrowthBarrier {
    /// Creates a barrier that polls every [`DEFAULT_SPIN_DELAY`] while waiting.
    pub fn new() -> Self {
        Self::with_spin_delay(DEFAULT_SPIN_DELAY)
    }

    /// Creates a barrier that sleeps for `spin_delay` between polls while waiting.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratchet::GrowthBarrier;
    /// use std::time::Duration;
    ///
    /// let barrier = GrowthBarrier::with_spin_delay(Duration::from_micros(50));
    /// let _section = barrier.shared();
    /// assert_eq!(barrier.active_sections(), 1);
    /// ```
    pub fn with_spin_delay(spin_delay: Duration) -> Self {
        Self {
            state: AtomicUsize::new(0),
            spin_delay,
        }
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::new(self.spin_delay)
    }

    /// Enters a shared section, waiting while a growth is announced or running.
    ///
    /// The section ends when the returned guard is dropped.
    pub fn shared(&self) -> SharedSection<'_> {
        let mut backoff = self.backoff();
        let mut was = self.state.load(Ordering::Acquire);
        loop {
            while was % 2 == 1 {
                backoff.snooze();
                was = self.state.load(Ordering::Acquire);
            }
            match self.state.compare_exchange_weak(
                was,
                was + 2,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(now) => was = now,
            }
        }
        SharedSection { barrier: self }
    }

    /// Runs `grow` once every shared section acquired before the call has been released.
    ///
    /// If another thread's growth is already announced, this waits for it to finish and returns
    /// `None` without running `grow`: callers re-check whether they still need to grow.
    pub fn exclusive<F, R>(&self, grow: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let mut backoff = self.backoff();
        let mut was = self.state.load(Ordering::Acquire);
        loop {
            if was % 2 == 1 {
                trace!("growth already announced; waiting for it to finish");
                while self.state.load(Ordering::Acquire) % 2 == 1 {
                    backoff.snooze();
                }
                return None;
            }
            match self.state.compare_exchange_weak(
                was,
                was + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(now) => was = now,
            }
        }
        trace!(shared = was / 2, "growth announced; draining shared sections");

        // reset the counter even if `grow` unwinds, otherwise every later operation would spin
        let section = ExclusiveSection { barrier: self };
        while self.state.load(Ordering::Acquire) != 1 {
            backoff.snooze();
        }
        let result = grow();
        drop(section);
        Some(result)
    }

    /// Number of shared sections currently held.
    pub fn active_sections(&self) -> usize {
        self.state.load(Ordering::Acquire) / 2
    }

    /// Returns `true` while a growth is announced or running.
    pub fn is_growing(&self) -> bool {
        self.state.load(Ordering::Acquire) % 2 == 1
    }
}

/// Proof that a [`GrowthBarrier`] shared section is held. Releases it on drop.
#[must_use = "the shared section ends as soon as the guard is dropped"]
pub struct SharedSection<'b> {
    barrier: &'b GrowthBarrier,
}

impl fmt::Debug for SharedSection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSection").finish_non_exhaustive()
    }
}

impl Drop for SharedSection<'_> {
    fn drop(&mut self) {
        self.barrier.state.fetch_sub(2, Ordering::Release);
    }
}

struct ExclusiveSection<'b> {
    barrier: &'b GrowthBarrier,
}

impl Drop for ExclusiveSection<'_> {
    fn drop(&mut self) {
        self.barrier.state.store(0, Ordering::Release);
        trace!("growth finished");
    }
}
