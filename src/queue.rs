use crate::barrier::GrowthBarrier;
use crate::holder::{Holder, Published};
use crate::{Error, Result, DEFAULT_CAPACITY};
use parking_lot::Mutex;
use std::fmt::{self, Debug, Formatter};
use std::iter::FromIterator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Number of slots that must stay free between the write reservation and the released cursor.
/// A push that would leave fewer doubles the ring first.
const FREE_MARGIN: usize = 2;

/// The smallest ring that can hold an element while keeping [`FREE_MARGIN`] slots free.
const MINIMUM_CAPACITY: usize = FREE_MARGIN + 1;

type Slot<T> = Mutex<Option<T>>;

/// A multi-producer, multi-consumer FIFO queue that is bounded until it fills up, and then grows.
///
/// The queue is a ring buffer with four cursors:
///
/// ```text
///   released <= unread <= written <= end
/// ```
///
/// The cursors only ever count up between two growths, and a slot is addressed by its cursor
/// modulo the ring's capacity. A cursor value that a thread read before the ring wrapped around
/// therefore never matches again, and its compare-and-swap fails.
///
/// `released` is where fully read slots end, `unread` is the next slot a reader will reserve,
/// `written` is where values visible to readers end and `end` is the next slot a writer will
/// reserve. Writers reserve slots out of order but commit them in reservation order, and readers
/// do the same on their side, which is what makes the queue FIFO across threads.
///
/// Every operation runs inside a [`GrowthBarrier`] shared section. When a push would bring `end`
/// within two slots of `released`, the pusher leaves its section and doubles the ring under the
/// barrier's exclusive section before retrying. The queue never shrinks.
///
/// # Examples
///
/// ```
/// use ratchet::Queue;
///
/// let queue = Queue::with_capacity(10);
/// for i in 0..11 {
///     queue.push(i);
/// }
/// assert_eq!(queue.capacity(), 20);
/// for i in 0..11 {
///     assert_eq!(queue.pop(), Ok(i));
/// }
/// assert!(queue.pop().is_err());
/// ```
pub struct Queue<T> {
    data: Published<Slot<T>>,

    /// Where slots whose read has completed end.
    released: AtomicUsize,

    /// The next slot to be reserved for reading.
    unread: AtomicUsize,

    /// Where slots visible to readers end.
    written: AtomicUsize,

    /// The next slot to be reserved for writing.
    end: AtomicUsize,

    barrier: GrowthBarrier,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    /// Creates an empty queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty queue backed by a ring of `capacity` slots.
    ///
    /// The ring keeps two slots free, so at most `capacity - 2` values fit before the first
    /// growth. Capacities below three are raised to three.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Holder::publish(capacity.max(MINIMUM_CAPACITY)),
            released: AtomicUsize::new(0),
            unread: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
            end: AtomicUsize::new(0),
            barrier: GrowthBarrier::new(),
        }
    }

    /// Replaces the [`GrowthBarrier`] that coordinates this queue's growth.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratchet::{GrowthBarrier, Queue};
    /// use std::time::Duration;
    ///
    /// let queue = Queue::with_capacity(16)
    ///     .with_barrier(GrowthBarrier::with_spin_delay(Duration::from_micros(10)));
    /// queue.push(1);
    /// assert_eq!(queue.pop(), Ok(1));
    /// ```
    pub fn with_barrier(mut self, barrier: GrowthBarrier) -> Self {
        self.barrier = barrier;
        self
    }

    /// Appends `value` to the back of the queue, growing the ring first if it is nearly full.
    pub fn push(&self, value: T) {
        loop {
            let section = self.barrier.shared();
            let data = self.data.load_full();
            let capacity = data.capacity();

            let mut pos = self.end.load(Ordering::Acquire);
            let reserved = loop {
                let released = self.released.load(Ordering::Acquire);
                // a stale `pos` can trail `released`; its CAS below fails
                if pos.saturating_sub(released) + FREE_MARGIN >= capacity {
                    break None;
                }
                let next = pos + 1;
                match self.end.compare_exchange_weak(
                    pos,
                    next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break Some(next),
                    Err(now) => pos = now,
                }
            };

            let Some(next) = reserved else {
                drop(section);
                self.grow(capacity);
                continue;
            };

            // the slot is ours alone until `written` moves past it
            *data[pos % capacity].lock() = Some(value);

            let mut backoff = self.barrier.backoff();
            while self
                .written
                .compare_exchange_weak(pos, next, Ordering::Release, Ordering::Relaxed)
                .is_err()
            {
                backoff.snooze();
            }
            return;
        }
    }

    /// Removes the value at the front of the queue.
    ///
    /// Returns [`Error::QueueEmpty`] if no committed value is available. A value whose push is
    /// still in flight does not count until its writer commits it.
    pub fn pop(&self) -> Result<T> {
        let _section = self.barrier.shared();
        let data = self.data.load_full();
        let capacity = data.capacity();

        let mut pos = self.unread.load(Ordering::Acquire);
        let next = loop {
            if pos >= self.written.load(Ordering::Acquire) {
                return Err(Error::QueueEmpty);
            }
            let next = pos + 1;
            match self
                .unread
                .compare_exchange_weak(pos, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break next,
                Err(now) => pos = now,
            }
        };

        let value = data[pos % capacity].lock().take();

        let mut backoff = self.barrier.backoff();
        while self
            .released
            .compare_exchange_weak(pos, next, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        value.ok_or(Error::QueueEmpty)
    }

    /// Returns the number of committed values that have not been reserved by a reader.
    pub fn len(&self) -> usize {
        let _section = self.barrier.shared();
        let unread = self.unread.load(Ordering::Acquire);
        self.written.load(Ordering::Acquire).saturating_sub(unread)
    }

    /// Returns `true` if [`len`](Queue::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the current ring.
    pub fn capacity(&self) -> usize {
        self.data.load().capacity()
    }

    /// Doubles the ring, unless someone else already grew it past `observed`.
    fn grow(&self, observed: usize) {
        self.barrier.exclusive(|| {
            let old = self.data.load_full();
            let capacity = old.capacity();
            if capacity != observed {
                return;
            }

            // no shared section is open, so every reservation has been committed or released
            let start = self.released.load(Ordering::Relaxed);
            let len = self.end.load(Ordering::Relaxed) - start;
            let data = Holder::<Slot<T>>::new(capacity * 2);
            for i in 0..len {
                *data[i].lock() = old[(start + i) % capacity].lock().take();
            }

            self.released.store(0, Ordering::Relaxed);
            self.unread.store(0, Ordering::Relaxed);
            self.written.store(len, Ordering::Relaxed);
            self.end.store(len, Ordering::Relaxed);
            self.data.store(Arc::new(data));
            debug!(from = capacity, to = capacity * 2, len, "grew queue");
        });
    }

    /// Calls `f` with every committed value, front to back, while holding a shared section.
    ///
    /// Values popped concurrently may or may not be observed.
    pub(crate) fn for_each_committed<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        let _section = self.barrier.shared();
        let data = self.data.load_full();
        let capacity = data.capacity();
        let start = self.unread.load(Ordering::Acquire);
        let len = self.written.load(Ordering::Acquire).saturating_sub(start);
        for i in 0..len {
            if let Some(value) = &*data[(start + i) % capacity].lock() {
                f(value);
            }
        }
    }
}

impl<T> Debug for Queue<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        self.for_each_committed(|v| {
            list.entry(v);
        });
        list.finish()
    }
}

impl<T> Extend<T> for &Queue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let queue = Queue::with_capacity(DEFAULT_CAPACITY.max(lower + FREE_MARGIN));
        (&queue).extend(iter);
        queue
    }
}
