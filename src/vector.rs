use crate::barrier::{Backoff, DEFAULT_SPIN_DELAY};
use crate::holder::{Holder, Published};
use crate::{Error, Result, DEFAULT_CAPACITY};
use arc_swap::ArcSwapOption;
use std::fmt::{self, Debug, Formatter};
use std::iter::FromIterator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

type Slot<T> = ArcSwapOption<T>;

/// A concurrently growable array.
///
/// Appending, popping, reading and overwriting are cheap and can be done from any number of
/// threads at once. Indices are claimed with a single atomic increment of the length; when a
/// claimed index does not fit, the claimer copies the array into a holder of twice the length
/// and publishes it with a compare-and-swap.
///
/// Unlike [`Queue`](crate::Queue) and [`HashMap`](crate::HashMap) there is no
/// [`GrowthBarrier`](crate::GrowthBarrier). The one thread that gets to replace a holder first
/// *seals* it; a write that lands in a sealed holder is repeated against the replacement, so no
/// write is lost to a concurrent copy.
///
/// [`insert`](Vector::insert) and [`erase`](Vector::erase) shift elements by copying the whole
/// array and are not meant for hot paths. Running them while other threads push or write at the
/// shifted indices can put those values at unshifted positions.
///
/// Elements are handed out as `Arc<T>`, which stay valid after the element is overwritten or the
/// array grows.
///
/// # Examples
///
/// ```
/// use ratchet::Vector;
///
/// let v = Vector::new();
/// for i in 0..20 {
///     v.push_back(i);
/// }
/// assert_eq!(v.len(), 20);
/// assert_eq!(*v.get(13).unwrap(), 13);
/// ```
pub struct Vector<T> {
    data: Published<Slot<T>>,

    /// The logical length. Indices below it have been claimed, not necessarily written.
    occupancy: AtomicUsize,
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies every slot of `old` into a fresh holder of `capacity` slots.
fn copied<T>(old: &Holder<Slot<T>>, capacity: usize) -> Holder<Slot<T>> {
    let data = Holder::<Slot<T>>::new(capacity);
    for (from, to) in old.slots().zip(data.slots()) {
        to.store(from.load_full());
    }
    data
}

impl<T> Vector<T> {
    /// Creates an empty array with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty array with room for `capacity` elements. Zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Holder::publish(capacity.max(1)),
            occupancy: AtomicUsize::new(0),
        }
    }

    /// Returns the logical length of the array.
    pub fn len(&self) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }

    /// Returns `true` if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the current holder.
    pub fn capacity(&self) -> usize {
        self.data.load().capacity()
    }

    /// Loads the current holder, waiting out a replacement that is already being copied.
    fn current(&self) -> Arc<Holder<Slot<T>>> {
        let mut backoff = Backoff::new(DEFAULT_SPIN_DELAY);
        loop {
            let data = self.data.load_full();
            if !data.is_sealed() {
                return data;
            }
            backoff.snooze();
        }
    }

    /// Replaces `data` with the holder `build` makes from it.
    ///
    /// Returns `false` without calling `build` if another thread is already replacing `data`.
    /// If `build` panics, `data` is unsealed and stays the current holder.
    fn replace<F>(&self, data: &Arc<Holder<Slot<T>>>, build: F) -> bool
    where
        F: FnOnce(&Holder<Slot<T>>) -> Holder<Slot<T>>,
    {
        let Some(seal) = data.seal() else {
            return false;
        };
        let next = Arc::new(build(data));
        // a sealed holder can only be replaced by its sealer, so this cannot fail
        let prev = self.data.compare_and_swap(data, next);
        debug_assert!(Arc::ptr_eq(&*prev, data));
        seal.keep();
        true
    }

    /// Stores `value` at `index`, repeating the store if a copy of the holder may have missed it.
    fn store(&self, index: usize, value: &Arc<T>) {
        loop {
            let data = self.current();
            data[index].store(Some(Arc::clone(value)));
            // a holder sealed after our store is copied after it, too
            if !data.is_sealed() {
                return;
            }
        }
    }

    /// Appends `value` to the end of the array.
    pub fn push_back(&self, value: T) {
        let value = Arc::new(value);
        let index = self.occupancy.fetch_add(1, Ordering::SeqCst);
        loop {
            let data = self.current();
            if index < data.capacity() {
                break;
            }
            let observed = self.occupancy.load(Ordering::SeqCst);
            let capacity = (observed * 2).max(index + 1);
            if self.replace(&data, |old| copied(old, capacity)) {
                debug!(from = data.capacity(), to = capacity, len = observed, "grew vector");
            }
        }
        self.store(index, &value);
    }

    /// Removes the last element from the array and returns it.
    ///
    /// The slot is cleared unless a concurrent [`push_back`](Vector::push_back) has already
    /// claimed it and stored a new value there. Returns `None` if the array is empty, or if the
    /// last element was claimed but never written.
    pub fn pop_back(&self) -> Option<Arc<T>> {
        let mut len = self.occupancy.load(Ordering::SeqCst);
        loop {
            if len == 0 {
                return None;
            }
            match self.occupancy.compare_exchange_weak(
                len,
                len - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(now) => len = now,
            }
        }
        let data = self.current();
        let slot = data.get(len - 1)?;
        let value = slot.load_full()?;
        // `value` is held, so its address cannot be reused by a newer push
        let _ = slot.compare_and_swap(&value, None::<Arc<T>>);
        Some(value)
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index` is not below [`len`](Vector::len), and
    /// [`Error::Vacant`] if the index was claimed by a push whose value has not landed yet.
    pub fn get(&self, index: usize) -> Result<Arc<T>> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        loop {
            let data = self.data.load_full();
            let value = data.get(index).and_then(|slot| slot.load_full());
            if Arc::ptr_eq(&data, &*self.data.load()) {
                return value.ok_or(Error::Vacant { index });
            }
        }
    }

    /// Overwrites the element at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index` is not below [`len`](Vector::len), and
    /// [`Error::Vacant`] if the index was claimed by a push that is still growing the array.
    pub fn write(&self, index: usize, value: T) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if index >= self.capacity() {
            return Err(Error::Vacant { index });
        }
        self.store(index, &Arc::new(value));
        Ok(())
    }

    /// Inserts `value` at `index`, shifting every later element one place to the right.
    ///
    /// This copies the whole array.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index` is greater than [`len`](Vector::len).
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        let len = self.occupancy.fetch_add(1, Ordering::SeqCst);
        if index > len {
            self.occupancy.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::IndexOutOfRange { index, len });
        }

        let value = Some(Arc::new(value));
        loop {
            let data = self.current();
            let replaced = self.replace(&data, |old| {
                let capacity = if len < old.capacity() {
                    old.capacity()
                } else {
                    (old.capacity() * 2).max(len + 1)
                };
                let next = Holder::<Slot<T>>::new(capacity);
                for (i, slot) in old.slots().enumerate() {
                    let to = match i {
                        i if i < index => i,
                        i if i < len => i + 1,
                        // the slot we claimed; its old content is stale
                        i if i == len => continue,
                        // pushed after our claim
                        i => i,
                    };
                    next[to].store(slot.load_full());
                }
                next[index].store(value.clone());
                next
            });
            if replaced {
                return Ok(());
            }
        }
    }

    /// Removes the element at `index`, shifting every later element one place to the left, and
    /// returns it.
    ///
    /// This copies the whole array.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `index` is not below [`len`](Vector::len), and
    /// [`Error::Vacant`] if the element was claimed but never written.
    pub fn erase(&self, index: usize) -> Result<Arc<T>> {
        let mut len = self.occupancy.load(Ordering::SeqCst);
        loop {
            if index >= len {
                return Err(Error::IndexOutOfRange { index, len });
            }
            match self.occupancy.compare_exchange_weak(
                len,
                len - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(now) => len = now,
            }
        }

        loop {
            let data = self.current();
            let mut removed = None;
            let replaced = self.replace(&data, |old| {
                let next = Holder::<Slot<T>>::new(old.capacity());
                for (i, slot) in old.slots().enumerate() {
                    match i {
                        i if i < index => next[i].store(slot.load_full()),
                        i if i == index => removed = slot.load_full(),
                        i if i < len => next[i - 1].store(slot.load_full()),
                        i => next[i].store(slot.load_full()),
                    }
                }
                next
            });
            if replaced {
                return removed.ok_or(Error::Vacant { index });
            }
        }
    }

    /// Returns the elements that are currently written, in index order.
    ///
    /// Indices that have been claimed but not yet written are skipped.
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        let len = self.len();
        let data = self.data.load_full();
        data.slots()
            .take(len)
            .filter_map(|slot| slot.load_full())
            .collect()
    }
}

impl<T> Debug for Vector<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl<T> Extend<T> for &Vector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let vector = Vector::with_capacity(DEFAULT_CAPACITY.max(lower));
        (&vector).extend(iter);
        vector
    }
}
