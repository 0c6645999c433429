use arc_swap::ArcSwap;
use std::fmt::{self, Debug, Formatter};
use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A fixed-capacity backing buffer shared by reference between a container and everything that
/// is still reading from it.
///
/// A holder is never resized. Growth allocates a larger holder, copies the live slots across and
/// republishes the container's [`Published`] reference; the old holder stays readable until its
/// last `Arc` goes away. Slots themselves carry their own interior mutability, so "immutable"
/// here means the *set* of slots, not their contents.
pub(crate) struct Holder<S> {
    slots: Box<[S]>,

    // set by the one thread that is about to copy this holder into its replacement.
    // writers that land after the seal must redo their write against the replacement.
    sealed: AtomicBool,
}

/// The atomically replaceable reference a container keeps to its current holder.
pub(crate) type Published<S> = ArcSwap<Holder<S>>;

impl<S> Holder<S>
where
    S: Default,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| S::default()).collect(),
            sealed: AtomicBool::new(false),
        }
    }

    pub(crate) fn publish(capacity: usize) -> Published<S> {
        ArcSwap::from_pointee(Self::new(capacity))
    }
}

impl<S> Holder<S> {
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> Option<&S> {
        self.slots.get(i)
    }

    #[inline]
    pub(crate) fn slots(&self) -> std::slice::Iter<'_, S> {
        self.slots.iter()
    }

    /// Marks this holder as about to be replaced.
    ///
    /// Returns a [`Seal`] for exactly one caller: the one that now owns the right to publish the
    /// replacement. The holder is unsealed again if the seal is dropped without being kept.
    pub(crate) fn seal(&self) -> Option<Seal<'_, S>> {
        self.sealed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Seal {
                holder: self,
                armed: true,
            })
    }

    #[inline]
    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }
}

/// The right to replace a sealed [`Holder`].
pub(crate) struct Seal<'h, S> {
    holder: &'h Holder<S>,
    armed: bool,
}

impl<S> Seal<'_, S> {
    /// Leaves the holder sealed for good; call once its replacement is published.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl<S> Drop for Seal<'_, S> {
    fn drop(&mut self) {
        // the replacement was never published, so the holder is still the current one
        if self.armed {
            self.holder.sealed.store(false, Ordering::SeqCst);
        }
    }
}

impl<S> Index<usize> for Holder<S> {
    type Output = S;

    #[inline]
    fn index(&self, i: usize) -> &S {
        &self.slots[i]
    }
}

impl<S> Debug for Holder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("capacity", &self.capacity())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Returns `true` if both references name the same holder allocation.
#[inline]
pub(crate) fn same<S>(a: &Arc<Holder<S>>, b: &Arc<Holder<S>>) -> bool {
    Arc::ptr_eq(a, b)
}
