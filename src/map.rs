use crate::barrier::GrowthBarrier;
use crate::holder::{self, Holder, Published};
use crate::iter::{Cursor, Iter};
use crate::{Error, Result, DEFAULT_CAPACITY};
use arc_swap::ArcSwapOption;
use std::borrow::Borrow;
use std::fmt::{self, Debug, Formatter};
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FromIterator;
use std::sync::atomic::{AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Slot hash of a slot that has never been claimed.
pub(crate) const EMPTY: u64 = 0;

/// Slot hash of a slot whose entry was erased. Tombstones are only reclaimed by a rehash.
pub(crate) const TOMBSTONE: u64 = 1;

/// The map grows once more than `LOAD_NUMERATOR / LOAD_DENOMINATOR` of its slots are occupied
/// (tombstones included).
const LOAD_NUMERATOR: usize = 2;
const LOAD_DENOMINATOR: usize = 3;

/// A key-value pair stored in a [`HashMap`].
///
/// Entries are shared: the map, any [`Cursor`] positioned on them and any caller of
/// [`HashMap::get`] all hold the same `Arc`, so an entry stays readable after it is erased.
pub struct Entry<K, V> {
    pub(crate) hash: u64,
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value.
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<K, V> Debug for Entry<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Entry")
            .field(&self.key)
            .field(&self.value)
            .finish()
    }
}

/// One open-addressing slot.
///
/// The slot hash doubles as the slot state: [`EMPTY`], [`TOMBSTONE`], or the mixed hash of the
/// entry that claimed it. A freshly claimed slot can briefly hold an entry while its hash is
/// still `EMPTY`; the entry's own `hash` is authoritative.
pub(crate) struct Slot<K, V> {
    pub(crate) hash: AtomicU64,
    pub(crate) cell: ArcSwapOption<Entry<K, V>>,
}

impl<K, V> Default for Slot<K, V> {
    fn default() -> Self {
        Self {
            hash: AtomicU64::new(EMPTY),
            cell: ArcSwapOption::empty(),
        }
    }
}

impl<K, V> Slot<K, V> {
    /// The entry in this slot, unless the slot is empty or tombstoned.
    pub(crate) fn live(&self) -> Option<Arc<Entry<K, V>>> {
        let entry = self.cell.load_full()?;
        if self.hash.load(Ordering::SeqCst) == TOMBSTONE {
            return None;
        }
        Some(entry)
    }

    /// `true` if probing may stop here: nothing was ever stored in this slot.
    fn is_vacant(&self) -> bool {
        self.cell.load().is_none() && self.hash.load(Ordering::SeqCst) == EMPTY
    }
}

pub(crate) type Table<K, V> = Holder<Slot<K, V>>;

enum Claim {
    Inserted,
    Present,
    Full,
}

/// Mixes a [`BuildHasher`] result with the splitmix64 finalizer and moves it off the two
/// reserved slot states.
#[inline]
fn mix(mut h: u64) -> u64 {
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^= h >> 31;
    match h {
        EMPTY => 2,
        TOMBSTONE => 3,
        h => h,
    }
}

#[inline]
fn home(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

/// A concurrent open-addressing hash table.
///
/// Lookups are lock-free and work on a snapshot of the table; inserts and erases run inside a
/// [`GrowthBarrier`] shared section so that a rehash never overlaps them. Collisions are resolved
/// by linear probing, and erased slots become tombstones that keep probe chains intact until the
/// next rehash drops them.
///
/// Once more than two thirds of the slots are in use (tombstones count as in use) the table is
/// rebuilt: at the same size if live entries fill at most half of it, which clears the
/// tombstones, and at double the size otherwise. It never shrinks.
///
/// Values are never replaced in place: [`HashMap::insert`] refuses to overwrite an existing key.
///
/// # Examples
///
/// ```
/// use ratchet::HashMap;
///
/// let map = HashMap::with_capacity(10);
/// assert!(map.insert("x", 1));
/// assert!(map.insert("y", 2));
/// assert!(!map.insert("x", 99));
/// assert_eq!(map.get("x").map(|e| *e.value()), Ok(1));
///
/// map.erase("x");
/// assert!(map.find("x") == map.end());
/// assert_eq!(map.len(), 1);
/// ```
pub struct HashMap<K, V, S = crate::DefaultHashBuilder> {
    data: Published<Slot<K, V>>,

    /// Live entries. May dip below zero while an erase overtakes the insert it erases.
    count: AtomicIsize,

    /// Slots that are not [`EMPTY`]: live entries plus tombstones. Drives the load factor.
    occupancy: AtomicUsize,

    barrier: GrowthBarrier,

    build_hasher: S,
}

impl<K, V> HashMap<K, V, crate::DefaultHashBuilder> {
    /// Creates an empty `HashMap` with the default capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratchet::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `HashMap` with `capacity` slots.
    ///
    /// Note that the map grows once two thirds of the slots are used, so `capacity` entries do
    /// not fit without a rehash.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, crate::DefaultHashBuilder::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty map with the default capacity which will use `hash_builder` to hash
    /// keys.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed to allow the map
    /// to be resistant to attacks that cause many collisions and very poor performance. Setting
    /// it manually using this function can expose a DoS attack vector.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty map with `capacity` slots, using `hash_builder` to hash the keys.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            data: Holder::publish(capacity.max(1)),
            count: AtomicIsize::new(0),
            occupancy: AtomicUsize::new(0),
            barrier: GrowthBarrier::new(),
            build_hasher: hash_builder,
        }
    }

    /// Replaces the [`GrowthBarrier`] that coordinates this map's rehashes.
    pub fn with_barrier(mut self, barrier: GrowthBarrier) -> Self {
        self.barrier = barrier;
        self
    }

    /// Returns the number of live entries in the map.
    pub fn len(&self) -> usize {
        let n = self.count.load(Ordering::Relaxed);
        if n < 0 {
            0
        } else {
            n as usize
        }
    }

    /// Returns `true` if the map holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the current table.
    pub fn capacity(&self) -> usize {
        self.data.load().capacity()
    }

    /// A cursor at the first live entry of the current table, or [`end`](HashMap::end) if
    /// there is none.
    ///
    /// The cursor keeps the table it was created from alive and never observes a later rehash.
    pub fn begin(&self) -> Cursor<K, V> {
        Cursor::begin(self.data.load_full())
    }

    /// The past-the-end cursor. It compares equal to every other past-the-end cursor.
    pub fn end(&self) -> Cursor<K, V> {
        Cursor::end(self.data.load_full())
    }

    /// An iterator over a snapshot of the map's entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratchet::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// let mut keys: Vec<_> = map.iter().map(|e| *e.key()).collect();
    /// keys.sort();
    /// assert_eq!(keys, vec![1, 2]);
    /// ```
    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.begin())
    }

    /// Grows the table to `capacity` slots, dropping tombstones on the way.
    ///
    /// Does nothing if the table already has at least `capacity` slots, or if another thread was
    /// rehashing at the same time.
    pub fn rehash(&self, capacity: usize) {
        self.barrier.exclusive(|| {
            let old = self.data.load_full();
            if old.capacity() < capacity {
                self.rebuild(&old, capacity);
            }
        });
    }

    /// Makes room in `observed` after an insert found it too loaded or full.
    ///
    /// A table whose live entries fill at most half of it is rebuilt at the same capacity, which
    /// only drops the tombstones; anything fuller is doubled. Does nothing if `observed` has
    /// already been replaced.
    fn grow(&self, observed: &Arc<Table<K, V>>) {
        self.barrier.exclusive(|| {
            let old = self.data.load_full();
            if !holder::same(&old, observed) {
                return;
            }
            let capacity = old.capacity();
            let live = old.slots().filter(|slot| slot.live().is_some()).count();
            if live * 2 > capacity {
                self.rebuild(&old, capacity * 2);
            } else {
                self.rebuild(&old, capacity);
            }
        });
    }

    /// Copies the live entries of `old` into a fresh table of `capacity` slots and publishes it.
    ///
    /// Must run inside an exclusive section.
    fn rebuild(&self, old: &Table<K, V>, capacity: usize) {
        let data = Table::<K, V>::new(capacity);
        let mut live = 0;
        for slot in old.slots() {
            let Some(entry) = slot.live() else {
                continue;
            };
            let mut pos = home(entry.hash, capacity);
            while data[pos].hash.load(Ordering::Relaxed) != EMPTY {
                pos = (pos + 1) % capacity;
            }
            data[pos].hash.store(entry.hash, Ordering::Relaxed);
            data[pos].cell.store(Some(entry));
            live += 1;
        }

        self.count.store(live as isize, Ordering::Relaxed);
        self.occupancy.store(live, Ordering::Relaxed);
        self.data.store(Arc::new(data));
        debug!(from = old.capacity(), to = capacity, live, "rehashed map");
    }

    fn needs_growth(&self, capacity: usize) -> bool {
        self.occupancy.load(Ordering::Relaxed) * LOAD_DENOMINATOR > capacity * LOAD_NUMERATOR
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash<Q: ?Sized + Hash>(&self, key: &Q) -> u64 {
        let mut h = self.build_hasher.build_hasher();
        key.hash(&mut h);
        mix(h.finish())
    }

    /// Inserts `key` with `value` unless the key is already present.
    ///
    /// Returns `true` if the entry was inserted and `false` if the key was present, in which
    /// case the map is left untouched.
    pub fn insert(&self, key: K, value: V) -> bool {
        let hash = self.hash(&key);
        let entry = Arc::new(Entry { hash, key, value });
        loop {
            let section = self.barrier.shared();
            let data = self.data.load_full();
            if self.needs_growth(data.capacity()) {
                drop(section);
                self.grow(&data);
                continue;
            }
            match self.claim(&data, &entry) {
                Claim::Inserted => return true,
                Claim::Present => return false,
                Claim::Full => {
                    drop(section);
                    self.grow(&data);
                }
            }
        }
    }

    /// Walks the probe chain of `entry` and claims the first never-used slot.
    ///
    /// Tombstones are skipped rather than reused: reusing one could place the key in front of a
    /// live copy of itself further down the chain.
    fn claim(&self, data: &Table<K, V>, entry: &Arc<Entry<K, V>>) -> Claim {
        let capacity = data.capacity();
        let mut pos = home(entry.hash, capacity);
        let mut visited = 0;
        while visited < capacity {
            let slot = &data[pos];
            let current = slot.cell.load_full();
            match current {
                Some(ref other) => {
                    if other.hash == entry.hash
                        && other.key == entry.key
                        && slot.hash.load(Ordering::SeqCst) != TOMBSTONE
                    {
                        return Claim::Present;
                    }
                }
                None if slot.hash.load(Ordering::SeqCst) == EMPTY => {
                    let prev = slot
                        .cell
                        .compare_and_swap(&current, Some(Arc::clone(entry)));
                    if prev.is_none() {
                        self.count.fetch_add(1, Ordering::SeqCst);
                        self.occupancy.fetch_add(1, Ordering::SeqCst);
                        // an erase may already have tombstoned the slot; leave that in place
                        let _ = slot.hash.compare_exchange(
                            EMPTY,
                            entry.hash,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        return Claim::Inserted;
                    }
                    // lost the race for this slot; look at whoever won it
                    continue;
                }
                None => {}
            }
            pos = (pos + 1) % capacity;
            visited += 1;
        }
        Claim::Full
    }

    /// Finds the live slot holding `key` in `data`.
    fn probe<Q>(&self, data: &Table<K, V>, key: &Q) -> Option<(usize, Arc<Entry<K, V>>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash(key);
        let capacity = data.capacity();
        let mut pos = home(hash, capacity);
        for _ in 0..capacity {
            let slot = &data[pos];
            if let Some(entry) = slot.live() {
                if entry.hash == hash && entry.key.borrow() == key {
                    return Some((pos, entry));
                }
            } else if slot.is_vacant() {
                return None;
            }
            pos = (pos + 1) % capacity;
        }
        None
    }

    /// Returns a cursor positioned at `key`, or a cursor equal to [`end`](HashMap::end) if the
    /// key is absent.
    ///
    /// The lookup runs entirely against the table that was current when it started, even if a
    /// rehash publishes a new one halfway through.
    pub fn find<Q>(&self, key: &Q) -> Cursor<K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let data = self.data.load_full();
        match self.probe(&data, key) {
            Some((pos, entry)) => Cursor::at(data, pos, entry),
            None => Cursor::end(data),
        }
    }

    /// Returns the entry for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Result<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let data = self.data.load_full();
        self.probe(&data, key)
            .map(|(_, entry)| entry)
            .ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map holds a live entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).is_ok()
    }

    /// Erases `key`, returning the entry that was removed.
    ///
    /// Erasing an absent key does nothing and returns `None`. The slot becomes a tombstone until
    /// the next rehash.
    pub fn erase<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _section = self.barrier.shared();
        let data = self.data.load_full();
        let (pos, entry) = self.probe(&data, key)?;

        let slot = &data[pos];
        slot.hash.store(TOMBSTONE, Ordering::SeqCst);
        let prev = slot.cell.compare_and_swap(&entry, None::<Arc<Entry<K, V>>>);
        match &*prev {
            Some(p) if Arc::ptr_eq(p, &entry) => {
                self.count.fetch_sub(1, Ordering::SeqCst);
                Some(entry)
            }
            // someone else erased it first
            _ => None,
        }
    }

    /// Erases the entry under `cursor` from the map and returns a cursor at the next live entry
    /// of the same snapshot.
    ///
    /// The erase goes by key, so if the key was erased and inserted again since the cursor read
    /// it, the newer entry is the one removed.
    pub fn erase_at(&self, cursor: &Cursor<K, V>) -> Cursor<K, V> {
        if let Some(entry) = cursor.entry() {
            self.erase(entry.key());
        }
        let mut next = cursor.clone();
        next.advance();
        next
    }
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let entries: Vec<_> = self.iter().collect();
        f.debug_map()
            .entries(entries.iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}

impl<K, V, S> Extend<(K, V)> for &HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        // room for `lower` entries under the load factor
        let capacity = DEFAULT_CAPACITY.max(lower * LOAD_DENOMINATOR / LOAD_NUMERATOR + 1);
        let map = Self::with_capacity_and_hasher(capacity, S::default());
        (&map).extend(iter);
        map
    }
}
