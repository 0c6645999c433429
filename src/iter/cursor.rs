use crate::holder;
use crate::map::{Entry, Table};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A position in a snapshot of a [`HashMap`](crate::HashMap).
///
/// A cursor holds its own reference to the table it was created from and to the entry it last
/// read, so it is always safe to dereference: an entry erased after the cursor reached it is
/// still returned by [`Cursor::entry`], and a rehash that publishes a new table does not affect
/// which entries the cursor walks over.
///
/// Two cursors are equal when they sit on the same slot of the same table. All past-the-end
/// cursors are equal to each other, whatever table they came from.
pub struct Cursor<K, V> {
    table: Arc<Table<K, V>>,

    /// Slot index in `table`; `table.capacity()` once past the end.
    position: usize,

    /// The entry read at `position` when the cursor arrived there.
    current: Option<Arc<Entry<K, V>>>,
}

impl<K, V> Cursor<K, V> {
    pub(crate) fn begin(table: Arc<Table<K, V>>) -> Self {
        let mut cursor = Self {
            table,
            position: 0,
            current: None,
        };
        cursor.settle_forward();
        cursor
    }

    pub(crate) fn end(table: Arc<Table<K, V>>) -> Self {
        let position = table.capacity();
        Self {
            table,
            position,
            current: None,
        }
    }

    pub(crate) fn at(table: Arc<Table<K, V>>, position: usize, entry: Arc<Entry<K, V>>) -> Self {
        Self {
            table,
            position,
            current: Some(entry),
        }
    }

    /// Moves forward from `position` (inclusive) to the next live slot, or past the end.
    fn settle_forward(&mut self) {
        while self.position < self.table.capacity() {
            if let Some(entry) = self.table[self.position].live() {
                self.current = Some(entry);
                return;
            }
            self.position += 1;
        }
        self.current = None;
    }

    /// The entry under the cursor, or `None` once past the end.
    pub fn entry(&self) -> Option<&Arc<Entry<K, V>>> {
        self.current.as_ref()
    }

    /// The key under the cursor.
    pub fn key(&self) -> Option<&K> {
        self.current.as_deref().map(Entry::key)
    }

    /// The value under the cursor.
    pub fn value(&self) -> Option<&V> {
        self.current.as_deref().map(Entry::value)
    }

    /// Returns `true` if the cursor is past the end of its table.
    pub fn is_end(&self) -> bool {
        self.position >= self.table.capacity()
    }

    /// Moves to the next live entry of the snapshot, or past the end.
    pub fn advance(&mut self) {
        if self.is_end() {
            return;
        }
        self.position += 1;
        self.settle_forward();
    }

    /// Moves to the previous live entry of the snapshot.
    ///
    /// Returns `false`, leaving the cursor where it was, if there is no live entry before it.
    pub fn retreat(&mut self) -> bool {
        let mut position = self.position.min(self.table.capacity());
        while position > 0 {
            position -= 1;
            if let Some(entry) = self.table[position].live() {
                self.position = position;
                self.current = Some(entry);
                return true;
            }
        }
        false
    }
}

impl<K, V> Clone for Cursor<K, V> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            position: self.position,
            current: self.current.clone(),
        }
    }
}

impl<K, V> PartialEq for Cursor<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.is_end() && other.is_end() {
            return true;
        }
        holder::same(&self.table, &other.table) && self.position == other.position
    }
}

impl<K, V> Eq for Cursor<K, V> {}

impl<K, V> Debug for Cursor<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("entry", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::HashMap;

    #[test]
    fn empty_map_begins_at_end() {
        let map = HashMap::<u32, u32>::new();
        assert!(map.begin().is_end());
        assert!(map.begin() == map.end());
        assert_eq!(map.begin().entry().map(|e| *e.key()), None);
    }

    #[test]
    fn retreat_walks_backwards() {
        let map = HashMap::new();
        for i in 0..5 {
            map.insert(i, i * 10);
        }
        let mut forward = Vec::new();
        let mut cursor = map.begin();
        while let Some(&k) = cursor.key() {
            forward.push(k);
            cursor.advance();
        }

        let mut backward = Vec::new();
        while cursor.retreat() {
            backward.push(*cursor.key().unwrap());
        }
        backward.reverse();
        assert_eq!(forward, backward);
        assert!(cursor == map.begin());
    }

    #[test]
    fn advance_past_end_is_idempotent() {
        let map = HashMap::new();
        map.insert("only", 1);
        let mut cursor = map.begin();
        cursor.advance();
        assert!(cursor.is_end());
        cursor.advance();
        assert!(cursor.is_end());
        assert_eq!(cursor.value(), None);
    }

    #[test]
    fn cursors_from_different_tables_differ() {
        let map = HashMap::with_capacity(4);
        map.insert(1, 1);
        let before = map.find(&1);
        map.rehash(64);
        let after = map.find(&1);
        assert_eq!(before.value(), after.value());
        assert!(before != after);
    }
}
