mod cursor;
pub use cursor::Cursor;

use crate::map::Entry;
use std::iter::FusedIterator;
use std::sync::Arc;

/// An iterator over a snapshot of a map's entries.
///
/// See [`HashMap::iter`](crate::HashMap::iter) for details.
#[derive(Debug)]
pub struct Iter<K, V> {
    cursor: Cursor<K, V>,
}

impl<K, V> Iter<K, V> {
    pub(crate) fn new(cursor: Cursor<K, V>) -> Self {
        Self { cursor }
    }
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = Arc<Entry<K, V>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry()?.clone();
        self.cursor.advance();
        Some(entry)
    }
}

impl<K, V> FusedIterator for Iter<K, V> {}

#[cfg(test)]
mod tests {
    use crate::HashMap;
    use std::collections::HashSet;
    use std::iter::FromIterator;

    #[test]
    fn iter() {
        let map = HashMap::<usize, usize>::new();
        map.insert(1, 42);
        map.insert(2, 84);

        assert_eq!(
            map.iter()
                .map(|e| (*e.key(), *e.value()))
                .collect::<HashSet<(usize, usize)>>(),
            HashSet::from_iter(vec![(1, 42), (2, 84)])
        );
    }

    #[test]
    fn iter_skips_erased() {
        let map = HashMap::<usize, usize>::new();
        map.insert(1, 42);
        map.insert(2, 84);
        map.erase(&1);

        let keys: Vec<_> = map.iter().map(|e| *e.key()).collect();
        assert_eq!(keys, vec![2]);
    }
}
