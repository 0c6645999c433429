use ratchet::*;
use std::sync::Arc;

#[test]
fn new() {
    let _map = HashMap::<usize, usize>::new();
}

#[test]
fn insert() {
    let map = HashMap::<usize, usize>::new();
    assert!(map.insert(42, 0));
    assert_eq!(map.len(), 1);
}

#[test]
fn insert_existing_key_is_refused() {
    let map = HashMap::<usize, usize>::new();
    assert!(map.insert(42, 0));
    assert!(!map.insert(42, 1));
    assert_eq!(map.get(&42).map(|e| *e.value()), Ok(0));
    assert_eq!(map.len(), 1);
}

#[test]
fn get_empty() {
    let map = HashMap::<usize, usize>::new();
    assert_eq!(map.get(&42).map(|e| *e.value()), Err(Error::KeyNotFound));
    assert!(!map.contains_key(&42));
}

#[test]
fn find_empty() {
    let map = HashMap::<usize, usize>::new();
    assert!(map.find(&42) == map.end());
}

#[test]
fn erase_empty() {
    let map = HashMap::<usize, usize>::new();
    assert!(map.erase(&42).is_none());
    assert_eq!(map.len(), 0);
}

#[test]
fn insert_and_erase() {
    let map = HashMap::<usize, usize>::new();
    map.insert(42, 0);
    let old = map.erase(&42).unwrap();
    assert_eq!((*old.key(), *old.value()), (42, 0));
    assert!(!map.contains_key(&42));
    assert!(map.is_empty());
}

#[test]
fn insert_after_erase() {
    let map = HashMap::<usize, usize>::new();
    map.insert(42, 0);
    map.erase(&42);
    assert!(map.insert(42, 1));
    assert_eq!(map.get(&42).map(|e| *e.value()), Ok(1));
    assert_eq!(map.len(), 1);
}

#[test]
fn insert_and_find() {
    let map = HashMap::<usize, usize>::new();
    map.insert(42, 0);

    let cursor = map.find(&42);
    assert!(!cursor.is_end());
    assert_eq!(cursor.key(), Some(&42));
    assert_eq!(cursor.value(), Some(&0));
}

#[test]
fn borrowed_lookups() {
    let map = HashMap::<String, usize>::new();
    map.insert("foo".to_string(), 1);

    assert!(map.contains_key("foo"));
    assert_eq!(map.get("foo").map(|e| *e.value()), Ok(1));
    assert_eq!(map.find("foo").value(), Some(&1));
    assert!(map.erase("foo").is_some());
}

#[test]
fn grows_from_tiny_capacity() {
    let map = HashMap::<usize, usize>::with_capacity(1);
    for i in 0..1000 {
        assert!(map.insert(i, i * 2));
    }
    assert_eq!(map.len(), 1000);
    assert!(map.capacity() * 2 >= 1000 * 3);
    for i in 0..1000 {
        assert_eq!(map.get(&i).map(|e| *e.value()), Ok(i * 2));
    }
}

#[test]
fn rehash_keeps_entries() {
    let map = HashMap::<usize, usize>::with_capacity(16);
    for i in 0..8 {
        map.insert(i, i);
    }
    map.erase(&3);
    map.rehash(256);
    assert_eq!(map.capacity(), 256);
    assert_eq!(map.len(), 7);
    assert!(!map.contains_key(&3));
    for i in (0..8).filter(|&i| i != 3) {
        assert!(map.contains_key(&i));
    }

    // rehashing to a smaller size does nothing
    map.rehash(8);
    assert_eq!(map.capacity(), 256);
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_insert() {
    let map = Arc::new(HashMap::<usize, usize>::new());

    let map1 = map.clone();
    let t1 = std::thread::spawn(move || {
        for i in 0..64 {
            map1.insert(i, 0);
        }
    });
    let map2 = map.clone();
    let t2 = std::thread::spawn(move || {
        for i in 0..64 {
            map2.insert(i, 1);
        }
    });

    t1.join().unwrap();
    t2.join().unwrap();

    assert_eq!(map.len(), 64);
    for i in 0..64 {
        let v = *map.get(&i).unwrap().value();
        assert!(v == 0 || v == 1);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_erase() {
    let map = Arc::new(HashMap::<usize, usize>::new());
    for i in 0..64 {
        map.insert(i, i);
    }

    let map1 = map.clone();
    let t1 = std::thread::spawn(move || {
        let mut erased = 0;
        for i in 0..64 {
            if map1.erase(&i).is_some() {
                erased += 1;
            }
        }
        erased
    });
    let map2 = map.clone();
    let t2 = std::thread::spawn(move || {
        let mut erased = 0;
        for i in 0..64 {
            if map2.erase(&i).is_some() {
                erased += 1;
            }
        }
        erased
    });

    // every key is erased by exactly one of the two threads
    let erased = t1.join().unwrap() + t2.join().unwrap();
    assert_eq!(erased, 64);

    for i in 0..64 {
        assert!(!map.contains_key(&i));
    }
    assert!(map.is_empty());
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_rehash_and_get() {
    let map = Arc::new(HashMap::<usize, usize>::new());
    for i in 0..1024 {
        map.insert(i, i);
    }

    let map1 = map.clone();
    // t1 forces a run of rehashes
    let t1 = std::thread::spawn(move || {
        for power in 12..16 {
            map1.rehash(1 << power);
        }
    });
    let map2 = map.clone();
    // t2 looks existing keys up while the tables are swapped underneath it
    let t2 = std::thread::spawn(move || {
        for _ in 0..32 {
            for i in 0..1024 {
                assert_eq!(map2.get(&i).map(|e| *e.value()), Ok(i));
            }
        }
    });

    t1.join().unwrap();
    t2.join().unwrap();

    for i in 0..1024 {
        assert_eq!(map.get(&i).map(|e| *e.value()), Ok(i));
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_insert_during_growth() {
    let map = Arc::new(HashMap::<usize, usize>::with_capacity(4));

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let map = map.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    assert!(map.insert(t * 500 + i, t));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(map.len(), 2000);
    assert_eq!(map.iter().count(), 2000);
    for k in 0..2000 {
        assert_eq!(map.get(&k).map(|e| *e.value()), Ok(k / 500));
    }
}

#[test]
fn current_kv_dropped() {
    let dropped1 = Arc::new(0);
    let dropped2 = Arc::new(0);

    let map = HashMap::<Arc<usize>, Arc<usize>>::new();

    map.insert(dropped1.clone(), dropped2.clone());
    assert_eq!(Arc::strong_count(&dropped1), 2);
    assert_eq!(Arc::strong_count(&dropped2), 2);

    drop(map);

    // dropping the map drops all keys and values right away
    assert_eq!(Arc::strong_count(&dropped1), 1);
    assert_eq!(Arc::strong_count(&dropped2), 1);
}

#[test]
fn erased_entry_outlives_erase() {
    let value = Arc::new(5);
    let map = HashMap::<usize, Arc<usize>>::new();
    map.insert(1, value.clone());

    let entry = map.get(&1).unwrap();
    map.erase(&1);
    assert_eq!(**entry.value(), 5);
    assert_eq!(Arc::strong_count(&value), 2);

    drop(entry);
    assert_eq!(Arc::strong_count(&value), 1);
}

#[test]
fn snapshot_iteration_ignores_later_inserts() {
    let map = HashMap::<usize, usize>::with_capacity(64);
    for i in 0..4 {
        map.insert(i, i);
    }
    let iter = map.iter();
    map.rehash(1024);
    for i in 4..100 {
        map.insert(i, i);
    }

    let mut keys: Vec<_> = iter.map(|e| *e.key()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1, 2, 3]);
}

#[test]
fn erase_while_walking() {
    let map = HashMap::<usize, usize>::new();
    for i in 0..6 {
        map.insert(i, i);
    }

    let mut cursor = map.begin();
    while !cursor.is_end() {
        cursor = if cursor.key().map_or(false, |k| k % 2 == 0) {
            map.erase_at(&cursor)
        } else {
            let mut next = cursor.clone();
            next.advance();
            next
        };
    }

    let mut keys: Vec<_> = map.iter().map(|e| *e.key()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![1, 3, 5]);
}

#[test]
fn default() {
    let map: HashMap<usize, usize> = Default::default();
    map.insert(42, 0);
    assert_eq!(map.get(&42).map(|e| *e.value()), Ok(0));
}

#[test]
fn debug() {
    let map: HashMap<usize, usize> = HashMap::new();
    map.insert(42, 0);
    map.insert(16, 8);

    let formatted = format!("{:?}", map);

    assert!(formatted == "{42: 0, 16: 8}" || formatted == "{16: 8, 42: 0}");
}

#[test]
fn extend() {
    let map: HashMap<usize, usize> = HashMap::new();

    let mut entries: Vec<(usize, usize)> = vec![(42, 0), (16, 6), (38, 42)];
    entries.sort();

    (&map).extend(entries.clone().into_iter());

    let mut collected: Vec<(usize, usize)> =
        map.iter().map(|e| (*e.key(), *e.value())).collect();
    collected.sort();

    assert_eq!(entries, collected);
}

#[test]
fn from_iter_keeps_first_of_duplicates() {
    use std::iter::FromIterator;

    let map: HashMap<usize, usize> = HashMap::from_iter(vec![(1, 1), (2, 2), (1, 3)]);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&1).map(|e| *e.value()), Ok(1));
}

#[test]
fn from_iter_empty() {
    use std::iter::FromIterator;

    let entries: Vec<(usize, usize)> = Vec::new();
    let map: HashMap<usize, usize> = HashMap::from_iter(entries.into_iter());

    assert_eq!(map.len(), 0);
    assert_eq!(map.capacity(), DEFAULT_CAPACITY);
}
