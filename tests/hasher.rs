use ratchet::{DefaultHashBuilder, HashMap};
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

#[derive(Default)]
pub struct ZeroHasher;

#[derive(Default)]
pub struct ZeroHashBuilder;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }
    fn write(&mut self, _: &[u8]) {}
}

impl BuildHasher for ZeroHashBuilder {
    type Hasher = ZeroHasher;

    fn build_hasher(&self) -> ZeroHasher {
        ZeroHasher
    }
}

fn check<S: BuildHasher + Default>() {
    let range = if cfg!(miri) { 0..16 } else { 0..1000 };
    let map = HashMap::<i32, i32, S>::default();
    for i in range.clone() {
        map.insert(i, i);
    }

    assert!(!map.contains_key(&i32::min_value()));
    assert!(!map.contains_key(&(range.start - 1)));
    for i in range.clone() {
        assert!(map.contains_key(&i));
    }
    assert!(!map.contains_key(&range.end));
    assert!(!map.contains_key(&i32::max_value()));

    for i in range.clone().step_by(2) {
        assert!(map.erase(&i).is_some());
    }
    for i in range.clone() {
        assert_eq!(map.contains_key(&i), i % 2 == 1);
    }
}

#[test]
fn test_default_hasher() {
    check::<DefaultHashBuilder>();
}

#[test]
fn test_zero_hasher() {
    check::<BuildHasherDefault<ZeroHasher>>();
}

#[test]
fn test_zero_hash_builder() {
    check::<ZeroHashBuilder>();
}

#[test]
fn test_max_hasher() {
    #[derive(Default)]
    struct MaxHasher;

    impl Hasher for MaxHasher {
        fn finish(&self) -> u64 {
            u64::max_value()
        }
        fn write(&mut self, _: &[u8]) {}
    }

    check::<BuildHasherDefault<MaxHasher>>();
}

#[test]
fn test_custom_hasher_with_capacity() {
    let map = HashMap::<&str, u8, _>::with_capacity_and_hasher(3, ZeroHashBuilder);
    assert!(map.insert("a", 1));
    assert!(map.insert("b", 2));
    assert!(map.insert("c", 3));
    assert!(!map.insert("b", 4));
    assert_eq!(map.len(), 3);
    assert!(map.capacity() >= 5);
}
