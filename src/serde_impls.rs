use crate::{HashMap, Queue, Vector};
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

impl<K, V, S> Serialize for HashMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let entries: Vec<_> = self.iter().collect();
        serializer.collect_map(entries.iter().map(|e| (e.key(), e.value())))
    }
}

impl<'de, K, V, S> Deserialize<'de> for HashMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(HashMapVisitor(PhantomData))
    }
}

struct HashMapVisitor<K, V, S>(PhantomData<(K, V, S)>);

impl<'de, K, V, S> Visitor<'de> for HashMapVisitor<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    type Value = HashMap<K, V, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let map = match access.size_hint() {
            // keep the hinted entries under the load factor
            Some(n) => HashMap::with_capacity_and_hasher(n * 3 / 2 + 1, S::default()),
            None => HashMap::with_hasher(S::default()),
        };

        while let Some((key, value)) = access.next_entry()? {
            if !map.insert(key, value) {
                return Err(de::Error::custom("map holds the same key twice"));
            }
        }

        Ok(map)
    }
}

impl<T> Serialize for Queue<T>
where
    T: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let mut seq = serializer.serialize_seq(None)?;
        let mut result = Ok(());
        self.for_each_committed(|value| {
            if result.is_ok() {
                result = seq.serialize_element(value);
            }
        });
        result?;
        seq.end()
    }
}

impl<'de, T> Deserialize<'de> for Queue<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(QueueVisitor(PhantomData))
    }
}

struct QueueVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for QueueVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = Queue<T>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let queue = match access.size_hint() {
            Some(n) => Queue::with_capacity(n + 2),
            None => Queue::new(),
        };
        while let Some(value) = access.next_element()? {
            queue.push(value);
        }
        Ok(queue)
    }
}

impl<T> Serialize for Vector<T>
where
    T: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let values = self.to_vec();
        serializer.collect_seq(values.iter().map(|v| &**v))
    }
}

impl<'de, T> Deserialize<'de> for Vector<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(VectorVisitor(PhantomData))
    }
}

struct VectorVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for VectorVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = Vector<T>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let vector = match access.size_hint() {
            Some(n) => Vector::with_capacity(n),
            None => Vector::new(),
        };
        while let Some(value) = access.next_element()? {
            vector.push_back(value);
        }
        Ok(vector)
    }
}
