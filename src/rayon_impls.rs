use crate::{HashMap, Queue, Vector};
use rayon::iter::{FromParallelIterator, IntoParallelIterator, ParallelExtend, ParallelIterator};
use std::hash::{BuildHasher, Hash};

impl<K, V, S> ParallelExtend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Sync,
{
    // `&mut self` buys nothing here; see `par_extend_sync`
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        self.par_extend_sync(par_iter);
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Sync,
{
    /// Inserts every pair of `par_iter` from rayon's worker threads.
    ///
    /// Like [`HashMap::insert`], a pair whose key is already present is dropped.
    pub fn par_extend_sync<I>(&self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        par_iter.into_par_iter().for_each(|(k, v)| {
            self.insert(k, v);
        });
    }
}

impl<K, V> FromParallelIterator<(K, V)> for HashMap<K, V, crate::DefaultHashBuilder>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        let created_map = HashMap::new();
        created_map.par_extend_sync(par_iter);
        created_map
    }
}

impl<T> ParallelExtend<T> for Queue<T>
where
    T: Send,
{
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = T>,
    {
        let queue = &*self;
        par_iter.into_par_iter().for_each(|v| queue.push(v));
    }
}

impl<T> ParallelExtend<T> for Vector<T>
where
    T: Send + Sync,
{
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = T>,
    {
        let vector = &*self;
        par_iter.into_par_iter().for_each(|v| vector.push_back(v));
    }
}

impl<T> FromParallelIterator<T> for Vector<T>
where
    T: Send + Sync,
{
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = T>,
    {
        let mut created = Vector::new();
        created.par_extend(par_iter);
        created
    }
}
