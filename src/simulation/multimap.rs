//! Ordered multimap used for the event schedule and for the vehicle index
//! of every road.
//!
//! Keys are kept sorted by their `Ord` implementation; wrap them in
//! [`std::cmp::Reverse`] for a descending order. Values under the same key
//! keep their insertion order.

use std::collections::btree_map;
use std::collections::BTreeMap;

/// A `BTreeMap` that supports multiple values for the same key.
#[derive(Debug, Clone)]
pub struct MultiTreeMap<K, V> {
    buckets: BTreeMap<K, Vec<V>>,
    value_count: usize,
}

impl<K: Ord, V> Default for MultiTreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> MultiTreeMap<K, V> {
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            value_count: 0,
        }
    }

    /// Appends a value at the end of the bucket for `key`
    pub fn put(&mut self, key: K, value: V) {
        self.buckets.entry(key).or_default().push(value);
        self.value_count += 1;
    }

    /// Removes the first value under `key` equal to `value`.
    /// An emptied bucket drops its key. Returns whether anything was removed.
    pub fn remove(&mut self, key: &K, value: &V) -> bool
    where
        V: PartialEq,
    {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let removed = match bucket.iter().position(|v| v == value) {
            Some(pos) => {
                bucket.remove(pos);
                self.value_count -= 1;
                true
            }
            None => false,
        };
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        removed
    }

    /// Total number of values over all keys
    pub fn total_count(&self) -> usize {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    /// Values stored under `key`, in insertion order
    pub fn get(&self, key: &K) -> Option<&[V]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.buckets.keys()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.value_count = 0;
    }

    /// Single-pass iteration over every value, by key and then by insertion
    pub fn values(&self) -> InnerValues<'_, K, V> {
        InnerValues {
            buckets: self.buckets.values(),
            current: <&[V]>::default().iter(),
        }
    }

    /// Every `(key, value)` pair in iteration order
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .iter()
            .flat_map(|(key, bucket)| bucket.iter().map(move |value| (key, value)))
    }

    /// A read-only positional view over every value, in the same order as
    /// [`MultiTreeMap::values`].
    pub fn values_list(&self) -> ValuesList<'_, K, V> {
        ValuesList::new(self)
    }
}

/// Iterator over the values of a [`MultiTreeMap`]
pub struct InnerValues<'a, K, V> {
    buckets: btree_map::Values<'a, K, Vec<V>>,
    current: std::slice::Iter<'a, V>,
}

impl<'a, K, V> Iterator for InnerValues<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.current.next() {
                return Some(value);
            }
            self.current = self.buckets.next()?.iter();
        }
    }
}

/// Positional access over a [`MultiTreeMap`].
///
/// Reading indices in increasing order is O(1) amortised: the bucket that
/// served the previous index is remembered. Asking for a smaller index than
/// the previous one rescans from the first bucket.
pub struct ValuesList<'a, K, V> {
    map: &'a MultiTreeMap<K, V>,
    buckets: btree_map::Values<'a, K, Vec<V>>,
    current: Option<&'a Vec<V>>,
    /// Global index of the first value of `current`
    start: usize,
    previous_index: usize,
}

impl<'a, K: Ord, V> ValuesList<'a, K, V> {
    fn new(map: &'a MultiTreeMap<K, V>) -> Self {
        let mut list = Self {
            map,
            buckets: map.buckets.values(),
            current: None,
            start: 0,
            previous_index: 0,
        };
        list.rewind();
        list
    }

    fn rewind(&mut self) {
        self.buckets = self.map.buckets.values();
        self.current = self.buckets.next();
        self.start = 0;
        self.previous_index = 0;
    }

    pub fn len(&self) -> usize {
        self.map.total_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at global position `index`, or `None` past the end
    pub fn get(&mut self, index: usize) -> Option<&'a V> {
        if index >= self.len() {
            return None;
        }
        if index < self.previous_index {
            self.rewind();
        }
        loop {
            let bucket = self.current?;
            if index < self.start + bucket.len() {
                self.previous_index = index;
                return bucket.get(index - self.start);
            }
            self.start += bucket.len();
            self.current = self.buckets.next();
        }
    }

    /// Fresh iterator over the same values
    pub fn iter(&self) -> InnerValues<'a, K, V> {
        self.map.values()
    }
}
