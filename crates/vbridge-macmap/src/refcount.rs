//! Reference counted key set that never auto-creates entries.
//!
//! Networks shared by several hosts are tracked here. Lookups never create
//! an entry; only [`RefCountMap::acquire`] does, and [`RefCountMap::release`]
//! removes the entry as soon as its count drops to zero, so a key is either
//! absent or present with a positive count.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Error type for RefCountMap operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefCountError {
    #[error("Key not found")]
    KeyNotFound,
}

/// A map from key to a positive reference count.
///
/// # Example
///
/// ```
/// use vbridge_macmap::RefCountMap;
///
/// let mut map: RefCountMap<&str> = RefCountMap::new();
///
/// // count() returns None for missing keys (doesn't create entry)
/// assert!(map.count(&"missing").is_none());
///
/// assert_eq!(map.acquire("key"), 1);
/// assert_eq!(map.acquire("key"), 2);
/// assert_eq!(map.release(&"key"), Ok(1));
/// assert_eq!(map.release(&"key"), Ok(0));
/// assert!(!map.contains(&"key"));
/// ```
#[derive(Debug, Clone)]
pub struct RefCountMap<K> {
    inner: HashMap<K, u32>,
}

impl<K> RefCountMap<K>
where
    K: Eq + Hash,
{
    /// Creates a new empty map.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Returns the number of keys with a positive count.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no key is referenced.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if the key is referenced at least once.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the reference count for the given key.
    ///
    /// **This never creates entries.**
    pub fn count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).copied()
    }

    /// Adds a reference to the key, creating it if needed.
    ///
    /// Returns the new reference count.
    pub fn acquire(&mut self, key: K) -> u32 {
        let count = self.inner.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops a reference to the key.
    ///
    /// Returns the remaining count. The key is removed when it reaches zero.
    pub fn release(&mut self, key: &K) -> Result<u32, RefCountError> {
        let count = self.inner.get_mut(key).ok_or(RefCountError::KeyNotFound)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.inner.remove(key);
        }
        Ok(remaining)
    }

    /// Removes the key regardless of its count.
    ///
    /// Returns the count it had, if it was present.
    pub fn remove(&mut self, key: &K) -> Option<u32> {
        self.inner.remove(key)
    }

    /// Returns an iterator over referenced keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }
}

impl<K> Default for RefCountMap<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
