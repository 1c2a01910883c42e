//! Bounded LRU cache with a write-back eviction hook
//!
//! Backing store for the per-user models: a slot arena plus an intrusive
//! index-based doubly linked list, so get/insert/touch/evict are all O(1)
//! with no reallocation after warm-up. Capacity is fixed at construction.
//!
//! The eviction hook runs synchronously, before the caller's insert returns,
//! with a borrow of the evicted entry; the hierarchy uses it to snapshot
//! models for persistence. A hook error is logged and the entry is removed
//! regardless; the cache never ends up in a half-evicted state.

use std::collections::HashMap;
use std::hash::Hash;
use tracing::warn;

/// Hook invoked with `(key, value)` as an entry is evicted
pub type EvictFn<K, V> = Box<dyn FnMut(&K, &V) -> reverie_core::Result<()> + Send>;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Fixed-capacity LRU map
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
    on_evict: Option<EvictFn<K, V>>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    pub fn with_eviction_hook(capacity: usize, hook: EvictFn<K, V>) -> Self {
        Self::build(capacity, Some(hook))
    }

    fn build(capacity: usize, on_evict: Option<EvictFn<K, V>>) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            capacity,
            map: HashMap::with_capacity(capacity + 1),
            slots: Vec::with_capacity(capacity + 1),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            on_evict,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Look up a key and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Mutable lookup, also marks the entry most recently used
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.slots[idx].as_mut().map(|slot| &mut slot.value)
    }

    /// Look up a key without disturbing recency order
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Insert or replace; evicts the least recently used entry (invoking the
    /// hook) when the insert pushes the cache past capacity
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(slot) = self.slots[idx].as_mut() {
                slot.value = value;
            }
            self.touch(idx);
            return;
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(Slot {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                });
                idx
            }
            None => {
                self.slots.push(Some(Slot {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                }));
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.attach_front(idx);

        while self.map.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Remove a key without invoking the eviction hook
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        let slot = self.slots[idx].take()?;
        self.free.push(idx);
        Some(slot.value)
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    fn evict_lru(&mut self) {
        let idx = self.tail;
        if idx == NIL {
            return;
        }
        self.detach(idx);
        let slot = match self.slots[idx].take() {
            Some(slot) => slot,
            None => return,
        };
        self.map.remove(&slot.key);
        self.free.push(idx);

        if let Some(hook) = self.on_evict.as_mut() {
            if let Err(e) = hook(&slot.key, &slot.value) {
                warn!("eviction hook failed; entry dropped anyway: {}", e);
            }
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(slot) => (slot.prev, slot.next),
            None => return,
        };
        if prev != NIL {
            if let Some(p) = self.slots[prev].as_mut() {
                p.next = next;
            }
        } else {
            self.head = next;
        }
        if next != NIL {
            if let Some(n) = self.slots[next].as_mut() {
                n.prev = prev;
            }
        } else {
            self.tail = prev;
        }
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = NIL;
            slot.next = NIL;
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = NIL;
            slot.next = old_head;
        }
        if old_head != NIL {
            if let Some(h) = self.slots[old_head].as_mut() {
                h.prev = idx;
            }
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}

/// Iterator over cache entries in recency order
pub struct Iter<'a, K, V> {
    cache: &'a LruCache<K, V>,
    cursor: usize,
}

impl<'a, K: Eq + Hash + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let slot = self.cache.slots[self.cursor].as_ref()?;
        self.cursor = slot.next;
        Some((&slot.key, &slot.value))
    }
}
