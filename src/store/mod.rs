// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-capacity, concurrently-accessible key-value store.
//!
//! # Architecture
//!
//! ```text
//! Slots: [Empty][Live(k1,v1)][Tombstone][Live(k2,v2)] ...
//!                  ^ open-addressed, linear-probed from h(key) % capacity
//! ```
//!
//! Readers run concurrently with each other; writers are exclusive with
//! everything. `parking_lot::RwLock` gives us that for free in place of the
//! first-reader/last-reader mutex-counter protocol a C implementation would
//! hand-roll.

mod hash;

use hash::jenkins_one_at_a_time;
use parking_lot::RwLock;
use thiserror::Error;

/// One slot in the store's backing array.
#[derive(Debug)]
enum Slot {
    Empty,
    Tombstone,
    Live { key: Box<[u8]>, value: Box<[u8]> },
}

struct StoreInner {
    slots: Vec<Slot>,
    size: usize,
    invalidated: bool,
}

/// Fixed-capacity, open-addressed hash store.
///
/// All operations take `&self`: interior mutability lives behind the
/// reader/writer lock so a single `Store` can be shared across worker
/// threads via `Arc`.
pub struct Store {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

/// Errors returned by store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("capacity must be at least 1")]
    InvalidCapacity,
    #[error("key and value must be non-empty")]
    InvalidArgument,
    #[error("store has been invalidated")]
    Invalidated,
    #[error("store is full")]
    OutOfMemory,
    #[error("no free or tombstoned slot reachable by probing")]
    Full,
}

impl Store {
    /// Create a store with the given fixed `capacity`. Fails if
    /// `capacity == 0`.
    pub fn create(capacity: usize) -> Result<Self, StoreError> {
        if capacity == 0 {
            return Err(StoreError::InvalidCapacity);
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        Ok(Self {
            capacity,
            inner: RwLock::new(StoreInner {
                slots,
                size: 0,
                invalidated: false,
            }),
        })
    }

    /// Fixed capacity this store was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently-live entries.
    pub fn len(&self) -> usize {
        self.inner.read().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.read().invalidated
    }

    fn probe_start(&self, key: &[u8]) -> usize {
        jenkins_one_at_a_time(key) as usize % self.capacity
    }

    /// Insert or replace `key` -> `value`.
    ///
    /// When the store is full and `force` is true, the slot at the key's
    /// initial probe index is overwritten regardless of its occupant
    /// (forced eviction); `size` is unchanged since one live entry replaces
    /// another. When `force` is false and the store is full, fails with
    /// [`StoreError::OutOfMemory`] and leaves the store unchanged.
    pub fn put(&self, key: &[u8], value: &[u8], force: bool) -> Result<(), StoreError> {
        if key.is_empty() || value.is_empty() {
            return Err(StoreError::InvalidArgument);
        }

        let mut inner = self.inner.write();
        if inner.invalidated {
            return Err(StoreError::Invalidated);
        }

        if inner.size >= self.capacity {
            if !force {
                return Err(StoreError::OutOfMemory);
            }
            let idx = self.probe_start(key);
            inner.slots[idx] = Slot::Live {
                key: key.into(),
                value: value.into(),
            };
            return Ok(());
        }

        let start = self.probe_start(key);
        let mut first_tombstone: Option<usize> = None;

        for step in 0..self.capacity {
            let idx = (start + step) % self.capacity;
            match &inner.slots[idx] {
                Slot::Live { key: k, .. } if k.as_ref() == key => {
                    inner.slots[idx] = Slot::Live {
                        key: key.into(),
                        value: value.into(),
                    };
                    return Ok(());
                }
                Slot::Live { .. } => {}
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Empty => {
                    let target = first_tombstone.unwrap_or(idx);
                    inner.slots[target] = Slot::Live {
                        key: key.into(),
                        value: value.into(),
                    };
                    inner.size += 1;
                    return Ok(());
                }
            }
        }

        // Full scan found no Empty slot but a Tombstone was passed over:
        // every non-live slot in the array was a Tombstone. Reuse it.
        if let Some(idx) = first_tombstone {
            inner.slots[idx] = Slot::Live {
                key: key.into(),
                value: value.into(),
            };
            inner.size += 1;
            return Ok(());
        }

        Err(StoreError::Full)
    }

    /// Look up `key`, copying its value out while the read lock is held so
    /// the guard never has to outlive this call (the caller may then do
    /// socket I/O without holding any store lock).
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        if inner.invalidated {
            return None;
        }

        let start = self.probe_start(key);
        for step in 0..self.capacity {
            let idx = (start + step) % self.capacity;
            match &inner.slots[idx] {
                Slot::Empty => return None,
                Slot::Tombstone => continue,
                Slot::Live { key: k, value } if k.as_ref() == key => {
                    return Some(value.to_vec())
                }
                Slot::Live { .. } => continue,
            }
        }
        None
    }

    /// Remove `key`, marking its slot a tombstone. Returns the removed
    /// (key, value) pair, or `None` if absent.
    pub fn delete(&self, key: &[u8]) -> Option<(Box<[u8]>, Box<[u8]>)> {
        let mut inner = self.inner.write();
        if inner.invalidated {
            return None;
        }

        let start = self.probe_start(key);
        for step in 0..self.capacity {
            let idx = (start + step) % self.capacity;
            match &inner.slots[idx] {
                Slot::Empty => return None,
                Slot::Tombstone => continue,
                Slot::Live { key: k, .. } if k.as_ref() == key => {
                    let removed = std::mem::replace(&mut inner.slots[idx], Slot::Tombstone);
                    inner.size -= 1;
                    return match removed {
                        Slot::Live { key, value } => Some((key, value)),
                        _ => unreachable!("slot checked Live above"),
                    };
                }
                Slot::Live { .. } => continue,
            }
        }
        None
    }

    /// Release every live entry and reset every slot to empty. The store
    /// remains usable afterward.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.invalidated {
            return Err(StoreError::Invalidated);
        }
        for slot in inner.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        inner.size = 0;
        Ok(())
    }

    /// Like [`Store::clear`], then releases the backing slot array and
    /// marks the store invalidated. Idempotent-reject: a second call fails.
    pub fn invalidate(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.invalidated {
            return Err(StoreError::Invalidated);
        }
        inner.slots.clear();
        inner.slots.shrink_to_fit();
        inner.size = 0;
        inner.invalidated = true;
        Ok(())
    }
}
