// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A free-list slot allocator handing out small integer handles.
//!
//! Every handle returned by a [`Heap`] is `id_offset | slot_index`. The offset occupies the bits
//! covered by [`OFFSET_MASK`] and identifies which heap (and therefore which kind of object) a
//! handle belongs to; the slot index occupies the bits covered by [`INDEX_MASK`]. Handles are
//! plain integers so they can cross an FFI boundary without exposing any pointer.
//!
//! Allocation, release and lookup are O(1). Freed slots are pushed on an intrusive singly linked
//! free list and are reused before the storage grows, so a freed handle value comes back on the
//! next allocation.
//!
//! ```
//! use slot_heap::Heap;
//!
//! let mut heap = Heap::new(0x0400_0000, 16).unwrap();
//! let a = heap.allocate("a").unwrap();
//! let b = heap.allocate("b").unwrap();
//! assert_eq!((a, b), (0x0400_0000, 0x0400_0001));
//! heap.free(a).unwrap();
//! assert_eq!(heap.allocate("c").unwrap(), a);
//! ```

use std::cmp;
use std::fmt;

use log::debug;
use log::warn;
use remain::sorted;
use thiserror::Error;

/// Bits of a handle holding the slot index.
pub const INDEX_MASK: u32 = 0x00ff_ffff;
/// Bits of a handle holding the heap offset.
pub const OFFSET_MASK: u32 = !INDEX_MASK;

// The all-ones index is never handed out so that no handle can collide with an all-ones
// "invalid id" value used by hosts.
const MAX_SLOTS: usize = INDEX_MASK as usize;

#[sorted]
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("handle {0:#010x} is not currently allocated")]
    DoubleFree(u32),
    #[error("handle {handle:#010x} does not belong to heap {id_offset:#010x}")]
    ForeignHandle { handle: u32, id_offset: u32 },
    #[error("id offset {0:#010x} overlaps the slot index bits")]
    InvalidIdOffset(u32),
    #[error("heap increment must be non-zero")]
    InvalidIncrement,
    #[error("failed to grow heap storage")]
    OutOfMemory,
    #[error("heap index space exhausted")]
    OutOfSpace,
}

pub type Result<T> = std::result::Result<T, Error>;

enum Slot<T> {
    Free {
        /// Next free slot, or `None` at the end of the free list.
        next_free: Option<usize>,
    },
    Allocated {
        id: u32,
        object: T,
    },
}

/// Position of an in-progress [`Heap::first`]/[`Heap::next`] walk.
///
/// A cursor stays meaningful only while the heap is not modified. Using it after an allocation
/// or a release does not crash, but which objects are visited from then on is unspecified.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    index: usize,
    id: u32,
    generation: u64,
}

impl Cursor {
    /// Handle of the object this cursor points at.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Slot allocator for objects of type `T`.
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    next_free: Option<usize>,
    id_offset: u32,
    increment: usize,
    allocated: usize,
    /// Bumped on every allocation and release; lets cursors notice concurrent modification.
    generation: u64,
}

impl<T> Heap<T> {
    /// Creates an empty heap. No slot is allocated until the first call to `allocate`.
    ///
    /// * `id_offset` - Value or'ed into every slot index to form a handle. Must not have any of
    ///   the `INDEX_MASK` bits set.
    /// * `increment` - Number of slots added every time the free list runs dry.
    pub fn new(id_offset: u32, increment: usize) -> Result<Self> {
        if id_offset & INDEX_MASK != 0 {
            return Err(Error::InvalidIdOffset(id_offset));
        }
        if increment == 0 {
            return Err(Error::InvalidIncrement);
        }
        Ok(Heap {
            slots: Vec::new(),
            next_free: None,
            id_offset,
            increment,
            allocated: 0,
            generation: 0,
        })
    }

    pub fn id_offset(&self) -> u32 {
        self.id_offset
    }

    /// Number of currently allocated objects.
    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Number of slots, free and allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if `id` carries this heap's offset.
    pub fn owns(&self, id: u32) -> bool {
        id & OFFSET_MASK == self.id_offset
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        if !self.owns(id) {
            return None;
        }
        let index = (id & INDEX_MASK) as usize;
        if index < self.slots.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Appends `increment` zeroed slots and links them in front of the free list.
    fn grow(&mut self) -> Result<()> {
        let old_len = self.slots.len();
        if old_len >= MAX_SLOTS {
            return Err(Error::OutOfSpace);
        }
        let new_len = cmp::min(old_len + self.increment, MAX_SLOTS);
        self.slots
            .try_reserve_exact(new_len - old_len)
            .map_err(|_| Error::OutOfMemory)?;
        for index in old_len..new_len {
            let next_free = if index + 1 < new_len {
                Some(index + 1)
            } else {
                self.next_free
            };
            self.slots.push(Slot::Free { next_free });
        }
        self.next_free = Some(old_len);
        Ok(())
    }

    /// Stores `object` in a free slot and returns its handle.
    ///
    /// When the free list is empty the storage grows once by the heap increment and the
    /// allocation is retried; it fails if that growth fails.
    pub fn allocate(&mut self, object: T) -> Result<u32> {
        let index = match self.next_free {
            Some(index) => index,
            None => {
                self.grow()?;
                self.next_free.ok_or(Error::OutOfSpace)?
            }
        };
        let next_free = match self.slots[index] {
            Slot::Free { next_free } => next_free,
            Slot::Allocated { id, .. } => {
                // The free list points at a live slot. Refuse rather than clobber it.
                debug_assert!(false, "free list corrupted at {:#010x}", id);
                return Err(Error::OutOfSpace);
            }
        };
        let id = self.id_offset | index as u32;
        self.slots[index] = Slot::Allocated { id, object };
        self.next_free = next_free;
        self.allocated += 1;
        self.generation = self.generation.wrapping_add(1);
        Ok(id)
    }

    /// Returns the object for `id`, or `None` for freed, foreign or garbage handles.
    pub fn get(&self, id: u32) -> Option<&T> {
        match self.slots.get(self.index_of(id)?)? {
            Slot::Allocated { id: slot_id, object } if *slot_id == id => Some(object),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        let index = self.index_of(id)?;
        match self.slots.get_mut(index)? {
            Slot::Allocated { id: slot_id, object } if *slot_id == id => Some(object),
            _ => None,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Releases the slot of `id` and hands back the object it held.
    ///
    /// Releasing a handle that is not allocated, or that belongs to another heap, is a
    /// programming error: it asserts in debug builds and is refused without touching the free
    /// list otherwise.
    pub fn free(&mut self, id: u32) -> Result<T> {
        if !self.owns(id) {
            debug_assert!(
                false,
                "handle {:#010x} freed on heap {:#010x}",
                id, self.id_offset
            );
            return Err(Error::ForeignHandle {
                handle: id,
                id_offset: self.id_offset,
            });
        }
        let index = match self.index_of(id) {
            Some(index) if matches!(self.slots[index], Slot::Allocated { .. }) => index,
            _ => {
                debug_assert!(false, "double free of handle {:#010x}", id);
                return Err(Error::DoubleFree(id));
            }
        };
        let slot = std::mem::replace(
            &mut self.slots[index],
            Slot::Free {
                next_free: self.next_free,
            },
        );
        self.next_free = Some(index);
        self.allocated -= 1;
        self.generation = self.generation.wrapping_add(1);
        match slot {
            Slot::Allocated { object, .. } => Ok(object),
            Slot::Free { .. } => Err(Error::DoubleFree(id)),
        }
    }

    fn scan_from(&self, start: usize) -> Option<(Cursor, &T)> {
        self.slots
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, slot)| match slot {
                Slot::Allocated { id, object } => Some((
                    Cursor {
                        index,
                        id: *id,
                        generation: self.generation,
                    },
                    object,
                )),
                Slot::Free { .. } => None,
            })
    }

    /// First allocated object in ascending slot order.
    pub fn first(&self) -> Option<(Cursor, &T)> {
        self.scan_from(0)
    }

    /// Allocated object following `cursor` in ascending slot order.
    pub fn next(&self, cursor: Cursor) -> Option<(Cursor, &T)> {
        if cursor.generation != self.generation {
            debug!(
                "heap {:#010x} modified during iteration, continuing after {:#010x}",
                self.id_offset, cursor.id
            );
        }
        self.scan_from(cursor.index + 1)
    }

    /// Iterates over `(handle, object)` pairs in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Allocated { id, object } => Some((*id, object)),
            Slot::Free { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Allocated { id, object } => Some((*id, &mut *object)),
            Slot::Free { .. } => None,
        })
    }

    /// Snapshot of all allocated handles, for walks that free objects as they go.
    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Releases the heap storage and returns how many objects were still allocated.
    ///
    /// Callers are expected to free every object first; leftovers are dropped and reported as
    /// a leak.
    pub fn destroy(self) -> usize {
        if self.allocated != 0 {
            warn!(
                "heap {:#010x} destroyed with {} object(s) still allocated",
                self.id_offset, self.allocated
            );
        }
        self.allocated
    }
}

impl<T> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Heap")
            .field("id_offset", &format_args!("{:#010x}", self.id_offset))
            .field("allocated", &self.allocated)
            .field("capacity", &self.slots.len())
            .field("next_free", &self.next_free)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSET: u32 = 0x0400_0000;

    #[test]
    fn new_rejects_bad_arguments() {
        assert_eq!(
            Heap::<u32>::new(0x0400_0001, 16).unwrap_err(),
            Error::InvalidIdOffset(0x0400_0001)
        );
        assert_eq!(
            Heap::<u32>::new(OFFSET, 0).unwrap_err(),
            Error::InvalidIncrement
        );
    }

    #[test]
    fn new_allocates_nothing() {
        let heap = Heap::<u32>::new(OFFSET, 16).unwrap();
        assert_eq!(heap.capacity(), 0);
        assert!(heap.is_empty());
        assert!(heap.first().is_none());
    }

    #[test]
    fn handles_carry_offset_and_index() {
        let mut heap = Heap::new(OFFSET, 16).unwrap();
        assert_eq!(heap.allocate(0).unwrap(), 0x0400_0000);
        assert_eq!(heap.allocate(1).unwrap(), 0x0400_0001);
        assert_eq!(heap.allocate(2).unwrap(), 0x0400_0002);
        heap.free(0x0400_0001).unwrap();
        assert_eq!(heap.allocate(3).unwrap(), 0x0400_0001);
        assert_eq!(heap.get(0x0400_0001), Some(&3));
    }

    #[test]
    fn grows_by_increment() {
        let mut heap = Heap::new(OFFSET, 4).unwrap();
        for i in 0..5 {
            heap.allocate(i).unwrap();
        }
        assert_eq!(heap.capacity(), 8);
        assert_eq!(heap.len(), 5);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let mut heap = Heap::new(OFFSET, 4).unwrap();
        let id = heap.allocate(7u32).unwrap();
        assert!(heap.get(id).is_some());
        // Other kind, out of range and never allocated slots.
        assert!(heap.get(0x0800_0000).is_none());
        assert!(heap.get(OFFSET | 100).is_none());
        assert!(heap.get(OFFSET | 2).is_none());
        assert!(heap.get(0xffff_ffff).is_none());
        heap.free(id).unwrap();
        assert!(heap.get(id).is_none());
        assert!(heap.get_mut(id).is_none());
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = Heap::new(OFFSET, 3).unwrap();
        let ids: Vec<u32> = (0..6).map(|i| heap.allocate(i).unwrap()).collect();
        for id in [ids[4], ids[0], ids[5], ids[2], ids[1], ids[3]] {
            heap.free(id).unwrap();
        }
        let mut again: Vec<u32> = (0..6).map(|i| heap.allocate(i).unwrap()).collect();
        again.sort_unstable();
        assert_eq!(again, ids);
        assert_eq!(heap.capacity(), 6);
    }

    #[test]
    fn lookup_tracks_allocation_state() {
        let mut heap = Heap::new(OFFSET, 2).unwrap();
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for round in 0..20u32 {
            live.push(heap.allocate(round).unwrap());
            if round % 3 == 2 {
                let id = live.remove(live.len() / 2);
                heap.free(id).unwrap();
                dead.push(id);
            }
            for id in &live {
                assert!(heap.contains(*id));
            }
            for id in dead.iter().filter(|id| !live.contains(id)) {
                assert!(!heap.contains(*id));
            }
        }
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut heap = Heap::new(OFFSET, 8).unwrap();
        let ids: Vec<u32> = (0..5).map(|i| heap.allocate(i * 10).unwrap()).collect();
        heap.free(ids[1]).unwrap();
        heap.free(ids[3]).unwrap();

        let mut seen = Vec::new();
        let mut cursor = heap.first();
        while let Some((c, value)) = cursor {
            seen.push((c.id(), *value));
            cursor = heap.next(c);
        }
        assert_eq!(seen, vec![(ids[0], 0), (ids[2], 20), (ids[4], 40)]);
        assert_eq!(heap.ids(), vec![ids[0], ids[2], ids[4]]);
    }

    #[test]
    fn stale_cursor_does_not_crash() {
        let mut heap = Heap::new(OFFSET, 2).unwrap();
        let a = heap.allocate(1).unwrap();
        heap.allocate(2).unwrap();
        let (cursor, _) = heap.first().unwrap();
        heap.free(a).unwrap();
        heap.allocate(3).unwrap();
        heap.allocate(4).unwrap();
        // Whatever is returned, walking to the end terminates.
        let mut next = heap.next(cursor);
        let mut steps = 0;
        while let Some((c, _)) = next {
            steps += 1;
            next = heap.next(c);
        }
        assert!(steps <= heap.capacity());
    }

    #[test]
    fn destroy_reports_leaks() {
        let mut heap = Heap::new(OFFSET, 2).unwrap();
        let id = heap.allocate(()).unwrap();
        heap.allocate(()).unwrap();
        heap.free(id).unwrap();
        assert_eq!(heap.destroy(), 1);
        assert_eq!(Heap::<()>::new(OFFSET, 2).unwrap().destroy(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "double free")]
    fn double_free_asserts_in_debug() {
        let mut heap = Heap::new(OFFSET, 2).unwrap();
        let id = heap.allocate(()).unwrap();
        heap.free(id).unwrap();
        let _ = heap.free(id);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn double_free_is_refused_in_release() {
        let mut heap = Heap::new(OFFSET, 2).unwrap();
        let a = heap.allocate(1).unwrap();
        let b = heap.allocate(2).unwrap();
        heap.free(a).unwrap();
        assert_eq!(heap.free(a), Err(Error::DoubleFree(a)));
        assert_eq!(
            heap.free(0x0800_0000),
            Err(Error::ForeignHandle {
                handle: 0x0800_0000,
                id_offset: OFFSET
            })
        );
        // The free list is intact: exactly one slot comes back before growth.
        assert_eq!(heap.allocate(3).unwrap(), a);
        assert_eq!(heap.get(b), Some(&2));
        assert_eq!(heap.capacity(), 2);
    }
}
