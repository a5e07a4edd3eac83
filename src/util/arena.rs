//! Arena allocator with generational indices.
//!
//! Stores runtime records (here: parked task futures) behind stable indices.
//! Generation counters detect stale handles: a waker that outlives its task
//! resolves to nothing instead of poking a recycled slot.

use core::fmt;

/// An index into an arena with a generation counter for ABA safety.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Returns the raw slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation counter.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// A simple arena with generation-based indices and slot reuse.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates a new empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the arena has no occupied slots.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.len += 1;

        if let Some(free_index) = self.free_head {
            let slot = &mut self.slots[free_index as usize];
            match slot {
                Slot::Vacant {
                    next_free,
                    generation,
                } => {
                    let generation = *generation;
                    self.free_head = *next_free;
                    *slot = Slot::Occupied { value, generation };
                    ArenaIndex {
                        index: free_index,
                        generation,
                    }
                }
                Slot::Occupied { .. } => unreachable!("free list pointed to occupied slot"),
            }
        } else {
            let index = u32::try_from(self.slots.len()).expect("arena overflow");
            self.slots.push(Slot::Occupied {
                value,
                generation: 0,
            });
            ArenaIndex {
                index,
                generation: 0,
            }
        }
    }

    /// Returns a reference to the value at `index`, if it is still live.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.slots.get(index.index as usize) {
            Some(Slot::Occupied { value, generation }) if *generation == index.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns a mutable reference to the value at `index`, if still live.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize) {
            Some(Slot::Occupied { value, generation }) if *generation == index.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Removes and returns the value at `index`.
    ///
    /// The slot's generation is bumped, so any outstanding copies of the
    /// index become stale.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == index.generation => {
                let next_generation = generation.wrapping_add(1);
                let old = std::mem::replace(
                    slot,
                    Slot::Vacant {
                        next_free: self.free_head,
                        generation: next_generation,
                    },
                );
                self.free_head = Some(index.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Vacant { .. } => unreachable!("slot was occupied"),
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(b), Some("b"));
        assert_eq!(arena.get(b), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_index_resolves_to_nothing() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);

        let b = arena.insert(2);
        // Slot reused, generation bumped.
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn free_slots_are_reused_before_growing() {
        let mut arena = Arena::new();
        let indices: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        for index in &indices {
            arena.remove(*index);
        }
        assert!(arena.is_empty());

        for i in 0..4 {
            arena.insert(i);
        }
        // No new slots beyond the original four.
        assert_eq!(arena.slots.len(), 4);
    }
}
