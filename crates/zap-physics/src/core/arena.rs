use std::sync::atomic::{AtomicU32, Ordering};

/// Source of arena ids. Zero is never issued.
static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Slot index paired with the generation it was issued under.
/// A removed slot bumps its generation, so stale indices stop resolving.
/// The issuing arena's id travels along, so an index never resolves in
/// another arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
    pub(crate) arena: u32,
}

impl Index {
    /// Raw slot number. Stable for the lifetime of the entry.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Generational slot storage.
/// Designed for physics worlds with hundreds to low thousands of entries.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    id: u32,
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Store a value and return its index. Freed slots are reused first.
    pub fn insert(&mut self, value: T) -> Index {
        self.len += 1;
        if let Some(slot) = self.free_head {
            let entry = &mut self.entries[slot as usize];
            if let Entry::Free { generation, next_free } = *entry {
                self.free_head = next_free;
                *entry = Entry::Occupied { generation, value };
                return Index { slot, generation, arena: self.id };
            }
        }
        let slot = self.entries.len() as u32;
        self.entries.push(Entry::Occupied { generation: 0, value });
        Index { slot, generation: 0, arena: self.id }
    }

    /// Remove a value. Returns `None` for stale or unknown indices.
    pub fn remove(&mut self, index: Index) -> Option<T> {
        if !self.contains(index) {
            return None;
        }
        let freed = Entry::Free {
            generation: index.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let old = std::mem::replace(&mut self.entries[index.slot as usize], freed);
        self.free_head = Some(index.slot);
        self.len -= 1;
        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Free { .. } => None,
        }
    }

    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    /// True when `index` was issued by this arena.
    pub fn owns(&self, index: Index) -> bool {
        index.arena == self.id
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        if !self.owns(index) {
            return None;
        }
        match self.entries.get(index.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        if !self.owns(index) {
            return None;
        }
        match self.entries.get_mut(index.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Mutable access to two distinct entries at once.
    pub fn get2_mut(&mut self, a: Index, b: Index) -> Option<(&mut T, &mut T)> {
        if a.slot == b.slot || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (lo, hi, swapped) = if a.slot < b.slot { (a, b, false) } else { (b, a, true) };
        let (head, tail) = self.entries.split_at_mut(hi.slot as usize);
        let first = match &mut head[lo.slot as usize] {
            Entry::Occupied { value, .. } => value,
            Entry::Free { .. } => return None,
        };
        let second = match &mut tail[0] {
            Entry::Occupied { value, .. } => value,
            Entry::Free { .. } => return None,
        };
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Iterate over occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        let arena = self.id;
        self.entries.iter().enumerate().filter_map(move |(slot, e)| match e {
            Entry::Occupied { generation, value } => Some((
                Index { slot: slot as u32, generation: *generation, arena },
                value,
            )),
            Entry::Free { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut T)> {
        let arena = self.id;
        self.entries.iter_mut().enumerate().filter_map(move |(slot, e)| match e {
            Entry::Occupied { generation, value } => Some((
                Index { slot: slot as u32, generation: *generation, arena },
                value,
            )),
            Entry::Free { .. } => None,
        })
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, occupied or free.
    pub fn slot_capacity(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
