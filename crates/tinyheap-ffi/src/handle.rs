//! Slot+generation table of live heap instances.
//!
//! A C handle packs the slot index into the upper 32 bits and the slot's
//! generation into the lower 32. Removing an instance bumps the slot's
//! generation, so stale handles miss instead of aliasing a newer instance.
//! Generations start at 1, which keeps `0` permanently invalid as a
//! C-side "no heap" value.

const FIRST_GENERATION: u32 = 1;

fn pack(slot: u32, generation: u32) -> u64 {
    (u64::from(slot) << 32) | u64::from(generation)
}

fn unpack(handle: u64) -> (usize, u32) {
    ((handle >> 32) as usize, handle as u32)
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

pub(crate) struct InstanceTable<T> {
    entries: Vec<Entry<T>>,
    vacant: Vec<u32>,
}

impl<T> InstanceTable<T> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u64 {
        if let Some(slot) = self.vacant.pop() {
            let entry = &mut self.entries[slot as usize];
            entry.value = Some(value);
            return pack(slot, entry.generation);
        }
        let slot = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: FIRST_GENERATION,
            value: Some(value),
        });
        pack(slot, FIRST_GENERATION)
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        let (slot, generation) = unpack(handle);
        let entry = self.entries.get(slot)?;
        if entry.generation != generation {
            return None;
        }
        entry.value.as_ref()
    }

    /// Take the value out and retire the handle. A second removal with the
    /// same handle returns `None`.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (slot, generation) = unpack(handle);
        let entry = self.entries.get_mut(slot)?;
        if entry.generation != generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        // A wrapped generation could match a handle from the slot's first
        // lifetime, so the slot is never reused after that.
        if entry.generation >= FIRST_GENERATION {
            self.vacant.push(slot as u32);
        }
        Some(value)
    }

    /// Number of live instances.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len() - self.vacant.len() - self.retired()
    }

    #[cfg(test)]
    fn retired(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value.is_none() && e.generation < FIRST_GENERATION)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_never_a_valid_handle() {
        let mut table = InstanceTable::new();
        let h = table.insert("a");
        assert_ne!(h, 0);
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(h), Some(&"a"));
    }

    #[test]
    fn removed_handle_goes_stale() {
        let mut table = InstanceTable::new();
        let h = table.insert(7u8);
        assert_eq!(table.remove(h), Some(7));
        assert_eq!(table.get(h), None);
        assert_eq!(table.remove(h), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reused_slot_gets_fresh_generation() {
        let mut table = InstanceTable::new();
        let old = table.insert(1u8);
        table.remove(old);
        let new = table.insert(2u8);
        assert_eq!(old >> 32, new >> 32);
        assert_ne!(old, new);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn unknown_slot_misses() {
        let table: InstanceTable<u8> = InstanceTable::new();
        assert_eq!(table.get(pack(5, FIRST_GENERATION)), None);
    }

    #[test]
    fn wrapped_slot_is_retired() {
        let mut table = InstanceTable::new();
        let h = table.insert(1u8);
        table.entries[0].generation = u32::MAX;
        let h = pack((h >> 32) as u32, u32::MAX);
        assert_eq!(table.remove(h), Some(1));
        assert!(table.vacant.is_empty());
        let fresh = table.insert(2u8);
        assert_eq!(fresh >> 32, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn len_counts_live_instances() {
        let mut table = InstanceTable::new();
        let a = table.insert(1u8);
        let _b = table.insert(2u8);
        assert_eq!(table.len(), 2);
        table.remove(a);
        assert_eq!(table.len(), 1);
    }
}
