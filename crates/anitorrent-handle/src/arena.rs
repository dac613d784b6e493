//! Generational arena issuing opaque native addresses.

use std::fmt;
use std::num::NonZeroU32;

/// Opaque address of a native handle object.
///
/// Only the engine that allocated the object can mint its address. The
/// owner tag keeps an address from resolving on any other engine, and the
/// generation makes it stale once its slot is freed, so a reused slot is
/// never reachable through an old address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeAddress {
    owner: u64,
    index: u32,
    generation: NonZeroU32,
}

impl NativeAddress {
    /// Slot index, for diagnostics.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation, for diagnostics.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation.get()
    }
}

impl fmt::Debug for NativeAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "NativeAddress({self})")
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}v{}@{}",
            self.index, self.generation, self.owner
        )
    }
}

struct Slot<T> {
    generation: NonZeroU32,
    value: Option<T>,
}

/// Slot storage with owner- and generation-checked access.
pub(crate) struct Arena<T> {
    owner: u64,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Empty arena whose addresses carry `owner`.
    pub(crate) const fn new(owner: u64) -> Self {
        Self {
            owner,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live values.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Store a value and return its address.
    ///
    /// Returns `None` only when every slot index is exhausted.
    pub(crate) fn insert(&mut self, value: T) -> Option<NativeAddress> {
        if let Some(index) = self.free.pop() {
            let slot = self.slots.get_mut(usize::try_from(index).ok()?)?;
            slot.value = Some(value);
            self.len += 1;
            return Some(NativeAddress {
                owner: self.owner,
                index,
                generation: slot.generation,
            });
        }

        let index = u32::try_from(self.slots.len()).ok()?;
        let generation = NonZeroU32::MIN;
        self.slots.push(Slot {
            generation,
            value: Some(value),
        });
        self.len += 1;
        Some(NativeAddress {
            owner: self.owner,
            index,
            generation,
        })
    }

    /// Borrow the value at `address` if it is still live.
    pub(crate) fn get(&self, address: NativeAddress) -> Option<&T> {
        let slot = self.slot(address)?;
        slot.value.as_ref()
    }

    /// Mutably borrow the value at `address` if it is still live.
    pub(crate) fn get_mut(&mut self, address: NativeAddress) -> Option<&mut T> {
        let slot = self.slot_mut(address)?;
        slot.value.as_mut()
    }

    /// Remove the value at `address`, invalidating every copy of the address.
    ///
    /// A slot whose generation counter would wrap is retired instead of reused.
    pub(crate) fn remove(&mut self, address: NativeAddress) -> Option<T> {
        let slot = self.slot_mut(address)?;
        let value = slot.value.take()?;
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(address.index);
        }
        self.len -= 1;
        Some(value)
    }

    fn slot(&self, address: NativeAddress) -> Option<&Slot<T>> {
        if address.owner != self.owner {
            return None;
        }
        let slot = self.slots.get(usize::try_from(address.index).ok()?)?;
        (slot.generation == address.generation).then_some(slot)
    }

    fn slot_mut(&mut self, address: NativeAddress) -> Option<&mut Slot<T>> {
        if address.owner != self.owner {
            return None;
        }
        let slot = self.slots.get_mut(usize::try_from(address.index).ok()?)?;
        (slot.generation == address.generation).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_address_goes_stale_when_slot_is_reused() {
        let mut arena = Arena::new(1);
        let first = arena.insert("first").expect("slot");
        assert_eq!(arena.remove(first), Some("first"));

        let second = arena.insert("second").expect("slot");
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&"second"));
        assert_eq!(arena.remove(first), None);
    }

    #[test]
    fn len_tracks_live_values() {
        let mut arena = Arena::new(1);
        let a = arena.insert(1).expect("slot");
        let b = arena.insert(2).expect("slot");
        assert_eq!(arena.len(), 2);
        let _ = arena.remove(a);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(b), Some(&2));
        assert_eq!(arena.get(a), None);
    }

    #[test]
    fn get_mut_respects_generation() {
        let mut arena = Arena::new(1);
        let address = arena.insert(10).expect("slot");
        if let Some(value) = arena.get_mut(address) {
            *value += 1;
        }
        assert_eq!(arena.get(address), Some(&11));
        let _ = arena.remove(address);
        assert!(arena.get_mut(address).is_none());
    }

    #[test]
    fn addresses_do_not_resolve_in_another_arena() {
        let mut mine = Arena::new(1);
        let mut theirs = Arena::new(2);
        let own = mine.insert("mine").expect("slot");
        let foreign = theirs.insert("theirs").expect("slot");

        assert_eq!(own.index(), foreign.index());
        assert_eq!(own.generation(), foreign.generation());
        assert_ne!(own, foreign);
        assert_eq!(mine.get(foreign), None);
        assert_eq!(mine.remove(foreign), None);
        assert_eq!(mine.get(own), Some(&"mine"));
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn display_names_slot_generation_and_owner() {
        let mut arena = Arena::new(7);
        let address = arena.insert(()).expect("slot");
        assert_eq!(address.to_string(), "0v1@7");
        assert_eq!(format!("{address:?}"), "NativeAddress(0v1@7)");
    }
}
