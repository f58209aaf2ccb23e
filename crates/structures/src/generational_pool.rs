use std::{marker::PhantomData, num::NonZeroU32};

/// Handle to an item in a generational pool. The handle is guaranteed to be
/// unique for the lifetime of the pool that created it.
///
/// It is typed for a modicum of safety, but it is still possible to use the
/// handle to look up an item in a different pool of the same type. That lookup
/// will be wrong, though never unsound.
pub struct Handle<T> {
    index: u32,
    generation: NonZeroU32,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: NonZeroU32) -> Self {
        Self {
            index,
            generation,
            _phantom: PhantomData,
        }
    }

    /// Packs the handle into a single integer, generation in the high bits.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        u64::from(self.generation.get()) << 32 | u64::from(self.index)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bits().cmp(&other.to_bits())
    }
}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation.get())
            .finish()
    }
}

struct Slot<T> {
    // Bumped every time the slot is vacated so that stale handles stop
    // matching.
    generation: NonZeroU32,
    value: Option<T>,
}

/// An object pool that makes use of generational indices to avoid the ABA
/// problem.
pub struct GenerationalPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for GenerationalPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GenerationalPool<T> {
    /// Initializes a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// The number of live items in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a reference to the item identified by the given handle.
    ///
    /// ## Returns
    ///
    /// `Some(&T)` if the handle is valid and `None` otherwise.
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Returns a mutable reference to the item identified by the given handle.
    ///
    /// ## Returns
    ///
    /// `Some(&mut T)` if the handle is valid and `None` otherwise.
    #[must_use]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    #[must_use]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Inserts a new value into the pool and returns a handle to it.
    ///
    /// ## Panics
    ///
    /// This function will panic if the pool would hold more than `u32::MAX`
    /// slots.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            Handle::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).expect("max u32::MAX items!");
            self.slots.push(Slot {
                generation: NonZeroU32::MIN,
                value: Some(value),
            });
            Handle::new(index, NonZeroU32::MIN)
        }
    }

    /// Removes the value identified by the given handle from the pool.
    ///
    /// ## Returns
    ///
    /// Returns the value if the handle is valid and `None` otherwise.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        self.len -= 1;

        // A saturated slot is retired instead of being reused.
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(handle.index);
        }

        Some(value)
    }

    /// Handles to every live item, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        self.iter().map(|(handle, _)| handle)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((Handle::new(index as u32, slot.generation), value))
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            let value = slot.value.as_mut()?;
            Some((Handle::new(index as u32, generation), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn init() {
        let pool = GenerationalPool::<u32>::new();

        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.handles().count(), 0);
    }

    #[test]
    fn insert_get_remove_one() {
        let mut pool = GenerationalPool::<u32>::new();

        let handle = pool.insert(42);

        assert_eq!(handle.to_bits(), 1 << 32);
        assert_eq!(pool.get(handle), Some(&42));
        assert_eq!(pool.get_mut(handle), Some(&mut 42));
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.remove(handle), Some(42));
        assert!(!pool.contains(handle));
        assert!(pool.is_empty());
        assert_eq!(pool.slots[0].generation.get(), 2);
        assert_eq!(pool.free, vec![0]);
    }

    #[test]
    fn handles() {
        let mut pool = GenerationalPool::<u32>::new();

        let handle = pool.insert(42);
        let handle2 = handle;

        assert_eq!(handle, handle2);
        assert_eq!(
            format!("{:?}", handle),
            "Handle { index: 0, generation: 1 }"
        );
    }

    #[test]
    fn insert_get_remove_many() {
        const COUNT: usize = 10;

        let mut pool = GenerationalPool::<u32>::new();
        let mut keys = vec![];

        for i in 0..COUNT {
            let handle = pool.insert(i as u32);
            keys.push(handle);
        }

        for (i, k) in keys.iter().enumerate() {
            assert_eq!(pool.get(*k), Some(&(i as u32)));
            assert_eq!(pool.get_mut(*k), Some(&mut (i as u32)));
        }

        assert_eq!(pool.handles().collect::<Vec<_>>(), keys);
        assert_eq!(pool.len(), COUNT);

        for (i, k) in keys.iter().enumerate() {
            assert_eq!(pool.remove(*k), Some(i as u32));
            assert!(!pool.contains(*k));
        }

        assert_eq!(pool.slots.len(), COUNT);
        assert!(pool.slots.iter().all(|slot| slot.generation.get() == 2));
    }

    #[test]
    fn remove_twice() {
        let mut pool = GenerationalPool::<u32>::new();
        let handle = pool.insert(42);

        assert_eq!(pool.remove(handle), Some(42));
        assert_eq!(pool.remove(handle), None);

        let _ = pool.insert(43);
        assert_eq!(pool.remove(handle), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn insert_remove_insert_get() {
        let mut pool = GenerationalPool::<u32>::new();

        let a = pool.insert(42);
        assert_eq!(pool.remove(a), Some(42));

        let b = pool.insert(43);
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.get(b), Some(&43));
        assert_ne!(a, b);
    }

    #[test]
    fn iter_mut_skips_free_slots() {
        let mut pool = GenerationalPool::<u32>::new();

        let a = pool.insert(1);
        let b = pool.insert(2);
        let c = pool.insert(3);
        pool.remove(b);

        for (_, value) in pool.iter_mut() {
            *value *= 10;
        }

        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool.get(c), Some(&30));
        assert_eq!(pool.iter().count(), 2);
    }

    #[test]
    fn non_copy_drop_once() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct T {
            #[allow(dead_code)]
            data: u32,
        }

        impl Drop for T {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut pool = GenerationalPool::<T>::new();

        let a = pool.insert(T { data: 42 });
        pool.remove(a);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);

        pool.remove(a);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);

        let _b = pool.insert(T { data: 43 });
        drop(pool);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
    }
}
