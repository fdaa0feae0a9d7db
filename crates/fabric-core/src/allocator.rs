use slab::Slab;
use static_assertions::const_assert_eq;
use std::{
    mem,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

/// A stable identifier for a value stored in an [`Arena`]. Tree nodes refer to each other with these instead of references.
///
/// An `Option<NodeId>` still only requires 32 bits.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(NonZeroU32);

const_assert_eq!(mem::size_of::<Option<NodeId>>(), mem::size_of::<NodeId>());

impl NodeId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn from_index(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "arena is full");
        // Shift by one so that slab index 0 is still representable by a non-zero id.
        Self(NonZeroU32::new(index as u32 + 1).unwrap())
    }

    #[inline]
    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Slab-backed storage for tree nodes. Ids stay valid until the value is removed, and removed slots get recycled.
pub struct Arena<T> {
    values: Slab<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { values: Slab::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Slab::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.values.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.values.get_mut(id.index())
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.values.contains(id.index())
    }

    pub fn insert(&mut self, value: T) -> NodeId {
        NodeId::from_index(self.values.insert(value))
    }

    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        self.values.try_remove(id.index())
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.values.iter().map(|(i, v)| (NodeId::from_index(i), v))
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId) -> &Self::Output {
        self.values.index(id.index())
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        self.values.index_mut(id.index())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_survive_unrelated_removals() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        let c = arena.insert("c");

        assert_eq!(arena.remove(b), Some("b"));
        assert_eq!(arena.remove(b), None);
        assert_eq!(arena[a], "a");
        assert_eq!(arena[c], "c");
        assert!(!arena.contains(b));

        // The freed slot is recycled.
        let d = arena.insert("d");
        assert_eq!(d, b);
        assert_eq!(arena.len(), 3);
    }
}
