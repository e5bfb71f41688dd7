//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena;
use crate::arena::{ArenaKey, Keys};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// The primary mapping of `K -> V`. Other mappings that use the same key
/// should use [`SecondaryMap`](super::SecondaryMap) or
/// [`SecondarySet`](super::SecondarySet) instead.
///
/// This is a typed wrapper around `Vec<V>` that only allows indexing with the
/// correct key type, and never removes entries so keys stay valid for the
/// entire lifetime of the map.
///
/// ```
/// # use itersched::arena_key;
/// # use itersched::arena::ArenaMap;
/// arena_key! {
///     struct Name;
/// }
///
/// let mut blocks = ArenaMap::new();
/// let bb: Name = blocks.insert("entry");
///
/// assert_eq!(blocks[bb], "entry");
/// ```
#[derive(Clone)]
pub struct ArenaMap<K: ArenaKey, V> {
    slots: Vec<V>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates a new, empty arena.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::default(),
            _unused: PhantomData,
        }
    }

    /// Creates an empty arena with an initial capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _unused: PhantomData,
        }
    }

    /// Checks if the arena contains a given key, i.e. whether a given key
    /// has been returned from [`Self::insert`] at some point.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        key.key_index() < self.slots.len()
    }

    /// Gets the value associated with `key`, if the key exists.
    #[inline]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.key_index())
    }

    /// Gets a mutable reference to the value associated with `key`, if the key exists.
    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.key_index())
    }

    /// Adds an item into the arena, and returns a key that can be used to
    /// access that data later.
    ///
    /// ```
    /// # use itersched::arena_key;
    /// # use itersched::arena::*;
    /// # arena_key! { struct Key; }
    /// let mut map = ArenaMap::default();
    /// let k: Key = map.insert("v_add_f32");
    /// assert_eq!(map[k], "v_add_f32");
    /// ```
    #[inline]
    pub fn insert(&mut self, value: V) -> K {
        self.slots.push(value);

        K::key_new(self.slots.len() - 1)
    }

    /// Gets the number of elements that have been pushed into the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if the arena has had any elements pushed into it.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns an iterator over the (valid) keys of the arena, in increasing order.
    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.slots.len())
    }

    /// Returns an iterator over the keys and values of the arena.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (K, &V)> + ExactSizeIterator {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }

    /// Returns an iterator over the keys and values of the arena, giving mutable references.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (K, &mut V)> + ExactSizeIterator {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }
}

impl<K: ArenaKey, V> FromIterator<V> for ArenaMap<K, V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self {
            slots: Vec::from_iter(iter),
            _unused: PhantomData,
        }
    }
}

impl<K: ArenaKey, T> Default for ArenaMap<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for ArenaMap<K, V>
where
    K: ArenaKey,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        arena::debug_write_map(f, "ArenaMap", self.iter())
    }
}

impl<K: ArenaKey, T> Index<K> for ArenaMap<K, T> {
    type Output = T;

    fn index(&self, key: K) -> &Self::Output {
        self.slots
            .get(key.key_index())
            .expect("tried to access invalid key on `ArenaMap`")
    }
}

impl<K: ArenaKey, T> IndexMut<K> for ArenaMap<K, T> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.slots
            .get_mut(key.key_index())
            .expect("tried to access invalid key on `ArenaMap`")
    }
}
