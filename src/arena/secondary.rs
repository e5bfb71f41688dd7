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
use crate::arena::{ArenaKey, ArenaMap};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A dense secondary mapping `K -> V` for keys from a primary [`ArenaMap`],
/// used to associate extra data with most (ideally *all*) keys of that map.
///
/// Unlike [`ArenaMap`], entries can be removed again, which is what the
/// instruction layout relies on when an instruction is unlinked.
///
/// ```
/// # use itersched::arena_key;
/// # use itersched::arena::*;
/// arena_key! { struct Inst; }
///
/// let mut insts = ArenaMap::new();
/// let i0: Inst = insts.insert("s_load_dword");
/// let i1 = insts.insert("v_mov_b32");
///
/// let latency = SecondaryMap::map_all_keys(&insts, |_, k| if k == i0 { 20 } else { 1 });
///
/// assert_eq!(latency[i0], 20);
/// assert_eq!(latency[i1], 1);
/// ```
#[derive(Clone)]
pub struct SecondaryMap<K: ArenaKey, V> {
    slots: Vec<Option<V>>,
    len: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> SecondaryMap<K, V> {
    /// Creates an empty map.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::default(),
            len: 0,
            _unused: PhantomData,
        }
    }

    /// Creates an empty map with room for every key of `primary`.
    pub fn with_primary<T>(primary: &ArenaMap<K, T>) -> Self {
        let mut slots = Vec::with_capacity(primary.len());

        slots.resize_with(primary.len(), || None);

        Self {
            slots,
            len: 0,
            _unused: PhantomData,
        }
    }

    /// Creates a map of `K -> f(K)` for every key inside of `primary`.
    pub fn map_all_keys<T, F>(primary: &ArenaMap<K, T>, mut f: F) -> Self
    where
        F: FnMut(&ArenaMap<K, T>, K) -> V,
    {
        let slots: Vec<Option<V>> = primary.keys().map(|k| Some(f(primary, k))).collect();

        Self {
            len: slots.len(),
            slots,
            _unused: PhantomData,
        }
    }

    /// Inserts a mapping, returning the previous value if there was one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let index = key.key_index();

        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }

        let prev = self.slots[index].replace(value);

        if prev.is_none() {
            self.len += 1;
        }

        prev
    }

    /// Removes a mapping, returning the value if it was mapped.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let prev = self.slots.get_mut(key.key_index()).and_then(Option::take);

        if prev.is_some() {
            self.len -= 1;
        }

        prev
    }

    /// Checks whether `key` is currently mapped.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Gets the value mapped to `key`, if any.
    #[inline]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.key_index()).and_then(Option::as_ref)
    }

    /// Gets a mutable reference to the value mapped to `key`, if any.
    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.key_index()).and_then(Option::as_mut)
    }

    /// The number of keys currently mapped.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no keys are currently mapped.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over every mapped key and its value, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::key_new(i), v)))
    }

    /// Iterates over every mapped key, in key order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<K: ArenaKey, V> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: PartialEq> PartialEq for SecondaryMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: ArenaKey, V: Eq> Eq for SecondaryMap<K, V> {}

impl<K: ArenaKey, V: Debug> Debug for SecondaryMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        arena::debug_write_map(f, "SecondaryMap", self.iter())
    }
}

impl<K: ArenaKey, V> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &Self::Output {
        self.get(key)
            .expect("tried to access invalid key on `SecondaryMap`")
    }
}

impl<K: ArenaKey, V> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.get_mut(key)
            .expect("tried to access invalid key on `SecondaryMap`")
    }
}
