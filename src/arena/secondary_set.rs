//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, ArenaMap};
use smallbitvec::{sbvec, SmallBitVec};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// A dense set of keys from a primary map, stored as a single bitvector.
///
/// The schedulers use this for "has this node been scheduled yet" style
/// questions, which get asked for every candidate on every step.
#[derive(Clone)]
pub struct SecondarySet<K: ArenaKey> {
    bits: SmallBitVec,
    cardinality: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> SecondarySet<K> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bits: SmallBitVec::default(),
            cardinality: 0,
            _unused: PhantomData,
        }
    }

    /// Creates an empty set sized for every key of `primary`.
    #[inline]
    pub fn with_primary<T>(primary: &ArenaMap<K, T>) -> Self {
        Self {
            bits: sbvec![false; primary.len()],
            cardinality: 0,
            _unused: PhantomData,
        }
    }

    /// Adds `key` to the set, returning `true` if it was not already present.
    pub fn insert(&mut self, key: K) -> bool {
        let index = key.key_index();

        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }

        if self.bits[index] {
            return false;
        }

        self.bits.set(index, true);
        self.cardinality += 1;

        true
    }

    /// Removes `key` from the set, returning `true` if it was present.
    pub fn remove(&mut self, key: K) -> bool {
        if !self.contains(key) {
            return false;
        }

        self.bits.set(key.key_index(), false);
        self.cardinality -= 1;

        true
    }

    /// Checks if `key` is in the set.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.bits.get(key.key_index()).unwrap_or(false)
    }

    /// Number of keys in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.cardinality
    }

    /// Whether the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Iterates over the keys in the set in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| *bit)
            .map(|(i, _)| K::key_new(i))
    }
}

impl<K: ArenaKey> Default for SecondarySet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey> Debug for SecondarySet<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecondarySet ")?;

        f.debug_set().entries(self.iter()).finish()
    }
}
