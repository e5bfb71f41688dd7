//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use std::iter::FusedIterator;
use std::marker::PhantomData;

/// Iterates over all of the keys in a given [`ArenaMap`](crate::arena::ArenaMap),
/// in increasing (i.e. insertion) order.
///
/// ```
/// # use itersched::arena_key;
/// # use itersched::arena::*;
/// arena_key! { struct K; }
/// let mut map = ArenaMap::<K, i32>::new();
/// let k1 = map.insert(1);
/// let k2 = map.insert(2);
/// let mut keys = map.keys();
/// assert_eq!(keys.next(), Some(k1));
/// assert_eq!(keys.next_back(), Some(k2));
/// assert_eq!(keys.next(), None);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct Keys<K: ArenaKey> {
    pos: usize,
    reverse_pos: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> Keys<K> {
    pub(in crate::arena) fn with_len(len: usize) -> Self {
        Self {
            pos: 0,
            reverse_pos: len,
            _unused: PhantomData,
        }
    }
}

impl<K: ArenaKey> Iterator for Keys<K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos < self.reverse_pos {
            self.pos += 1;

            Some(K::key_new(self.pos - 1))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.reverse_pos - self.pos;

        (size, Some(size))
    }
}

impl<K: ArenaKey> DoubleEndedIterator for Keys<K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.pos < self.reverse_pos {
            self.reverse_pos -= 1;

            Some(K::key_new(self.reverse_pos))
        } else {
            None
        }
    }
}

impl<K: ArenaKey> ExactSizeIterator for Keys<K> {}

impl<K: ArenaKey> FusedIterator for Keys<K> {}
