//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::Debug;

/// Models a type that can act as a key for the arena map types.
///
/// Prefer the [`arena_key`](crate::arena_key) or [`dense_arena_key`](crate::dense_arena_key)
/// macros over implementing this by hand.
pub trait ArenaKey: Copy + Eq + Debug {
    /// Creates a new key from a given arena index. Panics if the index cannot
    /// be represented by the key's storage type.
    fn key_new(index: usize) -> Self;

    /// Converts the key back into the arena index it was created from.
    fn key_index(self) -> usize;
}

/// Creates a type-safe key for a [`ArenaMap`](crate::arena::ArenaMap) and associated data structures.
///
/// The storage type defaults to `usize` and can be overridden per key.
///
/// ```
/// # use itersched::arena_key;
/// # use itersched::arena::ArenaMap;
/// arena_key! {
///     /// Uses the default storage type.
///     pub struct Register;
///
///     // this one is private, and uses u8 as the key type.
///     struct Bank(u8);
/// }
///
/// let mut banks = ArenaMap::new();
/// let vgpr: Bank = banks.insert("vgpr");
/// assert_eq!(banks[vgpr], "vgpr");
/// ```
#[macro_export(local_inner_macros)]
macro_rules! arena_key {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident($ty:ty); $($rest:tt)* ) => {
        $(#[$outer])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name($ty);

        impl $crate::arena::ArenaKey for $name {
            #[inline]
            fn key_new(index: usize) -> Self {
                use std::convert::TryInto;

                Self(index.try_into().expect("index is not representable with key type"))
            }

            #[inline]
            fn key_index(self) -> usize {
                self.0 as usize
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                std::write!(f, "{}({})", std::stringify!($name), self.0)
            }
        }

        arena_key!($($rest)*);
    };

    ( $(#[$outer:meta])* $vis:vis struct $name:ident; $($rest:tt)* ) => {
        arena_key! { $(#[$outer])* $vis struct $name(usize); $($rest)* }
    };

    () => {}
}

/// Creates a type-safe key with [`u32`] storage that also implements
/// [`Packable`](crate::utility::Packable), reserving `u32::MAX` as the
/// "none" value so the key fits into a [`PackedOption`](crate::utility::PackedOption).
///
/// ```
/// # use itersched::dense_arena_key;
/// # use itersched::utility::PackedOption;
/// dense_arena_key! {
///     pub struct Instr;
/// }
///
/// let none = PackedOption::<Instr>::none();
/// assert!(none.is_none());
/// ```
#[macro_export(local_inner_macros)]
macro_rules! dense_arena_key {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident; $($rest:tt)* ) => {
        arena_key! { $(#[$outer])* $vis struct $name(u32); }

        impl $crate::utility::Packable for $name {
            #[inline]
            fn reserved() -> Self {
                Self(u32::MAX)
            }

            #[inline]
            fn is_reserved(&self) -> bool {
                self.0 == u32::MAX
            }
        }

        dense_arena_key!($($rest)*);
    };

    () => {}
}

#[cfg(test)]
mod tests {
    use crate::arena::*;
    use crate::utility::Packable;
    use crate::{arena_key, dense_arena_key};
    use static_assertions::assert_eq_size;

    #[test]
    fn reserved_key_is_distinct() {
        dense_arena_key! { struct K; }

        let mut map = ArenaMap::<K, i32>::default();

        let k1 = map.insert(15);
        let k2 = map.insert(32);
        let k3 = K::reserved();

        assert!(k3.is_reserved());
        assert!(!k2.is_reserved());
        assert!(!k1.is_reserved());
    }

    #[test]
    fn key_sizes() {
        arena_key! { struct Wide; struct Narrow(u8); }
        dense_arena_key! { struct Dense; }

        assert_eq_size!(Wide, usize);
        assert_eq_size!(Narrow, u8);
        assert_eq_size!(Dense, u32);
    }

    #[test]
    #[should_panic(expected = "index is not representable with key type")]
    fn key_bounds_cause_panic() {
        // hide the stack trace, assuming this test panics as it's supposed to.
        std::panic::set_hook(Box::new(|_| {}));

        arena_key! { struct Key(u8); }

        let mut map = ArenaMap::new();

        // 1 past what u8 can represent
        for i in 0..=256 {
            let k: Key = map.insert(i);

            assert_eq!(map[k], i);
        }
    }
}
