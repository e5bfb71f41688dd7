//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::{Debug, Formatter, Result};
use std::mem;

/// Helper trait for a type that can be packed into a [`PackedOption`].
///
/// These types reserve one null-ish value that is used to distinguish
/// between `None` and `Some`. Keys made with
/// [`dense_arena_key`](crate::dense_arena_key) implement this automatically.
pub trait Packable {
    /// Returns the reserved value.
    fn reserved() -> Self;

    /// Checks if `self` is the reserved value.
    fn is_reserved(&self) -> bool;
}

/// An [`Option`]-like type that takes up exactly as much space as the value
/// would on its own, by using the value's reserved state as `None`.
///
/// The instruction layout stores its `prev`/`next` links with this.
///
/// ```
/// # use itersched::dense_arena_key;
/// # use itersched::utility::PackedOption;
/// dense_arena_key! { struct Inst; }
///
/// let mut link = PackedOption::<Inst>::none();
/// assert_eq!(link.expand(), None);
///
/// assert_eq!(link.replace(Inst(3)), None);
/// assert_eq!(link.expand(), Some(Inst(3)));
/// ```
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct PackedOption<T: Packable>(T);

impl<T: Packable> PackedOption<T> {
    /// Creates a `None` instance of `PackedOption`.
    #[inline]
    pub fn none() -> Self {
        Self(T::reserved())
    }

    /// Creates a `Some` instance of `PackedOption`. Panics if `value` is
    /// the reserved value.
    #[inline]
    pub fn some(value: T) -> Self {
        assert!(
            !value.is_reserved(),
            "cannot pack the reserved value as `Some`"
        );

        Self(value)
    }

    /// Returns `true` if the packed option is a `None` value.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0.is_reserved()
    }

    /// Returns `true` if the packed option is a `Some` value.
    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Expands the packed option into a normal `Option`.
    #[inline]
    pub fn expand(self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Takes the value out of the packed option, leaving a `None` in its place.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        mem::replace(self, Self::none()).expand()
    }

    /// Replaces the value with `value`, returning the previous value.
    #[inline]
    pub fn replace(&mut self, value: T) -> Option<T> {
        mem::replace(self, Self::some(value)).expand()
    }
}

impl<T: Packable> Default for PackedOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Packable> From<Option<T>> for PackedOption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            None => Self::none(),
            Some(t) => Self::some(t),
        }
    }
}

impl<T: Packable> From<PackedOption<T>> for Option<T> {
    fn from(packed: PackedOption<T>) -> Self {
        packed.expand()
    }
}

impl<T> Debug for PackedOption<T>
where
    T: Packable + Copy + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.is_none() {
            true => write!(f, "None"),
            false => write!(f, "Some({:?})", self.0),
        }
    }
}
