//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A set of 32-bit lanes of a virtual register, lane `n` is bit `n`.
///
/// ```
/// # use itersched::mir::LaneMask;
/// let lo = LaneMask::lane(0);
/// let full = LaneMask::all(2);
///
/// assert_eq!(full.count(), 2);
/// assert!(full.overlaps(lo));
/// assert_eq!((full & !lo), LaneMask::lane(1));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneMask(u32);

impl LaneMask {
    /// The empty mask.
    pub const NONE: LaneMask = LaneMask(0);

    /// Creates a mask from raw bits.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// A mask containing only lane `n`.
    #[inline]
    pub const fn lane(n: u32) -> Self {
        Self(1 << n)
    }

    /// The mask of every lane of a register that is `lanes` lanes wide.
    #[inline]
    pub const fn all(lanes: u32) -> Self {
        if lanes >= 32 {
            Self(u32::MAX)
        } else {
            Self((1 << lanes) - 1)
        }
    }

    /// Gets the raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The number of lanes in the mask.
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether no lanes are set.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether any lane is set.
    #[inline]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    /// Whether `self` and `other` have any lane in common.
    #[inline]
    pub const fn overlaps(self, other: LaneMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every lane in `other` is in `self`.
    #[inline]
    pub const fn contains(self, other: LaneMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LaneMask {
    type Output = LaneMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LaneMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LaneMask {
    type Output = LaneMask;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for LaneMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for LaneMask {
    type Output = LaneMask;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl Debug for LaneMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "LaneMask({:#x})", self.0)
    }
}

impl Display for LaneMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
