//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::mir::{LaneMask, VReg};
use crate::utility::SaHashMap;

/// The set of register lanes live at some program point.
///
/// Registers with no live lanes are never stored, so two sets describing the
/// same lanes always compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveRegSet {
    regs: SaHashMap<VReg, LaneMask>,
}

impl LiveRegSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lanes of `reg` that are live, possibly none.
    #[inline]
    pub fn get(&self, reg: VReg) -> LaneMask {
        self.regs.get(&reg).copied().unwrap_or(LaneMask::NONE)
    }

    /// Makes `lanes` of `reg` live. Returns the live lanes before and after.
    pub fn insert_lanes(&mut self, reg: VReg, lanes: LaneMask) -> (LaneMask, LaneMask) {
        let prev = self.get(reg);
        let new = prev | lanes;

        if new.any() {
            self.regs.insert(reg, new);
        }

        (prev, new)
    }

    /// Kills `lanes` of `reg`. Returns the live lanes before and after.
    pub fn remove_lanes(&mut self, reg: VReg, lanes: LaneMask) -> (LaneMask, LaneMask) {
        let prev = self.get(reg);
        let new = prev & !lanes;

        if new.any() {
            self.regs.insert(reg, new);
        } else {
            self.regs.remove(&reg);
        }

        (prev, new)
    }

    /// Adds every live lane of `other` to `self`. Returns whether anything changed.
    pub fn union_with(&mut self, other: &LiveRegSet) -> bool {
        let mut changed = false;

        for (&reg, &lanes) in other.regs.iter() {
            let (prev, new) = self.insert_lanes(reg, lanes);

            changed |= prev != new;
        }

        changed
    }

    /// The number of registers with at least one live lane
    #[inline]
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Whether nothing is live
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Iterates over the live registers in an unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (VReg, LaneMask)> + '_ {
        self.regs.iter().map(|(&reg, &lanes)| (reg, lanes))
    }

    /// The live registers sorted by register, for anything that needs a
    /// deterministic order.
    pub fn sorted(&self) -> Vec<(VReg, LaneMask)> {
        let mut regs: Vec<_> = self.iter().collect();

        regs.sort_unstable_by_key(|&(reg, _)| reg);
        regs
    }
}
