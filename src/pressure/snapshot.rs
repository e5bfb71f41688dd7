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
use crate::liveness::LiveRegSet;
use crate::mir::{LaneMask, MachineFunction, VReg};
use crate::target::{RegBank, TargetInfo};
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::iter;

/// A register pressure snapshot: how many registers of each bank are live.
///
/// For every bank this tracks two numbers:
///
/// 1. `units`: the number of live 32-bit lanes
/// 2. `tuples`: the full width of every tuple register with at least one
///    live lane. Tuples have to be allocated as contiguous, aligned runs of
///    registers, so they're the main source of fragmentation and are weighed
///    separately when comparing snapshots.
///
/// Banks the snapshot has never seen are zero, so [`RegPressure::default`]
/// is a valid empty snapshot for any target.
#[derive(Clone, Debug, Default)]
pub struct RegPressure {
    units: SmallVec<[u32; 2]>,
    tuples: SmallVec<[u32; 2]>,
}

impl RegPressure {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the pressure of every lane in `live`.
    pub fn from_live_set(func: &MachineFunction, target: &TargetInfo, live: &LiveRegSet) -> Self {
        let mut pressure = Self::new();

        for (reg, lanes) in live.iter() {
            pressure.inc(func, target, reg, LaneMask::NONE, lanes);
        }

        pressure
    }

    /// Updates the snapshot for the live lanes of `reg` changing from `prev`
    /// to `new`. Works in both directions.
    pub fn inc(
        &mut self,
        func: &MachineFunction,
        target: &TargetInfo,
        reg: VReg,
        prev: LaneMask,
        new: LaneMask,
    ) {
        if prev == new {
            return;
        }

        let class = target.class(func.vreg(reg).class);
        let bank = class.bank.key_index();

        self.grow_to(bank + 1);

        adjust(
            &mut self.units[bank],
            i64::from(new.count()) - i64::from(prev.count()),
        );

        if class.is_tuple() {
            let lanes = i64::from(class.lanes);

            match (prev.any(), new.any()) {
                (false, true) => adjust(&mut self.tuples[bank], lanes),
                (true, false) => adjust(&mut self.tuples[bank], -lanes),
                _ => {}
            }
        }
    }

    /// Live lanes in `bank`.
    #[inline]
    pub fn units(&self, bank: RegBank) -> u32 {
        self.units.get(bank.key_index()).copied().unwrap_or(0)
    }

    /// Weight of live tuple registers in `bank`.
    #[inline]
    pub fn tuples(&self, bank: RegBank) -> u32 {
        self.tuples.get(bank.key_index()).copied().unwrap_or(0)
    }

    /// Live lanes summed over every bank.
    pub fn total_units(&self) -> u32 {
        self.units.iter().sum()
    }

    /// Whether nothing is live.
    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    /// The occupancy supported by the snapshot, which is the minimum over
    /// every bank of the target.
    pub fn occupancy(&self, target: &TargetInfo) -> u32 {
        target
            .banks()
            .map(|(bank, _)| target.occupancy_for_bank(bank, self.units(bank)))
            .min()
            .unwrap_or(target.constraints().max_waves)
    }

    /// Raises every component of `self` to at least the matching component of `other`.
    pub fn max_assign(&mut self, other: &RegPressure) {
        self.grow_to(other.units.len());

        for (mine, theirs) in self.units.iter_mut().zip(other.units.iter()) {
            *mine = (*mine).max(*theirs);
        }

        for (mine, theirs) in self.tuples.iter_mut().zip(other.tuples.iter()) {
            *mine = (*mine).max(*theirs);
        }
    }

    /// Whether `self` is *better* than `other` when scheduling towards
    /// `target_occupancy`.
    ///
    /// Snapshots that both reach `target_occupancy` are equivalent, past that
    /// point there's nothing left to gain. Otherwise higher occupancy wins, then
    /// the snapshot with fewer tuple registers in the bank limiting occupancy
    /// (and then the other banks), and finally the one using fewer lanes of
    /// the limiting bank.
    ///
    /// This is a strict weak ordering, but not a total one: different
    /// snapshots can compare equal. Sorting with it needs to be stable.
    pub fn less(&self, other: &RegPressure, target_occupancy: u32, target: &TargetInfo) -> bool {
        let occ = self.occupancy(target).min(target_occupancy);
        let other_occ = other.occupancy(target).min(target_occupancy);

        if occ >= target_occupancy && other_occ >= target_occupancy {
            return false;
        }

        if occ != other_occ {
            return occ > other_occ;
        }

        let limiting = self.limiting_bank(target, target_occupancy);

        // if the two disagree on which bank matters, fall back to the primary one
        let bank = if limiting == other.limiting_bank(target, target_occupancy) {
            limiting
        } else {
            RegBank::key_new(0)
        };

        let rest = target.banks().map(|(b, _)| b).filter(|&b| b != bank);

        for b in iter::once(bank).chain(rest) {
            let (mine, theirs) = (self.tuples(b), other.tuples(b));

            if mine != theirs {
                return mine < theirs;
            }
        }

        self.units(bank) < other.units(bank)
    }

    /// Creates a displayable wrapper that uses the target's bank names.
    pub fn display<'a>(&'a self, target: &'a TargetInfo) -> PressureDisplay<'a> {
        PressureDisplay {
            pressure: self,
            target,
        }
    }

    // the bank with the lowest occupancy, lowest index on ties
    fn limiting_bank(&self, target: &TargetInfo, target_occupancy: u32) -> RegBank {
        target
            .banks()
            .map(|(bank, _)| {
                let occ = target
                    .occupancy_for_bank(bank, self.units(bank))
                    .min(target_occupancy);

                (occ, bank)
            })
            .min()
            .map_or(RegBank::key_new(0), |(_, bank)| bank)
    }

    fn grow_to(&mut self, len: usize) {
        if self.units.len() < len {
            self.units.resize(len, 0);
            self.tuples.resize(len, 0);
        }
    }
}

fn adjust(value: &mut u32, delta: i64) {
    let updated = i64::from(*value) + delta;

    assert!(updated >= 0, "register pressure went negative");

    *value = updated as u32;
}

// missing banks are zero, so compare with zero-extension
impl PartialEq for RegPressure {
    fn eq(&self, other: &Self) -> bool {
        let len = self.units.len().max(other.units.len());

        (0..len).all(|i| {
            let bank = RegBank::key_new(i);

            self.units(bank) == other.units(bank) && self.tuples(bank) == other.tuples(bank)
        })
    }
}

impl Eq for RegPressure {}

/// Formats a [`RegPressure`] as e.g. `vgpr: 12 (tuples 8), sgpr: 3 (tuples 0), occupancy 8`.
#[derive(Copy, Clone, Debug)]
pub struct PressureDisplay<'a> {
    pressure: &'a RegPressure,
    target: &'a TargetInfo,
}

impl Display for PressureDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (bank, data) in self.target.banks() {
            write!(
                f,
                "{}: {} (tuples {}), ",
                data.name,
                self.pressure.units(bank),
                self.pressure.tuples(bank)
            )?;
        }

        write!(f, "occupancy {}", self.pressure.occupancy(self.target))
    }
}
