//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Register file description and the hardware occupancy model.
//!
//! A target is a set of register *banks* (independent register files, e.g.
//! scalar and vector registers on a GPU) and register *classes* that live in
//! those banks. Each class is some number of 32-bit lanes wide; a class with
//! more than one lane is a *tuple* class.
//!
//! Occupancy is the number of hardware thread-contexts ("waves") that fit on
//! one execution unit at once. Every wave needs its own copy of the registers
//! it uses, so the more registers a wave uses, the fewer waves fit.

use crate::arena::ArenaMap;
use crate::arena_key;

arena_key! {
    /// A reference to a register bank (an independent register file).
    pub struct RegBank(u8);

    /// A reference to a register class.
    pub struct RegClass(u16);
}

/// Describes one register file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegBankData {
    /// Name used in dumps, e.g. `vgpr`
    pub name: &'static str,
    /// Total number of 32-bit registers in the file that are shared by every resident wave
    pub registers: u32,
    /// Registers are handed out to a wave in multiples of this
    pub granule: u32,
}

/// Describes one register class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegClassData {
    /// Name used in dumps, e.g. `vreg_64`
    pub name: &'static str,
    /// The bank that registers of this class are allocated from
    pub bank: RegBank,
    /// Width of the class in 32-bit lanes
    pub lanes: u32,
}

impl RegClassData {
    /// Whether registers of this class are tuples of several lanes.
    #[inline]
    pub fn is_tuple(&self) -> bool {
        self.lanes > 1
    }
}

/// The limits on occupancy that don't come from register usage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HardwareConstraints {
    /// Hard cap on resident waves per execution unit
    pub max_waves: u32,
    /// Occupancy allowed by the function's local (shared) memory usage, if it limits it
    pub local_memory_waves: Option<u32>,
    /// A user-requested limit on waves per execution unit, only honored by the ILP strategy
    pub waves_per_eu_limit: Option<u32>,
}

/// A full target description: banks, classes and hardware constraints.
#[derive(Clone, Debug)]
pub struct TargetInfo {
    name: &'static str,
    banks: ArenaMap<RegBank, RegBankData>,
    classes: ArenaMap<RegClass, RegClassData>,
    constraints: HardwareConstraints,
}

impl TargetInfo {
    /// Starts building a target description. `max_waves` must be at least 1.
    pub fn builder(name: &'static str, max_waves: u32) -> TargetBuilder {
        assert!(max_waves >= 1, "a target must allow at least one wave");

        TargetBuilder {
            target: TargetInfo {
                name,
                banks: ArenaMap::new(),
                classes: ArenaMap::new(),
                constraints: HardwareConstraints {
                    max_waves,
                    local_memory_waves: None,
                    waves_per_eu_limit: None,
                },
            },
        }
    }

    /// A GCN-like target: 256 VGPRs allocated in granules of 4 and 800 SGPRs
    /// allocated in granules of 8, with up to 10 waves per SIMD.
    ///
    /// The VGPR bank is bank 0, which makes it the bank that breaks ties in
    /// [`RegPressure::less`](crate::pressure::RegPressure::less).
    pub fn gcn() -> Self {
        let mut b = Self::builder("gcn", 10);
        let vgpr = b.bank("vgpr", 256, 4);
        let sgpr = b.bank("sgpr", 800, 8);

        b.class("vgpr_32", vgpr, 1);
        b.class("vreg_64", vgpr, 2);
        b.class("vreg_128", vgpr, 4);
        b.class("sgpr_32", sgpr, 1);
        b.class("sreg_64", sgpr, 2);
        b.class("sreg_128", sgpr, 4);

        b.build()
    }

    /// The name of the target
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of register banks.
    #[inline]
    pub fn num_banks(&self) -> usize {
        self.banks.len()
    }

    /// Iterates over every bank.
    pub fn banks(&self) -> impl Iterator<Item = (RegBank, &RegBankData)> {
        self.banks.iter()
    }

    /// Gets the description of a bank.
    #[inline]
    pub fn bank(&self, bank: RegBank) -> &RegBankData {
        &self.banks[bank]
    }

    /// Gets the description of a class.
    #[inline]
    pub fn class(&self, class: RegClass) -> &RegClassData {
        &self.classes[class]
    }

    /// Looks a class up by its name.
    pub fn class_by_name(&self, name: &str) -> Option<RegClass> {
        self.classes
            .iter()
            .find(|(_, data)| data.name == name)
            .map(|(class, _)| class)
    }

    /// Looks a bank up by its name.
    pub fn bank_by_name(&self, name: &str) -> Option<RegBank> {
        self.banks
            .iter()
            .find(|(_, data)| data.name == name)
            .map(|(bank, _)| bank)
    }

    /// The non-register occupancy limits of the target.
    #[inline]
    pub fn constraints(&self) -> &HardwareConstraints {
        &self.constraints
    }

    /// Occupancy achievable when each wave uses `units` registers of `bank`.
    ///
    /// This is a non-increasing step function of `units`: allocations are
    /// rounded up to the bank's granule, every wave gets at least one slot and
    /// never more than the hardware maximum.
    pub fn occupancy_for_bank(&self, bank: RegBank, units: u32) -> u32 {
        let max = self.constraints.max_waves;

        if units == 0 {
            return max;
        }

        let data = &self.banks[bank];
        let granule = data.granule.max(1);
        let allocated = units.div_ceil(granule) * granule;

        (data.registers / allocated).clamp(1, max)
    }

    /// The largest number of registers of `bank` a wave can use while still
    /// reaching `occupancy`. `0` means nothing is unconstrained, `u32::MAX`
    /// means any usage reaches it.
    pub fn max_units_for_occupancy(&self, bank: RegBank, occupancy: u32) -> u32 {
        if occupancy <= 1 {
            return u32::MAX;
        }

        if occupancy > self.constraints.max_waves {
            return 0;
        }

        let data = &self.banks[bank];
        let granule = data.granule.max(1);

        (data.registers / occupancy) / granule * granule
    }

    /// The occupancy the function should be scheduled towards.
    pub fn target_occupancy(&self) -> u32 {
        let c = &self.constraints;

        c.local_memory_waves.map_or(c.max_waves, |waves| waves.min(c.max_waves))
    }

    /// The occupancy the ILP strategy schedules towards, which additionally
    /// respects [`HardwareConstraints::waves_per_eu_limit`].
    pub fn ilp_target_occupancy(&self) -> u32 {
        let occ = self.target_occupancy();

        self.constraints
            .waves_per_eu_limit
            .map_or(occ, |limit| occ.min(limit))
    }
}

/// Builds a [`TargetInfo`], handing out the bank and class keys as it goes.
///
/// ```
/// # use itersched::target::TargetInfo;
/// let mut b = TargetInfo::builder("tiny", 8);
/// let vgpr = b.bank("vgpr", 16, 1);
/// let v32 = b.class("v32", vgpr, 1);
/// let target = b.build();
///
/// assert_eq!(target.class(v32).bank, vgpr);
/// assert_eq!(target.occupancy_for_bank(vgpr, 4), 4);
/// ```
#[derive(Clone, Debug)]
pub struct TargetBuilder {
    target: TargetInfo,
}

impl TargetBuilder {
    /// Adds a register bank.
    pub fn bank(&mut self, name: &'static str, registers: u32, granule: u32) -> RegBank {
        self.target.banks.insert(RegBankData {
            name,
            registers,
            granule,
        })
    }

    /// Adds a register class allocated from `bank`, `lanes` lanes wide.
    pub fn class(&mut self, name: &'static str, bank: RegBank, lanes: u32) -> RegClass {
        assert!(
            (1..=32).contains(&lanes),
            "register classes must be between 1 and 32 lanes wide"
        );

        self.target.classes.insert(RegClassData { name, bank, lanes })
    }

    /// Limits occupancy by local memory usage.
    pub fn local_memory_waves(&mut self, waves: u32) -> &mut Self {
        self.target.constraints.local_memory_waves = Some(waves);
        self
    }

    /// Sets the waves-per-execution-unit limit.
    pub fn waves_per_eu_limit(&mut self, waves: u32) -> &mut Self {
        self.target.constraints.waves_per_eu_limit = Some(waves);
        self
    }

    /// Finishes the target.
    pub fn build(self) -> TargetInfo {
        self.target
    }
}
