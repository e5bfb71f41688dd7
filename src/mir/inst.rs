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
use smallvec::SmallVec;
use std::ops::BitOr;

/// Whether an operand reads or writes its register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// The instruction writes the lanes.
    Def,
    /// The instruction reads the lanes.
    Use,
}

/// A single register operand of an instruction.
///
/// The `undef` and `dead` flags are only meaningful on defs, and are kept up
/// to date by [`LiveIntervals::adjust_def_flags`](crate::liveness::LiveIntervals::adjust_def_flags)
/// whenever an instruction moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    reg: VReg,
    lanes: LaneMask,
    kind: OperandKind,
    undef: bool,
    dead: bool,
}

impl Operand {
    /// Creates an operand touching `lanes` of `reg`.
    pub fn new(reg: VReg, lanes: LaneMask, kind: OperandKind) -> Self {
        debug_assert!(lanes.any(), "operands must touch at least one lane");

        Self {
            reg,
            lanes,
            kind,
            undef: false,
            dead: false,
        }
    }

    /// The register being accessed
    #[inline]
    pub fn reg(&self) -> VReg {
        self.reg
    }

    /// The lanes of the register being accessed
    #[inline]
    pub fn lanes(&self) -> LaneMask {
        self.lanes
    }

    /// Whether this is a def or a use
    #[inline]
    pub fn kind(&self) -> OperandKind {
        self.kind
    }

    /// Whether the operand writes its register
    #[inline]
    pub fn is_def(&self) -> bool {
        self.kind == OperandKind::Def
    }

    /// Whether the operand reads its register
    #[inline]
    pub fn is_use(&self) -> bool {
        self.kind == OperandKind::Use
    }

    /// For a partial def, whether none of the register's other lanes are live
    /// going into the instruction.
    #[inline]
    pub fn is_undef(&self) -> bool {
        self.undef
    }

    /// For a def, whether none of the written lanes are read afterwards.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn set_undef(&mut self, undef: bool) {
        self.undef = undef;
    }

    pub(crate) fn set_dead(&mut self, dead: bool) {
        self.dead = dead;
    }
}

/// Properties of an instruction that matter to scheduling.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct InstFlags(u8);

impl InstFlags {
    /// No special properties.
    pub const NONE: InstFlags = InstFlags(0);

    /// A debug-info marker. Not a real instruction: it has no effect on
    /// liveness or pressure, and isn't a node in the dependency graph.
    pub const DEBUG_VALUE: InstFlags = InstFlags(1 << 0);

    /// A scheduling boundary (calls, terminators, barriers). Nothing moves across these.
    pub const BOUNDARY: InstFlags = InstFlags(1 << 1);

    /// The instruction may read memory.
    pub const MAY_LOAD: InstFlags = InstFlags(1 << 2);

    /// The instruction may write memory.
    pub const MAY_STORE: InstFlags = InstFlags(1 << 3);

    /// The instruction has unmodeled side effects, and is ordered against
    /// everything else in its region.
    pub const SIDE_EFFECTS: InstFlags = InstFlags(1 << 4);

    /// Checks whether every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: InstFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InstFlags {
    type Output = InstFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// The data for a single machine instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstData {
    opcode: &'static str,
    operands: SmallVec<[Operand; 4]>,
    flags: InstFlags,
    latency: u32,
}

impl InstData {
    /// Creates an instruction with no operands and a latency of 1.
    pub fn new(opcode: &'static str, flags: InstFlags) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            flags,
            latency: 1,
        }
    }

    /// The opcode's name
    #[inline]
    pub fn opcode(&self) -> &'static str {
        self.opcode
    }

    /// Every operand in order
    #[inline]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Every def operand
    pub fn defs(&self) -> impl Iterator<Item = &Operand> + '_ {
        self.operands.iter().filter(|op| op.is_def())
    }

    /// Every use operand
    pub fn uses(&self) -> impl Iterator<Item = &Operand> + '_ {
        self.operands.iter().filter(|op| op.is_use())
    }

    /// Scheduling-relevant flags
    #[inline]
    pub fn flags(&self) -> InstFlags {
        self.flags
    }

    /// Cycles between this instruction issuing and its results being readable.
    #[inline]
    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Whether this is a debug-info marker
    #[inline]
    pub fn is_debug_value(&self) -> bool {
        self.flags.contains(InstFlags::DEBUG_VALUE)
    }

    /// Whether this is a scheduling boundary
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.flags.contains(InstFlags::BOUNDARY)
    }

    /// Whether the instruction may read memory
    #[inline]
    pub fn may_load(&self) -> bool {
        self.flags.contains(InstFlags::MAY_LOAD)
    }

    /// Whether the instruction may write memory
    #[inline]
    pub fn may_store(&self) -> bool {
        self.flags.contains(InstFlags::MAY_STORE)
    }

    /// Whether the instruction has unmodeled side effects
    #[inline]
    pub fn has_side_effects(&self) -> bool {
        self.flags.contains(InstFlags::SIDE_EFFECTS)
    }

    /// Merges the lanes read by the instruction per register, in operand order.
    ///
    /// An instruction reading two lanes of the same register through two
    /// operands reads the register once, which is what both pressure tracking
    /// and dependency building care about.
    pub fn reg_uses(&self) -> SmallVec<[(VReg, LaneMask); 4]> {
        merge_lanes(self.uses())
    }

    /// Merges the lanes written by the instruction per register, in operand order.
    pub fn reg_defs(&self) -> SmallVec<[(VReg, LaneMask); 4]> {
        merge_lanes(self.defs())
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }

    pub(crate) fn push_operand(&mut self, operand: Operand) {
        self.operands.push(operand);
    }

    pub(crate) fn set_latency(&mut self, latency: u32) {
        self.latency = latency;
    }

    pub(crate) fn add_flags(&mut self, flags: InstFlags) {
        self.flags = self.flags | flags;
    }
}

fn merge_lanes<'a>(ops: impl Iterator<Item = &'a Operand>) -> SmallVec<[(VReg, LaneMask); 4]> {
    let mut merged = SmallVec::<[(VReg, LaneMask); 4]>::new();

    for op in ops {
        match merged.iter_mut().find(|(reg, _)| *reg == op.reg()) {
            Some((_, lanes)) => *lanes |= op.lanes(),
            None => merged.push((op.reg(), op.lanes())),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    #[test]
    fn flags_combine() {
        let flags = InstFlags::MAY_LOAD | InstFlags::SIDE_EFFECTS;

        assert!(flags.contains(InstFlags::MAY_LOAD));
        assert!(flags.contains(InstFlags::SIDE_EFFECTS));
        assert!(!flags.contains(InstFlags::MAY_STORE));
        assert!(flags.contains(InstFlags::NONE));
    }

    #[test]
    fn uses_of_one_register_merge() {
        let v0 = VReg::key_new(0);
        let v1 = VReg::key_new(1);
        let mut data = InstData::new("v_pk_add", InstFlags::NONE);

        data.push_operand(Operand::new(v1, LaneMask::all(1), OperandKind::Def));
        data.push_operand(Operand::new(v0, LaneMask::lane(0), OperandKind::Use));
        data.push_operand(Operand::new(v0, LaneMask::lane(1), OperandKind::Use));

        assert_eq!(data.reg_uses().as_slice(), &[(v0, LaneMask::all(2))]);
        assert_eq!(data.reg_defs().as_slice(), &[(v1, LaneMask::all(1))]);
    }
}
