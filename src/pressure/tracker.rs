//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::liveness::LiveRegSet;
use crate::mir::{Block, Inst};
use crate::pressure::{RegInfo, RegPressure};

/// Tracks register pressure while walking a block bottom-up.
///
/// The tracker holds the set of lanes live below the last instruction it saw,
/// the pressure of that set, and the maximum pressure seen since the last
/// reset. The pressure *at* an instruction counts both the values live across
/// it and the values it reads, since a def can't reuse the register of one of
/// its operands unless that operand dies there.
#[derive(Clone, Debug, Default)]
pub struct UpwardTracker {
    live: LiveRegSet,
    current: RegPressure,
    max: RegPressure,
    last_tracked: Option<Inst>,
    initialized: bool,
}

impl UpwardTracker {
    /// Creates a tracker that needs to be reset before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking just below `inst`.
    pub fn reset(&mut self, info: &RegInfo<'_>, inst: Inst) {
        self.reset_to_live_set(info, info.lis.live_regs_after(info.func, inst));
        self.last_tracked = Some(inst);
    }

    /// Starts tracking at the bottom of `block`.
    pub fn reset_to_live_out(&mut self, info: &RegInfo<'_>, block: Block) {
        self.reset_to_live_set(info, info.lis.live_out(block).clone());
    }

    /// Starts tracking below an arbitrary point where `live` is live. The
    /// tracker has no last tracked instruction afterwards.
    pub fn reset_to_live_set(&mut self, info: &RegInfo<'_>, live: LiveRegSet) {
        self.current = RegPressure::from_live_set(info.func, info.target, &live);
        self.max = self.current.clone();
        self.live = live;
        self.last_tracked = None;
        self.initialized = true;
    }

    /// Steps over `inst` going upwards, recording the pressure at it.
    pub fn recede(&mut self, info: &RegInfo<'_>, inst: Inst) {
        assert!(self.initialized, "tracker must be reset before receding");

        let data = info.func.inst(inst);

        self.last_tracked = Some(inst);

        if data.is_debug_value() {
            return;
        }

        let uses = data.reg_uses();
        let mut at_inst = self.current.clone();

        for &(reg, lanes) in uses.iter() {
            let prev = self.live.get(reg);

            at_inst.inc(info.func, info.target, reg, prev, prev | lanes);
        }

        self.max.max_assign(&at_inst);

        for &(reg, lanes) in data.reg_defs().iter() {
            let (prev, new) = self.live.remove_lanes(reg, lanes);

            self.current.inc(info.func, info.target, reg, prev, new);
        }

        for &(reg, lanes) in uses.iter() {
            let (prev, new) = self.live.insert_lanes(reg, lanes);

            self.current.inc(info.func, info.target, reg, prev, new);
        }

        self.max.max_assign(&self.current);
    }

    /// Checks that the tracked live set matches what liveness says is live
    /// above the last tracked instruction, and that the current pressure
    /// matches the live set.
    pub fn is_valid(&self, info: &RegInfo<'_>) -> bool {
        if !self.initialized {
            return false;
        }

        let current = RegPressure::from_live_set(info.func, info.target, &self.live);

        if current != self.current {
            log::debug!("tracked pressure does not match tracked live set");

            return false;
        }

        match self.last_tracked {
            Some(inst) => {
                let expected = info.lis.live_regs_before(info.func, inst);

                if expected != self.live {
                    log::debug!(
                        "tracked live set is stale at `{}`",
                        info.func.display_inst(inst)
                    );

                    return false;
                }

                true
            }
            None => true,
        }
    }

    /// The instruction the tracker last stepped over (or was reset at).
    #[inline]
    pub fn last_tracked(&self) -> Option<Inst> {
        self.last_tracked
    }

    /// Whether the tracker has been reset at least once.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The lanes live above the last tracked instruction.
    #[inline]
    pub fn live_regs(&self) -> &LiveRegSet {
        &self.live
    }

    /// The pressure of [`Self::live_regs`].
    #[inline]
    pub fn current_pressure(&self) -> &RegPressure {
        &self.current
    }

    /// The maximum pressure seen since the last reset.
    #[inline]
    pub fn max_pressure(&self) -> &RegPressure {
        &self.max
    }

    /// Takes the maximum pressure seen so far, restarting the maximum from
    /// the current pressure so the tracker can keep going upwards.
    pub fn take_max_pressure(&mut self) -> RegPressure {
        std::mem::replace(&mut self.max, self.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LiveIntervals;
    use crate::mir::{FunctionBuilder, InstFlags, MachineFunction};
    use crate::target::TargetInfo;

    fn target() -> TargetInfo {
        let mut b = TargetInfo::builder("test", 8);
        let vgpr = b.bank("vgpr", 24, 1);
        b.class("v32", vgpr, 1);
        b.class("v64", vgpr, 2);
        b.build()
    }

    // four loads, then a reduction tree
    fn wide(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
        let v32 = target.class_by_name("v32").unwrap();
        let mut b = FunctionBuilder::new("wide", target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let r: Vec<_> = (0..7).map(|_| b.vreg(v32)).collect();
        let mut insts = Vec::new();

        for &reg in &r[..4] {
            insts.push(b.inst("load").def(reg).flags(InstFlags::MAY_LOAD).finish());
        }

        insts.push(b.inst("add").def(r[4]).use_reg(r[0]).use_reg(r[1]).finish());
        insts.push(b.inst("add").def(r[5]).use_reg(r[2]).use_reg(r[3]).finish());
        insts.push(b.inst("add").def(r[6]).use_reg(r[4]).use_reg(r[5]).finish());
        insts.push(b.inst("store").use_reg(r[6]).flags(InstFlags::MAY_STORE).finish());

        (b.build(), insts)
    }

    #[test]
    fn pressure_counts_operands_at_the_instruction() {
        let target = target();
        let vgpr = target.bank_by_name("vgpr").unwrap();
        let (func, insts) = wide(&target);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };

        let mut tracker = UpwardTracker::new();
        let last = *insts.last().unwrap();

        tracker.reset(&info, last);

        for &inst in insts.iter().rev() {
            tracker.recede(&info, inst);
            assert!(tracker.is_valid(&info));
        }

        // the first add sees two loads live across it plus its own operands
        assert_eq!(tracker.max_pressure().units(vgpr), 5);
        assert!(tracker.live_regs().is_empty());

        let max = tracker.take_max_pressure();

        assert_eq!(max.occupancy(&target), 4);
        assert_eq!(*tracker.max_pressure(), RegPressure::new());
    }

    #[test]
    fn debug_values_are_transparent() {
        let target = target();
        let v32 = target.class_by_name("v32").unwrap();
        let mut b = FunctionBuilder::new("dbg", &target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let x = b.vreg(v32);
        let def = b.inst("v_mov").def(x).finish();
        let dbg = b.debug_value(x);
        let func = b.build();
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };

        let mut tracker = UpwardTracker::new();

        tracker.reset_to_live_out(&info, bb);
        tracker.recede(&info, dbg);

        assert_eq!(tracker.last_tracked(), Some(dbg));
        assert!(tracker.live_regs().is_empty());
        assert!(tracker.is_valid(&info));

        tracker.recede(&info, def);
        assert_eq!(*tracker.max_pressure(), RegPressure::new());
    }

    #[test]
    #[should_panic(expected = "tracker must be reset")]
    fn receding_without_reset_panics() {
        let target = target();
        let (func, insts) = wide(&target);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };

        UpwardTracker::new().recede(&info, insts[0]);
    }
}
