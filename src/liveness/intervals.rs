//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::liveness::{step_backward, LiveRegSet};
use crate::mir::{Block, Inst, Layout, MachineFunction};
use std::fmt;
use std::fmt::{Display, Formatter};

const SLOT_SPACING: u32 = 16;

/// A position in the function's instruction numbering. Only real (non-debug)
/// instructions get one, and slots always increase in layout order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Gets the raw index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl Display for SlotIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.0)
    }
}

/// Liveness information for an entire function: per-block live-in and
/// live-out lane sets, plus a numbering of instructions.
///
/// Queries at a single instruction are answered by stepping backwards from
/// the end of its block, so they're always consistent with the *current*
/// layout as long as every move is reported through [`Self::handle_move`].
#[derive(Clone, Debug, Default)]
pub struct LiveIntervals {
    slots: SecondaryMap<Inst, SlotIndex>,
    block_ranges: SecondaryMap<Block, (SlotIndex, SlotIndex)>,
    live_in: SecondaryMap<Block, LiveRegSet>,
    live_out: SecondaryMap<Block, LiveRegSet>,
}

impl LiveIntervals {
    /// Computes liveness for `func`. This iterates the usual backwards
    /// data-flow equations to a fixed point.
    pub fn compute(func: &MachineFunction) -> Self {
        let mut lis = Self::default();
        let blocks: Vec<Block> = func.blocks().collect();

        lis.renumber(func);

        for &block in blocks.iter() {
            lis.live_in.insert(block, LiveRegSet::new());
            lis.live_out.insert(block, LiveRegSet::new());
        }

        loop {
            let mut changed = false;

            // reverse layout order converges quickly for mostly-forward CFGs
            for &block in blocks.iter().rev() {
                let mut out = LiveRegSet::new();

                for &succ in func.block(block).successors() {
                    out.union_with(&lis.live_in[succ]);
                }

                let mut live = out.clone();
                let mut cursor = func.layout().block_last_inst(block);

                while let Some(inst) = cursor {
                    step_backward(func, inst, &mut live);
                    cursor = func.layout().inst_prev(inst);
                }

                if live != lis.live_in[block] {
                    lis.live_in.insert(block, live);
                    changed = true;
                }

                lis.live_out.insert(block, out);
            }

            if !changed {
                break;
            }
        }

        lis
    }

    /// The lanes live on entry to `block`.
    #[inline]
    pub fn live_in(&self, block: Block) -> &LiveRegSet {
        &self.live_in[block]
    }

    /// The lanes live on exit from `block`.
    #[inline]
    pub fn live_out(&self, block: Block) -> &LiveRegSet {
        &self.live_out[block]
    }

    /// The lanes live immediately after `inst` executes.
    pub fn live_regs_after(&self, func: &MachineFunction, inst: Inst) -> LiveRegSet {
        let layout = func.layout();
        let mut live = self.live_out[layout.inst_block(inst)].clone();
        let mut cursor = layout.block_last_inst(layout.inst_block(inst));

        while let Some(current) = cursor {
            if current == inst {
                break;
            }

            step_backward(func, current, &mut live);
            cursor = layout.inst_prev(current);
        }

        live
    }

    /// The lanes live immediately before `inst` executes.
    pub fn live_regs_before(&self, func: &MachineFunction, inst: Inst) -> LiveRegSet {
        let mut live = self.live_regs_after(func, inst);

        step_backward(func, inst, &mut live);

        live
    }

    /// The slot of `inst`, or `None` for debug values.
    pub fn instruction_index(&self, inst: Inst) -> Option<SlotIndex> {
        self.slots.get(inst).copied()
    }

    /// Updates the numbering after `inst` was moved inside of its block.
    ///
    /// The instruction gets a slot halfway between its new neighbors if
    /// there's room, otherwise the whole function is renumbered.
    pub fn handle_move(&mut self, func: &MachineFunction, inst: Inst) {
        if func.is_debug_value(inst) {
            return;
        }

        let layout = func.layout();
        let (start, end) = self.block_ranges[layout.inst_block(inst)];

        let lower = real_neighbor(func, layout.inst_prev(inst), Layout::inst_prev)
            .map_or(start, |prev| self.slots[prev]);

        let upper = real_neighbor(func, layout.inst_next(inst), Layout::inst_next)
            .map_or(end, |next| self.slots[next]);

        if upper.0 > lower.0 + 1 {
            self.slots
                .insert(inst, SlotIndex(lower.0 + (upper.0 - lower.0) / 2));
        } else {
            log::trace!("no slot left between {lower} and {upper}, renumbering");

            self.renumber(func);
        }
    }

    /// Recomputes the `undef` and `dead` flags on the defs of `inst` for its
    /// current position.
    pub fn adjust_def_flags(&self, func: &mut MachineFunction, inst: Inst) {
        if func.is_debug_value(inst) {
            return;
        }

        let after = self.live_regs_after(func, inst);
        let before = self.live_regs_before(func, inst);
        let regs: Vec<_> = func
            .inst(inst)
            .operands()
            .iter()
            .map(|op| func.vreg(op.reg()).lanes)
            .collect();

        for (op, full) in func.inst_mut(inst).operands_mut().iter_mut().zip(regs) {
            if !op.is_def() {
                continue;
            }

            let others = full & !op.lanes();

            op.set_dead(!after.get(op.reg()).overlaps(op.lanes()));
            op.set_undef(others.any() && !before.get(op.reg()).overlaps(others));
        }
    }

    fn renumber(&mut self, func: &MachineFunction) {
        let mut next = 0;

        for block in func.blocks() {
            let start = SlotIndex(next);

            next += SLOT_SPACING;

            for inst in func.insts_in_block(block) {
                if func.is_debug_value(inst) {
                    continue;
                }

                self.slots.insert(inst, SlotIndex(next));
                next += SLOT_SPACING;
            }

            self.block_ranges.insert(block, (start, SlotIndex(next)));
        }
    }
}

fn real_neighbor(
    func: &MachineFunction,
    mut cursor: Option<Inst>,
    step: fn(&Layout, Inst) -> Option<Inst>,
) -> Option<Inst> {
    while let Some(inst) = cursor {
        if !func.is_debug_value(inst) {
            return Some(inst);
        }

        cursor = step(func.layout(), inst);
    }

    None
}
