//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaMap;
use crate::mir::{Block, Inst, InstData, InstDisplay, InstIter, LaneMask, Layout, VReg};
use crate::target::RegClass;
use smallvec::SmallVec;

/// Per-block data that isn't part of the layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockData {
    name: String,
    successors: SmallVec<[Block; 2]>,
}

impl BlockData {
    /// The name of the block, used in dumps
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blocks control can flow to after this one
    pub fn successors(&self) -> &[Block] {
        &self.successors
    }
}

/// Per-register data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VRegData {
    /// The class the register belongs to
    pub class: RegClass,
    /// Every lane of the register
    pub lanes: LaneMask,
}

/// A single function at the machine level, with virtual registers.
///
/// Instructions and blocks are only ever added (by [`FunctionBuilder`](crate::mir::FunctionBuilder));
/// the scheduler only changes the [`Layout`] and the liveness flags on def operands.
#[derive(Clone, Debug)]
pub struct MachineFunction {
    name: String,
    insts: ArenaMap<Inst, InstData>,
    blocks: ArenaMap<Block, BlockData>,
    vregs: ArenaMap<VReg, VRegData>,
    layout: Layout,
}

impl MachineFunction {
    pub(in crate::mir) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            insts: ArenaMap::new(),
            blocks: ArenaMap::new(),
            vregs: ArenaMap::new(),
            layout: Layout::new(),
        }
    }

    /// The function's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the data of an instruction.
    #[inline]
    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    pub(crate) fn inst_mut(&mut self, inst: Inst) -> &mut InstData {
        &mut self.insts[inst]
    }

    /// Gets the data of a block.
    #[inline]
    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    /// Gets the data of a virtual register.
    #[inline]
    pub fn vreg(&self, reg: VReg) -> VRegData {
        self.vregs[reg]
    }

    /// Iterates over every virtual register.
    pub fn vregs(&self) -> impl Iterator<Item = (VReg, &VRegData)> {
        self.vregs.iter()
    }

    /// The current instruction order.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    /// Iterates over the blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.layout.blocks()
    }

    /// Iterates over the instructions of `block` in layout order.
    pub fn insts_in_block(&self, block: Block) -> InstIter<'_> {
        self.layout.insts_in_block(block)
    }

    /// Collects the current order of `block`, mostly useful for tests and dumps.
    pub fn block_order(&self, block: Block) -> Vec<Inst> {
        self.layout.insts_in_block(block).collect()
    }

    /// Whether `inst` is a debug-info marker.
    #[inline]
    pub fn is_debug_value(&self, inst: Inst) -> bool {
        self.insts[inst].is_debug_value()
    }

    /// Creates a displayable wrapper around `inst`.
    pub fn display_inst(&self, inst: Inst) -> InstDisplay<'_> {
        InstDisplay::new(self, inst)
    }

    pub(in crate::mir) fn push_block(&mut self, name: &str) -> Block {
        let block = self.blocks.insert(BlockData {
            name: name.to_owned(),
            successors: SmallVec::new(),
        });

        self.layout.append_block(block);

        block
    }

    pub(in crate::mir) fn push_successor(&mut self, from: Block, to: Block) {
        let succs = &mut self.blocks[from].successors;

        if !succs.contains(&to) {
            succs.push(to);
        }
    }

    pub(in crate::mir) fn push_vreg(&mut self, data: VRegData) -> VReg {
        self.vregs.insert(data)
    }

    pub(in crate::mir) fn push_inst(&mut self, data: InstData, block: Block) -> Inst {
        let inst = self.insts.insert(data);

        self.layout.append_inst(inst, block);

        inst
    }
}
