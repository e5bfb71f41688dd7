//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::mir::*;
use crate::target::{RegClass, TargetInfo};

/// Builds a [`MachineFunction`] one instruction at a time.
///
/// ```
/// # use itersched::target::TargetInfo;
/// # use itersched::mir::{FunctionBuilder, InstFlags};
/// let target = TargetInfo::gcn();
/// let v32 = target.class_by_name("vgpr_32").unwrap();
///
/// let mut b = FunctionBuilder::new("kernel", &target);
/// let entry = b.create_block("entry");
/// b.switch_to(entry);
///
/// let ptr = b.vreg(v32);
/// let val = b.vreg(v32);
/// b.inst("v_mov").def(ptr).finish();
/// b.inst("global_load").def(val).use_reg(ptr).flags(InstFlags::MAY_LOAD).finish();
/// b.inst("global_store").use_reg(ptr).use_reg(val).flags(InstFlags::MAY_STORE).finish();
///
/// let func = b.build();
/// assert_eq!(func.block_order(entry).len(), 3);
/// ```
#[derive(Debug)]
pub struct FunctionBuilder<'t> {
    func: MachineFunction,
    target: &'t TargetInfo,
    current: Option<Block>,
}

impl<'t> FunctionBuilder<'t> {
    /// Starts building a function for `target`.
    pub fn new(name: &str, target: &'t TargetInfo) -> Self {
        Self {
            func: MachineFunction::new(name),
            target,
            current: None,
        }
    }

    /// Creates a new block, placing it after every existing block.
    pub fn create_block(&mut self, name: &str) -> Block {
        self.func.push_block(name)
    }

    /// Makes new instructions get appended to `block`.
    pub fn switch_to(&mut self, block: Block) {
        self.current = Some(block);
    }

    /// Records a control-flow edge from `from` to `to`.
    pub fn add_successor(&mut self, from: Block, to: Block) {
        self.func.push_successor(from, to);
    }

    /// Creates a new virtual register of `class`.
    pub fn vreg(&mut self, class: RegClass) -> VReg {
        let lanes = LaneMask::all(self.target.class(class).lanes);

        self.func.push_vreg(VRegData { class, lanes })
    }

    /// Starts an instruction that will be appended to the current block.
    pub fn inst(&mut self, opcode: &'static str) -> InstBuilder<'_, 't> {
        InstBuilder {
            data: InstData::new(opcode, InstFlags::NONE),
            builder: self,
        }
    }

    /// Appends a debug-info marker describing `reg`.
    pub fn debug_value(&mut self, reg: VReg) -> Inst {
        self.inst("DBG_VALUE")
            .use_reg(reg)
            .flags(InstFlags::DEBUG_VALUE)
            .latency(0)
            .finish()
    }

    /// Finishes the function.
    pub fn build(self) -> MachineFunction {
        self.func
    }
}

/// Builds a single instruction, see [`FunctionBuilder::inst`].
#[derive(Debug)]
pub struct InstBuilder<'b, 't> {
    builder: &'b mut FunctionBuilder<'t>,
    data: InstData,
}

impl<'b, 't> InstBuilder<'b, 't> {
    /// Adds a def of every lane of `reg`.
    pub fn def(self, reg: VReg) -> Self {
        let lanes = self.builder.func.vreg(reg).lanes;

        self.operand(reg, lanes, OperandKind::Def)
    }

    /// Adds a def of some of the lanes of `reg`.
    pub fn def_lanes(self, reg: VReg, lanes: LaneMask) -> Self {
        self.operand(reg, lanes, OperandKind::Def)
    }

    /// Adds a use of every lane of `reg`.
    pub fn use_reg(self, reg: VReg) -> Self {
        let lanes = self.builder.func.vreg(reg).lanes;

        self.operand(reg, lanes, OperandKind::Use)
    }

    /// Adds a use of some of the lanes of `reg`.
    pub fn use_lanes(self, reg: VReg, lanes: LaneMask) -> Self {
        self.operand(reg, lanes, OperandKind::Use)
    }

    /// Sets the result latency in cycles.
    pub fn latency(mut self, latency: u32) -> Self {
        self.data.set_latency(latency);
        self
    }

    /// Adds scheduling flags.
    pub fn flags(mut self, flags: InstFlags) -> Self {
        self.data.add_flags(flags);
        self
    }

    /// Appends the instruction to the builder's current block.
    pub fn finish(self) -> Inst {
        let block = self
            .builder
            .current
            .expect("must `switch_to` a block before appending instructions");

        self.builder.func.push_inst(self.data, block)
    }

    fn operand(mut self, reg: VReg, lanes: LaneMask, kind: OperandKind) -> Self {
        assert!(
            self.builder.func.vreg(reg).lanes.contains(lanes),
            "operand lanes must be lanes of the register"
        );

        self.data.push_operand(Operand::new(reg, lanes, kind));
        self
    }
}
