//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Small kernels shared by the scheduler's tests.

use crate::mir::{FunctionBuilder, Inst, InstFlags, MachineFunction};
use crate::pressure::{RegInfo, RegPressure};
use crate::sched::{schedule_pressure, Region};
use crate::target::{RegClass, TargetInfo};

fn builder(max_waves: u32) -> crate::target::TargetBuilder {
    let mut b = TargetInfo::builder("test", max_waves);
    let vgpr = b.bank("vgpr", 24, 1);

    b.class("v32", vgpr, 1);
    b.class("v64", vgpr, 2);
    b
}

/// One 24-register bank, up to 8 waves.
pub(crate) fn target() -> TargetInfo {
    builder(8).build()
}

/// Same as [`target`], but local memory limits the function to 4 waves.
pub(crate) fn lds_limited_target() -> TargetInfo {
    let mut b = builder(8);

    b.local_memory_waves(4);
    b.build()
}

/// Same as [`target`], but the ILP strategy is limited to 4 waves.
pub(crate) fn wave_limited_target() -> TargetInfo {
    let mut b = builder(8);

    b.waves_per_eu_limit(4);
    b.build()
}

/// `mov; add; add; add; store`, each reading the previous result.
pub(crate) fn chain(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
    let v32 = target.class_by_name("v32").expect("test target has v32");
    let mut b = FunctionBuilder::new("chain", target);
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let regs: Vec<_> = (0..4).map(|_| b.vreg(v32)).collect();
    let mut insts = vec![b.inst("v_mov").def(regs[0]).finish()];

    for w in regs.windows(2) {
        insts.push(b.inst("v_add").def(w[1]).use_reg(w[0]).finish());
    }

    insts.push(b.inst("store").use_reg(regs[3]).finish());

    (b.build(), insts)
}

/// Two independent three-instruction chains `a` and `b` and a merge.
pub(crate) fn two_chains(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
    let v32 = target.class_by_name("v32").expect("test target has v32");
    let mut b = FunctionBuilder::new("two_chains", target);
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let regs: Vec<_> = (0..7).map(|_| b.vreg(v32)).collect();
    let mut insts = Vec::new();

    for chain in [&regs[0..3], &regs[3..6]] {
        insts.push(b.inst("v_mov").def(chain[0]).finish());
        insts.push(b.inst("v_add").def(chain[1]).use_reg(chain[0]).finish());
        insts.push(b.inst("v_add").def(chain[2]).use_reg(chain[1]).finish());
    }

    insts.push(
        b.inst("v_add")
            .def(regs[6])
            .use_reg(regs[2])
            .use_reg(regs[5])
            .finish(),
    );

    (b.build(), insts)
}

/// Four loads, a two-level add tree over them, and a store of the sum.
pub(crate) fn wide(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
    tree_named("wide", target, 4)
}

/// `leaves` loads (a power of two), then every level of a pairwise add tree,
/// then a store of the root. Every load is issued before any add.
pub(crate) fn tree(target: &TargetInfo, leaves: usize) -> (MachineFunction, Vec<Inst>) {
    tree_named("tree", target, leaves)
}

fn tree_named(name: &str, target: &TargetInfo, leaves: usize) -> (MachineFunction, Vec<Inst>) {
    let v32 = target.class_by_name("v32").expect("test target has v32");
    let mut b = FunctionBuilder::new(name, target);
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let insts = emit_tree(&mut b, v32, leaves);

    (b.build(), insts)
}

/// Appends the body of [`tree`] to the current block.
pub(crate) fn emit_tree(b: &mut FunctionBuilder<'_>, class: RegClass, leaves: usize) -> Vec<Inst> {
    assert!(leaves.is_power_of_two() && leaves >= 2);

    let mut insts = Vec::new();
    let mut level = Vec::new();

    for _ in 0..leaves {
        let reg = b.vreg(class);

        insts.push(b.inst("load").def(reg).flags(InstFlags::MAY_LOAD).finish());
        level.push(reg);
    }

    while level.len() > 1 {
        let mut next = Vec::new();

        for pair in level.chunks(2) {
            let sum = b.vreg(class);

            insts.push(
                b.inst("v_add")
                    .def(sum)
                    .use_reg(pair[0])
                    .use_reg(pair[1])
                    .finish(),
            );
            next.push(sum);
        }

        level = next;
    }

    insts.push(
        b.inst("store")
            .use_reg(level[0])
            .flags(InstFlags::MAY_STORE)
            .finish(),
    );

    insts
}

/// Appends `inputs` loads, one instruction reading all of them, and a store
/// of its result. Every input is live at once in any order.
pub(crate) fn emit_fan_in(b: &mut FunctionBuilder<'_>, class: RegClass, inputs: usize) -> Vec<Inst> {
    let regs: Vec<_> = (0..inputs).map(|_| b.vreg(class)).collect();
    let sum = b.vreg(class);
    let mut insts = Vec::new();

    for &reg in &regs {
        insts.push(b.inst("load").def(reg).flags(InstFlags::MAY_LOAD).finish());
    }

    let mut reduce = b.inst("v_sum").def(sum);

    for &reg in &regs {
        reduce = reduce.use_reg(reg);
    }

    insts.push(reduce.finish());
    insts.push(b.inst("store").use_reg(sum).flags(InstFlags::MAY_STORE).finish());

    insts
}

/// Appends the chains of [`two_chains`] with their instructions alternating,
/// `a1 b1 a2 b2 a3 b3 merge`.
pub(crate) fn emit_interleaved_chains(b: &mut FunctionBuilder<'_>, class: RegClass) -> Vec<Inst> {
    let a: Vec<_> = (0..3).map(|_| b.vreg(class)).collect();
    let c: Vec<_> = (0..3).map(|_| b.vreg(class)).collect();
    let merged = b.vreg(class);
    let mut insts = Vec::new();

    for chain in [&a, &c] {
        insts.push(b.inst("v_mov").def(chain[0]).finish());
    }

    for step in 1..3 {
        for chain in [&a, &c] {
            insts.push(b.inst("v_add").def(chain[step]).use_reg(chain[step - 1]).finish());
        }
    }

    insts.push(b.inst("v_add").def(merged).use_reg(a[2]).use_reg(c[2]).finish());

    insts
}

/// A function of two blocks, `first` falling through to `second`, each
/// filled by the matching closure. Returns the instructions of each block.
pub(crate) fn two_blocks(
    target: &TargetInfo,
    first: impl FnOnce(&mut FunctionBuilder<'_>, RegClass) -> Vec<Inst>,
    second: impl FnOnce(&mut FunctionBuilder<'_>, RegClass) -> Vec<Inst>,
) -> (MachineFunction, Vec<Inst>, Vec<Inst>) {
    let v32 = target.class_by_name("v32").expect("test target has v32");
    let mut b = FunctionBuilder::new("two_blocks", target);
    let entry = b.create_block("entry");
    let exit = b.create_block("exit");

    b.add_successor(entry, exit);
    b.switch_to(entry);

    let first = first(&mut b, v32);

    b.switch_to(exit);

    let second = second(&mut b, v32);

    (b.build(), first, second)
}

/// A 4-cycle load, its use, and an unrelated move.
pub(crate) fn latency_kernel(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
    let v32 = target.class_by_name("v32").expect("test target has v32");
    let mut b = FunctionBuilder::new("latency", target);
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let (x, y, z) = (b.vreg(v32), b.vreg(v32), b.vreg(v32));
    let load = b
        .inst("load")
        .def(x)
        .latency(4)
        .flags(InstFlags::MAY_LOAD)
        .finish();
    let add = b.inst("v_add").def(y).use_reg(x).finish();
    let mov = b.inst("v_mov").def(z).finish();

    (b.build(), vec![load, add, mov])
}

/// A region covering the whole block of `insts[0]`, with its pressure
/// measured for the current order.
pub(crate) fn whole_block_region(info: &RegInfo<'_>, insts: &[Inst]) -> Region {
    let block = info.func.layout().inst_block(insts[0]);
    let num_instrs = insts
        .iter()
        .filter(|&&inst| !info.func.is_debug_value(inst))
        .count();

    let mut region = Region::new(block, insts[0], None, num_instrs, RegPressure::new());
    let order = info.func.block_order(block);
    let pressure = schedule_pressure(info, &region, order);

    region.set_max_pressure(pressure);
    region
}
