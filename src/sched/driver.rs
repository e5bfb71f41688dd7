//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::liveness::LiveIntervals;
use crate::mir::{Block, Inst, MachineFunction};
use crate::sched::{IterativeScheduler, SchedulerConfig};
use crate::target::TargetInfo;

/// What scheduling a function did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduleReport {
    /// How many regions were big enough to be scheduled
    pub regions: usize,
    /// The occupancy of the function before scheduling
    pub occupancy_before: u32,
    /// The occupancy of the function after scheduling
    pub occupancy_after: u32,
}

/// One schedulable range of a block, `[begin, end)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct RegionBounds {
    begin: Inst,
    end: Option<Inst>,
    num_instrs: usize,
}

// splits `block` at every boundary instruction, top to bottom
fn find_regions(func: &MachineFunction, block: Block) -> Vec<RegionBounds> {
    let mut regions = Vec::new();
    let mut begin = None;
    let mut num_instrs = 0;

    for inst in func.insts_in_block(block) {
        let data = func.inst(inst);

        if data.is_boundary() {
            if let Some(begin) = begin.take() {
                regions.push(RegionBounds {
                    begin,
                    end: Some(inst),
                    num_instrs,
                });
            }

            num_instrs = 0;
            continue;
        }

        begin.get_or_insert(inst);

        if !data.is_debug_value() {
            num_instrs += 1;
        }
    }

    if let Some(begin) = begin {
        regions.push(RegionBounds {
            begin,
            end: None,
            num_instrs,
        });
    }

    regions
}

// every region of `func`, blocks in layout order and bottom-up within a block
fn regions_in_visit_order(func: &MachineFunction) -> Vec<(Block, RegionBounds)> {
    func.blocks()
        .flat_map(|block| {
            find_regions(func, block)
                .into_iter()
                .rev()
                .map(move |bounds| (block, bounds))
        })
        .collect()
}

/// Schedules every region of `func` with the strategy selected by `config`.
///
/// `lis` must describe `func`, and is kept up to date as instructions move.
/// Regions are the ranges between boundary instructions, and are visited
/// bottom-up within each block.
///
/// The scheduler's registry holds regions in that visiting order: block by
/// block, and bottom-up within each block, not in program order.
pub fn schedule_function(
    func: &mut MachineFunction,
    lis: &mut LiveIntervals,
    target: &TargetInfo,
    config: SchedulerConfig,
) -> ScheduleReport {
    let regions = regions_in_visit_order(func);

    log::debug!("scheduling `{}` with {}", func.name(), config.strategy);

    let mut sched = IterativeScheduler::new(func, lis, target, config);

    for (block, bounds) in regions {
        sched.enter_region(block, bounds.begin, bounds.end, bounds.num_instrs);
        sched.schedule();
        sched.exit_region();
    }

    let occupancy_before = sched.function_occupancy();

    sched.finalize_schedule();

    let report = ScheduleReport {
        regions: sched.regions().len(),
        occupancy_before,
        occupancy_after: sched.function_occupancy(),
    };

    log::debug!(
        "scheduled {} regions, occupancy {} -> {}",
        report.regions,
        report.occupancy_before,
        report.occupancy_after
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{FunctionBuilder, InstFlags};
    use crate::sched::{testing, StrategyKind};

    fn config(strategy: StrategyKind) -> SchedulerConfig {
        SchedulerConfig {
            strategy,
            verify: true,
            ..SchedulerConfig::default()
        }
    }

    // two trees separated by a barrier, with a debug value in the first
    fn split_kernel(target: &TargetInfo) -> (MachineFunction, Vec<Inst>) {
        let v32 = target.class_by_name("v32").expect("test target has v32");
        let mut b = FunctionBuilder::new("split", target);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let mut insts = Vec::new();

        for half in 0..2 {
            let regs: Vec<_> = (0..7).map(|_| b.vreg(v32)).collect();

            for &reg in &regs[..4] {
                insts.push(b.inst("load").def(reg).flags(InstFlags::MAY_LOAD).finish());
            }

            if half == 0 {
                insts.push(b.debug_value(regs[0]));
            }

            insts.push(b.inst("v_add").def(regs[4]).use_reg(regs[0]).use_reg(regs[1]).finish());
            insts.push(b.inst("v_add").def(regs[5]).use_reg(regs[2]).use_reg(regs[3]).finish());
            insts.push(b.inst("v_add").def(regs[6]).use_reg(regs[4]).use_reg(regs[5]).finish());
            insts.push(b.inst("store").use_reg(regs[6]).flags(InstFlags::MAY_STORE).finish());

            if half == 0 {
                insts.push(b.inst("barrier").flags(InstFlags::BOUNDARY).finish());
            }
        }

        (b.build(), insts)
    }

    #[test]
    fn blocks_split_at_boundaries() {
        let target = testing::target();
        let (func, insts) = split_kernel(&target);
        let block = func.layout().inst_block(insts[0]);
        let regions = find_regions(&func, block);

        assert_eq!(
            regions,
            vec![
                RegionBounds {
                    begin: insts[0],
                    end: Some(insts[9]),
                    num_instrs: 8,
                },
                RegionBounds {
                    begin: insts[10],
                    end: None,
                    num_instrs: 8,
                },
            ]
        );
    }

    #[test]
    fn regions_are_visited_bottom_up() {
        let target = testing::target();
        let (mut func, insts) = split_kernel(&target);
        let block = func.layout().inst_block(insts[0]);
        let order = regions_in_visit_order(&func);
        let begins: Vec<_> = order.iter().map(|(_, bounds)| bounds.begin).collect();

        assert_eq!(begins, [insts[10], insts[0]]);
        assert!(order.iter().all(|&(b, _)| b == block));

        let mut lis = LiveIntervals::compute(&func);
        let mut sched = IterativeScheduler::new(
            &mut func,
            &mut lis,
            &target,
            config(StrategyKind::MinReg),
        );

        for (block, bounds) in order {
            sched.enter_region(block, bounds.begin, bounds.end, bounds.num_instrs);
            sched.exit_region();
        }

        assert_eq!(sched.regions()[0].begin(), insts[10]);
        assert_eq!(sched.regions()[1].begin(), insts[0]);
    }

    #[test]
    fn small_regions_are_skipped() {
        let target = testing::target();
        let v32 = target.class_by_name("v32").expect("test target has v32");
        let mut b = FunctionBuilder::new("small", &target);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let x = b.vreg(v32);

        b.inst("v_mov").def(x).finish();
        b.inst("store").use_reg(x).finish();
        b.inst("barrier").flags(InstFlags::BOUNDARY).finish();
        b.inst("barrier").flags(InstFlags::BOUNDARY).finish();

        let mut func = b.build();
        let mut lis = LiveIntervals::compute(&func);
        let report = schedule_function(&mut func, &mut lis, &target, config(StrategyKind::Ilp));

        assert_eq!(report.regions, 0);
        assert_eq!(report.occupancy_before, 8);
        assert_eq!(report.occupancy_after, 8);
    }

    #[test]
    fn every_strategy_keeps_regions_intact() {
        let target = testing::target();

        for strategy in [
            StrategyKind::MinReg,
            StrategyKind::MinRegForced,
            StrategyKind::LegacyMaxOccupancy,
            StrategyKind::Ilp,
        ] {
            let (mut func, insts) = split_kernel(&target);
            let block = func.layout().inst_block(insts[0]);
            let mut lis = LiveIntervals::compute(&func);
            let report = schedule_function(&mut func, &mut lis, &target, config(strategy));
            let order = func.block_order(block);

            assert_eq!(report.regions, 2);
            assert!(report.occupancy_after >= report.occupancy_before, "{strategy}");

            // the barrier never moves, and nothing crosses it
            let barrier = order.iter().position(|&i| i == insts[9]).expect("barrier kept");
            let mut first = order[..barrier].to_vec();
            let mut expected = insts[..9].to_vec();

            first.sort_unstable();
            expected.sort_unstable();

            assert_eq!(barrier, 9);
            assert_eq!(first, expected, "{strategy}");

            // the debug value stays right after the load it followed
            let dbg = order.iter().position(|&i| i == insts[4]).expect("debug value kept");

            assert_eq!(order[dbg - 1], insts[3], "{strategy}");
        }
    }

    #[test]
    fn limited_target_reaches_its_occupancy() {
        let target = testing::lds_limited_target();
        let (mut func, insts) = testing::tree(&target, 8);
        let block = func.layout().inst_block(insts[0]);
        let mut lis = LiveIntervals::compute(&func);
        let report = schedule_function(
            &mut func,
            &mut lis,
            &target,
            config(StrategyKind::LegacyMaxOccupancy),
        );

        assert_eq!(report.occupancy_before, 2);
        assert!(report.occupancy_after >= 3);

        let mut order = func.block_order(block);
        let mut expected = insts;

        order.sort_unstable();
        expected.sort_unstable();

        assert_eq!(order, expected);
    }
}
