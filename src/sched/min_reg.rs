//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{SecondaryMap, SecondarySet};
use crate::liveness::LiveRegSet;
use crate::mir::{InstData, VReg};
use crate::pressure::RegInfo;
use crate::sched::{region_live_out, CandidateSchedule, DagScope, DepKind, Region, ScheduleDag, SUnit};
use crate::utility::SaHashMap;
use std::cmp::Reverse;

// estimated liveness while scheduling top-down
struct LiveModel {
    live: LiveRegSet,
    live_out: LiveRegSet,
    readers_left: SaHashMap<VReg, u32>,
}

impl LiveModel {
    fn new(info: &RegInfo<'_>, dag: &ScheduleDag, region: &Region) -> Self {
        let mut readers_left = SaHashMap::default();

        for su in dag.units() {
            for (reg, _) in info.func.inst(dag.inst(su)).reg_uses() {
                *readers_left.entry(reg).or_insert(0) += 1;
            }
        }

        Self {
            live: info.lis.live_regs_before(info.func, region.begin()),
            live_out: region_live_out(info, region),
            readers_left,
        }
    }

    fn readers_left(&self, reg: VReg) -> u32 {
        self.readers_left.get(&reg).copied().unwrap_or(0)
    }

    // lanes made live minus lanes released by scheduling `data` next
    fn delta(&self, data: &InstData) -> i64 {
        let uses = data.reg_uses();
        let defs = data.reg_defs();
        let mut delta = 0;

        for &(reg, lanes) in defs.iter() {
            let reads_itself = uses.iter().any(|&(r, _)| r == reg);
            let other_readers = self.readers_left(reg) - u32::from(reads_itself);

            if other_readers > 0 || self.live_out.get(reg).overlaps(lanes) {
                delta += i64::from((lanes & !self.live.get(reg)).count());
            }
        }

        for &(reg, _) in uses.iter() {
            let redefined = defs.iter().any(|&(r, _)| r == reg);

            if self.readers_left(reg) == 1 && !redefined {
                let released = self.live.get(reg) & !self.live_out.get(reg);

                delta -= i64::from(released.count());
            }
        }

        delta
    }

    fn schedule(&mut self, data: &InstData) {
        let uses = data.reg_uses();
        let defs = data.reg_defs();

        for &(reg, _) in uses.iter() {
            if let Some(count) = self.readers_left.get_mut(&reg) {
                *count -= 1;
            }
        }

        for &(reg, _) in uses.iter() {
            let redefined = defs.iter().any(|&(r, _)| r == reg);

            if self.readers_left(reg) == 0 && !redefined {
                let dead = !self.live_out.get(reg);

                self.live.remove_lanes(reg, dead);
            }
        }

        for &(reg, lanes) in defs.iter() {
            if self.readers_left(reg) > 0 || self.live_out.get(reg).overlaps(lanes) {
                self.live.insert_lanes(reg, lanes);
            } else {
                self.live.remove_lanes(reg, lanes);
            }
        }
    }
}

/// Builds a schedule that greedily keeps as few registers live as possible,
/// working top-down from `top_roots`.
///
/// Among the ready nodes this prefers, in order:
///
/// 1. the smallest estimated pressure change: defs that are read later (or
///    live past the region) add their lanes, and the last reader of a value
///    that dies in the region releases it
/// 2. the highest priority: whenever a node is scheduled, the unscheduled
///    operands of its partially-ready consumers are bumped, so a consumer that
///    was started on gets finished before new values are created
/// 3. the fewest successors that still won't be ready afterwards
/// 4. the earliest in topological order
pub fn make_min_reg_schedule(
    top_roots: &[SUnit],
    dag: &ScheduleDag,
    info: &RegInfo<'_>,
    region: &Region,
) -> Vec<SUnit> {
    let mut model = LiveModel::new(info, dag, region);
    let mut preds_left = SecondaryMap::new();
    let mut priority = SecondaryMap::new();
    let mut scheduled = SecondarySet::new();
    let mut ready = top_roots.to_vec();
    let mut order = Vec::with_capacity(dag.len());

    for su in dag.units() {
        preds_left.insert(su, dag.preds(su).len());
        priority.insert(su, 0u32);
    }

    while !ready.is_empty() {
        let (index, su) = ready
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|&(_, su)| {
                let not_ready = dag
                    .succs(su)
                    .iter()
                    .filter(|dep| preds_left[dep.node] > 1)
                    .count();

                (
                    model.delta(info.func.inst(dag.inst(su))),
                    Reverse(priority[su]),
                    not_ready,
                    dag.topo_index(su),
                )
            })
            .expect("ready list cannot be empty here");

        let step = order.len() as u32 + 1;

        ready.swap_remove(index);
        scheduled.insert(su);
        order.push(su);
        model.schedule(info.func.inst(dag.inst(su)));

        for dep in dag.succs(su) {
            let left = &mut preds_left[dep.node];

            *left -= 1;

            if *left == 0 {
                ready.push(dep.node);
            } else if dep.kind == DepKind::Data {
                bump_operands(dag, dep.node, step, &scheduled, &mut priority);
            }
        }
    }

    order
}

// raises the priority of every unscheduled node `consumer` transitively reads
fn bump_operands(
    dag: &ScheduleDag,
    consumer: SUnit,
    step: u32,
    scheduled: &SecondarySet<SUnit>,
    priority: &mut SecondaryMap<SUnit, u32>,
) {
    let mut worklist = vec![consumer];

    while let Some(node) = worklist.pop() {
        for dep in dag.preds(node) {
            if dep.kind != DepKind::Data || scheduled.contains(dep.node) {
                continue;
            }

            if priority[dep.node] < step {
                priority[dep.node] = step;
                worklist.push(dep.node);
            }
        }
    }
}

/// Produces minimum-register candidates for regions.
#[derive(Copy, Clone, Debug, Default)]
pub struct MinRegStrategy {
    target_occupancy: u32,
}

impl MinRegStrategy {
    /// Creates a strategy that compares candidates at `target_occupancy`.
    pub fn new(target_occupancy: u32) -> Self {
        Self { target_occupancy }
    }

    /// Computes the minimum-register schedule for the region `scope` was
    /// built for. Yields nothing if the schedule would be worse than what the
    /// region already has.
    pub fn candidate(&self, scope: &DagScope<'_, '_>, region: &Region) -> Option<CandidateSchedule> {
        let ctx = scope.context();
        let info = ctx.info();
        let order = make_min_reg_schedule(scope.top_roots(), scope.dag(), &info, region);
        let pressure = scope.predict_pressure(region, &order);

        if region
            .max_pressure()
            .less(&pressure, self.target_occupancy, info.target)
        {
            log::warn!(
                "minimum-register schedule is worse than the current order ({} vs {}), ignoring it",
                pressure.display(info.target),
                region.max_pressure().display(info.target)
            );

            return None;
        }

        log::debug!("minimum-register candidate: {}", pressure.display(info.target));

        Some(CandidateSchedule::new(order, pressure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LiveIntervals;
    use crate::mir::{Inst, MachineFunction};
    use crate::sched::{schedule_pressure, testing};
    use crate::target::TargetInfo;

    fn min_reg_order(target: &TargetInfo, func: &MachineFunction, insts: &[Inst]) -> Vec<Inst> {
        let lis = LiveIntervals::compute(func);
        let info = RegInfo {
            func,
            lis: &lis,
            target,
        };
        let region = testing::whole_block_region(&info, insts);
        let dag = ScheduleDag::build(func, insts[0], None);
        let (top, _) = dag.find_roots();
        let order = make_min_reg_schedule(&top, &dag, &info, &region);

        assert!(dag.is_valid_order(&order));

        order.into_iter().map(|su| dag.inst(su)).collect()
    }

    #[test]
    fn reduction_tree_is_scheduled_depth_first() {
        let target = testing::target();
        let (func, i) = testing::tree(&target, 8);
        let order = min_reg_order(&target, &func, &i);

        // loads are 0..8, then the adds level by level, then the store
        let expected = vec![
            i[0], i[1], i[8], i[2], i[3], i[9], i[12], i[4], i[5], i[10], i[6], i[7], i[11], i[13],
            i[14], i[15],
        ];

        assert_eq!(order, expected);
    }

    #[test]
    fn predicted_pressure_beats_baseline() {
        let target = testing::target();
        let (func, i) = testing::tree(&target, 8);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };
        let region = testing::whole_block_region(&info, &i);
        let order = min_reg_order(&target, &func, &i);
        let pressure = schedule_pressure(&info, &region, order.iter().copied());

        assert_eq!(region.occupancy(&target), 2);
        assert_eq!(pressure.occupancy(&target), 4);
        assert!(pressure.less(region.max_pressure(), 8, &target));
    }

    #[test]
    fn chains_keep_their_order() {
        let target = testing::target();
        let (func, i) = testing::chain(&target);

        assert_eq!(min_reg_order(&target, &func, &i), i);
    }

    #[test]
    fn two_chains_finish_one_before_starting_the_other() {
        let target = testing::target();
        let (func, i) = testing::two_chains(&target);
        let order = min_reg_order(&target, &func, &i);

        assert_eq!(order, i);
        assert_eq!(order.last(), Some(&i[6]));
    }

    #[test]
    fn deterministic() {
        let target = testing::target();
        let (func, i) = testing::tree(&target, 8);

        assert_eq!(min_reg_order(&target, &func, &i), min_reg_order(&target, &func, &i));
    }
}
