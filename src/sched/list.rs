//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::pressure::{RegInfo, RegPressure, UpwardTracker};
use crate::sched::ilp::ReadyQueue;
use crate::sched::{region_live_out, Region, ScheduleDag, SUnit};
use smallvec::SmallVec;
use std::cmp::Reverse;

/// The list-scheduling strategy slot of the pass.
///
/// The slot always holds *something*: outside of a strategy override it's
/// [`ListStrategy::Stub`], which keeps the existing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ListStrategy {
    /// Keeps the current order of the region.
    #[default]
    Stub,
    /// The default occupancy-driven list scheduler.
    MaxOccupancy(MaxOccupancyStrategy),
}

impl ListStrategy {
    /// Orders the nodes of `dag`, the graph of `region`.
    pub fn schedule(&self, dag: &ScheduleDag, info: &RegInfo<'_>, region: &Region) -> Vec<SUnit> {
        match self {
            ListStrategy::Stub => dag.units().collect(),
            ListStrategy::MaxOccupancy(strategy) => strategy.schedule(dag, info, region),
        }
    }
}

/// A bottom-up list scheduler that tries to keep every bank under the
/// register limit of a target occupancy, and otherwise schedules for latency.
///
/// A target occupancy of `0` means unconstrained.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MaxOccupancyStrategy {
    target_occupancy: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Choice {
    // lanes over the limit at the instruction, summed over banks
    excess: u32,
    // pressure change, only for nodes that leave a bank over its limit
    over_limit_delta: i64,
    stalled: bool,
    depth: Reverse<u32>,
    topo: Reverse<u32>,
}

impl MaxOccupancyStrategy {
    /// Creates a strategy targeting `target_occupancy`.
    pub fn new(target_occupancy: u32) -> Self {
        Self { target_occupancy }
    }

    /// The occupancy being targeted
    pub fn target_occupancy(&self) -> u32 {
        self.target_occupancy
    }

    /// Changes the occupancy being targeted.
    pub fn set_target_occupancy(&mut self, target_occupancy: u32) {
        self.target_occupancy = target_occupancy;
    }

    /// Orders the nodes of `dag`, the graph of `region`.
    pub fn schedule(&self, dag: &ScheduleDag, info: &RegInfo<'_>, region: &Region) -> Vec<SUnit> {
        let target = info.target;
        let limits: SmallVec<[u32; 2]> = target
            .banks()
            .map(|(bank, _)| match self.target_occupancy {
                0 => u32::MAX,
                occ => target.max_units_for_occupancy(bank, occ),
            })
            .collect();

        let (_, bottom) = dag.find_roots();
        let mut queue = ReadyQueue::new(dag, &bottom);
        let mut tracker = UpwardTracker::new();
        let mut order = Vec::with_capacity(dag.len());

        tracker.reset_to_live_set(info, region_live_out(info, region));

        while !queue.is_empty() {
            queue.advance_if_stalled();

            let su = queue
                .ready()
                .iter()
                .copied()
                .min_by_key(|&su| {
                    let (excess, over_limit_delta) = if self.target_occupancy == 0 {
                        (0, 0)
                    } else {
                        pressure_cost(info, &tracker, dag, su, &limits)
                    };

                    Choice {
                        excess,
                        over_limit_delta,
                        stalled: !queue.is_available(su),
                        depth: Reverse(dag.depth(su)),
                        topo: Reverse(dag.topo_index(su)),
                    }
                })
                .expect("ready list cannot be empty here");

            queue.schedule(dag, su);
            tracker.recede(info, dag.inst(su));
            tracker.take_max_pressure();
            order.push(su);
        }

        order.reverse();
        order
    }
}

fn pressure_cost(
    info: &RegInfo<'_>,
    tracker: &UpwardTracker,
    dag: &ScheduleDag,
    su: SUnit,
    limits: &[u32],
) -> (u32, i64) {
    let mut probe = tracker.clone();

    probe.recede(info, dag.inst(su));

    let at: &RegPressure = probe.max_pressure();
    let after = probe.current_pressure();
    let mut excess = 0;
    let mut over = false;

    for ((bank, _), &limit) in info.target.banks().zip(limits) {
        excess += at.units(bank).saturating_sub(limit);
        over |= after.units(bank) > limit;
    }

    let delta = if over {
        i64::from(after.total_units()) - i64::from(tracker.current_pressure().total_units())
    } else {
        0
    };

    (excess, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LiveIntervals;
    use crate::sched::{schedule_pressure, testing};

    #[test]
    fn stub_keeps_original_order() {
        let target = testing::target();
        let (func, insts) = testing::wide(&target);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };
        let region = testing::whole_block_region(&info, &insts);

        let order = ListStrategy::Stub.schedule(&dag, &info, &region);

        assert_eq!(order, dag.topological_order());
    }

    #[test]
    fn constrained_schedule_stays_under_limit() {
        let target = testing::target();
        let (func, insts) = testing::tree(&target, 8);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };
        let region = testing::whole_block_region(&info, &insts);

        // 24 registers: 4 waves allows 6 registers
        let constrained = MaxOccupancyStrategy::new(4).schedule(&dag, &info, &region);
        let unconstrained = MaxOccupancyStrategy::new(0).schedule(&dag, &info, &region);

        assert!(dag.is_valid_order(&constrained));
        assert!(dag.is_valid_order(&unconstrained));

        let pressure = |order: &[SUnit]| {
            schedule_pressure(&info, &region, order.iter().map(|&su| dag.inst(su)))
        };

        assert!(pressure(&constrained).occupancy(&target) >= 4);
        assert!(!pressure(&unconstrained).less(&pressure(&constrained), 4, &target));
    }
}
