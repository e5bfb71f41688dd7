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
use crate::pressure::RegPressure;
use crate::sched::{CandidateSchedule, DagScope, Region, ScheduleDag, SUnit};
use std::cmp::Reverse;

/// The ready list of a bottom-up list scheduler with a single-issue cycle
/// model: one node per cycle, and a predecessor can't issue until the
/// latency of every edge to its already-scheduled successors has elapsed.
#[derive(Clone, Debug)]
pub(in crate::sched) struct ReadyQueue {
    succs_left: SecondaryMap<SUnit, usize>,
    release: SecondaryMap<SUnit, u32>,
    ready: Vec<SUnit>,
    cycle: u32,
}

impl ReadyQueue {
    pub(in crate::sched) fn new(dag: &ScheduleDag, bottom_roots: &[SUnit]) -> Self {
        let mut succs_left = SecondaryMap::new();
        let mut release = SecondaryMap::new();

        for su in dag.units() {
            succs_left.insert(su, dag.succs(su).len());
            release.insert(su, 0);
        }

        Self {
            succs_left,
            release,
            ready: bottom_roots.to_vec(),
            cycle: 0,
        }
    }

    pub(in crate::sched) fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// The nodes currently ready, whether or not they're available yet.
    pub(in crate::sched) fn ready(&self) -> &[SUnit] {
        &self.ready
    }

    /// Whether `su` can issue in the current cycle.
    pub(in crate::sched) fn is_available(&self, su: SUnit) -> bool {
        self.release[su] <= self.cycle
    }

    /// Skips ahead to the first cycle where something can issue.
    pub(in crate::sched) fn advance_if_stalled(&mut self) {
        if self.ready.iter().any(|&su| self.is_available(su)) {
            return;
        }

        if let Some(next) = self.ready.iter().map(|&su| self.release[su]).min() {
            self.cycle = next;
        }
    }

    /// How many predecessors of `su` become ready once it's scheduled.
    pub(in crate::sched) fn newly_ready(&self, dag: &ScheduleDag, su: SUnit) -> usize {
        dag.preds(su)
            .iter()
            .filter(|dep| self.succs_left[dep.node] == 1)
            .count()
    }

    /// Schedules `su` in the current cycle.
    pub(in crate::sched) fn schedule(&mut self, dag: &ScheduleDag, su: SUnit) {
        let index = self
            .ready
            .iter()
            .position(|&other| other == su)
            .expect("only ready nodes can be scheduled");

        self.ready.remove(index);

        for dep in dag.preds(su) {
            let release = &mut self.release[dep.node];

            *release = (*release).max(self.cycle + dep.latency);

            let left = &mut self.succs_left[dep.node];

            *left -= 1;

            if *left == 0 {
                self.ready.push(dep.node);
            }
        }

        self.cycle += 1;
    }
}

/// Builds a schedule that keeps as many independent instructions in flight
/// as possible, working from the bottom of the region upwards.
///
/// At each step, among the ready nodes this prefers one that can issue this
/// cycle, then the one that makes the most predecessors ready, then the one
/// deepest in the graph, then the one latest in topological order.
pub fn make_ilp_schedule(bottom_roots: &[SUnit], dag: &ScheduleDag) -> Vec<SUnit> {
    let mut queue = ReadyQueue::new(dag, bottom_roots);
    let mut order = Vec::with_capacity(dag.len());

    while !queue.is_empty() {
        queue.advance_if_stalled();

        let su = queue
            .ready()
            .iter()
            .copied()
            .min_by_key(|&su| {
                (
                    !queue.is_available(su),
                    Reverse(queue.newly_ready(dag, su)),
                    Reverse(dag.depth(su)),
                    Reverse(dag.topo_index(su)),
                )
            })
            .expect("ready list cannot be empty here");

        queue.schedule(dag, su);
        order.push(su);
    }

    order.reverse();
    order
}

/// Produces ILP candidates for regions.
#[derive(Copy, Clone, Debug, Default)]
pub struct IlpStrategy;

impl IlpStrategy {
    /// Computes the ILP schedule for the region `scope` was built for, along
    /// with its predicted pressure.
    pub fn candidate(&self, scope: &DagScope<'_, '_>, region: &Region) -> CandidateSchedule {
        let order = make_ilp_schedule(scope.bottom_roots(), scope.dag());
        let pressure: RegPressure = scope.predict_pressure(region, &order);

        log::debug!(
            "ilp candidate: {}",
            pressure.display(scope.context().target())
        );

        CandidateSchedule::new(order, pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::testing;

    #[test]
    fn independent_chains_interleave() {
        let target = testing::target();
        let (func, insts) = testing::two_chains(&target);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let (_, bottom) = dag.find_roots();

        let order: Vec<_> = make_ilp_schedule(&bottom, &dag)
            .into_iter()
            .map(|su| dag.inst(su))
            .collect();

        let (a, b, merge) = (&insts[0..3], &insts[3..6], insts[6]);

        assert_eq!(order, vec![a[0], b[0], a[1], b[1], a[2], b[2], merge]);
    }

    #[test]
    fn chains_keep_their_order() {
        let target = testing::target();
        let (func, insts) = testing::chain(&target);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let (_, bottom) = dag.find_roots();

        let order = make_ilp_schedule(&bottom, &dag);

        assert_eq!(order, dag.topological_order());
    }

    #[test]
    fn long_latency_results_are_hidden() {
        let target = testing::target();
        let (func, insts) = testing::latency_kernel(&target);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let (_, bottom) = dag.find_roots();

        let order: Vec<_> = make_ilp_schedule(&bottom, &dag)
            .into_iter()
            .map(|su| dag.inst(su))
            .collect();

        assert!(dag.is_valid_order(&make_ilp_schedule(&bottom, &dag)));

        // the independent add goes between the load and its use
        assert_eq!(order, vec![insts[0], insts[2], insts[1]]);
    }
}
