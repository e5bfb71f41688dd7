//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::mir::Inst;
use crate::pressure::RegPressure;
use crate::sched::{
    schedule_pressure, ListStrategy, Region, RegionCursor, SchedContext, ScheduleDag, SUnit,
    TentativeSchedule,
};
use std::mem;

/// A schedule for a region expressed as an order of DAG nodes, along with
/// the pressure it is predicted to have.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateSchedule {
    order: Vec<SUnit>,
    pressure: RegPressure,
}

impl CandidateSchedule {
    /// Pairs an order with its predicted pressure.
    pub fn new(order: Vec<SUnit>, pressure: RegPressure) -> Self {
        Self { order, pressure }
    }

    /// The order of the DAG's nodes
    pub fn order(&self) -> &[SUnit] {
        &self.order
    }

    /// The predicted pressure of the order
    pub fn pressure(&self) -> &RegPressure {
        &self.pressure
    }
}

/// Positions the context on one region and builds its DAG for the custom
/// strategies to work on.
///
/// The cursor the context had before the scope was created is restored when
/// the scope is dropped, whether or not anything was committed.
pub struct DagScope<'c, 'f> {
    ctx: &'c mut SchedContext<'f>,
    saved: RegionCursor,
    dag: ScheduleDag,
    top_roots: Vec<SUnit>,
    bottom_roots: Vec<SUnit>,
}

impl<'c, 'f> DagScope<'c, 'f> {
    /// Enters `region` and builds the DAG for its current order.
    pub fn new(ctx: &'c mut SchedContext<'f>, region: &Region) -> Self {
        let saved = ctx.cursor;

        ctx.enter_region(
            region.block(),
            region.begin(),
            region.end(),
            region.num_instrs(),
        );

        let dag = ScheduleDag::build(ctx.func, region.begin(), region.end());
        let (top_roots, bottom_roots) = dag.find_roots();

        log::trace!(
            "built dag with {} nodes ({} top roots, {} bottom roots)",
            dag.len(),
            top_roots.len(),
            bottom_roots.len()
        );

        Self {
            ctx,
            saved,
            dag,
            top_roots,
            bottom_roots,
        }
    }

    /// The region's dependency graph
    pub fn dag(&self) -> &ScheduleDag {
        &self.dag
    }

    /// Nodes without predecessors
    pub fn top_roots(&self) -> &[SUnit] {
        &self.top_roots
    }

    /// Nodes without successors
    pub fn bottom_roots(&self) -> &[SUnit] {
        &self.bottom_roots
    }

    /// The context the scope borrows
    pub fn context(&self) -> &SchedContext<'f> {
        self.ctx
    }

    /// Predicts the pressure of `order` without touching the function.
    pub fn predict_pressure(&self, region: &Region, order: &[SUnit]) -> RegPressure {
        schedule_pressure(
            &self.ctx.info(),
            region,
            order.iter().map(|&su| self.dag.inst(su)),
        )
    }

    /// Materializes `candidate` as the region's order.
    pub fn commit(&mut self, region: &mut Region, candidate: &CandidateSchedule) {
        let schedule = self.dag.detach_schedule(candidate.order());

        self.ctx.commit(region, &schedule, Some(candidate.pressure()));
    }

    /// Records `candidate` as the region's fallback without committing it.
    pub fn stash_best(&self, region: &mut Region, candidate: &CandidateSchedule) {
        region.stash_best(TentativeSchedule {
            schedule: self.dag.detach_schedule(candidate.order()),
            pressure: candidate.pressure().clone(),
        });
    }

    /// Commits and discards the region's stashed schedule, if it has one.
    pub fn commit_best(&mut self, region: &mut Region) -> bool {
        commit_best(self.ctx, region)
    }
}

impl Drop for DagScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.cursor = self.saved;
    }
}

/// Temporarily replaces the context's list strategy for one region, and
/// remembers the region's order so it can be put back.
///
/// Dropping the override restores both the previous strategy and the
/// previous cursor.
pub struct StrategyOverride<'c, 'f> {
    ctx: &'c mut SchedContext<'f>,
    saved_strategy: ListStrategy,
    saved_cursor: RegionCursor,
    original_order: Vec<Inst>,
    original_pressure: RegPressure,
}

impl<'c, 'f> StrategyOverride<'c, 'f> {
    /// Installs `strategy` and enters `region`.
    pub fn new(ctx: &'c mut SchedContext<'f>, region: &Region, strategy: ListStrategy) -> Self {
        let saved_strategy = mem::replace(&mut ctx.strategy, strategy);
        let saved_cursor = ctx.cursor;

        ctx.enter_region(
            region.block(),
            region.begin(),
            region.end(),
            region.num_instrs(),
        );

        let original_order = ctx
            .func
            .layout()
            .insts_between(region.begin(), region.end())
            .collect();

        Self {
            ctx,
            saved_strategy,
            saved_cursor,
            original_order,
            original_pressure: region.max_pressure().clone(),
        }
    }

    /// The context the override borrows
    pub fn context(&self) -> &SchedContext<'f> {
        self.ctx
    }

    /// Runs the installed list strategy on the region and commits whatever it
    /// produces. The region's pressure is re-measured afterwards.
    pub fn schedule(&mut self, region: &mut Region) {
        assert!(
            self.ctx.cursor.is_at(region),
            "strategy override is not positioned on this region"
        );

        let dag = ScheduleDag::build(self.ctx.func, region.begin(), region.end());
        let order = self.ctx.strategy.schedule(&dag, &self.ctx.info(), region);

        debug_assert!(dag.is_valid_order(&order));

        let schedule = dag.detach_schedule(&order);

        self.ctx.commit(region, &schedule, None);
    }

    /// Puts back the order the region had when the override was created.
    pub fn restore_order(&mut self, region: &mut Region) {
        let order = self.original_order.clone();

        self.ctx.commit(region, &order, Some(&self.original_pressure));
    }

    /// Commits and discards the region's stashed schedule, if it has one.
    pub fn commit_best(&mut self, region: &mut Region) -> bool {
        commit_best(self.ctx, region)
    }
}

impl Drop for StrategyOverride<'_, '_> {
    fn drop(&mut self) {
        self.ctx.strategy = mem::take(&mut self.saved_strategy);
        self.ctx.cursor = self.saved_cursor;
    }
}

fn commit_best(ctx: &mut SchedContext<'_>, region: &mut Region) -> bool {
    match region.take_best() {
        Some(best) => {
            ctx.commit(region, &best.schedule, Some(&best.pressure));

            true
        }
        None => false,
    }
}
