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
use crate::pressure::RegPressure;
use crate::sched::dump;
use crate::sched::{
    make_min_reg_schedule, CandidateSchedule, DagScope, IlpStrategy, ListStrategy,
    MaxOccupancyStrategy, MinRegStrategy, Region, RegionRegistry, SchedContext, SchedulerConfig,
    StrategyKind, StrategyOverride,
};
use crate::target::TargetInfo;

/// What happened to a region during a list-scheduling or ILP pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(in crate::sched) enum RegionOutcome {
    /// The list schedule met the target and was kept
    Kept,
    /// The list schedule missed the target, the stashed schedule was used
    UsedBest,
    /// The list schedule missed the target, the original order was restored
    Restored,
    /// No schedule met the target, the region was never touched
    Unchanged,
}

/// Collects the regions of one function and reschedules them all at once
/// with the configured strategy.
///
/// The driver calls [`Self::enter_region`], [`Self::schedule`] and
/// [`Self::exit_region`] for every region, and then [`Self::finalize_schedule`]
/// exactly once.
#[derive(Debug)]
pub struct IterativeScheduler<'f> {
    ctx: SchedContext<'f>,
    regions: RegionRegistry,
    config: SchedulerConfig,
}

impl<'f> IterativeScheduler<'f> {
    /// Creates a scheduler for `func`, which `lis` must describe.
    pub fn new(
        func: &'f mut MachineFunction,
        lis: &'f mut LiveIntervals,
        target: &'f TargetInfo,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx: SchedContext::new(func, lis, target, config.verify),
            regions: RegionRegistry::new(),
            config,
        }
    }

    /// Positions the scheduler on a region. Regions with more than two
    /// instructions are recorded along with their current pressure.
    pub fn enter_region(&mut self, block: Block, begin: Inst, end: Option<Inst>, num_instrs: usize) {
        self.ctx.enter_region(block, begin, end, num_instrs);

        if num_instrs > 2 {
            let pressure = self.ctx.region_pressure(block, begin, end);

            self.regions
                .push(Region::new(block, begin, end, num_instrs, pressure));
        }
    }

    /// Nothing is scheduled until every region is known, this only dumps the
    /// region the cursor is on.
    pub fn schedule(&mut self) {
        let cursor = self.ctx.cursor();

        if let (Some(last), Some(begin)) = (self.regions.iter().last(), cursor.begin) {
            if last.begin() == begin {
                let info = self.ctx.info();

                dump::log_with(|w| {
                    dump::print_region(w, info.func, last)?;
                    dump::print_liveness_info(w, &info, last)?;
                    writeln!(w, "  {}", last.max_pressure().display(info.target))
                });
            }
        }
    }

    /// Leaves the current region.
    pub fn exit_region(&mut self) {
        self.ctx.exit_region();
    }

    /// Runs the configured strategy over every recorded region.
    pub fn finalize_schedule(&mut self) {
        if self.regions.is_empty() {
            return;
        }

        log::debug!(
            "scheduling {} regions with {}",
            self.regions.len(),
            self.config.strategy
        );

        match self.config.strategy {
            StrategyKind::MinReg => self.schedule_min_reg(false),
            StrategyKind::MinRegForced => self.schedule_min_reg(true),
            StrategyKind::LegacyMaxOccupancy => {
                self.schedule_legacy_max_occupancy(self.config.try_maximize_occupancy)
            }
            StrategyKind::Ilp => self.schedule_ilp(self.config.ilp_maximize_occupancy),
        }
    }

    /// The recorded regions
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    /// The occupancy of the worst region, or the hardware maximum when there
    /// are no regions.
    pub fn function_occupancy(&self) -> u32 {
        let target = self.ctx.target();

        self.regions
            .min_occupancy(target)
            .unwrap_or(target.constraints().max_waves)
    }

    fn sort_regions(&mut self, target_occ: u32) -> u32 {
        let target = self.ctx.target();

        self.regions.sort_by_pressure(target_occ, target);

        dump::log_with(|w| dump::print_regions(w, &self.regions, target));

        self.regions[0].occupancy(target)
    }

    /// Tries to get every region to `target_occ` with minimum-register
    /// schedules, stashing each one that helps as the region's fallback.
    /// Returns the occupancy that's achievable with the stashed schedules.
    fn try_maximize_occupancy(&mut self, target_occ: u32) -> u32 {
        let target = self.ctx.target();
        let occ = self.regions[0].occupancy(target);
        let mut new_occ = target_occ;

        log::debug!("trying to improve occupancy from {occ} to {target_occ}");

        for i in 0..self.regions.len() {
            let region = &mut self.regions[i];

            if region.occupancy(target) >= new_occ {
                break;
            }

            // not filtered against the current order, the occupancy checks decide
            let scope = DagScope::new(&mut self.ctx, region);
            let info = scope.context().info();
            let order = make_min_reg_schedule(scope.top_roots(), scope.dag(), &info, region);
            let pressure = scope.predict_pressure(region, &order);
            let candidate = CandidateSchedule::new(order, pressure);

            new_occ = new_occ.min(candidate.pressure().occupancy(target));

            if new_occ <= occ {
                break;
            }

            scope.stash_best(region, &candidate);
        }

        log::debug!("occupancy achievable with minimum-register schedules: {new_occ}");

        new_occ.max(occ)
    }

    fn schedule_legacy_max_occupancy(&mut self, try_maximize: bool) {
        let target = self.ctx.target();
        let hw_target = target.target_occupancy();
        let mut occ = self.sort_regions(hw_target);

        if try_maximize && occ < hw_target {
            occ = self.try_maximize_occupancy(hw_target);
        }

        let policy = self.config.list_passes;
        let passes = policy.passes(occ, hw_target);
        let target_occ = occ.min(hw_target);

        log::debug!("list scheduling with {passes} passes towards occupancy {target_occ}");

        for pass in 0..passes {
            let strategy = MaxOccupancyStrategy::new(policy.list_target(pass, target_occ));

            for i in 0..self.regions.len() {
                self.schedule_legacy_region(i, ListStrategy::MaxOccupancy(strategy), target_occ);
            }
        }
    }

    /// Runs `strategy` on region `index`, and falls back to the stashed best
    /// schedule or the original order if the result misses `target_occ`.
    pub(in crate::sched) fn schedule_legacy_region(
        &mut self,
        index: usize,
        strategy: ListStrategy,
        target_occ: u32,
    ) -> RegionOutcome {
        let target = self.ctx.target();
        let region = &mut self.regions[index];
        let before = region.max_pressure().clone();
        let mut ovr = StrategyOverride::new(&mut self.ctx, region, strategy);

        ovr.schedule(region);

        dump::log_with(|w| dump::print_sched_rp(w, &before, region.max_pressure(), target));

        if region.occupancy(target) >= target_occ {
            return RegionOutcome::Kept;
        }

        let best_fits = region
            .best_schedule()
            .map_or(false, |best| best.pressure.occupancy(target) >= target_occ);

        if best_fits {
            log::debug!("missed occupancy {target_occ}, using the minimum-register schedule");

            ovr.commit_best(region);

            RegionOutcome::UsedBest
        } else {
            log::debug!("missed occupancy {target_occ}, restoring the original order");

            ovr.restore_order(region);

            if region.occupancy(target) < target_occ {
                log::debug!(
                    "original order is still below occupancy {target_occ}: {}",
                    region.max_pressure().display(target)
                );
            }

            RegionOutcome::Restored
        }
    }

    fn schedule_min_reg(&mut self, force: bool) {
        let target = self.ctx.target();
        let target_occ = target.target_occupancy();

        self.sort_regions(target_occ);

        let mut max_pressure: RegPressure = self.regions[0].max_pressure().clone();

        for i in 0..self.regions.len() {
            let region = &mut self.regions[i];

            if !force && region.max_pressure().less(&max_pressure, target_occ, target) {
                break;
            }

            let mut scope = DagScope::new(&mut self.ctx, region);

            let Some(candidate) = MinRegStrategy::new(target_occ).candidate(&scope, region) else {
                if force {
                    continue;
                }

                break;
            };

            if !force && max_pressure.less(candidate.pressure(), target_occ, target) {
                break;
            }

            scope.commit(region, &candidate);

            let info = scope.context().info();

            dump::log_with(|w| dump::print_sched_result(w, &info, region, candidate.pressure()));

            max_pressure = candidate.pressure().clone();
        }
    }

    fn schedule_ilp(&mut self, try_maximize: bool) {
        let target = self.ctx.target();
        let hw_target = target.ilp_target_occupancy();
        let mut occ = self.sort_regions(hw_target);

        if try_maximize && occ < hw_target {
            occ = self.try_maximize_occupancy(hw_target);
        }

        let target_occ = occ.min(hw_target);

        log::debug!("ilp scheduling towards occupancy {target_occ}");

        for i in 0..self.regions.len() {
            self.schedule_ilp_region(i, target_occ);
        }
    }

    /// Commits the ILP schedule of region `index` if it reaches `target_occ`,
    /// otherwise the stashed schedule if that does. If neither does, the
    /// region is left as it is.
    pub(in crate::sched) fn schedule_ilp_region(
        &mut self,
        index: usize,
        target_occ: u32,
    ) -> RegionOutcome {
        let target = self.ctx.target();
        let region = &mut self.regions[index];
        let mut scope = DagScope::new(&mut self.ctx, region);
        let candidate = IlpStrategy.candidate(&scope, region);

        if candidate.pressure().occupancy(target) >= target_occ {
            scope.commit(region, &candidate);

            return RegionOutcome::Kept;
        }

        let best_fits = region
            .best_schedule()
            .map_or(false, |best| best.pressure.occupancy(target) >= target_occ);

        if best_fits {
            log::debug!("ilp schedule misses occupancy {target_occ}, using the stashed one");

            scope.commit_best(region);

            RegionOutcome::UsedBest
        } else {
            log::debug!("ilp schedule misses occupancy {target_occ}, leaving region alone");

            RegionOutcome::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{testing, ListPassPolicy};

    fn config(strategy: StrategyKind) -> SchedulerConfig {
        SchedulerConfig {
            strategy,
            verify: true,
            ..SchedulerConfig::default()
        }
    }

    fn whole_block(sched: &mut IterativeScheduler<'_>, insts: &[Inst]) {
        let block = sched.ctx.func().layout().inst_block(insts[0]);

        sched.enter_region(block, insts[0], None, insts.len());
        sched.schedule();
        sched.exit_region();
    }

    type Kernel = fn(&TargetInfo) -> (MachineFunction, Vec<Inst>);

    fn run(target: &TargetInfo, strategy: StrategyKind, kernel: Kernel) -> (Vec<Inst>, Vec<Inst>, u32) {
        let (mut func, insts) = kernel(target);
        let mut lis = LiveIntervals::compute(&func);
        let block = func.layout().inst_block(insts[0]);
        let occ = {
            let mut sched = IterativeScheduler::new(&mut func, &mut lis, target, config(strategy));

            whole_block(&mut sched, &insts);
            sched.finalize_schedule();
            sched.function_occupancy()
        };

        (insts, func.block_order(block), occ)
    }

    const ALL: [StrategyKind; 4] = [
        StrategyKind::MinReg,
        StrategyKind::MinRegForced,
        StrategyKind::LegacyMaxOccupancy,
        StrategyKind::Ilp,
    ];

    #[test]
    fn chain_has_one_schedule() {
        let target = testing::target();

        for strategy in ALL {
            let (insts, order, _) = run(&target, strategy, testing::chain);

            assert_eq!(order, insts, "{strategy} reordered a chain");
        }
    }

    #[test]
    fn ilp_interleaves_min_reg_serializes() {
        let target = testing::target();
        let (i, ilp, _) = run(&target, StrategyKind::Ilp, testing::two_chains);
        let (_, min_reg, _) = run(&target, StrategyKind::MinRegForced, testing::two_chains);

        assert_eq!(ilp, vec![i[0], i[3], i[1], i[4], i[2], i[5], i[6]]);
        assert_eq!(min_reg, i);
    }

    #[test]
    fn min_reg_improves_the_tree() {
        let target = testing::target();

        for strategy in [StrategyKind::MinReg, StrategyKind::MinRegForced] {
            let (_, _, occ) = run(&target, strategy, |t| testing::tree(t, 8));

            assert_eq!(occ, 4);
        }
    }

    #[test]
    fn strategies_are_deterministic() {
        let target = testing::target();

        for strategy in ALL {
            let first = run(&target, strategy, |t| testing::tree(t, 8));
            let second = run(&target, strategy, |t| testing::tree(t, 8));

            assert_eq!(first.1, second.1);
        }
    }

    #[test]
    fn legacy_reaches_limited_target() {
        let target = testing::lds_limited_target();
        let (_, _, occ) = run(&target, StrategyKind::LegacyMaxOccupancy, |t| testing::tree(t, 8));

        assert!(occ >= 3);
    }

    #[test]
    fn legacy_never_lowers_occupancy() {
        let target = testing::target();

        for policy in [ListPassPolicy::UnconstrainedThenConstrained, ListPassPolicy::ConstrainedOnly] {
            let (mut func, insts) = testing::tree(&target, 8);
            let mut lis = LiveIntervals::compute(&func);
            let config = SchedulerConfig {
                list_passes: policy,
                ..config(StrategyKind::LegacyMaxOccupancy)
            };
            let mut sched = IterativeScheduler::new(&mut func, &mut lis, &target, config);

            whole_block(&mut sched, &insts);

            let before = sched.function_occupancy();

            sched.finalize_schedule();

            assert!(sched.function_occupancy() >= before);
        }
    }

    #[test]
    fn unreachable_target_restores_original_order() {
        let target = testing::target();
        let (mut func, insts) = testing::tree(&target, 8);
        let mut lis = LiveIntervals::compute(&func);
        let block = func.layout().inst_block(insts[0]);

        {
            let mut sched = IterativeScheduler::new(
                &mut func,
                &mut lis,
                &target,
                config(StrategyKind::LegacyMaxOccupancy),
            );

            whole_block(&mut sched, &insts);

            let baseline = sched.regions()[0].max_pressure().clone();
            let strategy = ListStrategy::MaxOccupancy(MaxOccupancyStrategy::new(8));
            let outcome = sched.schedule_legacy_region(0, strategy, 8);

            assert_eq!(outcome, RegionOutcome::Restored);
            assert_eq!(sched.regions()[0].max_pressure(), &baseline);
            assert_eq!(sched.ctx.strategy(), &ListStrategy::Stub);
        }

        assert_eq!(func.block_order(block), insts);
    }

    #[test]
    fn missed_target_uses_stashed_schedule() {
        let target = testing::target();
        let (mut func, insts) = testing::tree(&target, 8);
        let mut lis = LiveIntervals::compute(&func);
        let mut sched = IterativeScheduler::new(
            &mut func,
            &mut lis,
            &target,
            config(StrategyKind::LegacyMaxOccupancy),
        );

        whole_block(&mut sched, &insts);

        assert_eq!(sched.try_maximize_occupancy(4), 4);
        assert!(sched.regions()[0].best_schedule().is_some());

        // the stub keeps the original order, which only reaches 2 waves
        let outcome = sched.schedule_legacy_region(0, ListStrategy::Stub, 4);

        assert_eq!(outcome, RegionOutcome::UsedBest);
        assert_eq!(sched.regions()[0].occupancy(&target), 4);
        assert!(sched.regions()[0].best_schedule().is_none());
    }

    #[test]
    fn occupancy_pass_keeps_what_it_reached() {
        let target = testing::target();
        let (mut func, tree, fan_in) = testing::two_blocks(
            &target,
            |b, class| testing::emit_tree(b, class, 8),
            |b, class| testing::emit_fan_in(b, class, 7),
        );
        let mut lis = LiveIntervals::compute(&func);
        let mut sched = IterativeScheduler::new(
            &mut func,
            &mut lis,
            &target,
            config(StrategyKind::LegacyMaxOccupancy),
        );

        whole_block(&mut sched, &tree);
        whole_block(&mut sched, &fan_in);

        assert_eq!(sched.sort_regions(4), 2);

        // the tree gets to 4 waves, the fan-in keeps 7 values live in any
        // order and stays at 3
        assert_eq!(sched.try_maximize_occupancy(4), 3);
        assert!(sched.regions().iter().all(|r| r.best_schedule().is_some()));
    }

    #[test]
    fn only_forced_min_reg_visits_every_region() {
        let target = testing::target();

        for strategy in [StrategyKind::MinReg, StrategyKind::MinRegForced] {
            let (mut func, tree, chains) = testing::two_blocks(
                &target,
                |b, class| testing::emit_tree(b, class, 8),
                testing::emit_interleaved_chains,
            );
            let mut lis = LiveIntervals::compute(&func);
            let block = func.layout().inst_block(chains[0]);
            let occ = {
                let mut sched =
                    IterativeScheduler::new(&mut func, &mut lis, &target, config(strategy));

                whole_block(&mut sched, &tree);
                whole_block(&mut sched, &chains);
                sched.finalize_schedule();
                sched.function_occupancy()
            };

            assert_eq!(occ, 4, "{strategy}");

            // the chains already beat the committed tree, so only a forced
            // run gets to them
            let expected = match strategy {
                StrategyKind::MinRegForced => {
                    [0usize, 2, 4, 1, 3, 5, 6].map(|i| chains[i]).to_vec()
                }
                _ => chains.clone(),
            };

            assert_eq!(func.block_order(block), expected, "{strategy}");
        }
    }

    #[test]
    fn ilp_miss_uses_stashed_schedule() {
        let target = testing::wave_limited_target();
        let (mut func, insts) = testing::tree(&target, 8);
        let mut lis = LiveIntervals::compute(&func);
        let config = SchedulerConfig {
            ilp_maximize_occupancy: true,
            ..config(StrategyKind::Ilp)
        };
        let mut sched = IterativeScheduler::new(&mut func, &mut lis, &target, config);

        whole_block(&mut sched, &insts);

        assert_eq!(sched.sort_regions(target.ilp_target_occupancy()), 2);
        assert_eq!(sched.try_maximize_occupancy(4), 4);

        // the ilp order issues every load first, which only reaches 2 waves
        assert_eq!(sched.schedule_ilp_region(0, 4), RegionOutcome::UsedBest);
        assert_eq!(sched.regions()[0].occupancy(&target), 4);
        assert!(sched.regions()[0].best_schedule().is_none());
    }

    #[test]
    fn ilp_with_occupancy_pass_reaches_wave_limit() {
        let target = testing::wave_limited_target();
        let (mut func, insts) = testing::tree(&target, 8);
        let mut lis = LiveIntervals::compute(&func);
        let config = SchedulerConfig {
            ilp_maximize_occupancy: true,
            ..config(StrategyKind::Ilp)
        };
        let mut sched = IterativeScheduler::new(&mut func, &mut lis, &target, config);

        whole_block(&mut sched, &insts);
        sched.finalize_schedule();

        assert_eq!(sched.function_occupancy(), 4);
    }

    #[test]
    fn ilp_miss_without_stash_leaves_region_alone() {
        let target = testing::target();
        let (mut func, insts) = testing::tree(&target, 8);
        let mut lis = LiveIntervals::compute(&func);
        let block = func.layout().inst_block(insts[0]);

        {
            let mut sched =
                IterativeScheduler::new(&mut func, &mut lis, &target, config(StrategyKind::Ilp));

            whole_block(&mut sched, &insts);

            let baseline = sched.regions()[0].max_pressure().clone();

            assert_eq!(sched.schedule_ilp_region(0, 4), RegionOutcome::Unchanged);
            assert_eq!(sched.regions()[0].max_pressure(), &baseline);
            assert!(sched.regions()[0].best_schedule().is_none());
        }

        assert_eq!(func.block_order(block), insts);
    }
}
