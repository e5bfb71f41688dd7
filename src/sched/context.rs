//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::liveness::{LiveIntervals, LiveRegSet};
use crate::mir::{Block, Inst, MachineFunction};
use crate::pressure::{RegInfo, RegPressure, UpwardTracker};
use crate::sched::{ListStrategy, Region, RegionCursor};
use crate::target::TargetInfo;

/// The state shared by every step of the pass: the function and its
/// liveness, the region cursor, the pressure tracker reused across region
/// queries, and the active list-scheduling strategy slot.
///
/// Only [`SchedContext::commit`] mutates the function's layout and the
/// liveness information.
#[derive(Debug)]
pub struct SchedContext<'f> {
    pub(in crate::sched) func: &'f mut MachineFunction,
    pub(in crate::sched) lis: &'f mut LiveIntervals,
    pub(in crate::sched) target: &'f TargetInfo,
    pub(in crate::sched) cursor: RegionCursor,
    pub(in crate::sched) tracker: UpwardTracker,
    pub(in crate::sched) strategy: ListStrategy,
    pub(in crate::sched) verify: bool,
}

impl<'f> SchedContext<'f> {
    /// Creates a context for scheduling `func`.
    pub fn new(
        func: &'f mut MachineFunction,
        lis: &'f mut LiveIntervals,
        target: &'f TargetInfo,
        verify: bool,
    ) -> Self {
        Self {
            func,
            lis,
            target,
            cursor: RegionCursor::default(),
            tracker: UpwardTracker::new(),
            strategy: ListStrategy::default(),
            verify,
        }
    }

    /// Read-only views of the function, liveness and target.
    pub fn info(&self) -> RegInfo<'_> {
        RegInfo {
            func: self.func,
            lis: self.lis,
            target: self.target,
        }
    }

    /// The function being scheduled
    pub fn func(&self) -> &MachineFunction {
        self.func
    }

    /// The target being scheduled for
    pub fn target(&self) -> &'f TargetInfo {
        self.target
    }

    /// Where the pass currently is
    pub fn cursor(&self) -> RegionCursor {
        self.cursor
    }

    /// The list strategy currently in the strategy slot
    pub fn strategy(&self) -> &ListStrategy {
        &self.strategy
    }

    /// Positions the cursor on a region.
    pub fn enter_region(&mut self, block: Block, begin: Inst, end: Option<Inst>, num_instrs: usize) {
        self.cursor = RegionCursor {
            block: Some(block),
            begin: Some(begin),
            end,
            num_instrs,
        };
    }

    /// Clears the region part of the cursor, staying in the same block.
    pub fn exit_region(&mut self) {
        self.cursor = RegionCursor {
            block: self.cursor.block,
            ..RegionCursor::default()
        };
    }

    /// Measures the pressure of the current order of `[begin, end)`.
    ///
    /// Reuses the shared tracker without resetting it when the tracker last
    /// stopped right below the range, which is the case when walking
    /// consecutive regions of a block bottom-up.
    pub fn region_pressure(&mut self, block: Block, begin: Inst, end: Option<Inst>) -> RegPressure {
        let layout = self.func.layout();
        let bottom = match end {
            Some(end) => end,
            None => layout
                .block_last_inst(block)
                .expect("a region's block cannot be empty"),
        };

        let info = RegInfo {
            func: self.func,
            lis: self.lis,
            target: self.target,
        };

        let tracker = &mut self.tracker;
        let below = layout.inst_next(bottom);

        if tracker.is_initialized() && below.is_some() && tracker.last_tracked() == below {
            debug_assert!(!self.verify || tracker.is_valid(&info));
        } else {
            tracker.reset(&info, bottom);
        }

        let mut current = bottom;

        loop {
            tracker.recede(&info, current);

            if current == begin {
                break;
            }

            current = layout
                .inst_prev(current)
                .expect("region begin must be above its bottom instruction");
        }

        tracker.take_max_pressure()
    }
}

/// Computes the pressure `schedule` would have as the order of `region`,
/// without changing anything.
///
/// Uses its own tracker so it can be called on orders that haven't been
/// materialized. Debug values in `schedule` are ignored.
pub fn schedule_pressure<I>(info: &RegInfo<'_>, region: &Region, schedule: I) -> RegPressure
where
    I: IntoIterator<Item = Inst>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut tracker = UpwardTracker::new();

    match region.end() {
        Some(end) => {
            tracker.reset(info, end);
            tracker.recede(info, end);
        }
        None => tracker.reset_to_live_out(info, region.block()),
    }

    for inst in schedule.into_iter().rev() {
        tracker.recede(info, inst);
    }

    tracker.take_max_pressure()
}

/// The registers live right after `region`: live-in of its end boundary, or
/// live-out of the block if it runs to the end.
pub fn region_live_out(info: &RegInfo<'_>, region: &Region) -> LiveRegSet {
    match region.end() {
        Some(end) => info.lis.live_regs_before(info.func, end),
        None => info.lis.live_out(region.block()).clone(),
    }
}
