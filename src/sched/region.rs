//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::mir::{Block, Inst};
use crate::pressure::RegPressure;
use crate::target::TargetInfo;
use std::ops::{Index, IndexMut};
use std::slice;

/// A schedule that has been computed but not committed, along with the
/// pressure it's predicted to have.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TentativeSchedule {
    /// The full instruction order, debug values included
    pub schedule: Vec<Inst>,
    /// The pressure the schedule will have once committed
    pub pressure: RegPressure,
}

/// A scheduling region: the half-open instruction range `[begin, end)` of a
/// single block. `end` is the boundary instruction ending the region, or
/// `None` when the region runs to the end of the block.
#[derive(Clone, Debug)]
pub struct Region {
    block: Block,
    begin: Inst,
    end: Option<Inst>,
    num_instrs: usize,
    max_pressure: RegPressure,
    best_schedule: Option<TentativeSchedule>,
}

impl Region {
    pub(in crate::sched) fn new(
        block: Block,
        begin: Inst,
        end: Option<Inst>,
        num_instrs: usize,
        max_pressure: RegPressure,
    ) -> Self {
        Self {
            block,
            begin,
            end,
            num_instrs,
            max_pressure,
            best_schedule: None,
        }
    }

    /// The block the region is in
    #[inline]
    pub fn block(&self) -> Block {
        self.block
    }

    /// The current first instruction of the region. This changes when the
    /// region is rescheduled.
    #[inline]
    pub fn begin(&self) -> Inst {
        self.begin
    }

    /// The instruction right after the region, `None` for the end of the block
    #[inline]
    pub fn end(&self) -> Option<Inst> {
        self.end
    }

    /// The number of non-debug instructions in the region
    #[inline]
    pub fn num_instrs(&self) -> usize {
        self.num_instrs
    }

    /// The pressure of the region's current order.
    #[inline]
    pub fn max_pressure(&self) -> &RegPressure {
        &self.max_pressure
    }

    /// The occupancy the region's current order supports.
    pub fn occupancy(&self, target: &TargetInfo) -> u32 {
        self.max_pressure.occupancy(target)
    }

    /// The stashed improvement, if any.
    #[inline]
    pub fn best_schedule(&self) -> Option<&TentativeSchedule> {
        self.best_schedule.as_ref()
    }

    pub(in crate::sched) fn set_begin(&mut self, begin: Inst) {
        self.begin = begin;
    }

    pub(in crate::sched) fn set_max_pressure(&mut self, pressure: RegPressure) {
        self.max_pressure = pressure;
    }

    pub(in crate::sched) fn stash_best(&mut self, best: TentativeSchedule) {
        self.best_schedule = Some(best);
    }

    pub(in crate::sched) fn take_best(&mut self) -> Option<TentativeSchedule> {
        self.best_schedule.take()
    }
}

/// Where the pass currently is: the region being worked on, if any.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionCursor {
    /// The block being scheduled
    pub block: Option<Block>,
    /// First instruction of the current region
    pub begin: Option<Inst>,
    /// End of the current region, `None` meaning the end of the block
    pub end: Option<Inst>,
    /// Non-debug instructions in the current region
    pub num_instrs: usize,
}

impl RegionCursor {
    /// A cursor positioned on `region`.
    pub fn at(region: &Region) -> Self {
        Self {
            block: Some(region.block),
            begin: Some(region.begin),
            end: region.end,
            num_instrs: region.num_instrs,
        }
    }

    /// Whether the cursor is positioned on `region`.
    pub fn is_at(&self, region: &Region) -> bool {
        self.begin == Some(region.begin) && self.end == region.end
    }
}

/// Every region registered during a pass.
///
/// Regions are only ever appended. Their order changes only by sorting, and
/// their bounds only by committing a new schedule.
#[derive(Clone, Debug, Default)]
pub struct RegionRegistry {
    regions: Vec<Region>,
}

impl RegionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(in crate::sched) fn push(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// The number of regions
    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no regions were registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterates over the regions in their current order.
    pub fn iter(&self) -> slice::Iter<'_, Region> {
        self.regions.iter()
    }

    /// The lowest occupancy of any region, `None` if there are no regions.
    pub fn min_occupancy(&self, target: &TargetInfo) -> Option<u32> {
        self.regions.iter().map(|r| r.occupancy(target)).min()
    }

    /// Sorts the regions worst first according to
    /// [`RegPressure::less`], keeping the relative order of regions that
    /// compare equal.
    ///
    /// `less` isn't a total order, so this is a plain stable insertion sort
    /// rather than anything that may assume totality.
    pub fn sort_by_pressure(&mut self, target_occupancy: u32, target: &TargetInfo) {
        for i in 1..self.regions.len() {
            let mut j = i;

            // a region moves up while the one above it is better
            while j > 0
                && self.regions[j - 1].max_pressure.less(
                    &self.regions[j].max_pressure,
                    target_occupancy,
                    target,
                )
            {
                self.regions.swap(j - 1, j);
                j -= 1;
            }
        }
    }
}

impl Index<usize> for RegionRegistry {
    type Output = Region;

    fn index(&self, index: usize) -> &Self::Output {
        &self.regions[index]
    }
}

impl IndexMut<usize> for RegionRegistry {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.regions[index]
    }
}
