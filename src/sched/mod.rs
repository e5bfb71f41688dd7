//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The iterative scheduler.
//!
//! Regions of a function are collected first (see [`IterativeScheduler`]),
//! and only once every region is known does the configured [`StrategyKind`]
//! run over all of them. That lets the strategies rank regions by pressure
//! and spend effort on the ones that limit occupancy.
//!
//! Every strategy produces an order for a region's [`ScheduleDag`], and every
//! order ends up in the function through [`SchedContext::commit`].

mod commit;
mod config;
mod context;
mod dag;
mod driver;
pub mod dump;
mod ilp;
mod iterative;
mod list;
mod min_reg;
mod region;
mod scope;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ListPassPolicy, SchedulerConfig, StrategyKind};
pub use context::{region_live_out, schedule_pressure, SchedContext};
pub use dag::{Dep, DepKind, ScheduleDag, SUnit};
pub use driver::{schedule_function, ScheduleReport};
pub use ilp::{make_ilp_schedule, IlpStrategy};
pub use iterative::IterativeScheduler;
pub use list::{ListStrategy, MaxOccupancyStrategy};
pub use min_reg::{make_min_reg_schedule, MinRegStrategy};
pub use region::{Region, RegionCursor, RegionRegistry, TentativeSchedule};
pub use scope::{CandidateSchedule, DagScope, StrategyOverride};
