//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Register pressure: per-bank snapshots, the occupancy comparator and the
//! upward pressure tracker.

mod snapshot;
mod tracker;

pub use snapshot::{PressureDisplay, RegPressure};
pub use tracker::UpwardTracker;

use crate::liveness::LiveIntervals;
use crate::mir::MachineFunction;
use crate::target::TargetInfo;

/// Everything needed to turn live lanes into pressure, bundled up so it can
/// be handed around while the scheduler holds the mutable pieces separately.
#[derive(Copy, Clone, Debug)]
pub struct RegInfo<'a> {
    /// The function being scheduled
    pub func: &'a MachineFunction,
    /// Liveness for `func`
    pub lis: &'a LiveIntervals,
    /// The target being scheduled for
    pub target: &'a TargetInfo,
}
