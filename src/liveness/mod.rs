//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Lane-aware liveness.
//!
//! Liveness is tracked per virtual register *lane*, so a tuple register with
//! only some of its lanes defined (or still needed) only counts those lanes.

mod intervals;
mod live_set;

pub use intervals::{LiveIntervals, SlotIndex};
pub use live_set::LiveRegSet;

use crate::mir::{Inst, MachineFunction};

/// Steps `live` backwards over `inst`: the set of lanes live after the
/// instruction becomes the set live before it.
///
/// Defs kill the lanes they write, then uses make the lanes they read live.
/// A partial def leaves the register's other lanes alone. Debug values don't
/// affect liveness at all.
pub fn step_backward(func: &MachineFunction, inst: Inst, live: &mut LiveRegSet) {
    let data = func.inst(inst);

    if data.is_debug_value() {
        return;
    }

    for op in data.defs() {
        live.remove_lanes(op.reg(), op.lanes());
    }

    for op in data.uses() {
        live.insert_lanes(op.reg(), op.lanes());
    }
}
