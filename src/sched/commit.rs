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
use crate::sched::{schedule_pressure, Region, SchedContext};

impl SchedContext<'_> {
    /// Rewrites the order of `region` to `schedule`, keeping the liveness
    /// information in sync, and re-measures the region's pressure.
    ///
    /// `schedule` must be a permutation of the region's current instructions,
    /// and the cursor must be positioned on the region. When verification is
    /// on, the pressure predicted for `schedule` before moving anything and
    /// `predicted` (if given) must both match what is measured afterwards.
    pub fn commit(&mut self, region: &mut Region, schedule: &[Inst], predicted: Option<&RegPressure>) {
        assert!(
            self.cursor.is_at(region),
            "cannot commit to a region the cursor isn't positioned on"
        );

        self.check_permutation(region, schedule);

        let before = self
            .verify
            .then(|| schedule_pressure(&self.info(), region, schedule.iter().copied()));

        let block = region.block();
        let mut top = Some(region.begin());

        for &inst in schedule {
            if top != Some(inst) {
                let layout = self.func.layout_mut();

                layout.remove_inst(inst);

                match top {
                    Some(top) => layout.insert_inst_before(inst, top),
                    None => layout.append_inst(inst, block),
                }

                self.lis.handle_move(self.func, inst);
            }

            top = self.func.layout().inst_next(inst);
        }

        // flags depend on everything below, so they're only fixed once the
        // whole order is in place
        for &inst in schedule {
            self.lis.adjust_def_flags(self.func, inst);
        }

        self.cursor.begin = Some(schedule[0]);
        region.set_begin(schedule[0]);

        let measured = self.region_pressure(block, region.begin(), region.end());

        if let Some(before) = before {
            let mismatch = before != measured || predicted.map_or(false, |p| *p != measured);

            if mismatch {
                log::error!("pressure mismatch in region of block {block:?}");
                log::error!("  scheduled: {}", before.display(self.target));
                log::error!("  measured:  {}", measured.display(self.target));

                if let Some(predicted) = predicted {
                    log::error!("  predicted: {}", predicted.display(self.target));
                }

                panic!("register pressure mismatch after scheduling");
            }
        }

        region.set_max_pressure(measured);
    }

    fn check_permutation(&self, region: &Region, schedule: &[Inst]) {
        let mut current: Vec<_> = self
            .func
            .layout()
            .insts_between(region.begin(), region.end())
            .collect();
        let mut proposed = schedule.to_vec();

        current.sort_unstable();
        proposed.sort_unstable();

        assert!(
            !proposed.is_empty() && current == proposed,
            "schedule must be a permutation of the region's instructions"
        );
    }
}
