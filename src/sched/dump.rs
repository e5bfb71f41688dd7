//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Human-readable dumps of regions and pressure, for debug logging.
//!
//! None of these formats are stable. They're meant to be printed under
//! `log::Level::Debug`, see [`log_with`].

use crate::arena::ArenaKey;
use crate::liveness::LiveRegSet;
use crate::mir::{MachineFunction, RegionDisplay};
use crate::pressure::{RegInfo, RegPressure};
use crate::sched::{region_live_out, Region, RegionRegistry};
use crate::target::TargetInfo;
use std::fmt;
use std::fmt::Write;

/// Prints the instructions of `region` in their current order.
pub fn print_region(w: &mut dyn Write, func: &MachineFunction, region: &Region) -> fmt::Result {
    writeln!(
        w,
        "region of bb{} with {} instructions:",
        region.block().key_index(),
        region.num_instrs()
    )?;

    write!(w, "{}", RegionDisplay::new(func, region.begin(), region.end()))?;

    match region.end() {
        Some(end) => writeln!(w, "  ; ends at {}", func.display_inst(end)),
        None => writeln!(w, "  ; ends at end of block"),
    }
}

fn print_live_set(
    w: &mut dyn Write,
    info: &RegInfo<'_>,
    label: &str,
    live: &LiveRegSet,
) -> fmt::Result {
    let pressure = RegPressure::from_live_set(info.func, info.target, live);

    write!(w, "{label} ({}):", pressure.display(info.target))?;

    for (reg, lanes) in live.sorted() {
        write!(w, " %{}", reg.key_index())?;

        if lanes != info.func.vreg(reg).lanes {
            write!(w, ".{lanes}")?;
        }
    }

    writeln!(w)
}

/// Prints the registers live into and out of `region`.
pub fn print_liveness_info(w: &mut dyn Write, info: &RegInfo<'_>, region: &Region) -> fmt::Result {
    let live_in = info.lis.live_regs_before(info.func, region.begin());
    let live_out = region_live_out(info, region);

    print_live_set(w, info, "live in", &live_in)?;
    print_live_set(w, info, "live out", &live_out)
}

/// Prints one line per region with its pressure, in registry order.
pub fn print_regions(w: &mut dyn Write, regions: &RegionRegistry, target: &TargetInfo) -> fmt::Result {
    for (i, region) in regions.iter().enumerate() {
        writeln!(
            w,
            "#{i}: bb{}, {} instructions, {}",
            region.block().key_index(),
            region.num_instrs(),
            region.max_pressure().display(target)
        )?;
    }

    Ok(())
}

/// Prints the pressure of a region before and after scheduling it.
pub fn print_sched_rp(
    w: &mut dyn Write,
    before: &RegPressure,
    after: &RegPressure,
    target: &TargetInfo,
) -> fmt::Result {
    writeln!(w, "  RP before: {}", before.display(target))?;
    writeln!(w, "  RP after:  {}", after.display(target))
}

/// Prints a freshly scheduled region along with the pressure predicted for
/// its schedule.
pub fn print_sched_result(
    w: &mut dyn Write,
    info: &RegInfo<'_>,
    region: &Region,
    predicted: &RegPressure,
) -> fmt::Result {
    print_region(w, info.func, region)?;
    print_liveness_info(w, info, region)?;
    writeln!(w, "  predicted: {}", predicted.display(info.target))?;
    writeln!(w, "  measured:  {}", region.max_pressure().display(info.target))
}

/// Renders a dump through `f` and logs it at debug level, without doing any
/// work when debug logging is off.
pub fn log_with<F>(f: F)
where
    F: FnOnce(&mut dyn Write) -> fmt::Result,
{
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let mut out = String::new();

    if f(&mut out).is_ok() {
        log::debug!("{}", out.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::LiveIntervals;
    use crate::sched::testing;

    #[test]
    fn region_dump_lists_instructions() {
        let target = testing::target();
        let (func, insts) = testing::chain(&target);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };
        let region = testing::whole_block_region(&info, &insts);
        let mut out = String::new();

        print_region(&mut out, &func, &region).unwrap();

        assert!(out.starts_with("region of bb0 with 5 instructions:\n"));
        assert!(out.contains("  %0 = v_mov\n"));
        assert!(out.contains("  %1 = v_add %0\n"));
        assert!(out.ends_with("; ends at end of block\n"));
    }

    #[test]
    fn liveness_dump_shows_pressure() {
        let target = testing::target();
        let (func, insts) = testing::chain(&target);
        let lis = LiveIntervals::compute(&func);
        let info = RegInfo {
            func: &func,
            lis: &lis,
            target: &target,
        };
        let region = testing::whole_block_region(&info, &insts);
        let mut out = String::new();

        print_liveness_info(&mut out, &info, &region).unwrap();

        assert_eq!(
            out,
            "live in (vgpr: 0 (tuples 0), occupancy 8):\nlive out (vgpr: 0 (tuples 0), occupancy 8):\n"
        );
    }

    #[test]
    fn sched_rp_has_both_lines() {
        let target = testing::target();
        let mut out = String::new();

        print_sched_rp(&mut out, &RegPressure::new(), &RegPressure::new(), &target).unwrap();

        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("RP after:  vgpr: 0 (tuples 0), occupancy 8"));
    }
}
