//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![allow(dead_code)]
#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # itersched
//!
//! An iterative, register-pressure aware instruction scheduler for machine
//! code on targets where register usage limits occupancy (the number of
//! waves that can be resident at once).
//!
//! Unlike a one-region-at-a-time list scheduler, every region of a function
//! is collected first, ranked by pressure, and then rescheduled with one of
//! several strategies (see [`sched::StrategyKind`]).
//!
//! ```
//! # use itersched::liveness::LiveIntervals;
//! # use itersched::mir::{FunctionBuilder, InstFlags};
//! # use itersched::sched::{schedule_function, SchedulerConfig};
//! # use itersched::target::TargetInfo;
//! let target = TargetInfo::gcn();
//! let v32 = target.class_by_name("vgpr_32").unwrap();
//! let mut b = FunctionBuilder::new("kernel", &target);
//! let entry = b.create_block("entry");
//! b.switch_to(entry);
//!
//! let (x, y, z) = (b.vreg(v32), b.vreg(v32), b.vreg(v32));
//! b.inst("load").def(x).flags(InstFlags::MAY_LOAD).finish();
//! b.inst("load").def(y).flags(InstFlags::MAY_LOAD).finish();
//! b.inst("v_add").def(z).use_reg(x).use_reg(y).finish();
//! b.inst("store").use_reg(z).flags(InstFlags::MAY_STORE).finish();
//!
//! let mut func = b.build();
//! let mut lis = LiveIntervals::compute(&func);
//! let report = schedule_function(&mut func, &mut lis, &target, SchedulerConfig::default());
//!
//! assert_eq!(report.regions, 1);
//! assert_eq!(report.occupancy_after, 10);
//! ```

pub mod arena;
pub mod liveness;
pub mod mir;
pub mod pressure;
pub mod sched;
pub mod target;
pub mod utility;

pub use sched::schedule_function;
