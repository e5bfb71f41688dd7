//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The machine-level IR the scheduler operates on.
//!
//! Functions are made of blocks, blocks are made of instructions, and
//! instructions read and write virtual registers. Every virtual register has a
//! register class, and operands can touch only a subset of a register's
//! 32-bit lanes (sub-register accesses of tuple registers).
//!
//! The instruction *order* lives in a [`Layout`] separate from the
//! instruction data, so moving an instruction never changes its key.

mod builder;
mod function;
mod inst;
mod lanes;
mod layout;
mod writer;

pub use builder::{FunctionBuilder, InstBuilder};
pub use function::{BlockData, MachineFunction, VRegData};
pub use inst::{InstData, InstFlags, Operand, OperandKind};
pub use lanes::LaneMask;
pub use layout::{BlockIter, InstIter, Layout};
pub use writer::{InstDisplay, RegionDisplay};

use crate::dense_arena_key;

dense_arena_key! {
    /// A reference to a single machine instruction.
    pub struct Inst;

    /// A reference to a basic block.
    pub struct Block;

    /// A reference to a virtual register.
    pub struct VReg;
}
