//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use crate::mir::{Inst, MachineFunction, Operand};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Formats an instruction in a readable assembly-like syntax, e.g.
/// `undef %3.0x1, dead %4 = v_mad %0, %1, %2`.
#[derive(Copy, Clone, Debug)]
pub struct InstDisplay<'f> {
    func: &'f MachineFunction,
    inst: Inst,
}

impl<'f> InstDisplay<'f> {
    pub(in crate::mir) fn new(func: &'f MachineFunction, inst: Inst) -> Self {
        Self { func, inst }
    }

    fn write_operand(&self, f: &mut Formatter<'_>, op: &Operand) -> fmt::Result {
        if op.is_undef() {
            write!(f, "undef ")?;
        }

        if op.is_dead() {
            write!(f, "dead ")?;
        }

        write!(f, "%{}", op.reg().key_index())?;

        // only print lanes for sub-register accesses
        if op.lanes() != self.func.vreg(op.reg()).lanes {
            write!(f, ".{}", op.lanes())?;
        }

        Ok(())
    }
}

impl Display for InstDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let data = self.func.inst(self.inst);
        let mut defs = data.defs().peekable();

        if defs.peek().is_some() {
            for (i, op) in defs.enumerate() {
                if i != 0 {
                    write!(f, ", ")?;
                }

                self.write_operand(f, op)?;
            }

            write!(f, " = ")?;
        }

        write!(f, "{}", data.opcode())?;

        for (i, op) in data.uses().enumerate() {
            write!(f, "{}", if i == 0 { " " } else { ", " })?;
            self.write_operand(f, op)?;
        }

        Ok(())
    }
}

/// Formats every instruction in `[begin, end)`, one per line.
#[derive(Copy, Clone, Debug)]
pub struct RegionDisplay<'f> {
    func: &'f MachineFunction,
    begin: Inst,
    end: Option<Inst>,
}

impl<'f> RegionDisplay<'f> {
    /// Creates a display for the half-open range `[begin, end)`.
    pub fn new(func: &'f MachineFunction, begin: Inst, end: Option<Inst>) -> Self {
        Self { func, begin, end }
    }
}

impl Display for RegionDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for inst in self.func.layout().insts_between(self.begin, self.end) {
            writeln!(f, "  {}", self.func.display_inst(inst))?;
        }

        Ok(())
    }
}
