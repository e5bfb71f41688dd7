//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaMap, Keys, SecondaryMap};
use crate::dense_arena_key;
use crate::mir::{Inst, LaneMask, MachineFunction, VReg};
use crate::utility::SaHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;

dense_arena_key! {
    /// A node in a [`ScheduleDag`], one per non-debug instruction of the region.
    pub struct SUnit;
}

/// Why one node has to come before another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DepKind {
    /// The successor reads lanes the predecessor writes.
    Data,
    /// The successor writes lanes the predecessor reads.
    Anti,
    /// Both write the same lanes.
    Output,
    /// Memory or side-effect ordering.
    Order,
}

/// An edge of the dependency graph, stored on both of its endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dep {
    /// The node on the other end of the edge
    pub node: SUnit,
    /// The kind of the dependency, if several apply the first one found
    pub kind: DepKind,
    /// Minimum number of cycles between the predecessor and the successor
    pub latency: u32,
}

#[derive(Clone, Debug)]
struct SUnitData {
    inst: Inst,
    preds: SmallVec<[Dep; 4]>,
    succs: SmallVec<[Dep; 4]>,
    depth: u32,
    height: u32,
    topo_index: u32,
}

/// The dependency graph of a single scheduling region.
///
/// Debug values aren't nodes: they don't constrain anything, and are instead
/// remembered next to the instruction that preceded them so that
/// [`Self::detach_schedule`] can put them back after reordering.
#[derive(Clone, Debug)]
pub struct ScheduleDag {
    units: ArenaMap<SUnit, SUnitData>,
    inst_units: SecondaryMap<Inst, SUnit>,
    topo: Vec<SUnit>,
    // (debug value, instruction it followed)
    dbg_values: Vec<(Inst, Inst)>,
    first_dbg_value: Option<Inst>,
}

impl ScheduleDag {
    /// Builds the graph for the instructions in `[begin, end)`.
    pub fn build(func: &MachineFunction, begin: Inst, end: Option<Inst>) -> Self {
        let mut dag = Self {
            units: ArenaMap::new(),
            inst_units: SecondaryMap::new(),
            topo: Vec::new(),
            dbg_values: Vec::new(),
            first_dbg_value: None,
        };

        let mut prev = None;

        for inst in func.layout().insts_between(begin, end) {
            if func.is_debug_value(inst) {
                match prev {
                    Some(prev) => dag.dbg_values.push((inst, prev)),
                    None => dag.first_dbg_value = Some(inst),
                }
            } else {
                let su = dag.units.insert(SUnitData {
                    inst,
                    preds: SmallVec::new(),
                    succs: SmallVec::new(),
                    depth: 0,
                    height: 0,
                    topo_index: 0,
                });

                dag.inst_units.insert(inst, su);
            }

            prev = Some(inst);
        }

        dag.add_register_deps(func);
        dag.add_memory_deps(func);
        dag.compute_topological_order();
        dag.compute_depth_and_height();

        dag
    }

    /// The number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the region had no real instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Every node, in original program order.
    pub fn units(&self) -> Keys<SUnit> {
        self.units.keys()
    }

    /// The instruction a node stands for.
    #[inline]
    pub fn inst(&self, su: SUnit) -> Inst {
        self.units[su].inst
    }

    /// The node standing for `inst`, if it's a non-debug instruction of the region.
    pub fn unit_of(&self, inst: Inst) -> Option<SUnit> {
        self.inst_units.get(inst).copied()
    }

    /// Incoming edges of `su`.
    #[inline]
    pub fn preds(&self, su: SUnit) -> &[Dep] {
        &self.units[su].preds
    }

    /// Outgoing edges of `su`.
    #[inline]
    pub fn succs(&self, su: SUnit) -> &[Dep] {
        &self.units[su].succs
    }

    /// Length of the longest latency-weighted path from any root to `su`.
    #[inline]
    pub fn depth(&self, su: SUnit) -> u32 {
        self.units[su].depth
    }

    /// Length of the longest latency-weighted path from `su` to any leaf.
    #[inline]
    pub fn height(&self, su: SUnit) -> u32 {
        self.units[su].height
    }

    /// Position of `su` in [`Self::topological_order`].
    #[inline]
    pub fn topo_index(&self, su: SUnit) -> u32 {
        self.units[su].topo_index
    }

    /// A topological order of the graph, ties broken by original order.
    pub fn topological_order(&self) -> &[SUnit] {
        &self.topo
    }

    /// Debug values paired with the instruction they originally followed.
    pub fn dbg_values(&self) -> &[(Inst, Inst)] {
        &self.dbg_values
    }

    /// A debug value at the very top of the region, if any.
    pub fn first_dbg_value(&self) -> Option<Inst> {
        self.first_dbg_value
    }

    /// Computes the root nodes from both directions: `(top, bottom)`, where
    /// top roots have no predecessors and bottom roots have no successors.
    /// Both are in topological order.
    pub fn find_roots(&self) -> (Vec<SUnit>, Vec<SUnit>) {
        let top = self
            .topo
            .iter()
            .copied()
            .filter(|&su| self.units[su].preds.is_empty())
            .collect();

        let bottom = self
            .topo
            .iter()
            .copied()
            .filter(|&su| self.units[su].succs.is_empty())
            .collect();

        (top, bottom)
    }

    /// Checks that `order` contains every node exactly once, and that every
    /// node comes after all of its predecessors.
    pub fn is_valid_order(&self, order: &[SUnit]) -> bool {
        if order.len() != self.units.len() {
            return false;
        }

        let mut position = SecondaryMap::with_primary(&self.units);

        for (i, &su) in order.iter().enumerate() {
            if position.insert(su, i).is_some() {
                return false;
            }
        }

        order.iter().enumerate().all(|(i, &su)| {
            self.units[su]
                .preds
                .iter()
                .all(|dep| position.get(dep.node).is_some_and(|&p| p < i))
        })
    }

    /// Turns an order of nodes into the instruction order to commit, with
    /// debug values placed back after the instruction they followed in the
    /// original order (a leading debug value stays at the top).
    pub fn detach_schedule(&self, order: &[SUnit]) -> Vec<Inst> {
        let mut schedule = Vec::with_capacity(order.len() + self.dbg_values.len() + 1);

        if let Some(first) = self.first_dbg_value {
            schedule.push(first);
            self.push_debug_chain(first, &mut schedule);
        }

        for &su in order {
            let inst = self.units[su].inst;

            schedule.push(inst);
            self.push_debug_chain(inst, &mut schedule);
        }

        schedule
    }

    // a run of debug values forms a chain, each paired with the one before it
    fn push_debug_chain(&self, mut after: Inst, out: &mut Vec<Inst>) {
        while let Some(&(dbg, _)) = self.dbg_values.iter().find(|(_, prev)| *prev == after) {
            out.push(dbg);
            after = dbg;
        }
    }

    fn add_register_deps(&mut self, func: &MachineFunction) {
        let mut defs: SaHashMap<VReg, SmallVec<[(LaneMask, SUnit); 2]>> = SaHashMap::default();
        let mut readers: SaHashMap<VReg, SmallVec<[(LaneMask, SUnit); 4]>> = SaHashMap::default();
        let nodes: Vec<SUnit> = self.units.keys().collect();

        for su in nodes {
            let data = func.inst(self.units[su].inst);

            for (reg, lanes) in data.reg_uses() {
                for &(mask, def) in defs.get(&reg).into_iter().flatten() {
                    if mask.overlaps(lanes) {
                        let latency = func.inst(self.units[def].inst).latency();

                        add_edge(&mut self.units, def, su, DepKind::Data, latency);
                    }
                }

                readers.entry(reg).or_default().push((lanes, su));
            }

            for (reg, lanes) in data.reg_defs() {
                if let Some(prev_defs) = defs.get_mut(&reg) {
                    for &(mask, def) in prev_defs.iter() {
                        if mask.overlaps(lanes) && def != su {
                            add_edge(&mut self.units, def, su, DepKind::Output, 1);
                        }
                    }

                    strip_lanes(prev_defs, lanes);
                }

                // anything reading these lanes later reads this def, so the
                // old readers are ordered through this edge from now on
                if let Some(prev_readers) = readers.get_mut(&reg) {
                    for &(mask, reader) in prev_readers.iter() {
                        if mask.overlaps(lanes) && reader != su {
                            add_edge(&mut self.units, reader, su, DepKind::Anti, 0);
                        }
                    }

                    strip_lanes(prev_readers, lanes);
                }

                defs.entry(reg).or_default().push((lanes, su));
            }
        }
    }

    fn add_memory_deps(&mut self, func: &MachineFunction) {
        let mut last_store = None;
        let mut last_barrier = None;
        let mut loads = Vec::new();
        let mut since_barrier = Vec::new();
        let nodes: Vec<SUnit> = self.units.keys().collect();

        for su in nodes {
            let data = func.inst(self.units[su].inst);

            if data.has_side_effects() {
                for &mem in since_barrier.iter() {
                    add_edge(&mut self.units, mem, su, DepKind::Order, 0);
                }

                if let Some(barrier) = last_barrier {
                    add_edge(&mut self.units, barrier, su, DepKind::Order, 0);
                }

                last_barrier = Some(su);
                last_store = None;
                loads.clear();
                since_barrier.clear();

                continue;
            }

            if !data.may_load() && !data.may_store() {
                continue;
            }

            if let Some(barrier) = last_barrier {
                add_edge(&mut self.units, barrier, su, DepKind::Order, 0);
            }

            if data.may_store() {
                if let Some(store) = last_store {
                    add_edge(&mut self.units, store, su, DepKind::Order, 0);
                }

                for &load in loads.iter() {
                    add_edge(&mut self.units, load, su, DepKind::Order, 0);
                }

                loads.clear();
                last_store = Some(su);
            }

            if data.may_load() {
                if let Some(store) = last_store.filter(|&store| store != su) {
                    add_edge(&mut self.units, store, su, DepKind::Order, 0);
                }

                loads.push(su);
            }

            since_barrier.push(su);
        }
    }

    fn compute_topological_order(&mut self) {
        let mut remaining = SecondaryMap::map_all_keys(&self.units, |units, su| units[su].preds.len());
        let mut ready: BTreeSet<SUnit> = self
            .units
            .iter()
            .filter(|(_, data)| data.preds.is_empty())
            .map(|(su, _)| su)
            .collect();

        while let Some(su) = ready.pop_first() {
            self.units[su].topo_index = self.topo.len() as u32;
            self.topo.push(su);

            for dep in self.units[su].succs.iter() {
                let count = &mut remaining[dep.node];

                *count -= 1;

                if *count == 0 {
                    ready.insert(dep.node);
                }
            }
        }

        assert_eq!(
            self.topo.len(),
            self.units.len(),
            "dependency graph has a cycle"
        );
    }

    fn compute_depth_and_height(&mut self) {
        for i in 0..self.topo.len() {
            let su = self.topo[i];
            let depth = self.units[su]
                .preds
                .iter()
                .map(|dep| self.units[dep.node].depth + dep.latency)
                .max()
                .unwrap_or(0);

            self.units[su].depth = depth;
        }

        for i in (0..self.topo.len()).rev() {
            let su = self.topo[i];
            let height = self.units[su]
                .succs
                .iter()
                .map(|dep| self.units[dep.node].height + dep.latency)
                .max()
                .unwrap_or(0);

            self.units[su].height = height;
        }
    }
}

// one edge per pair of nodes, keeping the largest latency
fn add_edge(
    units: &mut ArenaMap<SUnit, SUnitData>,
    pred: SUnit,
    succ: SUnit,
    kind: DepKind,
    latency: u32,
) {
    debug_assert_ne!(pred, succ, "nodes cannot depend on themselves");

    if let Some(existing) = units[pred].succs.iter_mut().find(|dep| dep.node == succ) {
        existing.latency = existing.latency.max(latency);

        let latency = existing.latency;

        if let Some(back) = units[succ].preds.iter_mut().find(|dep| dep.node == pred) {
            back.latency = latency;
        }

        return;
    }

    units[pred].succs.push(Dep {
        node: succ,
        kind,
        latency,
    });

    units[succ].preds.push(Dep {
        node: pred,
        kind,
        latency,
    });
}

fn strip_lanes<const N: usize>(entries: &mut SmallVec<[(LaneMask, SUnit); N]>, lanes: LaneMask) {
    for (mask, _) in entries.iter_mut() {
        *mask &= !lanes;
    }

    entries.retain(|(mask, _)| mask.any());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{FunctionBuilder, InstFlags};
    use crate::sched::testing;

    fn edge(dag: &ScheduleDag, pred: Inst, succ: Inst) -> Option<Dep> {
        let (p, s) = (dag.unit_of(pred)?, dag.unit_of(succ)?);

        dag.succs(p).iter().copied().find(|dep| dep.node == s)
    }

    #[test]
    fn register_dependencies() {
        let target = testing::target();
        let v32 = target.class_by_name("v32").unwrap();
        let mut b = FunctionBuilder::new("deps", &target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let (x, y) = (b.vreg(v32), b.vreg(v32));
        let def = b.inst("v_mov").def(x).latency(4).finish();
        let read = b.inst("v_add").def(y).use_reg(x).finish();
        let redef = b.inst("v_mov").def(x).finish();
        let last = b.inst("store").use_reg(x).use_reg(y).finish();
        let func = b.build();

        let dag = ScheduleDag::build(&func, def, None);

        let data = edge(&dag, def, read).unwrap();
        assert_eq!((data.kind, data.latency), (DepKind::Data, 4));
        assert_eq!(edge(&dag, read, redef).unwrap().kind, DepKind::Anti);
        assert_eq!(edge(&dag, def, redef).unwrap().kind, DepKind::Output);
        assert_eq!(edge(&dag, redef, last).unwrap().kind, DepKind::Data);
        assert!(edge(&dag, def, last).is_none());
    }

    #[test]
    fn disjoint_lanes_are_independent() {
        let target = testing::target();
        let v64 = target.class_by_name("v64").unwrap();
        let mut b = FunctionBuilder::new("lanes", &target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let wide = b.vreg(v64);
        let lo = b.inst("v_mov").def_lanes(wide, LaneMask::lane(0)).finish();
        let hi = b.inst("v_mov").def_lanes(wide, LaneMask::lane(1)).finish();
        let use_hi = b.inst("store").use_lanes(wide, LaneMask::lane(1)).finish();
        let use_all = b.inst("store2").use_reg(wide).finish();
        let func = b.build();

        let dag = ScheduleDag::build(&func, lo, None);

        assert!(edge(&dag, lo, hi).is_none());
        assert!(edge(&dag, lo, use_hi).is_none());
        assert!(edge(&dag, hi, use_hi).is_some());
        assert!(edge(&dag, lo, use_all).is_some());
        assert!(edge(&dag, hi, use_all).is_some());
    }

    #[test]
    fn memory_ordering() {
        let target = testing::target();
        let v32 = target.class_by_name("v32").unwrap();
        let mut b = FunctionBuilder::new("mem", &target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let regs: Vec<_> = (0..3).map(|_| b.vreg(v32)).collect();
        let l0 = b.inst("load").def(regs[0]).flags(InstFlags::MAY_LOAD).finish();
        let l1 = b.inst("load").def(regs[1]).flags(InstFlags::MAY_LOAD).finish();
        let st = b.inst("store").flags(InstFlags::MAY_STORE).finish();
        let l2 = b.inst("load").def(regs[2]).flags(InstFlags::MAY_LOAD).finish();
        let fence = b.inst("fence").flags(InstFlags::SIDE_EFFECTS).finish();
        let alu = b.inst("v_add").use_reg(regs[0]).finish();
        let after = b.inst("store").flags(InstFlags::MAY_STORE).finish();
        let func = b.build();

        let dag = ScheduleDag::build(&func, l0, None);

        assert!(edge(&dag, l0, l1).is_none());
        assert!(edge(&dag, l0, st).is_some());
        assert!(edge(&dag, l1, st).is_some());
        assert!(edge(&dag, st, l2).is_some());
        assert!(edge(&dag, l2, fence).is_some());
        assert!(edge(&dag, st, fence).is_some());
        assert!(edge(&dag, fence, after).is_some());
        assert!(edge(&dag, fence, alu).is_none());
    }

    #[test]
    fn roots_depth_and_height() {
        let target = testing::target();
        let (func, insts) = testing::two_chains(&target);
        let dag = ScheduleDag::build(&func, insts[0], None);
        let (top, bottom) = dag.find_roots();

        let a1 = dag.unit_of(insts[0]).unwrap();
        let b1 = dag.unit_of(insts[3]).unwrap();
        let merge = dag.unit_of(insts[6]).unwrap();

        assert_eq!(top, vec![a1, b1]);
        assert_eq!(bottom, vec![merge]);
        assert_eq!(dag.depth(merge), 3);
        assert_eq!(dag.height(a1), 3);
        assert_eq!(dag.topological_order(), dag.units().collect::<Vec<_>>().as_slice());
        assert!(dag.is_valid_order(dag.topological_order()));

        let mut reversed = dag.topological_order().to_vec();
        reversed.reverse();
        assert!(!dag.is_valid_order(&reversed));
    }

    #[test]
    fn debug_values_follow_their_instruction() {
        let target = testing::target();
        let v32 = target.class_by_name("v32").unwrap();
        let mut b = FunctionBuilder::new("dbg", &target);
        let bb = b.create_block("entry");
        b.switch_to(bb);

        let (x, y) = (b.vreg(v32), b.vreg(v32));
        let lead = b.debug_value(x);
        let mx = b.inst("v_mov").def(x).finish();
        let d0 = b.debug_value(x);
        let d1 = b.debug_value(x);
        let my = b.inst("v_mov").def(y).finish();
        let st = b.inst("store").use_reg(x).use_reg(y).finish();
        let func = b.build();

        let dag = ScheduleDag::build(&func, lead, None);

        assert_eq!(dag.len(), 3);
        assert_eq!(dag.first_dbg_value(), Some(lead));
        assert_eq!(dag.dbg_values(), &[(d0, mx), (d1, d0)]);

        let order: Vec<_> = [my, mx, st].iter().map(|&i| dag.unit_of(i).unwrap()).collect();

        assert_eq!(dag.detach_schedule(&order), vec![lead, my, mx, d0, d1, st]);
    }
}
