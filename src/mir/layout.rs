//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::mir::{Block, Inst};
use crate::utility::PackedOption;
use std::fmt;
use std::fmt::{Debug, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct InstNode {
    prev: PackedOption<Inst>,
    next: PackedOption<Inst>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct BlockNode {
    prev: PackedOption<Block>,
    next: PackedOption<Block>,
    first: PackedOption<Inst>,
    last: PackedOption<Inst>,
}

/// Allows the blocks in a layout to be iterated over in program-order.
#[derive(Copy, Clone, Debug)]
pub struct BlockIter<'layout> {
    next: Option<Block>,
    layout: &'layout Layout,
}

impl<'l> Iterator for BlockIter<'l> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|block| {
            self.next = self.layout.blocks[block].next.expand();

            block
        })
    }
}

/// Walks instructions forwards from some starting point, either until the
/// end of the block or until a given instruction is reached.
#[derive(Copy, Clone, Debug)]
pub struct InstIter<'layout> {
    next: Option<Inst>,
    stop: Option<Inst>,
    layout: &'layout Layout,
}

impl<'l> Iterator for InstIter<'l> {
    type Item = Inst;

    fn next(&mut self) -> Option<Self::Item> {
        let inst = self.next.filter(|&inst| Some(inst) != self.stop)?;

        self.next = self.layout.nodes[inst].next.expand();

        Some(inst)
    }
}

/// Models the instruction order of an entire machine function.
///
/// Each block is a doubly-linked list of instructions, which makes the
/// remove-and-reinsert moves the scheduler performs constant-time, and the
/// blocks themselves form another linked list.
#[derive(Default, Clone)]
pub struct Layout {
    // forms a doubly-linked list of blocks, with `None` at the head/tail
    blocks: SecondaryMap<Block, BlockNode>,
    // forms a doubly-linked list of instructions, with `None` at the head/tail
    nodes: SecondaryMap<Inst, InstNode>,
    // maps instructions -> the blocks that contain them
    inst_blocks: SecondaryMap<Inst, Block>,
    head: PackedOption<Block>,
    tail: PackedOption<Block>,
}

impl Layout {
    /// Creates a new, empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction to the end of the specified block.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(
            !self.nodes.contains(inst),
            "cannot insert same inst multiple times"
        );

        let block_node = &mut self.blocks[block];
        let prev = block_node.last.replace(inst);

        match prev {
            Some(prev) => self.nodes[prev].next = PackedOption::some(inst),
            None => {
                block_node.first.replace(inst);
            }
        }

        self.insert_node(inst, block, prev.into(), PackedOption::none());
    }

    /// Inserts `inst` into the same block as `before`, but directly before `before`.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        debug_assert!(
            !self.nodes.contains(inst),
            "cannot insert same inst multiple times"
        );

        debug_assert!(
            self.nodes.contains(before),
            "cannot insert before instruction that doesn't exist in the layout"
        );

        let after = self.nodes[before].prev.replace(inst);

        // no previous instruction means `inst` is the new head of the block
        match after {
            Some(after) => self.nodes[after].next = PackedOption::some(inst),
            None => {
                self.block_node_mut(before).first = PackedOption::some(inst);
            }
        }

        self.insert_node(
            inst,
            self.inst_blocks[before],
            after.into(),
            PackedOption::some(before),
        );
    }

    /// Removes an instruction from the layout. The instruction must be in the
    /// layout, removing one that isn't is a bug.
    pub fn remove_inst(&mut self, inst: Inst) {
        let node = self.nodes[inst];

        match node.prev.expand() {
            Some(prev) => {
                self.nodes[prev].next = node.next;
            }
            None => {
                self.block_node_mut(inst).first = node.next;
            }
        }

        match node.next.expand() {
            Some(next) => {
                self.nodes[next].prev = node.prev;
            }
            None => {
                self.block_node_mut(inst).last = node.prev;
            }
        }

        self.nodes.remove(inst);
        self.inst_blocks.remove(inst);
    }

    /// Appends a block to the layout, putting it at the end of the list of blocks.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(
            !self.blocks.contains(block),
            "cannot insert block that is already inserted"
        );

        let prev = self.tail.replace(block);

        match prev {
            Some(bb) => {
                self.blocks[bb].next.replace(block);
            }
            None => {
                self.head.replace(block);
            }
        }

        self.blocks.insert(
            block,
            BlockNode {
                prev: prev.into(),
                next: PackedOption::none(),
                first: PackedOption::none(),
                last: PackedOption::none(),
            },
        );
    }

    /// Gets an iterator over the blocks of the layout.
    pub fn blocks(&self) -> BlockIter<'_> {
        BlockIter {
            next: self.head.expand(),
            layout: self,
        }
    }

    /// Gets an iterator over every instruction in a given block.
    pub fn insts_in_block(&self, block: Block) -> InstIter<'_> {
        InstIter {
            next: self.blocks[block].first.expand(),
            stop: None,
            layout: self,
        }
    }

    /// Gets an iterator over the half-open range `[begin, end)`, where an
    /// `end` of `None` means the end of `begin`'s block.
    pub fn insts_between(&self, begin: Inst, end: Option<Inst>) -> InstIter<'_> {
        InstIter {
            next: Some(begin),
            stop: end,
            layout: self,
        }
    }

    /// Gets the first instruction in `block`
    pub fn block_first_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].first.expand()
    }

    /// Gets the last instruction in `block`
    pub fn block_last_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].last.expand()
    }

    /// Gets the instruction that comes after `inst`
    pub fn inst_next(&self, inst: Inst) -> Option<Inst> {
        self.nodes[inst].next.expand()
    }

    /// Gets the instruction that comes before `inst`
    pub fn inst_prev(&self, inst: Inst) -> Option<Inst> {
        self.nodes[inst].prev.expand()
    }

    /// Gets the block that an instruction is in
    pub fn inst_block(&self, inst: Inst) -> Block {
        self.inst_blocks[inst]
    }

    fn insert_node(
        &mut self,
        inst: Inst,
        block: Block,
        prev: PackedOption<Inst>,
        next: PackedOption<Inst>,
    ) {
        self.nodes.insert(inst, InstNode { prev, next });
        self.inst_blocks.insert(inst, block);
    }

    fn block_node_mut(&mut self, inst: Inst) -> &mut BlockNode {
        &mut self.blocks[self.inst_blocks[inst]]
    }
}

impl Debug for Layout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();

        for block in self.blocks() {
            map.entry(&block, &self.insts_in_block(block).collect::<Vec<_>>());
        }

        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    fn layout_with(n: usize) -> (Layout, Block, Vec<Inst>) {
        let mut layout = Layout::new();
        let block = Block::key_new(0);
        let insts: Vec<_> = (0..n).map(Inst::key_new).collect();

        layout.append_block(block);

        for &inst in insts.iter() {
            layout.append_inst(inst, block);
        }

        (layout, block, insts)
    }

    #[test]
    fn append_keeps_program_order() {
        let (layout, block, insts) = layout_with(4);

        assert_eq!(layout.insts_in_block(block).collect::<Vec<_>>(), insts);
        assert_eq!(layout.block_first_inst(block), Some(insts[0]));
        assert_eq!(layout.block_last_inst(block), Some(insts[3]));
        assert_eq!(layout.insts_in_block(block).count(), 4);
    }

    #[test]
    fn move_to_front_and_back() {
        let (mut layout, block, i) = layout_with(4);

        layout.remove_inst(i[3]);
        layout.insert_inst_before(i[3], i[0]);

        layout.remove_inst(i[1]);
        layout.append_inst(i[1], block);

        let order: Vec<_> = layout.insts_in_block(block).collect();

        assert_eq!(order, vec![i[3], i[0], i[2], i[1]]);
        assert_eq!(layout.inst_prev(i[3]), None);
        assert_eq!(layout.inst_next(i[1]), None);
        assert_eq!(layout.inst_prev(i[2]), Some(i[0]));
        assert_eq!(layout.insts_in_block(block).count(), 4);
    }

    #[test]
    fn half_open_ranges() {
        let (layout, _, i) = layout_with(5);

        let middle: Vec<_> = layout.insts_between(i[1], Some(i[3])).collect();
        let tail: Vec<_> = layout.insts_between(i[2], None).collect();

        assert_eq!(middle, vec![i[1], i[2]]);
        assert_eq!(tail, vec![i[2], i[3], i[4]]);
        assert_eq!(layout.insts_between(i[2], Some(i[2])).count(), 0);
    }
}
