//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module.
//!
//! Every entity the scheduler deals with (instructions, blocks, virtual
//! registers, dependency-graph nodes, register banks and classes) is a small
//! copyable key into one of these arenas. The arenas never remove entries
//! (besides [`SecondaryMap`] and [`SecondarySet`]), which keeps keys stable
//! while instructions are moved around inside of a layout.
//!
//! ```
//! # use itersched::dense_arena_key;
//! # use itersched::arena::*;
//! dense_arena_key! {
//!     pub struct Node;
//! }
//!
//! let mut nodes = ArenaMap::new();
//! let a: Node = nodes.insert("load");
//! let b = nodes.insert("add");
//!
//! let mut scheduled = SecondarySet::with_primary(&nodes);
//! scheduled.insert(b);
//!
//! assert!(!scheduled.contains(a));
//! assert!(scheduled.contains(b));
//! ```

mod iter;
mod key;
mod map;
mod secondary;
mod secondary_set;

pub use iter::Keys;
pub use key::ArenaKey;
pub use map::ArenaMap;
pub use secondary::SecondaryMap;
pub use secondary_set::SecondarySet;

use std::fmt;
use std::fmt::{Debug, Formatter};

pub(in crate::arena) fn debug_write_map<'a, K, V>(
    f: &mut Formatter<'_>,
    name: &'static str,
    it: impl Iterator<Item = (K, &'a V)>,
) -> fmt::Result
where
    K: ArenaKey,
    V: Debug + 'a,
{
    write!(f, "{name} ")?;

    f.debug_map().entries(it).finish()
}
