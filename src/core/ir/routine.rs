// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Routines
//!
//! A routine is a statically-scheduled sequence of instruction slots.
//! A slot holding `None` is a hole, left by `place_routine` until
//! `set_nops` fills it with a designed no-op. `selected`, when set,
//! restricts `dump`/`dump_py`/`graph`-style passes to a subset of the
//! routine reached from a `select`ed instruction.

use std::collections::HashSet;

use crate::core::ir::operand::InstrId;
use crate::core::ir::ring::RegisterRing;

/// Either an instruction or a global, the two kinds of definition site
/// the register allocator and selection passes reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Def {
    Instr(InstrId),
    Global(crate::core::ir::operand::GlobalId),
}

#[derive(Debug, Clone, Default)]
pub struct Routine {
    pub base: Option<u32>,
    pub instr: Vec<Option<InstrId>>,
    pub rings: Vec<RegisterRing>,
    pub waitfull_ports: Vec<u32>,
    pub waitempty_ports: Vec<u32>,
    pub selected: Option<HashSet<Def>>,
}

impl Routine {
    pub fn new() -> Self {
        Routine::default()
    }

    pub fn is_selected(&self, id: InstrId) -> bool {
        match &self.selected {
            None => true,
            Some(set) => set.contains(&Def::Instr(id)),
        }
    }

    pub fn push(&mut self, id: InstrId) {
        self.instr.push(Some(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unselected_routine_selects_everything() {
        let r = Routine::new();
        assert!(r.is_selected(InstrId(0)));
    }

    #[test]
    fn selected_routine_restricts_to_set() {
        let mut r = Routine::new();
        let mut set = HashSet::new();
        set.insert(Def::Instr(InstrId(3)));
        r.selected = Some(set);
        assert!(r.is_selected(InstrId(3)));
        assert!(!r.is_selected(InstrId(4)));
    }
}
