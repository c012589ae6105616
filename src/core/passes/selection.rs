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

//! Selection, register bookkeeping and global/const allocation helpers
//!
//! `select` restricts follow-up dump/graph passes to the transitive
//! fan-in of one instruction within a routine; `clear_outs` and
//! `wipe_inits` reset state a compiler pipeline typically runs once.

use std::collections::HashSet;

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::{Operand, Register};
use crate::core::ir::routine::Def;
use crate::core::ir::{GlobalId, InstrId, Program};

pub fn special_reg(prg: &mut Program, reg: Register) {
    prg.register_specials.insert(reg);
}

pub fn add_regring(
    prg: &mut Program,
    routidx: usize,
    base: Register,
    depth: u32,
    width: u32,
) -> Result<()> {
    let rout = prg
        .routines
        .get_mut(routidx)
        .ok_or_else(|| CompileError::user(format!("no such routine: {routidx}")))?;
    rout.rings.push(crate::core::ir::RegisterRing::new(depth, width, base.bank, base.addr));
    Ok(())
}

/// Walk the fan-in of `rout.instr[instrpos]` and select every
/// instruction/global reached. Non-deconstructed register operands
/// are logged as warnings rather than followed further, since they
/// carry no abstract identity to select through.
pub fn select(prg: &mut Program, routidx: usize, instrpos: usize) -> Result<()> {
    let rout = prg
        .routines
        .get(routidx)
        .ok_or_else(|| CompileError::user(format!("no such routine: {routidx}")))?;
    let start = rout
        .instr
        .get(instrpos)
        .and_then(|s| *s)
        .ok_or_else(|| CompileError::user(format!("no such instruction: {instrpos}")))?;

    let mut visited: HashSet<Def> = HashSet::new();
    let mut queue: Vec<Def> = vec![Def::Instr(start)];

    while let Some(def) = queue.pop() {
        if visited.contains(&def) {
            continue;
        }
        match def {
            Def::Instr(id) => {
                let node = prg.instr(id);
                for op in node.deps() {
                    if let Operand::Register(reg) = op {
                        if !prg.register_specials.contains(reg) {
                            log::warn!("non-deconstructed instruction: {}", crate::core::passes::dump::instr_text(prg, id));
                            break;
                        }
                    }
                }
                for op in prg.instr(id).deps() {
                    match op {
                        Operand::Instr(dep) => queue.push(Def::Instr(*dep)),
                        Operand::Global(dep) => queue.push(Def::Global(*dep)),
                        _ => {}
                    }
                }
            }
            Def::Global(id) => {
                for op in prg.global(id).deps() {
                    match op {
                        Operand::Instr(dep) => queue.push(Def::Instr(*dep)),
                        Operand::Global(dep) => queue.push(Def::Global(*dep)),
                        _ => {}
                    }
                }
            }
        }
        visited.insert(def);
    }

    prg.routines[routidx].selected = Some(visited);
    Ok(())
}

pub fn select_none(prg: &mut Program, routidx: usize) -> Result<()> {
    let rout = prg
        .routines
        .get_mut(routidx)
        .ok_or_else(|| CompileError::user(format!("no such routine: {routidx}")))?;
    rout.selected = Some(HashSet::new());
    Ok(())
}

pub fn unselect(prg: &mut Program, routidx: Option<usize>) -> Result<()> {
    match routidx {
        Some(idx) => {
            let rout = prg
                .routines
                .get_mut(idx)
                .ok_or_else(|| CompileError::user(format!("no such routine: {idx}")))?;
            rout.selected = None;
        }
        None => {
            for rout in &mut prg.routines {
                rout.selected = None;
            }
        }
    }
    Ok(())
}

/// Clear instruction output register/ring assignments, replacing them
/// with the `Global` they feed where applicable.
pub fn clear_outs(prg: &mut Program) {
    let mut global_writers: std::collections::HashMap<InstrId, GlobalId> = std::collections::HashMap::new();

    for rout in &prg.routines {
        for slot in &rout.instr {
            let Some(id) = slot else { continue };
            for op in prg.instr(*id).deps() {
                if let Operand::Global(gid) = op {
                    for case in prg.global(*gid).deps() {
                        if let Operand::Instr(writer) = case {
                            global_writers.insert(*writer, *gid);
                        }
                    }
                }
            }
        }
    }

    let ids: Vec<InstrId> = prg.instr_ids().collect();
    for id in ids {
        if matches!(prg.instr(id).out, Some(Operand::Ring(_))) {
            continue;
        }
        prg.instr_mut(id).out = global_writers.get(&id).map(|gid| Operand::Global(*gid));
    }
}

pub fn wipe_inits(prg: &mut Program) {
    prg.register_inits.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::InstrNode;
    use crate::core::ir::Routine;
    use crate::core::opcode::Opcode;

    #[test]
    fn select_follows_instruction_chain() {
        let mut prg = Program::new();
        let a = prg.push_instr(InstrNode::new(Opcode::Add, None, [None, None, None]));
        let b = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Instr(a)), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(a);
        rout.push(b);
        prg.routines.push(rout);

        select(&mut prg, 0, 1).unwrap();

        let selected = prg.routines[0].selected.as_ref().unwrap();
        assert!(selected.contains(&Def::Instr(a)));
        assert!(selected.contains(&Def::Instr(b)));
    }

    #[test]
    fn wipe_inits_clears_map() {
        let mut prg = Program::new();
        prg.register_inits.insert(Register::new(1, 0), 5);
        wipe_inits(&mut prg);
        assert!(prg.register_inits.is_empty());
    }
}
