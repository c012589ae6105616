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

//! Deconstruction passes
//!
//! `deconstruct` reverts register allocation: it rewrites every
//! register operand into either a ring reference (`deconstruct_regrings`)
//! or an abstract reference to the instruction/global that defines it
//! (`deconstruct_simpleregs`). Running these lets every later pass
//! reason about data flow instead of raw register traffic.

use std::collections::{HashMap, HashSet};

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::{GlobalId, Operand, Register};
use crate::core::ir::program::GlobalNode;
use crate::core::ir::{InstrId, Program};

pub fn deconstruct_regrings(prg: &mut Program) -> Result<()> {
    for r in 0..prg.routines.len() {
        let ids: Vec<InstrId> = prg.routines[r].instr.iter().filter_map(|s| *s).collect();
        let mut written: HashSet<usize> = HashSet::new();

        for id in ids {
            for i in 0..3 {
                let reg = match prg.instr(id).ops[i] {
                    Some(Operand::Register(reg)) => reg,
                    _ => continue,
                };
                if prg.register_specials.contains(&reg) {
                    continue;
                }
                for (ring_idx, ring) in prg.routines[r].rings.iter().enumerate() {
                    if ring.contains(reg) {
                        if written.contains(&ring_idx) {
                            return Err(CompileError::structural(
                                "writes-after-reads on the same register ring from one routine are not supported"
                                    .to_string(),
                            ));
                        }
                        let offset = ring.decode_offset(reg);
                        prg.instr_mut(id).ops[i] = Some(Operand::Ring(
                            crate::core::ir::operand::RingOperand { ring: ring_idx, offset },
                        ));
                    }
                }
            }

            let out_reg = match prg.instr(id).out {
                Some(Operand::Register(reg)) => Some(reg),
                _ => None,
            };
            if let Some(reg) = out_reg {
                if !prg.register_specials.contains(&reg) {
                    for (ring_idx, ring) in prg.routines[r].rings.iter().enumerate() {
                        if ring.contains(reg) {
                            let offset = ring.decode_offset(reg);
                            prg.instr_mut(id).out = Some(Operand::Ring(
                                crate::core::ir::operand::RingOperand { ring: ring_idx, offset },
                            ));
                            written.insert(ring_idx);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn deconstruct_simpleregs(prg: &mut Program) -> Result<()> {
    enum Setter {
        Uninitialized,
        Constant(u32),
        Instr(InstrId),
    }

    let mut final_setters: HashMap<Register, Vec<Setter>> = HashMap::new();

    for (reg, val) in prg.register_inits.clone() {
        final_setters.entry(reg).or_default().push(Setter::Constant(val));
    }

    for rout in &prg.routines {
        let mut rout_final: HashMap<Register, InstrId> = HashMap::new();
        for slot in &rout.instr {
            let Some(id) = slot else { continue };
            if let Some(Operand::Register(reg)) = prg.instr(*id).out {
                rout_final.insert(reg, *id);
            }
        }
        for (reg, id) in rout_final {
            let entry = final_setters.entry(reg).or_default();
            if entry.is_empty() {
                entry.push(Setter::Uninitialized);
            }
            entry.push(Setter::Instr(id));
        }
    }

    let mut resolved: HashMap<Register, Operand> = HashMap::new();
    for (reg, setters) in final_setters {
        if setters.len() > 1 {
            let cases: Vec<Operand> = setters
                .into_iter()
                .map(|s| match s {
                    Setter::Uninitialized => Operand::Uninitialized,
                    Setter::Constant(v) => Operand::Constant(v),
                    Setter::Instr(id) => Operand::Instr(id),
                })
                .collect();
            let gid = prg.push_global(GlobalNode { cases, out: None });
            resolved.insert(reg, Operand::Global(gid));
        } else {
            let op = match setters.into_iter().next().unwrap() {
                Setter::Uninitialized => Operand::Uninitialized,
                Setter::Constant(v) => Operand::Constant(v),
                Setter::Instr(id) => Operand::Instr(id),
            };
            resolved.insert(reg, op);
        }
    }

    for r in 0..prg.routines.len() {
        let ids: Vec<InstrId> = prg.routines[r].instr.iter().filter_map(|s| *s).collect();
        let mut state: HashMap<Register, Operand> = HashMap::new();

        for id in ids {
            for i in 0..3 {
                let reg = match prg.instr(id).ops[i] {
                    Some(Operand::Register(reg)) => reg,
                    _ => continue,
                };
                if prg.register_specials.contains(&reg) {
                    continue;
                }
                let newop = if let Some(op) = state.get(&reg) {
                    op.clone()
                } else if let Some(op) = resolved.get(&reg) {
                    op.clone()
                } else {
                    resolved.insert(reg, Operand::Uninitialized);
                    Operand::Uninitialized
                };
                prg.instr_mut(id).ops[i] = Some(newop);
            }

            if let Some(Operand::Register(out_reg)) = prg.instr(id).out {
                if !prg.register_specials.contains(&out_reg) {
                    state.insert(out_reg, Operand::Instr(id));
                }
            }
        }
    }

    Ok(())
}

pub fn deconstruct(prg: &mut Program) -> Result<()> {
    deconstruct_regrings(prg)?;
    deconstruct_simpleregs(prg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::{InstrNode, Routine};
    use crate::core::opcode::Opcode;

    #[test]
    fn single_writer_register_becomes_instr_reference() {
        let mut prg = Program::new();
        let writer = prg.push_instr(InstrNode::new(
            Opcode::Add,
            Some(Operand::Register(Register::new(1, 0))),
            [None, None, None],
        ));
        let reader = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Register(Register::new(1, 0))), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(writer);
        rout.push(reader);
        prg.routines.push(rout);

        deconstruct_simpleregs(&mut prg).unwrap();

        assert_eq!(prg.instr(reader).ops[0], Some(Operand::Instr(writer)));
    }

    #[test]
    fn multi_writer_register_becomes_global() {
        let mut prg = Program::new();
        let w1 = prg.push_instr(InstrNode::new(
            Opcode::Add,
            Some(Operand::Register(Register::new(1, 0))),
            [None, None, None],
        ));
        let mut r1 = Routine::new();
        r1.push(w1);
        prg.routines.push(r1);

        let w2 = prg.push_instr(InstrNode::new(
            Opcode::Sub,
            Some(Operand::Register(Register::new(1, 0))),
            [None, None, None],
        ));
        let reader = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Register(Register::new(1, 0))), None, None],
        ));
        let mut r2 = Routine::new();
        r2.push(w2);
        r2.push(reader);
        prg.routines.push(r2);

        deconstruct_simpleregs(&mut prg).unwrap();

        assert!(matches!(prg.instr(reader).ops[0], Some(Operand::Global(_))));
    }
}
