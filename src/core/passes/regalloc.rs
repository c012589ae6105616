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

//! Register allocation
//!
//! `regalloc_intermediate` assigns a bank to every instruction/global
//! whose result is consumed as an operand elsewhere in the same
//! routine. Two definitions that ever feed the same operand list can't
//! share a bank, so this is graph coloring over 3 colors; it's phrased
//! as a SAT instance (one "is this def in bank Y" variable per
//! def/bank pair, an existence clause and pairwise mutex clauses per
//! co-feeding pair) and handed to a black-box solver rather than
//! solved with a bespoke coloring heuristic.
//!
//! `regalloc_const` separately assigns banks to `Constant` operands,
//! one instruction at a time, picking whichever banks aren't already
//! occupied by that instruction's register operands.
//!
//! Known limitation carried over unchanged: an instruction can't at
//! once be a global's writer and an available intermediate value, since
//! both claim the same `out` slot. Mixing the two in one instruction is
//! rejected rather than silently picking one.

use std::collections::{HashMap, HashSet};
use std::collections::BTreeSet;

use varisat::{CnfFormula, ExtendFormula, Lit, Solver};

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::{Operand, Register};
use crate::core::ir::routine::Def;
use crate::core::ir::Program;

pub struct RegAllocator {
    bank: u8,
    next_free: u32,
}

impl RegAllocator {
    pub fn new(bank: u8) -> Self {
        RegAllocator { bank, next_free: 0 }
    }

    pub fn alloc(&mut self, allocated: &HashSet<Register>) -> Register {
        let mut reg = Register::new(self.bank, self.next_free);
        while allocated.contains(&reg) {
            reg = Register::new(self.bank, reg.addr + 1);
        }
        self.next_free = reg.addr + 1;
        reg
    }
}

fn def_out(prg: &Program, def: Def) -> Option<Register> {
    match def {
        Def::Instr(id) => match prg.instr(id).out {
            Some(Operand::Register(r)) => Some(r),
            _ => None,
        },
        Def::Global(id) => prg.global(id).out,
    }
}

fn set_def_out(prg: &mut Program, def: Def, reg: Register) -> Result<()> {
    match def {
        Def::Instr(id) => {
            prg.instr_mut(id).out = Some(Operand::Register(reg));
        }
        Def::Global(id) => {
            prg.global_mut(id).out = Some(reg);
            let cases = prg.global(id).cases.clone();
            for case in cases {
                match case {
                    Operand::Instr(writer) => {
                        if prg.instr(writer).out.is_some()
                            && !matches!(prg.instr(writer).out, Some(Operand::Global(_)))
                        {
                            return Err(CompileError::pass(
                                "instruction cannot both write a global and be used as a plain intermediate".to_string(),
                            ));
                        }
                        prg.instr_mut(writer).out = Some(Operand::Register(reg));
                    }
                    Operand::Constant(val) => {
                        prg.register_inits.insert(reg, val);
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

pub fn regalloc_intermediate(prg: &mut Program, routidx: Option<usize>) -> Result<()> {
    if let Some(idx) = routidx {
        return regalloc_intermediate_routine(prg, idx);
    }
    for i in 0..prg.routines.len() {
        regalloc_intermediate_routine(prg, i)?;
    }
    Ok(())
}

fn regalloc_intermediate_routine(prg: &mut Program, routidx: usize) -> Result<()> {
    let rout = &prg.routines[routidx];

    let mut instr_of_interest: BTreeSet<Def> = BTreeSet::new();
    let mut edges: HashSet<(Def, Def)> = HashSet::new();

    for slot in &rout.instr {
        let Some(id) = slot else { continue };
        let node = prg.instr(*id);
        let inst_deps: Vec<Def> = node
            .deps()
            .filter_map(|op| match op {
                Operand::Instr(dep) => Some(Def::Instr(*dep)),
                Operand::Global(dep) => Some(Def::Global(*dep)),
                _ => None,
            })
            .collect();

        for def in &inst_deps {
            instr_of_interest.insert(*def);
        }

        for i in 0..inst_deps.len() {
            for j in (i + 1)..inst_deps.len() {
                let (a, b) = (inst_deps[i], inst_deps[j]);
                let pair = if a < b { (a, b) } else { (b, a) };
                edges.insert(pair);
            }
        }
    }

    if instr_of_interest.is_empty() {
        return Ok(());
    }

    let mut bank_var: HashMap<Def, [i32; 3]> = HashMap::new();
    let mut next_var = 1i32;
    for def in &instr_of_interest {
        bank_var.insert(*def, [next_var, next_var + 1, next_var + 2]);
        next_var += 3;
    }

    let mut formula = CnfFormula::new();
    for vars in bank_var.values() {
        formula.add_clause(&[
            Lit::from_dimacs(vars[0] as isize),
            Lit::from_dimacs(vars[1] as isize),
            Lit::from_dimacs(vars[2] as isize),
        ]);
    }
    for (a, b) in &edges {
        let va = bank_var[a];
        let vb = bank_var[b];
        for bank in 0..3 {
            formula.add_clause(&[
                Lit::from_dimacs(-(va[bank] as isize)),
                Lit::from_dimacs(-(vb[bank] as isize)),
            ]);
        }
    }

    let mut solver = Solver::new();
    solver.add_formula(&formula);
    let sat = solver
        .solve()
        .map_err(|e| CompileError::pass(format!("SAT solver error: {e}")))?;
    if !sat {
        return Err(CompileError::pass(
            "SAT solver couldn't solve for bank assignment: unsatisfiable".to_string(),
        ));
    }
    let model = solver
        .model()
        .ok_or_else(|| CompileError::pass("SAT solver returned no model".to_string()))?;

    let mut truth: HashMap<i32, bool> = HashMap::new();
    for lit in model {
        let dimacs = lit.to_dimacs() as i32;
        truth.insert(dimacs.unsigned_abs() as i32, dimacs > 0);
    }

    let mut allocators = [RegAllocator::new(1), RegAllocator::new(2), RegAllocator::new(3)];

    for def in &instr_of_interest {
        let vars = bank_var[def];
        let bank = (0..3)
            .find(|&b| *truth.get(&vars[b as usize]).unwrap_or(&false))
            .ok_or_else(|| CompileError::pass("SAT model assigned no bank".to_string()))?;
        let reg = allocators[bank as usize].alloc(&prg.register_allocated);
        prg.register_allocated.insert(reg);
        set_def_out(prg, *def, reg)?;
    }

    Ok(())
}

pub fn regalloc_const(prg: &mut Program, routidx: Option<usize>) -> Result<()> {
    if let Some(idx) = routidx {
        return regalloc_const_routine(prg, idx);
    }
    for i in 0..prg.routines.len() {
        regalloc_const_routine(prg, i)?;
    }
    Ok(())
}

fn regalloc_const_routine(prg: &mut Program, routidx: usize) -> Result<()> {
    let ids: Vec<_> = prg.routines[routidx].instr.iter().filter_map(|s| *s).collect();
    let mut allocators = [RegAllocator::new(1), RegAllocator::new(2), RegAllocator::new(3)];

    for id in ids {
        let mut free_banks: Vec<u8> = vec![1, 2, 3];
        for op in prg.instr(id).ops.iter().flatten() {
            if let Operand::Register(r) = op {
                free_banks.retain(|&b| b != r.bank);
            }
        }

        for i in 0..3 {
            let val = match prg.instr(id).ops[i] {
                Some(Operand::Constant(v)) => v,
                _ => continue,
            };
            let bank = free_banks.pop().ok_or_else(|| {
                CompileError::pass(format!(
                    "no free bank left to hold a constant operand at instruction {id:?}"
                ))
            })?;
            let reg = allocators[(bank - 1) as usize].alloc(&prg.register_allocated);
            prg.register_inits.insert(reg, val);
            prg.instr_mut(id).ops[i] = Some(Operand::Register(reg));
            prg.register_allocated.insert(reg);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::{InstrNode, Routine};
    use crate::core::opcode::Opcode;

    #[test]
    fn disjoint_consumers_can_share_a_bank() {
        let mut prg = Program::new();
        let a = prg.push_instr(InstrNode::new(Opcode::Add, None, [None, None, None]));
        let b = prg.push_instr(InstrNode::new(Opcode::Sub, None, [None, None, None]));
        let use_a = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Instr(a)), None, None],
        ));
        let use_b = prg.push_instr(InstrNode::new(
            Opcode::Or,
            None,
            [Some(Operand::Instr(b)), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(a);
        rout.push(b);
        rout.push(use_a);
        rout.push(use_b);
        prg.routines.push(rout);

        regalloc_intermediate(&mut prg, Some(0)).unwrap();

        assert!(prg.instr(a).out.is_some());
        assert!(prg.instr(b).out.is_some());
    }

    #[test]
    fn co_feeding_operands_get_different_banks() {
        let mut prg = Program::new();
        let a = prg.push_instr(InstrNode::new(Opcode::Add, None, [None, None, None]));
        let b = prg.push_instr(InstrNode::new(Opcode::Sub, None, [None, None, None]));
        let consumer = prg.push_instr(InstrNode::new(
            Opcode::Mux,
            None,
            [Some(Operand::Instr(a)), Some(Operand::Instr(b)), None],
        ));
        let mut rout = Routine::new();
        rout.push(a);
        rout.push(b);
        rout.push(consumer);
        prg.routines.push(rout);

        regalloc_intermediate(&mut prg, Some(0)).unwrap();

        let reg_a = match prg.instr(a).out {
            Some(Operand::Register(r)) => r,
            _ => panic!("expected register"),
        };
        let reg_b = match prg.instr(b).out {
            Some(Operand::Register(r)) => r,
            _ => panic!("expected register"),
        };
        assert_ne!(reg_a.bank, reg_b.bank);
    }

    #[test]
    fn const_operand_gets_a_free_bank() {
        let mut prg = Program::new();
        let id = prg.push_instr(InstrNode::new(
            Opcode::Add,
            None,
            [Some(Operand::Constant(0x2a)), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(id);
        prg.routines.push(rout);

        regalloc_const(&mut prg, Some(0)).unwrap();

        match prg.instr(id).ops[0] {
            Some(Operand::Register(r)) => assert_eq!(prg.register_inits.get(&r), Some(&0x2a)),
            _ => panic!("expected register"),
        }
    }
}
