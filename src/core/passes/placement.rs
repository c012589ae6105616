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

//! Instruction placement
//!
//! Scheduling a routine is a constraint-satisfaction problem: data
//! dependencies need their producer to sit some number of slots ahead
//! of the consumer (the multiply-accumulate family needs a one-slot
//! bubble), globals may only be updated after every routine that reads
//! them has done so, and side-effecting instructions must keep their
//! relative order. `place_routine` is a greedy list scheduler over
//! those constraints.

use std::collections::HashMap;

use crate::core::error::Result;
use crate::core::ir::operand::Operand;
use crate::core::ir::{InstrId, Program, Routine};

#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub endpoint: InstrId,
    pub base: InstrId,
    pub offset: i32,
    pub cost: u32,
    pub cause: &'static str,
}

fn position(rout: &Routine, id: InstrId) -> Option<usize> {
    rout.instr.iter().position(|slot| *slot == Some(id))
}

pub fn get_placement_constraints(prg: &Program, rout: &Routine) -> Vec<Constraint> {
    let instr_set: std::collections::HashSet<InstrId> = rout.instr.iter().filter_map(|s| *s).collect();
    let mut sideeffect: Vec<InstrId> = Vec::new();
    let mut constraints = Vec::new();

    for slot in &rout.instr {
        let Some(id) = slot else { continue };
        let node = prg.instr(*id);

        for op in node.deps() {
            match op {
                Operand::Instr(dep) if instr_set.contains(dep) => {
                    let dep_opcode = prg.instr(*dep).opcode;
                    let spacing = if dep_opcode.is_multiply_accumulate() { 1 } else { 0 };
                    constraints.push(Constraint {
                        endpoint: *id,
                        base: *dep,
                        offset: spacing,
                        cost: 1,
                        cause: "result-to-operand",
                    });
                }
                Operand::Global(gid) => {
                    for case in prg.global(*gid).deps() {
                        if let Operand::Instr(case_id) = case {
                            if instr_set.contains(case_id) {
                                constraints.push(Constraint {
                                    endpoint: *case_id,
                                    base: *id,
                                    offset: -1,
                                    cost: 0,
                                    cause: "global update-after-use",
                                });
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if node.has_side_effects() {
            if let Some(&last) = sideeffect.last() {
                constraints.push(Constraint {
                    endpoint: *id,
                    base: last,
                    offset: 0,
                    cost: 0,
                    cause: "side effect ordering",
                });
            }
            sideeffect.push(*id);
        }
    }

    constraints
}

pub fn check_placement(prg: &Program, routidx: usize) {
    let rout = &prg.routines[routidx];
    let constraints = get_placement_constraints(prg, rout);

    for constr in constraints {
        let Some(base_idx) = position(rout, constr.base) else { continue };
        let Some(endp_idx) = position(rout, constr.endpoint) else { continue };

        if endp_idx as i64 <= base_idx as i64 + constr.offset as i64 {
            log::warn!(
                "constraint violation ({}): {base_idx:#x}: {} vs {endp_idx:#x}: {}",
                constr.cause,
                crate::core::passes::dump::instr_text(prg, constr.base),
                crate::core::passes::dump::instr_text(prg, constr.endpoint),
            );
        }
    }
}

pub fn place_routine(prg: &mut Program, routidx: usize) -> Result<()> {
    let rout = &prg.routines[routidx];
    let instr_set: std::collections::HashSet<InstrId> = rout.instr.iter().filter_map(|s| *s).collect();
    let constraints = get_placement_constraints(prg, rout);

    let mut inst_blockers: HashMap<InstrId, Vec<usize>> = HashMap::new();
    let mut blocking: HashMap<InstrId, Vec<usize>> = HashMap::new();
    for &id in &instr_set {
        inst_blockers.insert(id, Vec::new());
        blocking.insert(id, Vec::new());
    }
    for (ci, constr) in constraints.iter().enumerate() {
        inst_blockers.entry(constr.endpoint).or_default().push(ci);
        blocking.entry(constr.base).or_default().push(ci);
    }

    let mut ready: Vec<InstrId> = rout
        .instr
        .iter()
        .filter_map(|s| *s)
        .filter(|id| inst_blockers.get(id).map(|v| v.is_empty()).unwrap_or(true))
        .collect();

    let mut placed: Vec<Option<InstrId>> = Vec::new();
    let mut nplaced = 0usize;

    while nplaced < instr_set.len() {
        if let Some(id) = ready.pop() {
            placed.push(Some(id));
            nplaced += 1;
        } else {
            placed.push(None);
        }

        for back in 0..placed.len().min(2) {
            let idx = placed.len() - 1 - back;
            let Some(ioi) = placed[idx] else { continue };
            let Some(constraint_ids) = blocking.get(&ioi).cloned() else { continue };
            for ci in constraint_ids {
                let constr = constraints[ci];
                if constr.offset > back as i32 {
                    continue;
                }
                let Some(blockers) = inst_blockers.get_mut(&constr.endpoint) else { continue };
                if blockers.is_empty() {
                    continue;
                }
                blockers.retain(|&x| x != ci);
                if blockers.is_empty() {
                    ready.push(constr.endpoint);
                }
            }
        }
    }

    prg.routines[routidx].instr = placed;
    check_placement(prg, routidx);
    Ok(())
}

pub fn place(prg: &mut Program) -> Result<()> {
    for i in 0..prg.routines.len() {
        place_routine(prg, i)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::InstrNode;
    use crate::core::opcode::Opcode;

    #[test]
    fn dependency_orders_producer_before_consumer() {
        let mut prg = Program::new();
        let producer = prg.push_instr(InstrNode::new(Opcode::Add, None, [None, None, None]));
        let consumer = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Instr(producer)), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(consumer);
        rout.push(producer);
        prg.routines.push(rout);

        place_routine(&mut prg, 0).unwrap();

        let positions = &prg.routines[0].instr;
        let p_idx = positions.iter().position(|s| *s == Some(producer)).unwrap();
        let c_idx = positions.iter().position(|s| *s == Some(consumer)).unwrap();
        assert!(p_idx < c_idx);
    }

    #[test]
    fn fmultacc_consumer_gets_a_one_slot_bubble() {
        let mut prg = Program::new();
        let producer = prg.push_instr(InstrNode::new(Opcode::Fmultacc, None, [None, None, None]));
        let consumer = prg.push_instr(InstrNode::new(
            Opcode::Add,
            None,
            [Some(Operand::Instr(producer)), None, None],
        ));
        let mut rout = Routine::new();
        rout.push(consumer);
        rout.push(producer);
        prg.routines.push(rout);

        place_routine(&mut prg, 0).unwrap();

        let positions = &prg.routines[0].instr;
        let p_idx = positions.iter().position(|s| *s == Some(producer)).unwrap();
        let c_idx = positions.iter().position(|s| *s == Some(consumer)).unwrap();
        assert!(c_idx > p_idx + 1, "expected a latency bubble between {p_idx} and {c_idx}");
    }

    #[test]
    fn side_effect_order_is_preserved_without_a_data_dependency() {
        let mut prg = Program::new();
        let first = prg.push_instr(InstrNode::new(Opcode::Put, None, [None, None, None]));
        let second = prg.push_instr(InstrNode::new(Opcode::Put, None, [None, None, None]));
        let mut rout = Routine::new();
        rout.push(first);
        rout.push(second);
        prg.routines.push(rout);

        place_routine(&mut prg, 0).unwrap();

        let positions = &prg.routines[0].instr;
        let f_idx = positions.iter().position(|s| *s == Some(first)).unwrap();
        let s_idx = positions.iter().position(|s| *s == Some(second)).unwrap();
        assert!(f_idx < s_idx, "side-effecting instructions must keep their original order");
    }
}
