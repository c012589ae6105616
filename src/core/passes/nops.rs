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

//! Hole filling and operand propagation
//!
//! `set_nops` turns the `None` holes `place_routine` leaves behind
//! into real instructions (a designed `AND` no-op), and
//! `propagate_outs` rewrites abstract `Instr`/`Global` operand
//! references into the concrete registers `regalloc_intermediate`
//! assigned them.

use crate::core::ir::operand::Operand;
use crate::core::ir::{InstrNode, Program};
use crate::core::opcode::Opcode;

pub fn set_nops(prg: &mut Program) -> u32 {
    let mut nnops = 0;
    for r in 0..prg.routines.len() {
        for i in 0..prg.routines[r].instr.len() {
            if prg.routines[r].instr[i].is_none() {
                let id = prg.push_instr(InstrNode::new(Opcode::And, None, [None, None, None]));
                prg.routines[r].instr[i] = Some(id);
                nnops += 1;
            }
        }
    }
    log::info!("set {nnops} NOPs");
    nnops
}

pub fn propagate_outs(prg: &mut Program) {
    let ids: Vec<_> = prg.instr_ids().collect();
    for id in ids {
        for i in 0..3 {
            let resolved = match prg.instr(id).ops[i] {
                Some(Operand::Instr(dep)) => prg.instr(dep).out.clone(),
                Some(Operand::Global(dep)) => prg.global(dep).out.map(Operand::Register),
                _ => None,
            };
            if let Some(reg) = resolved {
                prg.instr_mut(id).ops[i] = Some(reg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::Routine;

    #[test]
    fn set_nops_fills_holes() {
        let mut prg = Program::new();
        let mut rout = Routine::new();
        rout.instr = vec![None, None];
        prg.routines.push(rout);

        let n = set_nops(&mut prg);
        assert_eq!(n, 2);
        assert!(prg.routines[0].instr.iter().all(|s| s.is_some()));
    }

    #[test]
    fn propagate_outs_rewrites_instr_refs() {
        use crate::core::ir::operand::Register;

        let mut prg = Program::new();
        let producer = prg.push_instr(InstrNode::new(
            Opcode::Add,
            Some(Operand::Register(Register::new(1, 0))),
            [None, None, None],
        ));
        let consumer = prg.push_instr(InstrNode::new(
            Opcode::And,
            None,
            [Some(Operand::Instr(producer)), None, None],
        ));

        propagate_outs(&mut prg);

        assert_eq!(
            prg.instr(consumer).ops[0],
            Some(Operand::Register(Register::new(1, 0)))
        );
    }
}
