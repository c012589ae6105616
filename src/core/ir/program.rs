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

//! Programs
//!
//! A `Program` owns every instruction and global in an arena and ties
//! them together into routines. `from_image`/`build_image` are the
//! only two places that talk to the image codec directly; every pass
//! operates purely on the in-memory IR.

use std::collections::{BTreeMap, HashSet};

use crate::core::error::{CompileError, Result};
use crate::core::image::{Image, SectionFlags, SectionType};
use crate::core::ir::operand::{GlobalId, InstrId, Operand, Register};
use crate::core::ir::routine::Routine;
use crate::core::opcode::{GeneralInstr, Opcode};

#[derive(Debug, Clone)]
pub struct InstrNode {
    pub opcode: Opcode,
    pub out: Option<Operand>,
    pub ops: [Option<Operand>; 3],
    /// `file:line` of the DSL call site that created this instruction.
    pub src: Option<String>,
}

impl InstrNode {
    pub fn new(opcode: Opcode, out: Option<Operand>, ops: [Option<Operand>; 3]) -> Self {
        InstrNode {
            opcode,
            out,
            ops,
            src: None,
        }
    }

    pub fn has_side_effects(&self) -> bool {
        self.opcode.has_side_effects()
    }

    pub fn deps(&self) -> impl Iterator<Item = &Operand> {
        self.ops.iter().filter_map(|o| o.as_ref())
    }

    fn decode(words: [u32; 4]) -> Result<Self> {
        let fields = GeneralInstr::from_word(words[0]);
        let opcode = Opcode::from_number(fields.opcode_number())?;
        let opspecs = [words[1], words[2], words[3]];
        let banks = [fields.op1_bank, fields.op2_bank, fields.op3_bank];

        let resolve = |bank: u32| -> Option<Operand> {
            if bank == 0 {
                None
            } else {
                Some(Operand::Register(Register::new(bank as u8, opspecs[(bank - 1) as usize])))
            }
        };

        let out = if fields.out_bank != 0 {
            Some(Operand::Register(Register::new(fields.out_bank as u8, fields.out_addr)))
        } else {
            None
        };

        Ok(InstrNode {
            opcode,
            out,
            ops: [resolve(banks[0]), resolve(banks[1]), resolve(banks[2])],
            src: None,
        })
    }

    fn encode(&self) -> Result<[u32; 4]> {
        let mut opspecs: [Option<u32>; 3] = [None; 3];
        let mut opbanks: [u32; 3] = [0; 3];

        for (i, op) in self.ops.iter().enumerate() {
            let reg = match op {
                None => continue,
                Some(Operand::Register(r)) => *r,
                Some(_) => {
                    return Err(CompileError::structural(
                        "instruction has a non-register operand at emission time".to_string(),
                    ))
                }
            };
            let slot = (reg.bank - 1) as usize;
            if let Some(existing) = opspecs[slot] {
                if existing != reg.addr {
                    return Err(CompileError::structural(format!(
                        "bank {} carries conflicting addresses {existing:#x} and {:#x}",
                        reg.bank, reg.addr
                    )));
                }
            }
            opspecs[slot] = Some(reg.addr);
            opbanks[i] = reg.bank as u32;
        }

        let (out_bank, out_addr) = match &self.out {
            Some(Operand::Register(r)) => (r.bank as u32, r.addr),
            Some(_) => {
                return Err(CompileError::structural(
                    "instruction has a non-register output at emission time".to_string(),
                ))
            }
            None => (0, 0),
        };

        let n = self.opcode.number();
        let gi = GeneralInstr {
            out_addr,
            opcode2: (n >> 8) & 0b11,
            out_bank,
            op3_bank: opbanks[2],
            op2_bank: opbanks[1],
            op1_bank: opbanks[0],
            opcode1: n & 0xff,
        };

        Ok([
            gi.to_word(),
            opspecs[0].unwrap_or(0),
            opspecs[1].unwrap_or(0),
            opspecs[2].unwrap_or(0),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalNode {
    pub cases: Vec<Operand>,
    pub out: Option<Register>,
}

impl GlobalNode {
    pub fn deps(&self) -> impl Iterator<Item = &Operand> {
        self.cases.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub(crate) instrs: Vec<InstrNode>,
    pub(crate) globals: Vec<GlobalNode>,
    pub register_inits: BTreeMap<Register, u32>,
    pub register_specials: HashSet<Register>,
    pub register_allocated: HashSet<Register>,
    pub routines: Vec<Routine>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn push_instr(&mut self, node: InstrNode) -> InstrId {
        self.instrs.push(node);
        InstrId((self.instrs.len() - 1) as u32)
    }

    pub fn push_global(&mut self, node: GlobalNode) -> GlobalId {
        self.globals.push(node);
        GlobalId((self.globals.len() - 1) as u32)
    }

    pub fn instr(&self, id: InstrId) -> &InstrNode {
        &self.instrs[id.0 as usize]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut InstrNode {
        &mut self.instrs[id.0 as usize]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalNode {
        &self.globals[id.0 as usize]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut GlobalNode {
        &mut self.globals[id.0 as usize]
    }

    pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> {
        (0..self.instrs.len() as u32).map(InstrId)
    }

    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> {
        (0..self.globals.len() as u32).map(GlobalId)
    }

    pub fn from_image(img: &Image) -> Result<Self> {
        let mut prg = Program::new();

        for span in img.routine_spans() {
            let i0 = img.get_range(SectionType::Inst0, span.clone())?;
            let i1 = img.get_range(SectionType::Inst1, span.clone())?;
            let i2 = img.get_range(SectionType::Inst2, span.clone())?;
            let i3 = img.get_range(SectionType::Inst3, span.clone())?;

            let mut rout = Routine::new();
            rout.base = Some(span.start);
            for k in 0..i0.len() {
                let node = InstrNode::decode([i0[k], i1[k], i2[k], i3[k]])?;
                let id = prg.push_instr(node);
                rout.push(id);
            }

            let waitbase = span.start << 16;
            rout.waitfull_ports = img.get_tail(SectionType::WaitFullList, waitbase);
            rout.waitempty_ports = img.get_tail(SectionType::WaitEmptyList, waitbase);

            prg.routines.push(rout);
        }

        for (ty, bank) in [
            (SectionType::State1, 1u8),
            (SectionType::State2, 2u8),
            (SectionType::State3, 3u8),
        ] {
            for (span, _) in img.section_spans(ty) {
                let words = img.get_range(ty, span.clone())?;
                for (offset, val) in words.into_iter().enumerate() {
                    let reg = Register::new(bank, span.start + offset as u32);
                    prg.register_inits.insert(reg, val);
                }
            }
        }

        Ok(prg)
    }

    pub fn build_image(&self) -> Result<Image> {
        let mut img = Image::new();

        for (ty, bank) in [
            (SectionType::State1, 1u8),
            (SectionType::State2, 2u8),
            (SectionType::State3, 3u8),
        ] {
            let inits: BTreeMap<u32, u32> = self
                .register_inits
                .iter()
                .filter(|(reg, _)| reg.bank == bank)
                .map(|(reg, val)| (reg.addr, *val))
                .collect();
            if inits.is_empty() {
                continue;
            }
            let base = *inits.keys().next().unwrap();
            let end = *inits.keys().last().unwrap() + 1;
            img.reserve(ty, base..end, SectionFlags::empty());
            for (addr, val) in &inits {
                img.set(ty, *addr, *val)?;
            }
        }

        for rout in &self.routines {
            let base = rout
                .base
                .ok_or_else(|| CompileError::structural("routine has no assigned base".to_string()))?;
            let span = base..base + rout.instr.len() as u32;

            for ty in [
                SectionType::Inst0,
                SectionType::Inst1,
                SectionType::Inst2,
                SectionType::Inst3,
            ] {
                img.reserve(ty, span.clone(), SectionFlags::ROUTINE);
            }

            for (off, slot) in rout.instr.iter().enumerate() {
                let id = slot.ok_or_else(|| {
                    CompileError::structural(format!(
                        "routine at base {base:#x} has an unfilled instruction slot at offset {off:#x}"
                    ))
                })?;
                let words = self.instr(id).encode()?;
                let idx = base + off as u32;
                img.set(SectionType::Inst0, idx, words[0])?;
                img.set(SectionType::Inst1, idx, words[1])?;
                img.set(SectionType::Inst2, idx, words[2])?;
                img.set(SectionType::Inst3, idx, words[3])?;
            }

            let waitbase = base << 16;

            if !rout.waitempty_ports.is_empty() {
                let mut ports = rout.waitempty_ports.clone();
                ports.sort_unstable();
                img.reserve(
                    SectionType::WaitEmptyList,
                    waitbase..waitbase + ports.len() as u32,
                    SectionFlags::empty(),
                );
                img.set_range(SectionType::WaitEmptyList, waitbase, &ports)?;
            }

            if !rout.waitfull_ports.is_empty() {
                let mut ports = rout.waitfull_ports.clone();
                ports.sort_unstable();
                img.reserve(
                    SectionType::WaitFullList,
                    waitbase..waitbase + ports.len() as u32,
                    SectionFlags::empty(),
                );
                img.set_range(SectionType::WaitFullList, waitbase, &ports)?;
            }
        }

        Ok(img)
    }

    pub fn dump(&self, f: &mut dyn std::io::Write) -> std::io::Result<()> {
        for (no, rout) in self.routines.iter().enumerate() {
            writeln!(f, "     # Routine {no}")?;
            for (off, slot) in rout.instr.iter().enumerate() {
                let Some(id) = slot else { continue };
                if !rout.is_selected(*id) {
                    continue;
                }
                let text = crate::core::passes::dump::instr_text(self, *id);
                if let Some(base) = rout.base {
                    writeln!(f, "{:03x}: {text}", base + off as u32)?;
                } else {
                    writeln!(f, "+{off:02x}: {text}")?;
                }
            }
        }
        Ok(())
    }
}
