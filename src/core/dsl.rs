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

//! DSL builder façade
//!
//! `Builder` is the only thing a front-end script touches to populate a
//! [`Program`]: it owns the `Program` under construction, tracks which
//! routine is "current", and exposes one method per opcode plus a
//! handful of IR-shaping helpers (`global`, `update`, `special`). The
//! front-end script itself — whatever free-form Rust or embedded DSL
//! calls into this façade — is out of scope; only this surface is.
//!
//! Most opcodes take their operands positionally in slot order. A
//! handful route the caller's arguments onto a different hardware slot
//! so callers don't have to pass `None` placeholders to reach the slot
//! that matters (`TAKE`'s only argument lands in slot 3, not slot 1);
//! [`operand_sieve`] is that mapping, lifted unchanged from the
//! front-end's `OPERAND_SIEVE` table.

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::{GlobalId, InstrId, Operand, Register};
use crate::core::ir::program::GlobalNode;
use crate::core::ir::{InstrNode, Program, Routine};
use crate::core::opcode::Opcode;

/// One positional argument to an opcode call: either a value already in
/// the IR (another instruction's result, a global, a pinned register)
/// or a literal that gets wrapped as a [`Operand::Constant`].
#[derive(Debug, Clone)]
pub enum Arg {
    Operand(Operand),
    Int(i64),
    Float(f64),
}

impl From<Operand> for Arg {
    fn from(op: Operand) -> Self {
        Arg::Operand(op)
    }
}

impl From<InstrId> for Arg {
    fn from(id: InstrId) -> Self {
        Arg::Operand(Operand::Instr(id))
    }
}

impl From<GlobalId> for Arg {
    fn from(id: GlobalId) -> Self {
        Arg::Operand(Operand::Global(id))
    }
}

impl From<Register> for Arg {
    fn from(reg: Register) -> Self {
        Arg::Operand(Operand::Register(reg))
    }
}

macro_rules! int_arg {
    ($t:ty) => {
        impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(v as i64)
            }
        }
    };
}
int_arg!(i32);
int_arg!(i64);
int_arg!(u32);
int_arg!(u64);
int_arg!(usize);

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v as f64)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

fn assimilate(arg: &Arg) -> Operand {
    match arg {
        Arg::Operand(op) => op.clone(),
        Arg::Int(v) => Operand::Constant(*v as u32),
        Arg::Float(v) => Operand::from_float(*v as f32),
    }
}

/// Per-opcode operand-slot sieve: `Some([alive1, alive2, alive3])` maps
/// the caller's positional arguments onto the hardware slots marked
/// `true`, in order, leaving the rest `None`. Opcodes absent from this
/// table take their arguments positionally, slot 1 first.
fn operand_sieve(opcode: Opcode) -> Option<[bool; 3]> {
    use Opcode::*;
    Some(match opcode {
        Take => [false, false, true],
        Takec => [false, true, true],
        Peek => [false, false, true],
        Put => [true, false, true],
        Putc => [true, true, true],
        Update => [true, false, true],
        F32Fmt => [false, true, true],
        Fmult => [false, true, true],
        FmultNeg => [false, true, true],
        Mult0 => [false, true, true],
        _ => return None,
    })
}

/// Populates a [`Program`] from DSL calls. Owns the `Program` under
/// construction; `into_program`/`prg` hand it back once the script is
/// done.
pub struct Builder {
    prg: Program,
    curr_rout: Option<usize>,
}

impl Builder {
    pub fn new(prg: Program) -> Self {
        Builder { prg, curr_rout: None }
    }

    pub fn prg(&self) -> &Program {
        &self.prg
    }

    pub fn prg_mut(&mut self) -> &mut Program {
        &mut self.prg
    }

    pub fn into_program(self) -> Program {
        self.prg
    }

    /// Run `body` with a freshly-appended routine as the current one,
    /// the Rust stand-in for the front-end's `with b.Routine(...) as r:`
    /// block. Every opcode call `body` makes lands in this routine;
    /// once `body` returns, the previous current routine (if any) is
    /// restored.
    pub fn routine<F>(&mut self, waitfull_ports: Vec<u32>, waitempty_ports: Vec<u32>, body: F) -> Result<()>
    where
        F: FnOnce(&mut Builder) -> Result<()>,
    {
        let mut rout = Routine::new();
        rout.waitfull_ports = waitfull_ports;
        rout.waitempty_ports = waitempty_ports;
        self.prg.routines.push(rout);
        let idx = self.prg.routines.len() - 1;

        let prev = self.curr_rout.replace(idx);
        let result = body(self);
        self.curr_rout = prev;
        result
    }

    /// Pin `reg` as hardware-special, exempting it from deconstruction.
    pub fn special(&mut self, reg: Register) {
        self.prg.register_specials.insert(reg);
    }

    /// Allocate a fresh abstract multi-writer location with no cases yet.
    pub fn global(&mut self) -> GlobalId {
        self.prg.push_global(GlobalNode::default())
    }

    /// Record a new definition site for `glob`. By convention the value
    /// is wrapped in an identity `OR` so placement's "global
    /// update-after-use" ordering treats it as a definition site rather
    /// than a bare pass-through read.
    pub fn update(&mut self, glob: GlobalId, val: impl Into<Arg>) -> Result<()> {
        let arg: Arg = val.into();
        let id = self.call(Opcode::Or, &[arg.clone(), arg])?;
        self.prg.global_mut(glob).cases.push(Operand::Instr(id));
        Ok(())
    }

    /// Append an instruction for `opcode` in the current routine,
    /// applying `opcode`'s operand sieve (if any) to `args`.
    pub fn call(&mut self, opcode: Opcode, args: &[Arg]) -> Result<InstrId> {
        let routidx = self
            .curr_rout
            .ok_or_else(|| CompileError::user("no current routine: call this inside Builder::routine".to_string()))?;

        let mut user_ops = args.iter().map(assimilate);
        let ops: [Option<Operand>; 3] = match operand_sieve(opcode) {
            Some(sieve) => {
                let mut out: [Option<Operand>; 3] = [None, None, None];
                for (slot, alive) in out.iter_mut().zip(sieve.iter()) {
                    if *alive {
                        *slot = user_ops.next();
                    }
                }
                out
            }
            None => {
                let mut out: [Option<Operand>; 3] = [None, None, None];
                for slot in out.iter_mut() {
                    *slot = user_ops.next();
                }
                out
            }
        };

        let node = InstrNode::new(opcode, None, ops);
        let id = self.prg.push_instr(node);
        self.prg.routines[routidx].push(id);
        Ok(id)
    }

    pub fn take(&mut self, port: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Take, &[port.into()])
    }

    pub fn takec(&mut self, cond: impl Into<Arg>, port: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Takec, &[cond.into(), port.into()])
    }

    pub fn peek(&mut self, port: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Peek, &[port.into()])
    }

    pub fn put(&mut self, port: impl Into<Arg>, val: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Put, &[port.into(), val.into()])
    }

    pub fn putc(&mut self, port: impl Into<Arg>, cond: impl Into<Arg>, val: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Putc, &[port.into(), cond.into(), val.into()])
    }

    pub fn update_port(&mut self, port: impl Into<Arg>, val: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Update, &[port.into(), val.into()])
    }

    pub fn fmult(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Fmult, &[a.into(), b.into()])
    }

    pub fn fmult_neg(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::FmultNeg, &[a.into(), b.into()])
    }

    pub fn f32_fmt(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::F32Fmt, &[a.into(), b.into()])
    }

    pub fn mult0(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Mult0, &[a.into(), b.into()])
    }

    pub fn add(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Add, &[a.into(), b.into()])
    }

    pub fn sub(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Sub, &[a.into(), b.into()])
    }

    pub fn and(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::And, &[a.into(), b.into()])
    }

    pub fn or(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Or, &[a.into(), b.into()])
    }

    pub fn fadd(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Fadd, &[a.into(), b.into()])
    }

    pub fn fsub(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Fsub, &[a.into(), b.into()])
    }

    pub fn fmultacc(&mut self, a: impl Into<Arg>, b: impl Into<Arg>, c: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Fmultacc, &[a.into(), b.into(), c.into()])
    }

    pub fn fmultsub(&mut self, a: impl Into<Arg>, b: impl Into<Arg>, c: impl Into<Arg>) -> Result<InstrId> {
        self.call(Opcode::Fmultsub, &[a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_sieves_its_argument_into_slot_three() {
        let mut b = Builder::new(Program::new());
        b.routine(vec![], vec![], |b| {
            b.take(3i64)?;
            Ok(())
        })
        .unwrap();

        let id = b.prg().routines[0].instr[0].unwrap();
        let node = b.prg().instr(id);
        assert_eq!(node.ops[0], None);
        assert_eq!(node.ops[1], None);
        assert_eq!(node.ops[2], Some(Operand::Constant(3)));
    }

    #[test]
    fn put_sieves_into_slots_one_and_three() {
        let mut b = Builder::new(Program::new());
        b.routine(vec![], vec![], |b| {
            b.put(5i64, 9i64)?;
            Ok(())
        })
        .unwrap();

        let id = b.prg().routines[0].instr[0].unwrap();
        let node = b.prg().instr(id);
        assert_eq!(node.ops[0], Some(Operand::Constant(5)));
        assert_eq!(node.ops[1], None);
        assert_eq!(node.ops[2], Some(Operand::Constant(9)));
    }

    #[test]
    fn unsieved_opcode_takes_args_positionally() {
        let mut b = Builder::new(Program::new());
        b.routine(vec![], vec![], |b| {
            b.add(1i64, 2i64)?;
            Ok(())
        })
        .unwrap();

        let id = b.prg().routines[0].instr[0].unwrap();
        let node = b.prg().instr(id);
        assert_eq!(node.ops[0], Some(Operand::Constant(1)));
        assert_eq!(node.ops[1], Some(Operand::Constant(2)));
        assert_eq!(node.ops[2], None);
    }

    #[test]
    fn call_outside_routine_is_a_user_error() {
        let mut b = Builder::new(Program::new());
        assert!(b.add(1i64, 2i64).is_err());
    }

    #[test]
    fn update_appends_an_or_case_to_the_global() {
        let mut b = Builder::new(Program::new());
        let g = b.global();
        b.routine(vec![], vec![], |b| {
            b.update(g, 7i64)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(b.prg().global(g).cases.len(), 1);
        let case = &b.prg().global(g).cases[0];
        let Operand::Instr(id) = case else { panic!("expected instr case") };
        let node = b.prg().instr(*id);
        assert_eq!(node.opcode, Opcode::Or);
        assert_eq!(node.ops[0], Some(Operand::Constant(7)));
        assert_eq!(node.ops[1], Some(Operand::Constant(7)));
    }

    #[test]
    fn float_constant_round_trips_through_assimilate() {
        let mut b = Builder::new(Program::new());
        b.routine(vec![], vec![], |b| {
            b.fadd(1.5f32, 2.0f32)?;
            Ok(())
        })
        .unwrap();

        let id = b.prg().routines[0].instr[0].unwrap();
        let node = b.prg().instr(id);
        assert_eq!(node.ops[0].as_ref().unwrap().as_float(), Some(1.5));
        assert_eq!(node.ops[1].as_ref().unwrap().as_float(), Some(2.0));
    }
}
