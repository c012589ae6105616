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

//! Textual dumps and their inverse
//!
//! `instr_text` renders one instruction as `OPCODE out, op1, op2, op3`,
//! the format `Program::dump` writes and `asm` reads back. `dump_py`
//! takes the same IR and renders it as Python-flavored pseudocode
//! instead: it's lossy (every value is treated as a float, multiply
//! timing and side effects on ports are invisible) but far easier to
//! read when checking that a routine computes what it's supposed to.
//!
//! `dump_py` also renders `Bad`/`Uninitialized` operands as-is: values
//! that never went through `deconstruct` and so have no data-flow
//! meaning. `lossy_dump_warnings` (`true` by default, see
//! [`Config`](crate::core::config::Config)) controls whether that's a
//! warning or a hard error.

use std::collections::HashMap;
use std::io::Write;

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::{GlobalId, InstrId, Operand, Register};
use crate::core::ir::{InstrNode, Program};
use crate::core::opcode::Opcode;

fn operand_str(op: Option<&Operand>) -> String {
    match op {
        None => "--".to_string(),
        Some(Operand::Bad) => "??".to_string(),
        Some(Operand::Uninitialized) => "uninit".to_string(),
        Some(Operand::Constant(v)) => format!("={v:08x}"),
        Some(Operand::Register(r)) => r.to_string(),
        Some(Operand::Ring(ring)) => format!("ring{}+{:x}", ring.ring, ring.offset),
        Some(Operand::Global(id)) => format!("global{}", id.0),
        Some(Operand::Instr(id)) => format!("<result of #{}>", id.0),
    }
}

/// Render one instruction as `OPCODE out, op1, op2, op3`.
pub fn instr_text(prg: &Program, id: InstrId) -> String {
    let node = prg.instr(id);
    format!(
        "{:<13} {}, {}, {}, {}",
        node.opcode.name(),
        operand_str(node.out.as_ref()),
        operand_str(node.ops[0].as_ref()),
        operand_str(node.ops[1].as_ref()),
        operand_str(node.ops[2].as_ref()),
    )
}

/// Print every routine's selected instructions in `instr_text` form.
///
/// This is the same text `Program::dump` produces; it's exposed as a
/// standalone pass so it can be wired into the named-pass registry and
/// run from the command line without touching `Program` directly.
pub fn dump(prg: &Program, out: &mut dyn Write) -> std::io::Result<()> {
    prg.dump(out)
}

/// Parse the output of `dump`/`instr_text` back into a `Program`.
///
/// Each `# Routine N` line starts a fresh routine; every other
/// non-blank, non-comment line is `[addr:] OPCODE out, op1, op2, op3`.
pub fn asm(text: &str) -> Result<Program> {
    let mut prg = Program::new();
    let mut rout: Option<crate::core::ir::Routine> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') && !line.contains("Routine") {
            continue;
        }
        if line.contains("Routine") {
            if let Some(r) = rout.take() {
                prg.routines.push(r);
            }
            rout = Some(crate::core::ir::Routine::new());
            continue;
        }

        let body = match line.find(':') {
            Some(pos) => line[pos + 1..].trim(),
            None => line,
        };

        let (mnemonic, trail) = body
            .split_once(' ')
            .ok_or_else(|| CompileError::user(format!("malformed instruction line: {line:?}")))?;

        let opcode = Opcode::from_name(mnemonic.trim())?;
        let fields: Vec<&str> = trail.split(',').map(|s| s.trim()).collect();
        if fields.len() < 4 {
            return Err(CompileError::user(format!(
                "expected 4 operand fields, found {} in {line:?}",
                fields.len()
            )));
        }

        let regs: Vec<Option<Register>> = fields[..4]
            .iter()
            .map(|f| Register::parse(f))
            .collect::<Result<_>>()?;

        let node = InstrNode::new(
            opcode,
            regs[0].map(Operand::Register),
            [
                regs[1].map(Operand::Register),
                regs[2].map(Operand::Register),
                regs[3].map(Operand::Register),
            ],
        );
        let id = prg.push_instr(node);
        rout.get_or_insert_with(crate::core::ir::Routine::new).push(id);
    }

    if let Some(r) = rout {
        prg.routines.push(r);
    }

    Ok(prg)
}

fn format_scientific8(val: f32) -> String {
    let s = format!("{val:.8E}");
    match s.find('E') {
        Some(epos) => {
            let (mantissa, exp) = (&s[..epos], &s[epos + 1..]);
            let exp_num: i32 = exp.parse().unwrap_or(0);
            format!("{mantissa}E{}{:02}", if exp_num >= 0 { "+" } else { "-" }, exp_num.abs())
        }
        None => s,
    }
}

#[derive(Default)]
struct Labeler {
    globals: HashMap<GlobalId, String>,
    instrs: HashMap<InstrId, String>,
    global_cnt: u32,
    inm_cnt: u32,
}

impl Labeler {
    fn global(&mut self, id: GlobalId) -> String {
        if let Some(l) = self.globals.get(&id) {
            return l.clone();
        }
        let l = format!("global{}", self.global_cnt);
        self.global_cnt += 1;
        self.globals.insert(id, l.clone());
        l
    }

    fn instr(&mut self, prg: &Program, id: InstrId) -> String {
        if let Some(l) = self.instrs.get(&id) {
            return l.clone();
        }
        let l = match prg.instr(id).out {
            Some(Operand::Global(gid)) => self.global(gid),
            _ => {
                let l = format!("inm{}", self.inm_cnt);
                self.inm_cnt += 1;
                l
            }
        };
        self.instrs.insert(id, l.clone());
        l
    }

    fn conv(&mut self, prg: &Program, op: Option<&Operand>) -> String {
        match op {
            None => "None".to_string(),
            Some(Operand::Constant(bits)) => {
                format_scientific8(f32::from_be_bytes(bits.to_be_bytes()))
            }
            Some(Operand::Instr(id)) => self.instr(prg, *id),
            Some(Operand::Global(id)) => self.global(*id),
            Some(Operand::Register(r)) => r.to_string(),
            Some(Operand::Ring(r)) => format!("ring{}[{}]", r.ring, r.offset),
            Some(Operand::Uninitialized) => "None  # uninitialized".to_string(),
            Some(Operand::Bad) => "None  # malformed".to_string(),
        }
    }
}

fn is_lossy(op: &Operand) -> bool {
    matches!(op, Operand::Bad | Operand::Uninitialized)
}

/// Count the `Bad`/`Uninitialized` operands among a routine's selected
/// instructions, i.e. values `dump_py` can't render as real data flow.
fn count_lossy_operands(prg: &Program) -> usize {
    let mut n = 0;
    for rout in &prg.routines {
        for slot in &rout.instr {
            let Some(id) = slot else { continue };
            if !rout.is_selected(*id) {
                continue;
            }
            let node = prg.instr(*id);
            n += node.out.iter().filter(|op| is_lossy(op)).count();
            n += node.ops.iter().flatten().filter(|op| is_lossy(op)).count();
        }
    }
    n
}

/// Render the program as Python-flavored pseudocode.
///
/// Every value is emulated as a host float regardless of whether the
/// original computation was fixed-point; multiply-accumulate timing,
/// port side effects and wait lists aren't represented at all. This is
/// a readability aid for checking routine arithmetic, not a faithful
/// emulator.
///
/// `lossy_dump_warnings` controls what happens when a `Bad`/
/// `Uninitialized` operand shows up: `true` logs a warning and renders
/// it anyway (as `None  # malformed`/`None  # uninitialized`), `false`
/// fails the pass instead.
pub fn dump_py(prg: &Program, out: &mut dyn Write, lossy_dump_warnings: bool) -> Result<()> {
    let lossy = count_lossy_operands(prg);
    if lossy > 0 {
        if !lossy_dump_warnings {
            return Err(CompileError::pass(format!(
                "dump_py found {lossy} operand(s) never lowered by deconstruct"
            )));
        }
        log::warn!("dump_py: {lossy} operand(s) were never lowered by deconstruct");
    }
    dump_py_write(prg, out).map_err(|e| CompileError::structural(format!("failed to write dump: {e}")))
}

fn dump_py_write(prg: &Program, out: &mut dyn Write) -> std::io::Result<()> {
    let mut labeler = Labeler::default();
    let mut mentioned_globals: Vec<GlobalId> = Vec::new();

    for (no, rout) in prg.routines.iter().enumerate() {
        writeln!(out, "def rout{no}():")?;
        let mut wrote_any = false;
        for slot in &rout.instr {
            let Some(id) = slot else { continue };
            if !rout.is_selected(*id) {
                continue;
            }
            let node = prg.instr(*id);
            let label = labeler.instr(prg, *id);
            if let Some(Operand::Global(gid)) = node.out {
                if !mentioned_globals.contains(&gid) {
                    mentioned_globals.push(gid);
                }
            }

            let a = labeler.conv(prg, node.ops[0].as_ref());
            let b = labeler.conv(prg, node.ops[1].as_ref());
            let c = labeler.conv(prg, node.ops[2].as_ref());

            let rhs = match node.opcode {
                Opcode::Fadd => format!("{a} + {b}"),
                Opcode::Fsub => format!("{a} - {b}"),
                Opcode::FaddDiv2 => format!("({a} + {b}) / 2"),
                Opcode::FsubDiv2 => format!("({a} - {b}) / 2"),
                Opcode::Fmult => format!("{a} * {b}"),
                Opcode::Fmultacc => format!("{c} + {a} * {b}"),
                Opcode::FmultNeg => format!("-({a} * {b})"),
                Opcode::FmultaccNeg => format!("{c} - {a} * {b}"),
                Opcode::Fmultsub => format!("{c} - {a} * {b}"),
                Opcode::Fmux => format!("{b} if {a} else {c}"),
                Opcode::Add => format!("{a} + {b}"),
                Opcode::Sub => format!("{a} - {b}"),
                Opcode::And => format!("{a} & {b}"),
                Opcode::Or => format!("{a} | {b}"),
                Opcode::Xor => format!("{a} ^ {b}"),
                Opcode::Max => format!("max({a}, {b})"),
                Opcode::Min => format!("min({a}, {b})"),
                Opcode::Mux => format!("{b} if {a} else {c}"),
                _ => format!("{}({a}, {b}, {c})", node.opcode.name()),
            };

            writeln!(out, "    {label} = {rhs}")?;
            wrote_any = true;
        }
        if !wrote_any {
            writeln!(out, "    pass")?;
        }
        writeln!(out)?;
    }

    for gid in mentioned_globals {
        let cases = &prg.global(gid).cases;
        if let Some(Operand::Constant(bits)) = cases.first() {
            let label = labeler.global(gid);
            writeln!(
                out,
                "{label} = {}",
                format_scientific8(f32::from_be_bytes(bits.to_be_bytes()))
            )?;
        }
    }

    Ok(())
}
