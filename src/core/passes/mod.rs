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

//! Compiler passes
//!
//! Each submodule is one stage of the pipeline a program walks through
//! between `Program::from_image` and `Program::build_image`:
//! deconstruction turns raw registers back into data-flow references,
//! selection/register bookkeeping narrows or resets state, placement
//! schedules instructions within a routine, register allocation assigns
//! banks, `set_nops`/`propagate_outs` finish the job, and `layout`/`emit`
//! turn the result back into an `Image`. `dump` is the odd one out: a
//! read-only view used for debugging, not part of the lowering chain.
//!
//! [`PASSES`] is the same pipeline addressed by name, for callers (the
//! CLI, scripts) that pick passes at runtime instead of calling Rust
//! functions directly.

pub mod deconstruct;
pub mod dump;
pub mod emit;
pub mod layout;
pub mod nops;
pub mod placement;
pub mod regalloc;
pub mod selection;

pub use deconstruct::{deconstruct, deconstruct_regrings, deconstruct_simpleregs};
pub use dump::{asm, dump_py, instr_text};
pub use emit::{build, image_bytes, image_hexdump, image_to_writer};
pub use layout::{arrange_routines, arrange_routines_with_gap};
pub use nops::{propagate_outs, set_nops};
pub use placement::{check_placement, get_placement_constraints, place, place_routine, Constraint};
pub use regalloc::{regalloc_const, regalloc_intermediate, RegAllocator};
pub use selection::{add_regring, clear_outs, select, select_none, special_reg, unselect, wipe_inits};

use crate::core::error::{CompileError, Result};
use crate::core::ir::operand::Register;
use crate::core::ir::Program;

/// A parsed CLI/script pass argument. Stands in for the handful of
/// literal shapes a `-p` pass invocation can pass: a bank/address pair
/// for register arguments, plain integers, and the occasional string.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    fn as_i64(&self) -> Result<i64> {
        match self {
            Literal::Int(v) => Ok(*v),
            other => Err(CompileError::user(format!("expected an integer argument, found {other:?}"))),
        }
    }

    fn as_usize(&self) -> Result<usize> {
        let v = self.as_i64()?;
        usize::try_from(v).map_err(|_| CompileError::user(format!("argument out of range: {v}")))
    }

    fn as_str(&self) -> Result<&str> {
        match self {
            Literal::Str(s) => Ok(s),
            other => Err(CompileError::user(format!("expected a string argument, found {other:?}"))),
        }
    }
}

fn arg_count(args: &[Literal], n: usize, name: &str) -> Result<()> {
    if args.len() != n {
        return Err(CompileError::user(format!(
            "{name} takes {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn opt_routidx(args: &[Literal]) -> Result<Option<usize>> {
    match args {
        [] => Ok(None),
        [one] => Ok(Some(one.as_usize()?)),
        _ => Err(CompileError::user("expected zero or one routine index argument".to_string())),
    }
}

/// One named entry in the pass registry: `name` is what a `-p`/script
/// invocation types, `doc` is shown by `--list-passes`, `run` adapts
/// the parsed literal arguments to the pass's real signature.
pub struct PassDef {
    pub name: &'static str,
    pub doc: &'static str,
    pub run: fn(&mut Program, &[Literal]) -> Result<()>,
}

pub static PASSES: &[PassDef] = &[
    PassDef {
        name: "deconstruct_regrings",
        doc: "rewrite register-ring operands into Ring references",
        run: |prg, args| {
            arg_count(args, 0, "deconstruct_regrings")?;
            deconstruct_regrings(prg)
        },
    },
    PassDef {
        name: "deconstruct_simpleregs",
        doc: "rewrite plain register operands into Instr/Global/Constant references",
        run: |prg, args| {
            arg_count(args, 0, "deconstruct_simpleregs")?;
            deconstruct_simpleregs(prg)
        },
    },
    PassDef {
        name: "deconstruct",
        doc: "run deconstruct_regrings then deconstruct_simpleregs",
        run: |prg, args| {
            arg_count(args, 0, "deconstruct")?;
            deconstruct(prg)
        },
    },
    PassDef {
        name: "special_reg",
        doc: "mark a register as hardware-special, exempt from deconstruction",
        run: run_special_reg,
    },
    PassDef {
        name: "add_regring",
        doc: "attach a register ring to a routine: routidx, base, depth, width",
        run: run_add_regring,
    },
    PassDef {
        name: "select",
        doc: "select the fan-in of routine[instrpos] for dump/graph passes",
        run: |prg, args| {
            arg_count(args, 2, "select")?;
            select(prg, args[0].as_usize()?, args[1].as_usize()?)
        },
    },
    PassDef {
        name: "select_none",
        doc: "select nothing in a routine",
        run: |prg, args| {
            arg_count(args, 1, "select_none")?;
            select_none(prg, args[0].as_usize()?)
        },
    },
    PassDef {
        name: "unselect",
        doc: "clear selection (all routines, or one if given an index)",
        run: |prg, args| unselect(prg, opt_routidx(args)?),
    },
    PassDef {
        name: "clear_outs",
        doc: "drop instruction output assignments, keeping only global references",
        run: |prg, args| {
            arg_count(args, 0, "clear_outs")?;
            clear_outs(prg);
            Ok(())
        },
    },
    PassDef {
        name: "wipe_inits",
        doc: "forget every register's initial value",
        run: |prg, args| {
            arg_count(args, 0, "wipe_inits")?;
            wipe_inits(prg);
            Ok(())
        },
    },
    PassDef {
        name: "place",
        doc: "schedule every routine's instructions",
        run: |prg, args| {
            arg_count(args, 0, "place")?;
            place(prg)
        },
    },
    PassDef {
        name: "place_routine",
        doc: "schedule one routine's instructions",
        run: |prg, args| {
            arg_count(args, 1, "place_routine")?;
            place_routine(prg, args[0].as_usize()?)
        },
    },
    PassDef {
        name: "regalloc_intermediate",
        doc: "assign banks to intermediate values (all routines, or one if given an index)",
        run: |prg, args| regalloc_intermediate(prg, opt_routidx(args)?),
    },
    PassDef {
        name: "regalloc_const",
        doc: "assign banks to constant operands (all routines, or one if given an index)",
        run: |prg, args| regalloc_const(prg, opt_routidx(args)?),
    },
    PassDef {
        name: "set_nops",
        doc: "fill unfilled instruction slots with AND no-ops",
        run: |prg, args| {
            arg_count(args, 0, "set_nops")?;
            set_nops(prg);
            Ok(())
        },
    },
    PassDef {
        name: "propagate_outs",
        doc: "rewrite abstract operand references into their assigned registers",
        run: |prg, args| {
            arg_count(args, 0, "propagate_outs")?;
            propagate_outs(prg);
            Ok(())
        },
    },
    PassDef {
        name: "arrange_routines",
        doc: "assign every routine a non-overlapping base address; takes an optional gap (default 1)",
        run: |prg, args| {
            let gap = match args {
                [] => 1,
                [one] => one.as_i64()? as u32,
                _ => return Err(CompileError::user("arrange_routines takes zero or one gap argument".to_string())),
            };
            arrange_routines_with_gap(prg, gap);
            Ok(())
        },
    },
    PassDef {
        name: "dump",
        doc: "print each routine's selected instructions to stdout",
        run: |prg, args| {
            arg_count(args, 0, "dump")?;
            dump::dump(prg, &mut std::io::stdout())
                .map_err(|e| CompileError::structural(format!("failed to write dump: {e}")))
        },
    },
    PassDef {
        name: "dump_py",
        doc: "print each routine as lossy Python-style pseudocode to stdout; takes an optional 0/1 warn-don't-fail flag (default 1)",
        run: |prg, args| {
            let lossy_dump_warnings = match args {
                [] => true,
                [one] => one.as_i64()? != 0,
                _ => return Err(CompileError::user("dump_py takes zero or one flag argument".to_string())),
            };
            dump_py(prg, &mut std::io::stdout(), lossy_dump_warnings)
        },
    },
    PassDef {
        name: "image",
        doc: "build a program image and write it to stdout",
        run: |prg, args| {
            arg_count(args, 0, "image")?;
            image_to_writer(prg, &mut std::io::stdout())
        },
    },
    PassDef {
        name: "image_hexdump",
        doc: "build a program image and print its hexdump to stdout",
        run: |prg, args| {
            arg_count(args, 0, "image_hexdump")?;
            println!("{}", image_hexdump(prg)?);
            Ok(())
        },
    },
];

/// Look up a pass by name, accepting an unambiguous prefix the way the
/// CLI's `-p` flag does.
pub fn lookup_pass(name: &str) -> Result<&'static PassDef> {
    if let Some(exact) = PASSES.iter().find(|p| p.name == name) {
        return Ok(exact);
    }
    let mut matches: Vec<&PassDef> = PASSES.iter().filter(|p| p.name.starts_with(name)).collect();
    match matches.len() {
        0 => Err(CompileError::user(format!("no pass matches {name:?}"))),
        1 => Ok(matches.remove(0)),
        _ => {
            let names: Vec<&str> = matches.iter().map(|p| p.name).collect();
            Err(CompileError::user(format!(
                "{name:?} matches more than one pass: {}",
                names.join(", ")
            )))
        }
    }
}

fn register_from_literal(lit: &Literal) -> Result<Register> {
    Register::parse(lit.as_str()?)?.ok_or_else(|| CompileError::user("register argument cannot be --".to_string()))
}

/// Helper for scripted `special_reg`/`add_regring` invocations, which
/// take a register name rather than a plain integer.
pub fn run_special_reg(prg: &mut Program, args: &[Literal]) -> Result<()> {
    arg_count(args, 1, "special_reg")?;
    let reg = register_from_literal(&args[0])?;
    special_reg(prg, reg);
    Ok(())
}

/// Helper for scripted `add_regring` invocations: `routidx, base, depth, width`.
pub fn run_add_regring(prg: &mut Program, args: &[Literal]) -> Result<()> {
    arg_count(args, 4, "add_regring")?;
    let routidx = args[0].as_usize()?;
    let base = register_from_literal(&args[1])?;
    let depth = args[2].as_i64()? as u32;
    let width = args[3].as_i64()? as u32;
    add_regring(prg, routidx, base, depth, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_pass_matches_exact_name() {
        let p = lookup_pass("set_nops").unwrap();
        assert_eq!(p.name, "set_nops");
    }

    #[test]
    fn lookup_pass_matches_unambiguous_prefix() {
        let p = lookup_pass("arrange").unwrap();
        assert_eq!(p.name, "arrange_routines");
    }

    #[test]
    fn lookup_pass_rejects_ambiguous_prefix() {
        assert!(lookup_pass("regalloc_").is_err());
    }

    #[test]
    fn lookup_pass_rejects_unknown_name() {
        assert!(lookup_pass("not_a_real_pass").is_err());
    }

    #[test]
    fn run_set_nops_via_registry() {
        use crate::core::ir::Routine;

        let mut prg = Program::new();
        let mut rout = Routine::new();
        rout.instr = vec![None];
        prg.routines.push(rout);

        let pass = lookup_pass("set_nops").unwrap();
        (pass.run)(&mut prg, &[]).unwrap();
        assert!(prg.routines[0].instr[0].is_some());
    }

    #[test]
    fn run_arrange_routines_via_registry_honors_an_explicit_gap() {
        use crate::core::ir::{InstrNode, Routine};
        use crate::core::opcode::Opcode;

        let mut prg = Program::new();
        for _ in 0..2 {
            let id = prg.push_instr(InstrNode::new(Opcode::And, None, [None, None, None]));
            let mut rout = Routine::new();
            rout.push(id);
            prg.routines.push(rout);
        }

        let pass = lookup_pass("arrange_routines").unwrap();
        (pass.run)(&mut prg, &[Literal::Int(4)]).unwrap();

        assert_eq!(prg.routines[0].base, Some(0));
        assert_eq!(prg.routines[1].base, Some(5));
    }

    #[test]
    fn run_dump_py_via_registry_fails_on_bad_operand_when_asked() {
        use crate::core::ir::operand::Operand;
        use crate::core::ir::{InstrNode, Routine};
        use crate::core::opcode::Opcode;

        let mut prg = Program::new();
        let id = prg.push_instr(InstrNode::new(Opcode::Fadd, None, [Some(Operand::Bad), None, None]));
        let mut rout = Routine::new();
        rout.push(id);
        prg.routines.push(rout);

        let pass = lookup_pass("dump_py").unwrap();
        assert!((pass.run)(&mut prg, &[Literal::Int(0)]).is_err());
    }

    #[test]
    fn run_image_via_registry() {
        let prg = Program::new();
        let pass = lookup_pass("image").unwrap();
        (pass.run)(&mut prg.clone(), &[]).unwrap();
    }

    #[test]
    fn run_image_hexdump_via_registry() {
        let prg = Program::new();
        let pass = lookup_pass("image_hexdump").unwrap();
        (pass.run)(&mut prg.clone(), &[]).unwrap();
    }
}
