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

//! End-to-end pipeline tests: DSL construction through image bytes on
//! disk and back, exercising every stage a real `leapc` invocation runs.

use leapc::core::dsl::Builder;
use leapc::core::image::Image;
use leapc::core::ir::Program;
use leapc::core::opcode::Opcode;
use leapc::core::passes;

fn build_sample() -> Program {
    let mut b = Builder::new(Program::new());
    b.routine(vec![0], vec![1], |b| {
        let x = b.take(0i64)?;
        let y = b.fmult(x, 2.0f32)?;
        let z = b.fmultacc(y, 3.0f32, x)?;
        b.put(1i64, z)?;
        Ok(())
    })
    .unwrap();
    b.into_program()
}

fn lower(prg: &mut Program) {
    passes::deconstruct(prg).unwrap();
    passes::place(prg).unwrap();
    passes::regalloc_intermediate(prg, None).unwrap();
    passes::regalloc_const(prg, None).unwrap();
    passes::set_nops(prg);
    passes::propagate_outs(prg);
    passes::arrange_routines(prg);
}

#[test]
fn full_pipeline_survives_an_image_round_trip_through_disk() {
    let mut prg = build_sample();
    lower(&mut prg);

    let img = passes::build(&prg).unwrap();
    let bytes = img.to_bytes();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routine.limg");
    std::fs::write(&path, &bytes).unwrap();

    let read_back = std::fs::read(&path).unwrap();
    let img2 = Image::read(&read_back).unwrap();
    let back = Program::from_image(&img2).unwrap();

    assert_eq!(back.routines.len(), 1);
    assert_eq!(back.routines[0].instr.len(), prg.routines[0].instr.len());

    let opcodes: Vec<Opcode> = back.routines[0]
        .instr
        .iter()
        .map(|slot| back.instr(slot.unwrap()).opcode)
        .collect();
    assert!(opcodes.contains(&Opcode::Fmult));
    assert!(opcodes.contains(&Opcode::Fmultacc));
    assert!(opcodes.contains(&Opcode::Take));
    assert!(opcodes.contains(&Opcode::Put));
}

#[test]
fn fmultacc_bubble_survives_the_full_pipeline() {
    let mut prg = build_sample();
    lower(&mut prg);

    let rout = &prg.routines[0];
    let fmult_pos = rout
        .instr
        .iter()
        .position(|s| s.is_some() && prg.instr(s.unwrap()).opcode == Opcode::Fmult)
        .unwrap();
    let fmultacc_pos = rout
        .instr
        .iter()
        .position(|s| s.is_some() && prg.instr(s.unwrap()).opcode == Opcode::Fmultacc)
        .unwrap();
    assert!(fmultacc_pos > fmult_pos + 1, "no latency bubble after placement+nops");
}

#[test]
fn side_effects_stay_in_program_order_end_to_end() {
    let mut b = Builder::new(Program::new());
    b.routine(vec![], vec![], |b| {
        b.put(0i64, 1i64)?;
        b.put(1i64, 2i64)?;
        b.put(2i64, 3i64)?;
        Ok(())
    })
    .unwrap();

    // Capture construction order before lowering reorders the slots.
    let original_order: Vec<_> = b.prg().routines[0].instr.iter().filter_map(|s| *s).collect();

    let mut prg = b.into_program();
    lower(&mut prg);

    let rout = &prg.routines[0];
    let placed_order: Vec<usize> = original_order
        .iter()
        .map(|id| rout.instr.iter().position(|s| *s == Some(*id)).unwrap())
        .collect();

    assert!(
        placed_order.windows(2).all(|w| w[0] < w[1]),
        "side-effecting PUTs must keep their original relative order: {placed_order:?}"
    );
}

#[test]
fn two_routines_get_disjoint_non_overlapping_bases() {
    let mut b = Builder::new(Program::new());
    b.routine(vec![], vec![], |b| {
        b.take(0i64)?;
        Ok(())
    })
    .unwrap();
    b.routine(vec![], vec![], |b| {
        b.take(1i64)?;
        b.take(2i64)?;
        Ok(())
    })
    .unwrap();
    let mut prg = b.into_program();
    lower(&mut prg);

    let spans: Vec<(u32, u32)> = prg
        .routines
        .iter()
        .map(|r| {
            let base = r.base.unwrap();
            (base, base + r.instr.len() as u32)
        })
        .collect();
    assert!(spans[0].1 <= spans[1].0 || spans[1].1 <= spans[0].0);
}
