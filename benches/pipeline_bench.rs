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

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use leapc::core::dsl::Builder;
use leapc::core::ir::Program;
use leapc::core::passes;

fn sample_program() -> Program {
    let mut b = Builder::new(Program::new());
    b.routine(vec![], vec![], |b| {
        for _ in 0..16 {
            let x = b.take(0i64)?;
            let y = b.fmult(x, 2.0f32)?;
            let z = b.fmultacc(y, 3.0f32, x)?;
            b.put(1i64, z)?;
        }
        Ok(())
    })
    .unwrap();
    b.into_program()
}

fn placement_benchmark(c: &mut Criterion) {
    c.bench_function("place_routine", |b| {
        b.iter_batched(
            sample_program,
            |mut prg| {
                black_box(passes::place(&mut prg).unwrap());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn full_pipeline_benchmark(c: &mut Criterion) {
    c.bench_function("full_pipeline", |b| {
        b.iter_batched(
            sample_program,
            |mut prg| {
                passes::deconstruct(&mut prg).unwrap();
                passes::place(&mut prg).unwrap();
                passes::regalloc_intermediate(&mut prg, None).unwrap();
                passes::regalloc_const(&mut prg, None).unwrap();
                passes::set_nops(&mut prg);
                passes::propagate_outs(&mut prg);
                passes::arrange_routines(&mut prg);
                black_box(passes::build(&prg).unwrap());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn image_codec_benchmark(c: &mut Criterion) {
    let mut prg = sample_program();
    passes::deconstruct(&mut prg).unwrap();
    passes::place(&mut prg).unwrap();
    passes::regalloc_intermediate(&mut prg, None).unwrap();
    passes::regalloc_const(&mut prg, None).unwrap();
    passes::set_nops(&mut prg);
    passes::propagate_outs(&mut prg);
    passes::arrange_routines(&mut prg);
    let img = passes::build(&prg).unwrap();
    let bytes = img.to_bytes();

    c.bench_function("image_write", |b| {
        b.iter(|| black_box(img.to_bytes()));
    });

    c.bench_function("image_read", |b| {
        b.iter(|| black_box(leapc::core::image::Image::read(&bytes).unwrap()));
    });
}

criterion_group!(
    benches,
    placement_benchmark,
    full_pipeline_benchmark,
    image_codec_benchmark
);
criterion_main!(benches);
