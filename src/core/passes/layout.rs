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

//! Final layout
//!
//! `arrange_routines` assigns each routine a base address in
//! instruction memory, one past the end of the previous one plus the
//! configured gap, so that routines never overlap.

use crate::core::ir::Program;

pub fn arrange_routines(prg: &mut Program) {
    arrange_routines_with_gap(prg, crate::core::config::DEFAULT_ROUTINE_GAP);
}

pub fn arrange_routines_with_gap(prg: &mut Program, gap: u32) {
    let mut base = 0u32;
    for rout in &mut prg.routines {
        rout.base = Some(base);
        base += rout.instr.len() as u32 + gap;
    }
}
