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

//! Compiler middle-end components
//!
//! This module contains the whole LEAP middle-end:
//! - the instruction word bit-field layout and opcode space
//! - the in-memory program IR (operands, routines, register rings, programs)
//! - the bit-exact image codec
//! - the DSL builder façade
//! - the pass pipeline (deconstruction, placement, register allocation,
//!   NOP insertion, layout, image emission, dumps)
//! - the pass driver (named-pass dispatch, used by the `leapc` CLI)

pub mod config;
pub mod dsl;
pub mod driver;
pub mod error;
pub mod image;
pub mod ir;
pub mod opcode;
pub mod passes;

// Re-export commonly used types
pub use config::Config;
pub use error::{CompileError, Result};
pub use image::{Image, Section, SectionFlags, SectionType};
pub use ir::{Operand, Program, Register, RegisterRing, Routine};
pub use opcode::{GeneralInstr, Opcode};
