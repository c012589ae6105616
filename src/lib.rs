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

//! LEAP toolchain middle-end
//!
//! This library provides the compiler middle-end for LEAP, a small
//! fixed-function DSP/accelerator coprocessor: the in-memory program IR,
//! the pass pipeline that lowers abstract instruction graphs to
//! register-allocated, scheduled routines, and the bit-exact image codec.
//!
//! # Example
//!
//! ```
//! use leapc::core::ir::Program;
//! use leapc::core::passes;
//!
//! let mut prg = Program::new();
//! passes::arrange_routines(&mut prg);
//! let img = prg.build_image().unwrap();
//! assert_eq!(img.sections().len(), 0);
//! ```

pub mod core;
