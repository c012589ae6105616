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

//! In-memory program representation: operands, rings, routines,
//! programs.

pub mod operand;
pub mod program;
pub mod ring;
pub mod routine;

pub use operand::{GlobalId, InstrId, Operand, Register, RingOperand};
pub use program::{GlobalNode, InstrNode, Program};
pub use ring::RegisterRing;
pub use routine::{Def, Routine};
