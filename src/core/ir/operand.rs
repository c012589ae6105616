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

//! Operand representation
//!
//! `Operand` is a tagged union over every kind of value an instruction
//! slot can hold, from a raw hardware register to an abstract
//! reference to whichever instruction will eventually produce a value.
//! Abstract references (`Instr`, `Global`) are arena handles rather
//! than owning pointers: the original representation lets an operand
//! point directly at the `Instruction` object that defines it, even
//! across routine boundaries and in cycles (a `Global` can be fed by
//! an instruction that itself reads that same `Global`). Rust can't
//! express that with owning references, so `Program` owns every
//! `InstrNode`/`GlobalNode` in an arena and operands carry lightweight
//! indices into it.

use std::fmt;

/// Index of an `InstrNode` inside a `Program`'s instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

/// Index of a `GlobalNode` inside a `Program`'s global arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub u32);

/// A hardware register: bank 0 means "no operand", banks 1-3 are the
/// data banks A/B/C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register {
    pub bank: u8,
    pub addr: u32,
}

impl Register {
    pub fn new(bank: u8, addr: u32) -> Self {
        Register { bank, addr }
    }

    /// Parse the assembly-style register name used by `dump`/`asm`
    /// (`a00`, `b1f`, `--` for "no register").
    pub fn parse(name: &str) -> crate::core::error::Result<Option<Self>> {
        use crate::core::error::CompileError;
        let name = name.trim();
        if name == "--" {
            return Ok(None);
        }
        let mut chars = name.chars();
        let bank_char = chars
            .next()
            .ok_or_else(|| CompileError::user(format!("bad register name: {name:?}")))?;
        let bank = match bank_char {
            'a' => 1,
            'b' => 2,
            'c' => 3,
            _ => return Err(CompileError::user(format!("bad register name: {name:?}"))),
        };
        let rest = chars.as_str();
        if rest.is_empty() {
            return Err(CompileError::user(format!("bad register name: {name:?}")));
        }
        let addr = u32::from_str_radix(rest, 16)
            .map_err(|_| CompileError::user(format!("bad register name: {name:?}")))?;
        Ok(Some(Register::new(bank, addr)))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bank_char = match self.bank {
            1 => 'a',
            2 => 'b',
            3 => 'c',
            _ => '?',
        };
        write!(f, "{bank_char}{:02x}", self.addr)
    }
}

/// A register within a `RegisterRing`'s circular window, addressed by
/// ring identity and offset rather than by raw bank/address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingOperand {
    pub ring: usize,
    pub offset: u32,
}

/// A value an instruction operand slot (or output slot) can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Placeholder for a malformed decode; never produced by passes.
    Bad,
    /// A register read before any instruction in scope has written it.
    Uninitialized,
    /// An immediate. The float view is obtained by reinterpreting the
    /// big-endian bytes of this value as an IEEE-754 single.
    Constant(u32),
    Register(Register),
    Ring(RingOperand),
    /// A location with more than one producer across routines.
    Global(GlobalId),
    /// A direct reference to the instruction defining this value.
    Instr(InstrId),
}

impl Operand {
    pub fn from_float(val: f32) -> Self {
        Operand::Constant(u32::from_be_bytes(val.to_be_bytes()))
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Operand::Constant(bits) => Some(f32::from_be_bytes(bits.to_be_bytes())),
            _ => None,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parse_and_display() {
        let r = Register::parse("a1f").unwrap().unwrap();
        assert_eq!(r, Register::new(1, 0x1f));
        assert_eq!(r.to_string(), "a1f");
    }

    #[test]
    fn register_parse_dashes_is_none() {
        assert_eq!(Register::parse("--").unwrap(), None);
    }

    #[test]
    fn register_parse_rejects_bad_bank() {
        assert!(Register::parse("d00").is_err());
    }

    #[test]
    fn constant_float_roundtrip() {
        let op = Operand::from_float(1.5);
        assert_eq!(op.as_float(), Some(1.5));
    }
}
