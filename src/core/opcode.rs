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

//! Instruction word bit-field layout and opcode space
//!
//! A general instruction word packs a 10-bit opcode (split across two
//! bit ranges for historical reasons), an output bank/address pair and
//! three operand bank selectors, into a single 32-bit little-endian
//! word. The three operand *addresses* live in parallel words at the
//! same program-counter index rather than in the general word itself.

use crate::core::error::CompileError;

/// Bit-field layout of the general instruction word (`INST0`).
///
/// ```text
/// bit  31..19  18..17  15..14   13..12   11..10    9..8     7..0
///      OUTADDR OPCODE2 OUTBANK  OP3BANK  OP2BANK  OP1BANK  OPCODE1
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralInstr {
    pub out_addr: u32,
    pub opcode2: u32,
    pub out_bank: u32,
    pub op3_bank: u32,
    pub op2_bank: u32,
    pub op1_bank: u32,
    pub opcode1: u32,
}

fn field(word: u32, top: u32, bot: u32) -> u32 {
    let mask = if top - bot + 1 >= 32 {
        u32::MAX
    } else {
        (1u32 << (top - bot + 1)) - 1
    };
    (word >> bot) & mask
}

fn set_field(word: &mut u32, top: u32, bot: u32, value: u32) {
    let width = top - bot + 1;
    let mask = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
    *word = (*word & !(mask << bot)) | ((value & mask) << bot);
}

impl GeneralInstr {
    pub fn from_word(word: u32) -> Self {
        GeneralInstr {
            out_addr: field(word, 31, 19),
            opcode2: field(word, 18, 17),
            out_bank: field(word, 15, 14),
            op3_bank: field(word, 13, 12),
            op2_bank: field(word, 11, 10),
            op1_bank: field(word, 9, 8),
            opcode1: field(word, 7, 0),
        }
    }

    pub fn to_word(self) -> u32 {
        let mut word = 0u32;
        set_field(&mut word, 31, 19, self.out_addr);
        set_field(&mut word, 18, 17, self.opcode2);
        set_field(&mut word, 15, 14, self.out_bank);
        set_field(&mut word, 13, 12, self.op3_bank);
        set_field(&mut word, 11, 10, self.op2_bank);
        set_field(&mut word, 9, 8, self.op1_bank);
        set_field(&mut word, 7, 0, self.opcode1);
        word
    }

    /// The full 10-bit opcode number, `OPCODE1 | (OPCODE2 << 8)`.
    pub fn opcode_number(self) -> u32 {
        self.opcode1 | (self.opcode2 << 8)
    }
}

/// Every opcode the hardware understands, numbered exactly as the
/// instruction word's `OPCODE1 | (OPCODE2 << 8)` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Fracmult = 0x00,

    Add = 0x80,
    AddDiv2 = 0x81,
    Sub = 0x82,
    SubDiv2 = 0x83,
    AddUns = 0x84,
    Abs = 0x85,
    Max = 0x86,
    Min = 0x87,
    Mux = 0x88,
    And = 0x89,
    Or = 0x8a,
    Xor = 0x8b,
    Clr = 0x8c,
    Zero = 0x8d,
    Add2 = 0x8e,
    Add3 = 0x8f,
    Zero2 = 0x90,
    Zero3 = 0x91,
    Zero4 = 0x92,
    Clamp = 0x93,
    Rot = 0x94,
    Pdm1 = 0x95,
    Pdm2 = 0x96,
    Pdm3 = 0x97,
    Pdm4 = 0x98,
    Pdm5 = 0x99,
    Pdm6 = 0x9a,
    Cmp = 0x9b,
    Cmp2 = 0x9c,
    Eq = 0x9d,
    Add4 = 0x9e,
    Sub2 = 0x9f,

    Take = 0xa0,
    Takec = 0xa1,
    Peek = 0xa2,
    Put = 0xa4,
    Putc = 0xa5,
    Update = 0xa6,

    UnkBf = 0xbf,

    Fcmp = 0xe0,
    Fcmp2 = 0xe1,
    Fmux = 0xe5,
    F32Fmt = 0xed,

    Fadd = 0x1c0,
    FaddAbs = 0x1c1,
    FaddDiv2 = 0x1c2,
    Fsub = 0x1c3,
    FsubAbs = 0x1c4,
    FsubDiv2 = 0x1c5,

    Fmult = 0x1c6,
    Fmultacc = 0x1c7,
    FmultNeg = 0x1d6,
    FmultaccNeg = 0x1d7,
    Fmultsub = 0x1d8,

    Mult31 = 0x2e0,
    Mult0 = 0x2ff,
}

impl Opcode {
    pub fn from_number(n: u32) -> crate::core::error::Result<Self> {
        use Opcode::*;
        Ok(match n {
            0x00 => Fracmult,
            0x80 => Add,
            0x81 => AddDiv2,
            0x82 => Sub,
            0x83 => SubDiv2,
            0x84 => AddUns,
            0x85 => Abs,
            0x86 => Max,
            0x87 => Min,
            0x88 => Mux,
            0x89 => And,
            0x8a => Or,
            0x8b => Xor,
            0x8c => Clr,
            0x8d => Zero,
            0x8e => Add2,
            0x8f => Add3,
            0x90 => Zero2,
            0x91 => Zero3,
            0x92 => Zero4,
            0x93 => Clamp,
            0x94 => Rot,
            0x95 => Pdm1,
            0x96 => Pdm2,
            0x97 => Pdm3,
            0x98 => Pdm4,
            0x99 => Pdm5,
            0x9a => Pdm6,
            0x9b => Cmp,
            0x9c => Cmp2,
            0x9d => Eq,
            0x9e => Add4,
            0x9f => Sub2,
            0xa0 => Take,
            0xa1 => Takec,
            0xa2 => Peek,
            0xa4 => Put,
            0xa5 => Putc,
            0xa6 => Update,
            0xbf => UnkBf,
            0xe0 => Fcmp,
            0xe1 => Fcmp2,
            0xe5 => Fmux,
            0xed => F32Fmt,
            0x1c0 => Fadd,
            0x1c1 => FaddAbs,
            0x1c2 => FaddDiv2,
            0x1c3 => Fsub,
            0x1c4 => FsubAbs,
            0x1c5 => FsubDiv2,
            0x1c6 => Fmult,
            0x1c7 => Fmultacc,
            0x1d6 => FmultNeg,
            0x1d7 => FmultaccNeg,
            0x1d8 => Fmultsub,
            0x2e0 => Mult31,
            0x2ff => Mult0,
            other => {
                return Err(CompileError::decode(format!(
                    "unknown opcode {other:#x}"
                )))
            }
        })
    }

    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Fracmult => "FRACMULT",
            Add => "ADD",
            AddDiv2 => "ADD_DIV2",
            Sub => "SUB",
            SubDiv2 => "SUB_DIV2",
            AddUns => "ADD_UNS",
            Abs => "ABS",
            Max => "MAX",
            Min => "MIN",
            Mux => "MUX",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Clr => "CLR",
            Zero => "ZERO",
            Add2 => "ADD2",
            Add3 => "ADD3",
            Zero2 => "ZERO2",
            Zero3 => "ZERO3",
            Zero4 => "ZERO4",
            Clamp => "CLAMP",
            Rot => "ROT",
            Pdm1 => "PDM1",
            Pdm2 => "PDM2",
            Pdm3 => "PDM3",
            Pdm4 => "PDM4",
            Pdm5 => "PDM5",
            Pdm6 => "PDM6",
            Cmp => "CMP",
            Cmp2 => "CMP2",
            Eq => "EQ",
            Add4 => "ADD4",
            Sub2 => "SUB2",
            Take => "TAKE",
            Takec => "TAKEC",
            Peek => "PEEK",
            Put => "PUT",
            Putc => "PUTC",
            Update => "UPDATE",
            UnkBf => "UNK_BF",
            Fcmp => "FCMP",
            Fcmp2 => "FCMP2",
            Fmux => "FMUX",
            F32Fmt => "F32_FMT",
            Fadd => "FADD",
            FaddAbs => "FADD_ABS",
            FaddDiv2 => "FADD_DIV2",
            Fsub => "FSUB",
            FsubAbs => "FSUB_ABS",
            FsubDiv2 => "FSUB_DIV2",
            Fmult => "FMULT",
            Fmultacc => "FMULTACC",
            FmultNeg => "FMULT_NEG",
            FmultaccNeg => "FMULTACC_NEG",
            Fmultsub => "FMULTSUB",
            Mult31 => "MULT31",
            Mult0 => "MULT0",
        }
    }

    /// Opcodes in `0xa0..0xc0` perform I/O against a port and must keep
    /// their relative order through every pass.
    pub fn has_side_effects(self) -> bool {
        let n = self.number();
        (0xa0..0xc0).contains(&n)
    }

    /// Whether this opcode operates on the float view of its operands.
    ///
    /// The hardware doesn't expose this as a bit field; it's a closed
    /// set of opcodes rather than a name-prefix heuristic (`FRACMULT`
    /// starts with `F` too, but is an integer fractional-multiply op).
    pub fn is_float_op(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Fcmp | Fcmp2
                | Fmux
                | F32Fmt
                | Fadd
                | FaddAbs
                | FaddDiv2
                | Fsub
                | FsubAbs
                | FsubDiv2
                | Fmult
                | Fmultacc
                | FmultNeg
                | FmultaccNeg
                | Fmultsub
        )
    }

    /// Parse the assembly mnemonic produced by `name()`, the inverse
    /// lookup `asm` needs to rebuild instructions from a text dump.
    pub fn from_name(name: &str) -> crate::core::error::Result<Self> {
        use Opcode::*;
        Ok(match name {
            "FRACMULT" => Fracmult,
            "ADD" => Add,
            "ADD_DIV2" => AddDiv2,
            "SUB" => Sub,
            "SUB_DIV2" => SubDiv2,
            "ADD_UNS" => AddUns,
            "ABS" => Abs,
            "MAX" => Max,
            "MIN" => Min,
            "MUX" => Mux,
            "AND" => And,
            "OR" => Or,
            "XOR" => Xor,
            "CLR" => Clr,
            "ZERO" => Zero,
            "ADD2" => Add2,
            "ADD3" => Add3,
            "ZERO2" => Zero2,
            "ZERO3" => Zero3,
            "ZERO4" => Zero4,
            "CLAMP" => Clamp,
            "ROT" => Rot,
            "PDM1" => Pdm1,
            "PDM2" => Pdm2,
            "PDM3" => Pdm3,
            "PDM4" => Pdm4,
            "PDM5" => Pdm5,
            "PDM6" => Pdm6,
            "CMP" => Cmp,
            "CMP2" => Cmp2,
            "EQ" => Eq,
            "ADD4" => Add4,
            "SUB2" => Sub2,
            "TAKE" => Take,
            "TAKEC" => Takec,
            "PEEK" => Peek,
            "PUT" => Put,
            "PUTC" => Putc,
            "UPDATE" => Update,
            "UNK_BF" => UnkBf,
            "FCMP" => Fcmp,
            "FCMP2" => Fcmp2,
            "FMUX" => Fmux,
            "F32_FMT" => F32Fmt,
            "FADD" => Fadd,
            "FADD_ABS" => FaddAbs,
            "FADD_DIV2" => FaddDiv2,
            "FSUB" => Fsub,
            "FSUB_ABS" => FsubAbs,
            "FSUB_DIV2" => FsubDiv2,
            "FMULT" => Fmult,
            "FMULTACC" => Fmultacc,
            "FMULT_NEG" => FmultNeg,
            "FMULTACC_NEG" => FmultaccNeg,
            "FMULTSUB" => Fmultsub,
            "MULT31" => Mult31,
            "MULT0" => Mult0,
            other => {
                return Err(CompileError::user(format!("unknown opcode mnemonic: {other}")))
            }
        })
    }

    /// Multiply-accumulate family opcodes whose result isn't available
    /// to a dependent instruction in the same pipeline slot: a one-slot
    /// bubble must separate producer and consumer.
    pub fn is_multiply_accumulate(self) -> bool {
        use Opcode::*;
        matches!(self, Fmult | Fmultacc | FmultNeg | FmultaccNeg | Fmultsub)
            || (Opcode::Mult31.number()..=Opcode::Mult0.number()).contains(&self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn field_roundtrip() {
        let gi = GeneralInstr {
            out_addr: 0x1fff,
            opcode2: 0b11,
            out_bank: 2,
            op3_bank: 1,
            op2_bank: 3,
            op1_bank: 2,
            opcode1: 0x89,
        };
        let word = gi.to_word();
        assert_eq!(GeneralInstr::from_word(word), gi);
    }

    #[test]
    fn opcode_number_splits_across_fields() {
        let n = Opcode::Fadd.number();
        let gi = GeneralInstr {
            out_addr: 0,
            opcode2: (n >> 8) & 0b11,
            out_bank: 0,
            op3_bank: 0,
            op2_bank: 0,
            op1_bank: 0,
            opcode1: n & 0xff,
        };
        let decoded = GeneralInstr::from_word(gi.to_word());
        assert_eq!(decoded.opcode_number(), n);
    }

    #[test]
    fn side_effects_range() {
        assert!(Opcode::Take.has_side_effects());
        assert!(Opcode::Update.has_side_effects());
        assert!(!Opcode::Add.has_side_effects());
        assert!(!Opcode::Fcmp.has_side_effects());
    }

    #[test]
    fn float_set_excludes_fracmult() {
        assert!(!Opcode::Fracmult.is_float_op());
        assert!(Opcode::Fadd.is_float_op());
        assert!(Opcode::Fmultacc.is_float_op());
    }

    #[test]
    fn multiply_accumulate_family() {
        assert!(Opcode::Fmultacc.is_multiply_accumulate());
        assert!(Opcode::Mult31.is_multiply_accumulate());
        assert!(!Opcode::Add.is_multiply_accumulate());
    }

    #[test]
    fn unknown_opcode_is_decode_error() {
        assert!(Opcode::from_number(0xc1).is_err());
    }

    proptest! {
        /// Every legal combination of field values round-trips through
        /// `to_word`/`from_word` (property 2 of spec.md §8, at the
        /// bit-field level rather than the full `encode`/`decode` pair).
        #[test]
        fn general_instr_fields_roundtrip(
            out_addr in 0u32..=0x1fff,
            opcode2 in 0u32..=0b11,
            out_bank in 0u32..=0b11,
            op3_bank in 0u32..=0b11,
            op2_bank in 0u32..=0b11,
            op1_bank in 0u32..=0b11,
            opcode1 in 0u32..=0xff,
        ) {
            let gi = GeneralInstr {
                out_addr,
                opcode2,
                out_bank,
                op3_bank,
                op2_bank,
                op1_bank,
                opcode1,
            };
            let word = gi.to_word();
            prop_assert_eq!(GeneralInstr::from_word(word), gi);
        }
    }
}
