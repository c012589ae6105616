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

//! Bit-exact image codec
//!
//! An image is a header plus a flat list of typed sections, each a
//! `(type, load_base)`-addressed span of 32-bit words. Sections are
//! not required to be contiguous or non-overlapping by the format
//! itself, only by convention; addressed reads and writes locate the
//! owning section by binary search on `(type, load_base)`.

mod codec;

pub use codec::{CodecError, MAGIC};

use std::ops::Range;

use bitflags::bitflags;

use crate::core::error::{CompileError, Result};

/// Section type tags, numbered exactly as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionType {
    State0,
    State1,
    State2,
    State3,
    Inst0,
    Inst1,
    Inst2,
    Inst3,
    RoutineCtl,
    /// Per-routine list of ports it waits for not-empty on.
    WaitEmptyList,
    /// Per-routine list of ports it waits for not-full on.
    WaitFullList,
    IoInit,
    PdmSpecial,
    /// A tag this build doesn't recognize; preserved verbatim so an
    /// image can round-trip through tools that don't understand it.
    Unknown(u32),
}

impl SectionType {
    pub fn from_u32(v: u32) -> Self {
        use SectionType::*;
        match v {
            0x10000 => State0,
            0x10001 => State1,
            0x10002 => State2,
            0x10003 => State3,
            0x20000 => Inst0,
            0x20001 => Inst1,
            0x20002 => Inst2,
            0x20003 => Inst3,
            0x30000 => RoutineCtl,
            0x30001 => WaitEmptyList,
            0x30002 => WaitFullList,
            0x30100 => IoInit,
            0x30101 => PdmSpecial,
            other => Unknown(other),
        }
    }

    pub fn to_u32(self) -> u32 {
        use SectionType::*;
        match self {
            State0 => 0x10000,
            State1 => 0x10001,
            State2 => 0x10002,
            State3 => 0x10003,
            Inst0 => 0x20000,
            Inst1 => 0x20001,
            Inst2 => 0x20002,
            Inst3 => 0x20003,
            RoutineCtl => 0x30000,
            WaitEmptyList => 0x30001,
            WaitFullList => 0x30002,
            IoInit => 0x30100,
            PdmSpecial => 0x30101,
            Unknown(v) => v,
        }
    }

    pub fn name(self) -> String {
        use SectionType::*;
        match self {
            State0 => "STATE0".into(),
            State1 => "STATE1".into(),
            State2 => "STATE2".into(),
            State3 => "STATE3".into(),
            Inst0 => "INST0".into(),
            Inst1 => "INST1".into(),
            Inst2 => "INST2".into(),
            Inst3 => "INST3".into(),
            RoutineCtl => "ROUTINE_CTL".into(),
            WaitEmptyList => "WE_SIEVE".into(),
            WaitFullList => "WF_SIEVE".into(),
            IoInit => "IO_INIT".into(),
            PdmSpecial => "PDM_SPECIAL".into(),
            Unknown(v) => format!("{v:#x} (unknown)"),
        }
    }

    pub fn state_bank(self) -> Option<u8> {
        match self {
            SectionType::State0 => Some(0),
            SectionType::State1 => Some(1),
            SectionType::State2 => Some(2),
            SectionType::State3 => Some(3),
            _ => None,
        }
    }

    pub fn has_instructions(self) -> bool {
        matches!(
            self,
            SectionType::Inst0 | SectionType::Inst1 | SectionType::Inst2 | SectionType::Inst3
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        /// Section belongs to a routine's instruction/wait-list span.
        const ROUTINE = 1;
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub ty: SectionType,
    pub load_base: u32,
    pub flags: SectionFlags,
    pub data: Vec<u32>,
}

impl Section {
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn span(&self) -> Range<u32> {
        self.load_base..self.load_base + self.size()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Image {
    pub imprint: String,
    sections: Vec<Section>,
    index: Vec<(SectionType, u32, usize)>,
}

impl Image {
    pub fn new() -> Self {
        Image::default()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    fn reindex(&mut self) {
        self.index = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| (s.ty, s.load_base, i))
            .collect();
        self.index.sort();
    }

    /// Append a new, zero-filled section covering `span` of `ty`.
    pub fn reserve(&mut self, ty: SectionType, span: Range<u32>, flags: SectionFlags) {
        let size = span.end.saturating_sub(span.start) as usize;
        self.sections.push(Section {
            ty,
            load_base: span.start,
            flags,
            data: vec![0; size],
        });
        self.reindex();
    }

    /// Spans of every section of `ty`, as `(load_base..load_base+size)`.
    pub fn section_spans(&self, ty: SectionType) -> Vec<(Range<u32>, SectionFlags)> {
        let mut spans: Vec<_> = self
            .sections
            .iter()
            .filter(|s| s.ty == ty)
            .map(|s| (s.span(), s.flags))
            .collect();
        spans.sort_by_key(|(span, _)| span.start);
        spans
    }

    /// Spans of every routine (contiguous `Inst0` sections tagged
    /// `ROUTINE`), used to reconstruct routines from an image.
    pub fn routine_spans(&self) -> Vec<Range<u32>> {
        self.section_spans(SectionType::Inst0)
            .into_iter()
            .filter(|(_, flags)| flags.contains(SectionFlags::ROUTINE))
            .map(|(span, _)| span)
            .collect()
    }

    fn lookup_section(&self, ty: SectionType, addr: u32) -> Option<&Section> {
        let probe = (ty, addr.saturating_add(1));
        let idx = self.index.partition_point(|(t, base, _)| (*t, *base) < probe);
        if idx == 0 {
            return None;
        }
        let (t, _, sect_idx) = self.index[idx - 1];
        if t != ty {
            return None;
        }
        let sect = &self.sections[sect_idx];
        if addr >= sect.load_base + sect.size() {
            return None;
        }
        Some(sect)
    }

    fn lookup_section_mut(&mut self, ty: SectionType, addr: u32) -> Option<usize> {
        let probe = (ty, addr.saturating_add(1));
        let idx = self.index.partition_point(|(t, base, _)| (*t, *base) < probe);
        if idx == 0 {
            return None;
        }
        let (t, _, sect_idx) = self.index[idx - 1];
        if t != ty {
            return None;
        }
        let sect = &self.sections[sect_idx];
        if addr >= sect.load_base + sect.size() {
            return None;
        }
        Some(sect_idx)
    }

    pub fn contains(&self, ty: SectionType, addr: u32) -> bool {
        self.lookup_section(ty, addr).is_some()
    }

    pub fn get(&self, ty: SectionType, addr: u32) -> Result<u32> {
        let sect = self
            .lookup_section(ty, addr)
            .ok_or_else(|| CompileError::structural(format!("no backing for {:?},{addr:#x} in image", ty)))?;
        Ok(sect.data[(addr - sect.load_base) as usize])
    }

    pub fn set(&mut self, ty: SectionType, addr: u32, value: u32) -> Result<()> {
        let idx = self
            .lookup_section_mut(ty, addr)
            .ok_or_else(|| CompileError::structural(format!("no backing for {:?},{addr:#x} in image", ty)))?;
        let sect = &mut self.sections[idx];
        sect.data[(addr - sect.load_base) as usize] = value;
        Ok(())
    }

    /// Read a contiguous range `span` of `ty`. If `span` extends past
    /// the owning section's end, probes the following address to
    /// distinguish "no data at all past here" (empty tail) from "data
    /// exists but spans sections" (unsupported).
    pub fn get_range(&self, ty: SectionType, span: Range<u32>) -> Result<Vec<u32>> {
        if span.end <= span.start {
            return Ok(Vec::new());
        }
        let sect = self
            .lookup_section(ty, span.start)
            .ok_or_else(|| CompileError::structural(format!("no backing for {:?},{:#x} in image", ty, span.start)))?;
        if span.end > sect.load_base + sect.size() {
            if self.contains(ty, sect.load_base + sect.size()) {
                return Err(CompileError::structural(
                    "slice overruns an image section".to_string(),
                ));
            }
            return Err(CompileError::structural(format!(
                "no backing for {:?},{:#x} in image",
                ty, span.end - 1
            )));
        }
        let start = (span.start - sect.load_base) as usize;
        let end = (span.end - sect.load_base) as usize;
        Ok(sect.data[start..end].to_vec())
    }

    /// Read from `start` to the end of its owning section, or an empty
    /// vector if nothing is backed at `start`.
    pub fn get_tail(&self, ty: SectionType, start: u32) -> Vec<u32> {
        match self.lookup_section(ty, start) {
            None => Vec::new(),
            Some(sect) => sect.data[(start - sect.load_base) as usize..].to_vec(),
        }
    }

    pub fn set_range(&mut self, ty: SectionType, start: u32, data: &[u32]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let end = start + data.len() as u32;
        let idx = self
            .lookup_section_mut(ty, start)
            .ok_or_else(|| CompileError::structural(format!("no backing for {:?},{start:#x} in image", ty)))?;
        let sect = &self.sections[idx];
        if end > sect.load_base + sect.size() {
            if self.contains(ty, sect.load_base + sect.size()) {
                return Err(CompileError::structural(
                    "slice overruns an image section".to_string(),
                ));
            }
            return Err(CompileError::structural(format!(
                "no backing for {:?},{:#x} in image",
                ty,
                end - 1
            )));
        }
        let sect = &mut self.sections[idx];
        let lo = (start - sect.load_base) as usize;
        let hi = (end - sect.load_base) as usize;
        sect.data[lo..hi].copy_from_slice(data);
        Ok(())
    }

    pub fn dump(&self, f: &mut dyn std::io::Write) -> std::io::Result<()> {
        for (i, sect) in self.sections.iter().enumerate() {
            writeln!(
                f,
                "SECTION {i} TYPE {} LOAD BASE {:#x} FLAGS {:x}",
                sect.ty.name(),
                sect.load_base,
                sect.flags.bits()
            )?;
            let per_line = if matches!(
                sect.ty,
                SectionType::Inst1 | SectionType::Inst2 | SectionType::Inst3
            ) {
                16
            } else {
                8
            };
            let width = if per_line == 16 { 3 } else { 8 };
            for chunk in sect.data.chunks(per_line) {
                let line: String = chunk.iter().map(|v| format!("{v:0width$x} ", width = width)).collect();
                writeln!(f, "\t{line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_addressed_access() {
        let mut img = Image::new();
        img.reserve(SectionType::State1, 0x10..0x14, SectionFlags::empty());
        img.set(SectionType::State1, 0x11, 0xdead_beef).unwrap();
        assert_eq!(img.get(SectionType::State1, 0x11).unwrap(), 0xdead_beef);
        assert_eq!(img.get(SectionType::State1, 0x10).unwrap(), 0);
    }

    #[test]
    fn no_backing_error() {
        let img = Image::new();
        let err = img.get(SectionType::State1, 0).unwrap_err();
        assert!(matches!(err, CompileError::Structural { .. }));
    }

    #[test]
    fn overrun_without_followup_is_no_backing() {
        let mut img = Image::new();
        img.reserve(SectionType::State1, 0..4, SectionFlags::empty());
        let err = img.get_range(SectionType::State1, 0..8).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("no backing"));
    }

    #[test]
    fn overrun_with_followup_is_unsupported() {
        let mut img = Image::new();
        img.reserve(SectionType::State1, 0..4, SectionFlags::empty());
        img.reserve(SectionType::State1, 4..8, SectionFlags::empty());
        let err = img.get_range(SectionType::State1, 0..8).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("overruns"));
    }

    #[test]
    fn routine_spans_filter_by_flag() {
        let mut img = Image::new();
        img.reserve(SectionType::Inst0, 0..4, SectionFlags::ROUTINE);
        img.reserve(SectionType::Inst0, 0x100..0x108, SectionFlags::empty());
        let spans = img.routine_spans();
        assert_eq!(spans, vec![0..4]);
    }

    /// S2: literal addressed-access scenario from spec.md's testable-properties
    /// section, exercised against the three sections it names.
    #[test]
    fn literal_slice_overwrite_scenario() {
        let mut img = Image::new();
        img.reserve(SectionType::Inst0, 0x0..0x100, SectionFlags::empty());
        img.reserve(SectionType::Inst1, 0x1000..0x1100, SectionFlags::empty());
        img.reserve(SectionType::Inst1, 0x0..0x100, SectionFlags::empty());

        let inst0_data: Vec<u32> = (0..0x100).collect();
        let inst1_data: Vec<u32> = (0x100..0x200).collect();
        img.set_range(SectionType::Inst0, 0x0, &inst0_data).unwrap();
        img.set_range(SectionType::Inst1, 0x0, &inst1_data).unwrap();
        img.set(SectionType::Inst1, 0x1022, 0x11).unwrap();

        assert_eq!(img.get(SectionType::Inst0, 0x33).unwrap(), 0x33);
        assert_eq!(img.get(SectionType::Inst1, 0x33).unwrap(), 0x133);

        assert_eq!(
            img.get_range(SectionType::Inst0, 0x90..0x100).unwrap(),
            (0x90..0x100).collect::<Vec<u32>>()
        );
        assert_eq!(
            img.get_range(SectionType::Inst1, 0x90..0x100).unwrap(),
            (0x190..0x200).collect::<Vec<u32>>()
        );

        assert_eq!(img.get(SectionType::Inst1, 0x1021).unwrap(), 0);
        assert_eq!(img.get(SectionType::Inst1, 0x1022).unwrap(), 0x11);
    }
}
