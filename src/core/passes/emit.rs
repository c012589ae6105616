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

//! Image emission
//!
//! Builds the final `Image` from a fully placed, allocated, NOP-filled
//! program and hands it back in whichever form the caller needs: bytes
//! on a writer, a returned buffer, or a hex dump.

use crate::core::error::Result;
use crate::core::image::Image;
use crate::core::ir::Program;

fn log_sections(img: &Image) {
    log::info!("writing image with {} sections:", img.sections().len());
    for sect in img.sections() {
        log::info!(
            "    {:6} base {:#x} size {:#x} flags {:#x}",
            sect.ty.name(),
            sect.load_base,
            sect.size(),
            sect.flags.bits()
        );
    }
}

pub fn build(prg: &Program) -> Result<Image> {
    let img = prg.build_image()?;
    log_sections(&img);
    Ok(img)
}

pub fn image_to_writer(prg: &Program, out: &mut dyn std::io::Write) -> Result<()> {
    let img = build(prg)?;
    out.write_all(&img.to_bytes())
        .map_err(|e| crate::core::error::CompileError::structural(format!("failed to write image: {e}")))
}

pub fn image_bytes(prg: &Program) -> Result<Vec<u8>> {
    Ok(build(prg)?.to_bytes())
}

pub fn image_hexdump(prg: &Program) -> Result<String> {
    let bytes = image_bytes(prg)?;
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", i * 16));
        for b in chunk {
            out.push_str(&format!("{b:02x} "));
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_builds_empty_image_bytes() {
        let prg = Program::new();
        let bytes = image_bytes(&prg).unwrap();
        assert!(!bytes.is_empty());
    }
}
