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

//! Toolchain configuration
//!
//! Settings are loaded from an optional `leapc.toml` in the current
//! directory and can be overridden by environment variables (loaded
//! from a `.env` file via `dotenvy` if present). Env overrides use the
//! prefix `LEAPC_`, e.g. `LEAPC_ROUTINE_GAP=4`.

use serde::Deserialize;
use std::path::Path;

use crate::core::error::{CompileError, Result};

/// Number of data register banks (banks 1..=N), not counting bank 0
/// ("no operand").
const DEFAULT_REGISTER_BANKS: u32 = 3;

/// Default width of a placement gap inserted between adjacent routines
/// during `arrange_routines`.
pub(crate) const DEFAULT_ROUTINE_GAP: u32 = 1;

/// Number of data banks the register file actually has: the operand
/// bank field is 2 bits wide, with 0 reserved for "no operand", leaving
/// exactly three addressable banks. `register_banks` is validated
/// against this rather than free to vary, since the allocator (SAT
/// formula arity, `RegAllocator` triples) is written against it
/// directly rather than parameterized over an arbitrary bank count.
const HARDWARE_REGISTER_BANKS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of data banks available to the register allocator. Fixed
    /// by the hardware at 3; present (and validated) so a `leapc.toml`
    /// that disagrees with the toolchain's hardcoded bank count is
    /// caught at startup rather than producing a silently wrong image.
    pub register_banks: u32,
    /// Gap, in instruction slots, left between consecutive routines
    /// when laying out the final image.
    pub routine_gap: u32,
    /// Emit a warning instead of failing when `dump_py` encounters an
    /// operand that was never lowered by `deconstruct`.
    pub lossy_dump_warnings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            register_banks: DEFAULT_REGISTER_BANKS,
            routine_gap: DEFAULT_ROUTINE_GAP,
            lossy_dump_warnings: true,
        }
    }
}

impl Config {
    /// Load configuration, applying (in order of increasing priority):
    /// built-in defaults, `leapc.toml` if present, and `LEAPC_*` env vars.
    pub fn load(toml_path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        let path = toml_path.as_ref();
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CompileError::user(format!("failed to read {}: {e}", path.display()))
            })?;
            cfg = toml::from_str(&text)
                .map_err(|e| CompileError::user(format!("invalid config {}: {e}", path.display())))?;
        }

        if let Ok(v) = std::env::var("LEAPC_REGISTER_BANKS") {
            cfg.register_banks = v
                .parse()
                .map_err(|_| CompileError::user(format!("invalid LEAPC_REGISTER_BANKS: {v}")))?;
        }
        if let Ok(v) = std::env::var("LEAPC_ROUTINE_GAP") {
            cfg.routine_gap = v
                .parse()
                .map_err(|_| CompileError::user(format!("invalid LEAPC_ROUTINE_GAP: {v}")))?;
        }
        if let Ok(v) = std::env::var("LEAPC_LOSSY_DUMP_WARNINGS") {
            cfg.lossy_dump_warnings = v
                .parse()
                .map_err(|_| CompileError::user(format!("invalid LEAPC_LOSSY_DUMP_WARNINGS: {v}")))?;
        }

        if cfg.register_banks != HARDWARE_REGISTER_BANKS {
            return Err(CompileError::user(format!(
                "register_banks must be {HARDWARE_REGISTER_BANKS} (the hardware has a fixed 2-bit bank field), got {}",
                cfg.register_banks
            )));
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hardware() {
        let cfg = Config::default();
        assert_eq!(cfg.register_banks, 3);
        assert_eq!(cfg.routine_gap, 1);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = Config::load("/nonexistent/leapc.toml").unwrap();
        assert_eq!(cfg.register_banks, DEFAULT_REGISTER_BANKS);
    }

    #[test]
    fn load_rejects_a_register_bank_count_the_hardware_does_not_have() {
        std::env::set_var("LEAPC_REGISTER_BANKS", "4");
        let result = Config::load("/nonexistent/leapc.toml");
        std::env::remove_var("LEAPC_REGISTER_BANKS");
        assert!(result.is_err());
    }
}
