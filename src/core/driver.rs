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

//! Pass driver
//!
//! Turns a `-p`/`-s`-style pass script — `"pass1 arg; pass2 arg1 arg2"`,
//! one invocation per `;` or newline — into ordered calls against the
//! [`PASSES`](crate::core::passes::PASSES) registry. Each invocation is
//! logged at `info` with the same hierarchical counter prefix
//! (`1.`, `1.1.`, `2.`, ...) the original tool prints, so a script's
//! progress through a long pipeline is visible without re-deriving it
//! from pass names alone.
//!
//! Argument tokens are parsed as literal scalars: a decimal or
//! `0x`/`0o`/`0b`-radix integer, a float, a single- or double-quoted
//! string, or (a deliberate deviation from the original's
//! `ast.literal_eval`, which would reject this) a bare identifier,
//! treated as a string so register names (`a0f`) and the like can be
//! passed unquoted.

use crate::core::error::{CompileError, Result};
use crate::core::ir::Program;
use crate::core::passes::{lookup_pass, Literal};

/// Split a pass script into individual invocation strings: newlines are
/// treated as `;`, blank lines and `#`-comments are dropped.
pub fn split_script(text: &str) -> Vec<String> {
    text.replace('\n', ";")
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .collect()
}

/// Parse one argument token into a [`Literal`].
pub fn parse_token(tok: &str) -> Literal {
    let t = tok.trim();

    if t.len() >= 2 {
        let bytes = t.as_bytes();
        let quote = bytes[0];
        if (quote == b'"' || quote == b'\'') && bytes[bytes.len() - 1] == quote {
            return Literal::Str(t[1..t.len() - 1].to_string());
        }
    }

    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };

    let radixed = if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16).ok()
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        i64::from_str_radix(rest, 8).ok()
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(rest, 2).ok()
    } else {
        None
    };
    if let Some(v) = radixed {
        return Literal::Int(if neg { -v } else { v });
    }

    if let Ok(v) = t.parse::<i64>() {
        return Literal::Int(v);
    }
    if let Ok(v) = t.parse::<f64>() {
        return Literal::Float(v);
    }

    Literal::Str(t.to_string())
}

/// Split one invocation (`"pass_name arg1 arg2"`) into its name and
/// parsed argument literals.
pub fn parse_invocation(line: &str) -> Result<(String, Vec<Literal>)> {
    let mut tokens = line.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| CompileError::user("empty pass invocation".to_string()))?
        .to_string();
    let args = tokens.map(parse_token).collect();
    Ok((name, args))
}

/// Run every invocation in `text` against `prg`, in order. Aborts on
/// the first unknown/ambiguous pass name or pass failure, matching
/// spec.md §7's "every error aborts the current pass and the whole
/// invocation."
pub fn run_script(prg: &mut Program, text: &str) -> Result<()> {
    let mut counters: Vec<u32> = vec![1];

    for line in split_script(text) {
        let (name, args) = parse_invocation(&line)?;
        let pass = lookup_pass(&name)?;

        let counter_str: String = counters.iter().map(|c| format!("{c}.")).collect();
        log::info!("{counter_str} running {}", pass.name.to_uppercase());

        counters.push(1);
        let result = (pass.run)(prg, &args);
        counters.pop();
        if let Some(last) = counters.last_mut() {
            *last += 1;
        }

        result?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_script_treats_newlines_as_semicolons() {
        let lines = split_script("arrange_routines\nset_nops\n");
        assert_eq!(lines, vec!["arrange_routines", "set_nops"]);
    }

    #[test]
    fn split_script_drops_comments_and_blanks() {
        let lines = split_script("# a comment\n;  ; place ");
        assert_eq!(lines, vec!["place"]);
    }

    #[test]
    fn parse_token_reads_radix_and_float_and_string() {
        assert_eq!(parse_token("0x1f"), Literal::Int(0x1f));
        assert_eq!(parse_token("-0b101"), Literal::Int(-5));
        assert_eq!(parse_token("0o17"), Literal::Int(15));
        assert_eq!(parse_token("3.5"), Literal::Float(3.5));
        assert_eq!(parse_token("\"hello\""), Literal::Str("hello".to_string()));
        assert_eq!(parse_token("a0f"), Literal::Str("a0f".to_string()));
    }

    #[test]
    fn parse_invocation_splits_name_and_args() {
        let (name, args) = parse_invocation("add_regring 0 a00 4 2").unwrap();
        assert_eq!(name, "add_regring");
        assert_eq!(
            args,
            vec![
                Literal::Int(0),
                Literal::Str("a00".to_string()),
                Literal::Int(4),
                Literal::Int(2),
            ]
        );
    }

    #[test]
    fn run_script_executes_known_passes_in_order() {
        let mut prg = Program::new();
        run_script(&mut prg, "arrange_routines; set_nops").unwrap();
    }

    #[test]
    fn run_script_stops_on_unknown_pass() {
        let mut prg = Program::new();
        assert!(run_script(&mut prg, "not_a_real_pass").is_err());
    }
}
