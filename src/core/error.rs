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

//! Compiler error types
//!
//! Every error raised anywhere in the middle-end aborts the pass that
//! raised it and the whole invocation; there is no partial success.
//! Each variant carries an optional [`ErrorContext`] identifying the
//! routine/instruction/opcode responsible, so the pass driver can print
//! a diagnostic with that context attached.

use std::fmt;
use thiserror::Error;

/// Result type for middle-end operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Where in the program an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub routine: Option<usize>,
    pub instr: Option<usize>,
    pub opcode: Option<&'static str>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn routine(idx: usize) -> Self {
        Self {
            routine: Some(idx),
            ..Self::default()
        }
    }

    pub fn instr(routine: usize, instr: usize) -> Self {
        Self {
            routine: Some(routine),
            instr: Some(instr),
            ..Self::default()
        }
    }

    pub fn with_opcode(mut self, opcode: &'static str) -> Self {
        self.opcode = Some(opcode);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(r) = self.routine {
            parts.push(format!("routine {r}"));
        }
        if let Some(i) = self.instr {
            parts.push(format!("instruction {i}"));
        }
        if let Some(op) = self.opcode {
            parts.push(format!("opcode {op}"));
        }
        if parts.is_empty() {
            Ok(())
        } else {
            write!(f, " ({})", parts.join(", "))
        }
    }
}

/// The four error kinds the middle-end can raise: decode, structural, pass, user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Unknown opcode, malformed operand banks, image magic/version mismatch.
    #[error("decode error: {message}{context}")]
    Decode {
        message: String,
        context: ErrorContext,
    },

    /// Slice overruns a section, no backing for an address, ring write-after-read.
    #[error("structural error: {message}{context}")]
    Structural {
        message: String,
        context: ErrorContext,
    },

    /// SAT unsat, placement constraint violation, non-deconstructed operand
    /// in a late pass, register allocation collision on Global+intermediate.
    #[error("pass error: {message}{context}")]
    Pass {
        message: String,
        context: ErrorContext,
    },

    /// Unknown/ambiguous pass name, unparseable pass argument.
    #[error("user error: {message}{context}")]
    User {
        message: String,
        context: ErrorContext,
    },
}

impl CompileError {
    pub fn decode(message: impl Into<String>) -> Self {
        CompileError::Decode {
            message: message.into(),
            context: ErrorContext::none(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        CompileError::Structural {
            message: message.into(),
            context: ErrorContext::none(),
        }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        CompileError::Pass {
            message: message.into(),
            context: ErrorContext::none(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        CompileError::User {
            message: message.into(),
            context: ErrorContext::none(),
        }
    }

    /// Attach context to an already-built error.
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        match &mut self {
            CompileError::Decode { context, .. }
            | CompileError::Structural { context, .. }
            | CompileError::Pass { context, .. }
            | CompileError::User { context, .. } => *context = ctx,
        }
        self
    }
}
