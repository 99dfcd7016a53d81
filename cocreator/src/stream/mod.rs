// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Streaming tag parser
//
// Responsibilities:
// - Split model output into narrative text and FILE/PATCH blocks
// - Hold back possible start-tag prefixes until they resolve
// - Emit provisional FILE content while a block is open
// - Apply PATCH blocks against the project file view on close
// - Produce the same final result for any chunking of the same stream

mod parser;
mod tags;
mod types;

pub use parser::{advance, conclude, StreamingTagParser};
pub use types::{
    BlockKind, Diagnostic, FileUpdate, OpenBlock, ParserMode, ParserOptions, ParserState,
    StreamEvent, UnterminatedPolicy, DEFAULT_SAFETY_MARGIN,
};

#[cfg(test)]
mod tests;
