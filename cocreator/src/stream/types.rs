// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Parser options, the explicit machine state, and the events the parser
// emits while classifying a model's output stream.

use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Default number of trailing bytes held back while inside a block, so an
/// end tag is never split across an emission boundary. Must be at least as
/// long as the longest end tag (`[/PATCH]`, 8 bytes).
pub const DEFAULT_SAFETY_MARGIN: usize = 10;

/// What happens to a FILE/PATCH block still open when the stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnterminatedPolicy {
    /// Drop the partial content and report a diagnostic.
    #[default]
    Drop,
    /// Emit partial FILE content as a final update. PATCH blocks are
    /// always dropped: a partial patch cannot be applied.
    Commit,
}

/// Per-agent parser configuration.
///
/// One parser serves every build-style agent; agents differ only in these
/// options. Keywords are stored uppercase and matched case-insensitively
/// in start tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub file_keyword: String,
    /// `None` disables PATCH blocks entirely.
    pub patch_keyword: Option<String>,
    /// Strip a leading and trailing Markdown fence line from final FILE
    /// content.
    pub strip_fences: bool,
    pub safety_margin: usize,
    pub unterminated: UnterminatedPolicy,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            file_keyword: "FILE".to_string(),
            patch_keyword: Some("PATCH".to_string()),
            strip_fences: true,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            unterminated: UnterminatedPolicy::Drop,
        }
    }
}

impl ParserOptions {
    pub fn keyword(&self, kind: BlockKind) -> Option<&str> {
        match kind {
            BlockKind::File => Some(self.file_keyword.as_str()),
            BlockKind::Patch => self.patch_keyword.as_deref(),
        }
    }

    /// The literal closing tag for `kind`, e.g. `[/FILE]`.
    pub fn end_tag(&self, kind: BlockKind) -> String {
        format!("[/{}]", self.keyword(kind).unwrap_or(kind.as_str()))
    }

    /// Configured margin, raised to the longest end tag if it is shorter.
    pub fn effective_margin(&self) -> usize {
        let longest = [BlockKind::File, BlockKind::Patch]
            .into_iter()
            .filter(|kind| self.keyword(*kind).is_some())
            .map(|kind| self.end_tag(kind).len())
            .max()
            .unwrap_or(0);
        self.safety_margin.max(longest)
    }
}

// ---------------------------------------------------------------------------
// Modes and state
// ---------------------------------------------------------------------------

/// Kind of structural block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockKind {
    File,
    Patch,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::File => "FILE",
            BlockKind::Patch => "PATCH",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parser's current mode. Derived from [`ParserState`]: a block is
/// open exactly when the mode is not `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    Text,
    File,
    Patch,
}

/// A FILE or PATCH block between its start tag and its end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBlock {
    pub kind: BlockKind,
    pub path: String,
    pub content: String,
    /// Still waiting to drop the line break that follows the start tag.
    pub(crate) at_start: bool,
}

impl OpenBlock {
    pub(crate) fn new(kind: BlockKind, path: String) -> Self {
        Self {
            kind,
            path,
            content: String::new(),
            at_start: true,
        }
    }
}

/// Complete machine state. Transitions consume a state and return the next
/// one, so the parser has no hidden mutation beyond this value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    /// Raw text received but not yet classified.
    pub(crate) buffer: String,
    pub(crate) block: Option<OpenBlock>,
    /// Set when a block closes; leading whitespace of the narrative text
    /// that follows is dropped until the first visible character.
    pub(crate) swallow_whitespace: bool,
}

impl ParserState {
    pub fn mode(&self) -> ParserMode {
        match &self.block {
            None => ParserMode::Text,
            Some(block) => match block.kind {
                BlockKind::File => ParserMode::File,
                BlockKind::Patch => ParserMode::Patch,
            },
        }
    }

    pub fn open_block(&self) -> Option<&OpenBlock> {
        self.block.as_ref()
    }

    pub fn current_path(&self) -> Option<&str> {
        self.block.as_ref().map(|block| block.path.as_str())
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A file content update. Partial updates (`is_complete == false`) carry
/// everything accumulated so far and are provisional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUpdate {
    pub path: String,
    pub content: String,
    pub is_complete: bool,
}

/// Something the caller should know about that is neither narrative text
/// nor a file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A PATCH block whose body had no usable directive. Nothing was
    /// changed and no narrative text was emitted.
    MalformedPatch { path: String, reason: String },
    /// The stream ended inside a block.
    UnterminatedBlock {
        block: BlockKind,
        path: String,
        dropped_bytes: usize,
        committed: bool,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedPatch { path, reason } => {
                write!(f, "malformed patch for '{path}': {reason}")
            }
            Diagnostic::UnterminatedBlock {
                block,
                path,
                dropped_bytes,
                committed,
            } => {
                if *committed {
                    write!(f, "unterminated {block} block for '{path}' committed as-is")
                } else {
                    write!(
                        f,
                        "unterminated {block} block for '{path}': {dropped_bytes} bytes dropped"
                    )
                }
            }
        }
    }
}

/// One unit of parser output, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Text(String),
    FileUpdate(FileUpdate),
    Diagnostic(Diagnostic),
}
