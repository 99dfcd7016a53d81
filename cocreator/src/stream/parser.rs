// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Streaming tag parser
//
// Consumes model output one fragment at a time and splits it into narrative
// text, whole-file blocks and patch blocks. The machine is a value:
// `advance` and `conclude` take a `ParserState` and return the next state
// together with the events produced. `StreamingTagParser` only owns the
// options and the current state between calls.

use std::collections::HashMap;

use super::tags::{find_start_tag, strip_fences, StartScan};
use super::types::{
    BlockKind, Diagnostic, FileUpdate, OpenBlock, ParserOptions, ParserState, StreamEvent,
    UnterminatedPolicy,
};
use crate::files::FileView;
use crate::patch::{try_apply_patch, PatchDirective, PatchError};

/// Stateful wrapper around [`advance`] and [`conclude`].
///
/// Create one per model stream; call [`process_chunk`](Self::process_chunk)
/// for every fragment, then [`finish`](Self::finish) once.
#[derive(Debug, Clone)]
pub struct StreamingTagParser {
    options: ParserOptions,
    state: ParserState,
}

impl StreamingTagParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            state: ParserState::default(),
        }
    }

    /// Feed one fragment. `files` is consulted for PATCH targets.
    pub fn process_chunk(&mut self, chunk: &str, files: &dyn FileView) -> Vec<StreamEvent> {
        let state = std::mem::take(&mut self.state);
        let (next, events) = advance(state, chunk, &self.options, files);
        self.state = next;
        events
    }

    /// Flush at end of stream. The parser is reset afterwards.
    pub fn finish(&mut self, files: &dyn FileView) -> Vec<StreamEvent> {
        let state = std::mem::take(&mut self.state);
        conclude(state, &self.options, files)
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &ParserState {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Append `chunk` and run the machine until it stops making progress.
///
/// Every loop iteration either consumes buffered text, changes mode or
/// emits output; the first iteration that does none of these ends the call
/// and leaves the rest buffered for the next chunk.
pub fn advance(
    mut state: ParserState,
    chunk: &str,
    options: &ParserOptions,
    files: &dyn FileView,
) -> (ParserState, Vec<StreamEvent>) {
    state.buffer.push_str(chunk);

    let mut out = Emitter::new(files);
    loop {
        let progressed = if state.block.is_some() {
            step_block(&mut state, options, &mut out)
        } else {
            step_text(&mut state, options, &mut out)
        };
        if !progressed {
            break;
        }
    }

    (state, out.events)
}

/// End of stream: flush narrative text and settle any unterminated block.
pub fn conclude(
    state: ParserState,
    options: &ParserOptions,
    files: &dyn FileView,
) -> Vec<StreamEvent> {
    let mut out = Emitter::new(files);
    let ParserState {
        buffer,
        block,
        swallow_whitespace,
    } = state;

    match block {
        None => {
            let text = if swallow_whitespace {
                buffer.trim_start()
            } else {
                buffer.as_str()
            };
            out.text(text);
        }
        Some(mut block) => {
            push_content(&mut block, &buffer);
            settle_unterminated(block, options, &mut out);
        }
    }

    out.events
}

fn step_text(state: &mut ParserState, options: &ParserOptions, out: &mut Emitter<'_>) -> bool {
    if state.swallow_whitespace {
        let visible = state.buffer.trim_start().len();
        let skipped = state.buffer.len() - visible;
        if visible == 0 {
            state.buffer.clear();
            return skipped > 0;
        }
        state.buffer.drain(..skipped);
        state.swallow_whitespace = false;
    }

    if state.buffer.is_empty() {
        return false;
    }

    match find_start_tag(&state.buffer, options) {
        StartScan::Tag {
            start,
            end,
            kind,
            path,
        } => {
            out.text(&state.buffer[..start]);
            state.buffer.drain(..end);
            tracing::debug!(block = %kind, path = %path, "block opened");
            state.block = Some(OpenBlock::new(kind, path));
            true
        }
        StartScan::Pending { start } => {
            if start == 0 {
                return false;
            }
            out.text(&state.buffer[..start]);
            state.buffer.drain(..start);
            true
        }
        StartScan::None => {
            out.text(&state.buffer);
            state.buffer.clear();
            true
        }
    }
}

fn step_block(state: &mut ParserState, options: &ParserOptions, out: &mut Emitter<'_>) -> bool {
    let ParserState {
        buffer,
        block,
        swallow_whitespace,
    } = state;
    let Some(open) = block.as_mut() else {
        return false;
    };

    if open.at_start {
        // The line break right after the start tag is not content. A lone
        // `\r` may be the first half of `\r\n`, so wait for more input.
        if buffer.is_empty() || buffer.as_str() == "\r" {
            return false;
        }
        let skip = if buffer.starts_with("\r\n") {
            2
        } else if buffer.starts_with('\n') {
            1
        } else {
            0
        };
        buffer.drain(..skip);
        open.at_start = false;
    }

    let end_tag = options.end_tag(open.kind);
    if let Some(at) = buffer.find(&end_tag) {
        open.content.push_str(&buffer[..at]);
        buffer.drain(..at + end_tag.len());
        *swallow_whitespace = true;
        if let Some(closed) = block.take() {
            close_block(closed, options, out);
        }
        return true;
    }

    let margin = options.effective_margin();
    if buffer.len() <= margin {
        return false;
    }
    let mut split = buffer.len() - margin;
    while !buffer.is_char_boundary(split) {
        split -= 1;
    }
    if split == 0 {
        return false;
    }

    open.content.push_str(&buffer[..split]);
    buffer.drain(..split);
    if open.kind == BlockKind::File {
        out.file_update(&open.path, open.content.clone(), false);
    }
    true
}

/// Append the unconsumed tail of a block at end of stream, honouring a
/// pending start-of-block line break.
fn push_content(block: &mut OpenBlock, tail: &str) {
    let tail = if block.at_start {
        tail.strip_prefix("\r\n")
            .or_else(|| tail.strip_prefix('\n'))
            .unwrap_or(tail)
    } else {
        tail
    };
    block.content.push_str(tail);
}

fn close_block(block: OpenBlock, options: &ParserOptions, out: &mut Emitter<'_>) {
    match block.kind {
        BlockKind::File => {
            let content = if options.strip_fences {
                strip_fences(&block.content)
            } else {
                block.content
            };
            tracing::debug!(path = %block.path, bytes = content.len(), "file block closed");
            out.file_update(&block.path, content, true);
        }
        BlockKind::Patch => apply_patch_block(&block.path, &block.content, out),
    }
}

fn apply_patch_block(path: &str, body: &str, out: &mut Emitter<'_>) {
    let directive = match PatchDirective::parse(path, body) {
        Ok(directive) => directive,
        Err(reason) => {
            out.diagnostic(Diagnostic::MalformedPatch {
                path: path.to_string(),
                reason: reason.to_string(),
            });
            return;
        }
    };

    let applied = match out.current_content(&directive.file_path) {
        None => Err(PatchError::FileNotFound),
        Some(original) => {
            try_apply_patch(original, &directive.search, &directive.replace).into_result()
        }
    };

    match applied {
        Ok(content) => {
            tracing::debug!(path = %directive.file_path, bytes = content.len(), "patch applied");
            out.file_update(&directive.file_path, content, true);
        }
        Err(reason) => {
            tracing::warn!(path = %directive.file_path, %reason, "patch not applied");
            out.text(&format!(
                "\n[SYSTEM ERROR]: Failed to apply patch to {}: {reason}.\n",
                directive.file_path
            ));
        }
    }
}

fn settle_unterminated(block: OpenBlock, options: &ParserOptions, out: &mut Emitter<'_>) {
    let commit =
        block.kind == BlockKind::File && options.unterminated == UnterminatedPolicy::Commit;

    let dropped_bytes = if commit { 0 } else { block.content.len() };
    out.diagnostic(Diagnostic::UnterminatedBlock {
        block: block.kind,
        path: block.path.clone(),
        dropped_bytes,
        committed: commit,
    });

    if commit {
        let content = if options.strip_fences {
            strip_fences(&block.content)
        } else {
            block.content
        };
        out.file_update(&block.path, content, true);
    }
}

// ---------------------------------------------------------------------------
// Event collection
// ---------------------------------------------------------------------------

/// Collects events for one transition and overlays the file updates made so
/// far on top of the caller's view, so a patch sees an earlier block from
/// the same chunk.
struct Emitter<'a> {
    files: &'a dyn FileView,
    written: HashMap<String, String>,
    events: Vec<StreamEvent>,
}

impl<'a> Emitter<'a> {
    fn new(files: &'a dyn FileView) -> Self {
        Self {
            files,
            written: HashMap::new(),
            events: Vec::new(),
        }
    }

    fn current_content(&self, path: &str) -> Option<&str> {
        match self.written.get(path) {
            Some(content) => Some(content.as_str()),
            None => self.files.file_content(path),
        }
    }

    fn text(&mut self, text: &str) {
        if !text.is_empty() {
            self.events.push(StreamEvent::Text(text.to_string()));
        }
    }

    fn file_update(&mut self, path: &str, content: String, is_complete: bool) {
        self.written.insert(path.to_string(), content.clone());
        self.events.push(StreamEvent::FileUpdate(FileUpdate {
            path: path.to_string(),
            content,
            is_complete,
        }));
    }

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.events.push(StreamEvent::Diagnostic(diagnostic));
    }
}
