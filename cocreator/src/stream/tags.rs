// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Tag grammar
//
// Start tags: `[FILE: <path>]`, `[PATCH: <path>]`. The keyword is matched
// case-insensitively; whitespace is allowed after `[`, around `:` and before
// `]`. The path is the trimmed text between `:` and `]`.
//
// The scanner distinguishes a complete tag, a buffer that may still become a
// tag once more input arrives, and text that can never be a tag. The second
// case is what keeps split tags out of narrative output.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{BlockKind, ParserOptions};

/// Result of looking for a start tag in the narrative buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StartScan {
    /// A complete tag spans `start..end`.
    Tag {
        start: usize,
        end: usize,
        kind: BlockKind,
        path: String,
    },
    /// Text from `start` onward could still become a tag.
    Pending { start: usize },
    /// The buffer contains no tag and no tag prefix.
    None,
}

/// Outcome of scanning from a single `[`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TagAt {
    Complete {
        len: usize,
        kind: BlockKind,
        path: String,
    },
    Partial,
    Invalid,
}

/// Find the earliest start tag, or the earliest `[` that may still begin one.
///
/// A `[` that scans as partial has no `]` after it, so no later `[` can
/// complete a tag either; the first partial candidate ends the search.
pub(crate) fn find_start_tag(buffer: &str, options: &ParserOptions) -> StartScan {
    for (start, _) in buffer.match_indices('[') {
        match scan_tag_at(&buffer[start..], options) {
            TagAt::Complete { len, kind, path } => {
                return StartScan::Tag {
                    start,
                    end: start + len,
                    kind,
                    path,
                }
            }
            TagAt::Partial => return StartScan::Pending { start },
            TagAt::Invalid => continue,
        }
    }
    StartScan::None
}

/// Scan a start tag at the beginning of `text`, which starts with `[`.
fn scan_tag_at(text: &str, options: &ParserOptions) -> TagAt {
    let rest = text[1..].trim_start();
    if rest.is_empty() {
        return TagAt::Partial;
    }

    let ident_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let ident = &rest[..ident_len];

    if ident_len == rest.len() {
        // Keyword still arriving.
        return if keyword_prefix(ident, options) {
            TagAt::Partial
        } else {
            TagAt::Invalid
        };
    }

    let Some(kind) = keyword_kind(ident, options) else {
        return TagAt::Invalid;
    };

    let after_ident = rest[ident_len..].trim_start();
    let Some(after_colon) = after_ident.strip_prefix(':') else {
        return if after_ident.is_empty() {
            TagAt::Partial
        } else {
            TagAt::Invalid
        };
    };

    let Some(close) = after_colon.find(']') else {
        return TagAt::Partial;
    };
    let path = after_colon[..close].trim();
    if path.is_empty() {
        return TagAt::Invalid;
    }

    let len = text.len() - after_colon.len() + close + 1;
    TagAt::Complete {
        len,
        kind,
        path: path.to_string(),
    }
}

fn keyword_kind(ident: &str, options: &ParserOptions) -> Option<BlockKind> {
    [BlockKind::File, BlockKind::Patch]
        .into_iter()
        .find(|kind| {
            options
                .keyword(*kind)
                .is_some_and(|keyword| keyword.eq_ignore_ascii_case(ident))
        })
}

fn keyword_prefix(ident: &str, options: &ParserOptions) -> bool {
    [BlockKind::File, BlockKind::Patch].into_iter().any(|kind| {
        options.keyword(kind).is_some_and(|keyword| {
            keyword
                .get(..ident.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ident))
        })
    })
}

// ---------------------------------------------------------------------------
// Markdown fences
// ---------------------------------------------------------------------------

static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*```[^`\n]*\n").expect("leading fence pattern is valid")
});

static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\A|\n)[ \t]*```\s*\z").expect("trailing fence pattern is valid")
});

/// Remove a leading fence line (three backticks and an optional language
/// tag) and a trailing fence line from final FILE content.
///
/// The newline ending the last content line is kept.
pub(crate) fn strip_fences(content: &str) -> String {
    let body = LEADING_FENCE
        .find(content)
        .map_or(content, |m| &content[m.end()..]);

    match TRAILING_FENCE.find(body) {
        Some(m) => {
            let mut out = body[..m.start()].to_string();
            if body[m.start()..].starts_with('\n') {
                out.push('\n');
            }
            out
        }
        None => body.to_string(),
    }
}
