// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Search/replace patching
//
// A PATCH block body carries one directive:
//
//   <<<<
//   old text
//   ====
//   new text
//   >>>>
//
// The search text is applied as an exact, first-occurrence substitution.
// A whitespace-normalized match is only ever detected, never applied.

const OPEN_MARKER: &str = "<<<<";
const SEPARATOR_MARKER: &str = "====";
const CLOSE_MARKER: &str = ">>>>";
const MARKER_LEN: usize = 4;

/// Labels that may follow the opening marker on its own line
/// (`<<<<<<< SEARCH`).
const OPEN_LABELS: &[&str] = &["SEARCH", "ORIGINAL"];

/// Why a patch could not be parsed or applied.
///
/// The `Display` text is what ends up in the inline `[SYSTEM ERROR]` line
/// shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("missing \"{marker}\" marker")]
    MissingMarker { marker: &'static str },

    #[error("no target file path")]
    MissingPath,

    #[error("file not found")]
    FileNotFound,

    #[error("search block not found")]
    SearchNotFound,

    #[error("search block only matches with different whitespace")]
    WhitespaceMismatch,
}

/// A parsed search/replace instruction for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDirective {
    pub file_path: String,
    pub search: String,
    pub replace: String,
}

impl PatchDirective {
    /// Extract a directive from a PATCH block body.
    ///
    /// Markers are located left to right: the first `<<<<`, the first
    /// `====` after it, and the *last* `>>>>` after that, so the close
    /// marker may also appear inside the replacement text. Longer marker
    /// runs (`=======`) count as one marker only where they stand alone:
    /// an open or separator run must be followed by whitespace or the end
    /// of the body, and a close run must start its line. Elsewhere the
    /// extra characters belong to the text, so `<h1>>>>>` keeps its `>`.
    ///
    /// The search text is trimmed. The replacement keeps its own leading and
    /// trailing whitespace; only the line break ending the `====` line and
    /// the one before the `>>>>` line belong to the markers.
    pub fn parse(file_path: &str, body: &str) -> Result<Self, PatchError> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            return Err(PatchError::MissingPath);
        }

        let open_at = body.find(OPEN_MARKER).ok_or(PatchError::MissingMarker {
            marker: OPEN_MARKER,
        })?;
        let search_start = skip_label(body, marker_end(body, open_at, b'<'));

        let separator_at = body[search_start..]
            .find(SEPARATOR_MARKER)
            .map(|rel| search_start + rel)
            .ok_or(PatchError::MissingMarker {
                marker: SEPARATOR_MARKER,
            })?;
        let replace_start = marker_end(body, separator_at, b'=');

        let close_at = body[replace_start..]
            .rfind(CLOSE_MARKER)
            .map(|rel| close_run_start(body, replace_start, replace_start + rel))
            .ok_or(PatchError::MissingMarker {
                marker: CLOSE_MARKER,
            })?;

        Ok(Self {
            file_path: file_path.to_string(),
            search: body[search_start..separator_at].trim().to_string(),
            replace: strip_marker_line_breaks(&body[replace_start..close_at]).to_string(),
        })
    }
}

/// Result of attempting a patch, with the reason when it did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(String),
    /// The search text exists once whitespace is normalized, but applying
    /// it would mean guessing at the original whitespace.
    WhitespaceOnly,
    NotFound,
}

impl PatchOutcome {
    pub fn into_result(self) -> Result<String, PatchError> {
        match self {
            PatchOutcome::Applied(content) => Ok(content),
            PatchOutcome::WhitespaceOnly => Err(PatchError::WhitespaceMismatch),
            PatchOutcome::NotFound => Err(PatchError::SearchNotFound),
        }
    }
}

/// Apply a search/replace patch, returning the new content or `None`.
///
/// `original` is never modified. Only the first occurrence of `search` is
/// replaced; an empty `search` matches at offset zero.
pub fn apply_patch(original: &str, search: &str, replace: &str) -> Option<String> {
    match try_apply_patch(original, search, replace) {
        PatchOutcome::Applied(content) => Some(content),
        PatchOutcome::WhitespaceOnly | PatchOutcome::NotFound => None,
    }
}

/// Like [`apply_patch`] but reports why a patch did not apply.
pub fn try_apply_patch(original: &str, search: &str, replace: &str) -> PatchOutcome {
    if original.contains(search) {
        return PatchOutcome::Applied(original.replacen(search, replace, 1));
    }

    let normalized_search = normalize_whitespace(search);
    if !normalized_search.is_empty() && normalize_whitespace(original).contains(&normalized_search)
    {
        return PatchOutcome::WhitespaceOnly;
    }

    PatchOutcome::NotFound
}

/// Trim every line, drop blank lines, rejoin with `\n`.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index just past the opening or separator marker found at `at`.
///
/// A run longer than four characters is consumed whole only when it is
/// followed by whitespace, an opening label or the end of the body.
/// Otherwise only the four marker characters are, and the rest of the run
/// is text.
fn marker_end(body: &str, at: usize, marker: u8) -> usize {
    let bytes = body.as_bytes();
    let mut end = at;
    while end < bytes.len() && bytes[end] == marker {
        end += 1;
    }
    let standalone = match bytes.get(end) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || (marker == b'<' && is_label_line(&body[end..])),
    };
    if standalone {
        end
    } else {
        at + MARKER_LEN
    }
}

fn is_label_line(rest: &str) -> bool {
    let line_end = rest.find('\n').unwrap_or(rest.len());
    let label = rest[..line_end].trim();
    OPEN_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label))
}

/// Start of the closing marker whose last four characters begin at `at`.
///
/// The marker extends back over further `>` only when the whole run begins
/// a line (or the replacement); a `>` ending the replacement text stays.
fn close_run_start(body: &str, replace_start: usize, at: usize) -> usize {
    let bytes = body.as_bytes();
    let mut start = at;
    while start > replace_start && bytes[start - 1] == b'>' {
        start -= 1;
    }
    if start == at || start == replace_start || bytes[start - 1] == b'\n' {
        start
    } else {
        at
    }
}

/// Skip a `SEARCH`-style label when it is the only thing left on the
/// opening marker's line. Anything else is search text.
fn skip_label(body: &str, at: usize) -> usize {
    let rest = &body[at..];
    if is_label_line(rest) {
        at + rest.find('\n').unwrap_or(rest.len())
    } else {
        at
    }
}

fn strip_marker_line_breaks(replace: &str) -> &str {
    let mut text = replace;

    let head = text.trim_start_matches([' ', '\t']);
    if let Some(rest) = head
        .strip_prefix("\r\n")
        .or_else(|| head.strip_prefix('\n'))
    {
        text = rest;
    }

    let tail = text.trim_end_matches([' ', '\t']);
    if let Some(rest) = tail
        .strip_suffix("\r\n")
        .or_else(|| tail.strip_suffix('\n'))
    {
        text = rest;
    }

    text
}
