// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Tests for the streaming tag parser
//
// Tests cover:
//  1. Narrative text and a FILE block split across chunk boundaries
//  2. Fence stripping on final (not partial) FILE content
//  3. Partial FILE updates while a block is still open
//  4. PATCH blocks: success, missing file, unmatched search, malformed body
//  5. Nested and foreign tags inside an open block are literal content
//  6. Whitespace after a closing tag is swallowed across chunks
//  7. End-of-stream handling for narrative text and unterminated blocks
//  8. Chunk-boundary invariance over every two- and three-way split
//  9. Pure transition functions

use super::*;
use crate::files::{FileView, ProjectFileMap};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Everything observable about one parsed stream.
#[derive(Debug, PartialEq)]
struct Run {
    events: Vec<StreamEvent>,
    files: ProjectFileMap,
}

impl Run {
    fn narrative(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn texts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn updates(&self, complete: bool) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::FileUpdate(update) if update.is_complete == complete => {
                    Some((update.path.clone(), update.content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn final_updates(&self) -> Vec<(String, String)> {
        self.updates(true)
    }

    fn partial_updates(&self) -> Vec<(String, String)> {
        self.updates(false)
    }

    fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect()
    }
}

/// Parse `chunks` the way a build turn does: file updates are written to
/// the map before the next chunk is processed.
fn run_with(options: ParserOptions, mut files: ProjectFileMap, chunks: &[&str]) -> Run {
    let mut parser = StreamingTagParser::new(options);
    let mut events = Vec::new();

    for chunk in chunks {
        let batch = parser.process_chunk(chunk, &files);
        apply(&mut files, &batch);
        events.extend(batch);
    }
    let batch = parser.finish(&files);
    apply(&mut files, &batch);
    events.extend(batch);

    Run { events, files }
}

fn run(chunks: &[&str]) -> Run {
    run_with(ParserOptions::default(), ProjectFileMap::new(), chunks)
}

fn run_on(files: &[(&str, &str)], chunks: &[&str]) -> Run {
    let map = files.iter().copied().collect();
    run_with(ParserOptions::default(), map, chunks)
}

fn apply(files: &mut ProjectFileMap, events: &[StreamEvent]) {
    for event in events {
        if let StreamEvent::FileUpdate(update) = event {
            files.insert(update.path.clone(), update.content.clone());
        }
    }
}

fn char_boundaries(text: &str) -> Vec<usize> {
    (1..text.len()).filter(|i| text.is_char_boundary(*i)).collect()
}

/// The comparable outcome of a run: chunking may change when partial
/// updates and text fragments are emitted, but never this.
fn outcome(run: &Run) -> (String, Vec<(String, String)>, Vec<Diagnostic>, ProjectFileMap) {
    (
        run.narrative(),
        run.final_updates(),
        run.diagnostics().into_iter().cloned().collect(),
        run.files.clone(),
    )
}

const TAG_PREFIXES: &[&str] = &["[FILE:", "[PATCH:", "[/FILE]", "[/PATCH]"];

// ---------------------------------------------------------------------------
// 1. Narrative text and FILE blocks across chunks
// ---------------------------------------------------------------------------

#[test]
fn file_tag_split_across_chunks() {
    let run = run(&["Hello ", "[FILE: a.", "lua]\nprint(1)", "\n[/FILE]\nDone"]);

    assert_eq!(
        run.events,
        vec![
            StreamEvent::Text("Hello ".to_string()),
            StreamEvent::FileUpdate(FileUpdate {
                path: "a.lua".to_string(),
                content: "print(1)\n".to_string(),
                is_complete: true,
            }),
            StreamEvent::Text("Done".to_string()),
        ]
    );
}

#[test]
fn full_file_round_trip() {
    let body = "local x = 1\nreturn x\n";
    let stream = format!("[FILE: a.txt]\n{body}[/FILE]");
    let run = run(&[stream.as_str()]);

    assert_eq!(run.final_updates(), vec![("a.txt".to_string(), body.to_string())]);
    assert!(run.texts().is_empty());
}

#[test]
fn keyword_case_is_normalized() {
    let run = run(&["[file:  Src/Main.lua ]\nx\n[/FILE]"]);
    assert_eq!(
        run.final_updates(),
        vec![("Src/Main.lua".to_string(), "x\n".to_string())]
    );
}

#[test]
fn text_and_blocks_keep_stream_order() {
    let run = run(&[
        "Intro\n[FILE: a]\n1\n[/FILE]\nMiddle\n[FILE: b]\n2\n[/FILE]\nOutro",
    ]);

    let order: Vec<String> = run
        .events
        .iter()
        .map(|event| match event {
            StreamEvent::Text(text) => format!("text:{text}"),
            StreamEvent::FileUpdate(update) => format!("file:{}", update.path),
            StreamEvent::Diagnostic(d) => format!("diag:{d}"),
        })
        .collect();

    assert_eq!(
        order,
        vec!["text:Intro\n", "file:a", "text:Middle\n", "file:b", "text:Outro"]
    );
}

#[test]
fn brackets_that_are_not_tags_flow_as_text() {
    let run = run(&["items[0] and ", "[link](url) and [FILES: no]"]);
    assert_eq!(run.narrative(), "items[0] and [link](url) and [FILES: no]");
    assert!(run.final_updates().is_empty());
}

#[test]
fn pending_tag_prefix_is_not_emitted_early() {
    let mut parser = StreamingTagParser::new(ParserOptions::default());
    let files = ProjectFileMap::new();

    let events = parser.process_chunk("Writing [FI", &files);
    assert_eq!(events, vec![StreamEvent::Text("Writing ".to_string())]);
    assert_eq!(parser.state().buffered(), "[FI");
    assert_eq!(parser.state().mode(), ParserMode::Text);

    let events = parser.process_chunk("LE: x.md]", &files);
    assert!(events.is_empty());
    assert_eq!(parser.state().mode(), ParserMode::File);
    assert_eq!(parser.state().current_path(), Some("x.md"));
}

// ---------------------------------------------------------------------------
// 2. Fence stripping
// ---------------------------------------------------------------------------

#[test]
fn fences_are_stripped_from_final_content() {
    let run = run(&["[FILE: a.lua]\n```lua\nprint(1)\n```\n[/FILE]"]);
    assert_eq!(
        run.final_updates(),
        vec![("a.lua".to_string(), "print(1)\n".to_string())]
    );
}

#[test]
fn partial_content_keeps_fences() {
    let run = run(&[
        "[FILE: a.lua]\n```lua\nprint('hello world')\n",
        "print('again')\n```\n[/FILE]",
    ]);

    let partials = run.partial_updates();
    assert!(!partials.is_empty());
    assert!(partials[0].1.starts_with("```lua\n"));
    assert_eq!(
        run.final_updates(),
        vec![(
            "a.lua".to_string(),
            "print('hello world')\nprint('again')\n".to_string()
        )]
    );
}

#[test]
fn fence_stripping_can_be_disabled() {
    let options = ParserOptions {
        strip_fences: false,
        ..ParserOptions::default()
    };
    let run = run_with(
        options,
        ProjectFileMap::new(),
        &["[FILE: notes.md]\n```\ncode\n```\n[/FILE]"],
    );
    assert_eq!(
        run.final_updates(),
        vec![("notes.md".to_string(), "```\ncode\n```\n".to_string())]
    );
}

// ---------------------------------------------------------------------------
// 3. Partial FILE updates
// ---------------------------------------------------------------------------

#[test]
fn partial_updates_grow_and_never_contain_the_end_tag() {
    let body = "0123456789".repeat(3) + "\n";
    let stream = format!("[FILE: big.txt]\n{body}[/FILE]");
    let chunks: Vec<String> = stream
        .as_bytes()
        .chunks(5)
        .map(|c| String::from_utf8(c.to_vec()).unwrap())
        .collect();
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

    let run = run(&chunk_refs);
    let partials = run.partial_updates();

    assert!(partials.len() >= 2);
    let mut previous = 0;
    for (path, content) in &partials {
        assert_eq!(path, "big.txt");
        assert!(body.starts_with(content.as_str()));
        assert!(content.len() > previous);
        assert!(!content.contains("[/"));
        previous = content.len();
    }
    assert_eq!(run.final_updates(), vec![("big.txt".to_string(), body)]);
}

#[test]
fn short_content_is_held_back_by_the_safety_margin() {
    let mut parser = StreamingTagParser::new(ParserOptions::default());
    let files = ProjectFileMap::new();

    let events = parser.process_chunk("[FILE: a]\n123456789", &files);
    assert!(events.is_empty());
    assert_eq!(parser.state().buffered(), "123456789");

    let events = parser.process_chunk("ab", &files);
    assert_eq!(
        events,
        vec![StreamEvent::FileUpdate(FileUpdate {
            path: "a".to_string(),
            content: "1".to_string(),
            is_complete: false,
        })]
    );
}

#[test]
fn multibyte_content_splits_on_char_boundaries() {
    let body = "héllo wörld ✓ ünïcode ✓✓✓\n";
    let stream = format!("[FILE: u.txt]\n{body}[/FILE]");
    let chunks: Vec<String> = stream.chars().map(String::from).collect();
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

    let run = run(&chunk_refs);
    for (_, content) in run.partial_updates() {
        assert!(body.starts_with(&content));
    }
    assert_eq!(run.final_updates(), vec![("u.txt".to_string(), body.to_string())]);
}

// ---------------------------------------------------------------------------
// 4. PATCH blocks
// ---------------------------------------------------------------------------

#[test]
fn patch_applies_against_existing_file() {
    let run = run_on(
        &[("f.txt", "x\nold\ny")],
        &["[PATCH: f.txt]\n<<<<\nold\n====\nnew\n>>>>\n[/PATCH]"],
    );

    assert_eq!(
        run.final_updates(),
        vec![("f.txt".to_string(), "x\nnew\ny".to_string())]
    );
    assert!(run.partial_updates().is_empty());
    assert!(run.texts().is_empty());
}

#[test]
fn patch_content_is_never_partially_emitted() {
    let stream = "[PATCH: f.txt]\n<<<<\nlocal a = 1\n====\nlocal a = 2\n>>>>\n[/PATCH]";
    let chunks: Vec<String> = stream.chars().map(String::from).collect();
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

    let run = run_on(&[("f.txt", "local a = 1\nprint(a)\n")], &chunk_refs);

    assert!(run.partial_updates().is_empty());
    assert_eq!(
        run.final_updates(),
        vec![("f.txt".to_string(), "local a = 2\nprint(a)\n".to_string())]
    );
}

#[test]
fn patch_on_missing_file_reports_inline_error() {
    let run = run(&["[PATCH: ghost.lua]\n<<<<\na\n====\nb\n>>>>\n[/PATCH]"]);

    assert!(run.final_updates().is_empty());
    assert_eq!(
        run.narrative(),
        "\n[SYSTEM ERROR]: Failed to apply patch to ghost.lua: file not found.\n"
    );
    assert!(run.files.is_empty());
}

#[test]
fn patch_with_unmatched_search_leaves_file_untouched() {
    let run = run_on(
        &[("f.txt", "alpha\n")],
        &["[PATCH: f.txt]\n<<<<\nbeta\n====\ngamma\n>>>>\n[/PATCH]"],
    );

    assert!(run.final_updates().is_empty());
    assert!(run
        .narrative()
        .contains("[SYSTEM ERROR]: Failed to apply patch to f.txt: search block not found."));
    assert_eq!(run.files.file_content("f.txt"), Some("alpha\n"));
}

#[test]
fn patch_matching_only_after_normalization_is_refused() {
    let run = run_on(
        &[("f.lua", "if x then\n    go()\nend\n")],
        &["[PATCH: f.lua]\n<<<<\nif x then\ngo()\nend\n====\nstop()\n>>>>\n[/PATCH]"],
    );

    assert!(run.final_updates().is_empty());
    assert!(run.narrative().contains("different whitespace"));
    assert_eq!(
        run.files.file_content("f.lua"),
        Some("if x then\n    go()\nend\n")
    );
}

#[test]
fn malformed_patch_is_silent_in_narrative() {
    let run = run_on(
        &[("a.txt", "old")],
        &["[PATCH: a.txt]\n<<<<\nold\nnew\n>>>>\n[/PATCH]"],
    );

    assert!(run.final_updates().is_empty());
    assert!(run.partial_updates().is_empty());
    assert!(run.texts().is_empty());
    assert_eq!(
        run.diagnostics(),
        vec![&Diagnostic::MalformedPatch {
            path: "a.txt".to_string(),
            reason: "missing \"====\" marker".to_string(),
        }]
    );
}

#[test]
fn patch_sees_file_written_earlier_in_same_chunk() {
    let run = run(&[
        "[FILE: a.txt]\nhello world\n[/FILE]\n[PATCH: a.txt]\n<<<<\nworld\n====\nthere\n>>>>\n[/PATCH]",
    ]);

    assert_eq!(
        run.final_updates(),
        vec![
            ("a.txt".to_string(), "hello world\n".to_string()),
            ("a.txt".to_string(), "hello there\n".to_string()),
        ]
    );
}

#[test]
fn consecutive_patches_build_on_each_other() {
    let run = run_on(
        &[("n.txt", "one two three")],
        &[
            "[PATCH: n.txt]\n<<<<\none\n====\n1\n>>>>\n[/PATCH]\n",
            "[PATCH: n.txt]\n<<<<\n1 two\n====\n1 2\n>>>>\n[/PATCH]",
        ],
    );
    assert_eq!(run.files.file_content("n.txt"), Some("1 2 three"));
}

#[test]
fn patch_tag_is_text_when_patches_disabled() {
    let options = ParserOptions {
        patch_keyword: None,
        ..ParserOptions::default()
    };
    let run = run_with(
        options,
        ProjectFileMap::new(),
        &["see [PATCH: a.txt] here"],
    );
    assert_eq!(run.narrative(), "see [PATCH: a.txt] here");
}

// ---------------------------------------------------------------------------
// 5. Literal content inside an open block
// ---------------------------------------------------------------------------

#[test]
fn nested_start_tag_is_literal_content() {
    let run = run(&["[FILE: a.md]\nsee [FILE: b.md] here\n[/FILE]"]);
    assert_eq!(
        run.final_updates(),
        vec![("a.md".to_string(), "see [FILE: b.md] here\n".to_string())]
    );
}

#[test]
fn only_the_open_blocks_end_tag_closes_it() {
    let run = run(&["[FILE: a]\n[/PATCH]\nx[/file]\n[/FILE]"]);
    assert_eq!(
        run.final_updates(),
        vec![("a".to_string(), "[/PATCH]\nx[/file]\n".to_string())]
    );
}

#[test]
fn custom_keywords_change_both_tags() {
    let options = ParserOptions {
        file_keyword: "DOC".to_string(),
        patch_keyword: Some("EDIT".to_string()),
        ..ParserOptions::default()
    };
    let run = run_with(
        options,
        ProjectFileMap::new(),
        &["[Doc: r.md]\n# Report\n[/FILE]\n[/DOC]"],
    );
    assert_eq!(
        run.final_updates(),
        vec![("r.md".to_string(), "# Report\n[/FILE]\n".to_string())]
    );
}

// ---------------------------------------------------------------------------
// 6. Whitespace after a closing tag
// ---------------------------------------------------------------------------

#[test]
fn whitespace_after_end_tag_is_swallowed_across_chunks() {
    let run = run(&["[FILE: a]\nx\n[/FILE]", "\n\n", "  Next"]);
    assert_eq!(run.narrative(), "Next");
}

#[test]
fn trailing_whitespace_only_after_block_emits_nothing() {
    let run = run(&["[FILE: a]\nx\n[/FILE]\n   \n"]);
    assert!(run.texts().is_empty());
}

// ---------------------------------------------------------------------------
// 7. End of stream
// ---------------------------------------------------------------------------

#[test]
fn finish_flushes_pending_text() {
    let run = run(&["look at [FIL"]);
    assert_eq!(run.texts(), vec!["look at ", "[FIL"]);
}

#[test]
fn unterminated_file_is_dropped_with_diagnostic() {
    let mut parser = StreamingTagParser::new(ParserOptions::default());
    let files = ProjectFileMap::new();

    parser.process_chunk("[FILE: a.txt]\npartial content", &files);
    let events = parser.finish(&files);

    assert_eq!(
        events,
        vec![StreamEvent::Diagnostic(Diagnostic::UnterminatedBlock {
            block: BlockKind::File,
            path: "a.txt".to_string(),
            dropped_bytes: 15,
            committed: false,
        })]
    );
    assert_eq!(parser.state(), &ParserState::default());
}

#[test]
fn unterminated_file_can_be_committed() {
    let options = ParserOptions {
        unterminated: UnterminatedPolicy::Commit,
        ..ParserOptions::default()
    };
    let run = run_with(
        options,
        ProjectFileMap::new(),
        &["[FILE: a.lua]\n```lua\nprint(1)\n"],
    );

    assert_eq!(
        run.final_updates(),
        vec![("a.lua".to_string(), "print(1)\n".to_string())]
    );
    assert!(matches!(
        run.diagnostics()[..],
        [Diagnostic::UnterminatedBlock { committed: true, .. }]
    ));
}

#[test]
fn unterminated_patch_is_never_committed() {
    let options = ParserOptions {
        unterminated: UnterminatedPolicy::Commit,
        ..ParserOptions::default()
    };
    let files: ProjectFileMap = [("a.txt", "old")].into_iter().collect();
    let run = run_with(options, files, &["[PATCH: a.txt]\n<<<<\nold\n====\nnew\n>>>>\n"]);

    assert!(run.final_updates().is_empty());
    assert_eq!(run.files.file_content("a.txt"), Some("old"));
    assert!(matches!(
        run.diagnostics()[..],
        [Diagnostic::UnterminatedBlock {
            block: BlockKind::Patch,
            committed: false,
            ..
        }]
    ));
}

// ---------------------------------------------------------------------------
// 8. Chunk-boundary invariance
// ---------------------------------------------------------------------------

const INVARIANCE_STREAMS: &[&str] = &[
    "Hello [FILE: a.lua]\nprint(1)\n[/FILE]\nDone",
    "Intro [x] [FILE: src/app.js]\n```js\nconst a = [1, 2];\n```\n[/FILE]\n\n  Then [PATCH: src/app.js]\n<<<<\nconst a = [1, 2];\n====\nconst a = [3];\n>>>>\n[/PATCH]\nEnd [FIL",
    "[PATCH: missing.txt]\n<<<<\na\n====\nb\n>>>>\n[/PATCH] after",
    "Unicode ✓ [FILE: ü.txt]\r\nhéllo ✓\r\n[/FILE]\r\nbye ✓",
    "[FILE: a]\nno end tag here, stream truncated",
];

#[test]
fn every_two_way_split_gives_the_same_outcome() {
    for &stream in INVARIANCE_STREAMS {
        let reference = outcome(&run(&[stream]));
        for at in char_boundaries(stream) {
            let split = run(&[&stream[..at], &stream[at..]]);
            assert_eq!(outcome(&split), reference, "stream {stream:?} split at {at}");
        }
    }
}

#[test]
fn every_three_way_split_gives_the_same_outcome() {
    let stream = INVARIANCE_STREAMS[0];
    let reference = outcome(&run(&[stream]));
    let cuts = char_boundaries(stream);

    for (i, a) in cuts.iter().enumerate() {
        for b in &cuts[i + 1..] {
            let split = run(&[&stream[..*a], &stream[*a..*b], &stream[*b..]]);
            assert_eq!(outcome(&split), reference, "cuts {a}, {b}");
        }
    }
}

#[test]
fn single_char_chunks_give_the_same_outcome() {
    for &stream in INVARIANCE_STREAMS {
        let reference = outcome(&run(&[stream]));
        let chars: Vec<String> = stream.chars().map(String::from).collect();
        let chunk_refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(outcome(&run(&chunk_refs)), reference, "stream {stream:?}");
    }
}

#[test]
fn no_tag_prefix_leaks_into_narrative() {
    for &stream in INVARIANCE_STREAMS {
        let chars: Vec<String> = stream.chars().map(String::from).collect();
        let chunk_refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        let run = run(&chunk_refs);

        for text in run.texts() {
            for tag in TAG_PREFIXES {
                assert!(!text.contains(tag), "{text:?} leaked {tag}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 9. Pure transitions
// ---------------------------------------------------------------------------

#[test]
fn advance_is_deterministic_over_state_values() {
    let options = ParserOptions::default();
    let files = ProjectFileMap::new();

    let (state, first) = advance(ParserState::default(), "Hi [FILE: a]\nab", &options, &files);
    let (again, second) = advance(ParserState::default(), "Hi [FILE: a]\nab", &options, &files);

    assert_eq!(state, again);
    assert_eq!(first, second);
    assert_eq!(state.mode(), ParserMode::File);
    assert_eq!(state.open_block().map(|b| b.kind), Some(BlockKind::File));

    let events = conclude(state, &options, &files);
    assert!(matches!(
        events[..],
        [StreamEvent::Diagnostic(Diagnostic::UnterminatedBlock { .. })]
    ));
}

#[test]
fn file_view_is_only_read() {
    let files: ProjectFileMap = [("f.txt", "old")].into_iter().collect();
    let options = ParserOptions::default();

    let (_, events) = advance(
        ParserState::default(),
        "[PATCH: f.txt]\n<<<<\nold\n====\nnew\n>>>>\n[/PATCH]",
        &options,
        &files,
    );

    assert_eq!(files.file_content("f.txt"), Some("old"));
    assert_eq!(
        events,
        vec![StreamEvent::FileUpdate(FileUpdate {
            path: "f.txt".to_string(),
            content: "new".to_string(),
            is_complete: true,
        })]
    );
}
