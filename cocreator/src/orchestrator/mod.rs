// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Build turn orchestration
//
// Responsibilities:
// - Open one model stream per turn and feed its fragments to a fresh parser
// - Keep the turn's working copy of the project files current
// - Forward text, file updates and diagnostics to the observer in order
// - Stop at the cancellation token without finishing the parser
// - Return the clean response and the final file map only on success

mod observer;

pub use observer::{ChannelObserver, NoopObserver, RecordingObserver, TurnObserver};

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, ConfigError, ModelSettings};
use crate::files::ProjectFileMap;
use crate::model::{ChatMessage, ChunkStream, ModelClient, ModelError, ModelRequest};
use crate::stream::{Diagnostic, ParserOptions, StreamEvent, StreamingTagParser};

// ---------------------------------------------------------------------------
// Turn results
// ---------------------------------------------------------------------------

/// The authoritative result of a turn whose stream ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTurn {
    pub turn_id: String,
    /// Narrative text with every tag and block removed.
    pub response: String,
    pub files: ProjectFileMap,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(CompletedTurn),
    /// The model stream failed to open or failed mid-stream. Updates
    /// already shown to the observer are not committed.
    Failed { message: String, error: ModelError },
    /// The cancellation token fired. Paths whose last update was complete
    /// are `committed`; paths last seen as partial are `provisional`.
    Cancelled {
        committed: Vec<String>,
        provisional: Vec<String>,
    },
}

impl TurnOutcome {
    pub fn completed(&self) -> Option<&CompletedTurn> {
        match self {
            TurnOutcome::Completed(turn) => Some(turn),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildOrchestrator
// ---------------------------------------------------------------------------

/// Drives build turns for one agent profile.
pub struct BuildOrchestrator {
    client: Arc<dyn ModelClient>,
    profile: String,
    parser_options: ParserOptions,
    model: ModelSettings,
}

impl BuildOrchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        profile: &str,
        parser_options: ParserOptions,
        model: ModelSettings,
    ) -> Self {
        Self {
            client,
            profile: profile.to_string(),
            parser_options,
            model,
        }
    }

    /// Orchestrator for a named profile of a loaded config.
    pub fn from_config(
        client: Arc<dyn ModelClient>,
        config: &Config,
        profile: &str,
    ) -> Result<Self, ConfigError> {
        let parser_options = config.parser_options(profile)?;
        Ok(Self::new(client, profile, parser_options, config.model.clone()))
    }

    /// Run one build turn: request a stream for `messages` and drive it
    /// against a working copy of `files`.
    pub async fn run_turn(
        &self,
        messages: Vec<ChatMessage>,
        files: &ProjectFileMap,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let turn_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "build_turn",
            turn_id = %turn_id,
            profile = %self.profile,
            model = %self.model.id,
        );

        async {
            let request = ModelRequest::new(&self.model, messages);
            let stream = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("turn cancelled before the stream opened");
                    return TurnOutcome::Cancelled {
                        committed: Vec::new(),
                        provisional: Vec::new(),
                    };
                }
                opened = self.client.stream(request) => opened,
            };

            match stream {
                Ok(stream) => self.drive(turn_id, stream, files, observer, cancel).await,
                Err(error) => failed(error),
            }
        }
        .instrument(span)
        .await
    }

    /// Drive an already-open stream through the parser. Exposed so callers
    /// with their own transport can reuse the turn semantics.
    pub async fn drive_stream(
        &self,
        stream: ChunkStream,
        files: &ProjectFileMap,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let turn_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("build_turn", turn_id = %turn_id, profile = %self.profile);
        self.drive(turn_id, stream, files, observer, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        turn_id: String,
        mut stream: ChunkStream,
        files: &ProjectFileMap,
        observer: &mut dyn TurnObserver,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        tracing::info!(files = files.len(), "build turn started");

        let mut parser = StreamingTagParser::new(self.parser_options.clone());
        let mut turn = WorkingTurn::new(files.clone());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let (committed, provisional) = turn.split_paths();
                    tracing::info!(
                        committed = committed.len(),
                        provisional = provisional.len(),
                        "build turn cancelled"
                    );
                    return TurnOutcome::Cancelled { committed, provisional };
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let events = parser.process_chunk(&chunk, &turn.files);
                    turn.apply(events, observer);
                }
                Some(Err(error)) => return failed(error),
                None => break,
            }
        }

        let events = parser.finish(&turn.files);
        turn.apply(events, observer);

        tracing::info!(
            response_bytes = turn.response.len(),
            files = turn.files.len(),
            diagnostics = turn.diagnostics.len(),
            "build turn completed"
        );

        TurnOutcome::Completed(CompletedTurn {
            turn_id,
            response: turn.response,
            files: turn.files,
            diagnostics: turn.diagnostics,
        })
    }
}

fn failed(error: ModelError) -> TurnOutcome {
    tracing::warn!(%error, "model stream failed");
    TurnOutcome::Failed {
        message: format!("The build could not be completed: {error}"),
        error,
    }
}

// ---------------------------------------------------------------------------
// Working state
// ---------------------------------------------------------------------------

/// Everything one turn accumulates while its stream is running.
struct WorkingTurn {
    files: ProjectFileMap,
    response: String,
    diagnostics: Vec<Diagnostic>,
    /// Whether the last update seen for each path was complete.
    touched: BTreeMap<String, bool>,
}

impl WorkingTurn {
    fn new(files: ProjectFileMap) -> Self {
        Self {
            files,
            response: String::new(),
            diagnostics: Vec::new(),
            touched: BTreeMap::new(),
        }
    }

    fn apply(&mut self, events: Vec<StreamEvent>, observer: &mut dyn TurnObserver) {
        for event in events {
            match event {
                StreamEvent::Text(text) => {
                    self.response.push_str(&text);
                    observer.on_text(&text);
                }
                StreamEvent::FileUpdate(update) => {
                    self.files.insert(update.path.clone(), update.content.clone());
                    self.touched.insert(update.path.clone(), update.is_complete);
                    observer.on_file_update(&update);
                }
                StreamEvent::Diagnostic(diagnostic) => {
                    tracing::warn!(%diagnostic, "stream diagnostic");
                    observer.on_diagnostic(&diagnostic);
                    self.diagnostics.push(diagnostic);
                }
            }
        }
    }

    fn split_paths(&self) -> (Vec<String>, Vec<String>) {
        let mut committed = Vec::new();
        let mut provisional = Vec::new();
        for (path, complete) in &self.touched {
            if *complete {
                committed.push(path.clone());
            } else {
                provisional.push(path.clone());
            }
        }
        (committed, provisional)
    }
}
