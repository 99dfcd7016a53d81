// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Replay a recorded model transcript through one build turn.
//
// Events are printed to stdout as JSON lines in stream order; the final
// file map is written to `--out` when the turn completes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cocreator::config;
use cocreator::files::ProjectFileMap;
use cocreator::model::{ChatMessage, ScriptedModelClient};
use cocreator::orchestrator::{BuildOrchestrator, TurnObserver, TurnOutcome};
use cocreator::stream::{Diagnostic, FileUpdate, StreamEvent};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cocreator", about = "Replay a model transcript through a build turn")]
struct Cli {
    /// Path to the cocreator.yaml config file
    #[arg(long, default_value = "cocreator.yaml", env = "COCREATOR_CONFIG")]
    config: PathBuf,

    /// Agent profile whose parser options apply
    #[arg(long, default_value = "web_app")]
    profile: String,

    /// Project file map as JSON (`{"path": {"content": "..."}}`); empty if omitted
    #[arg(long)]
    project: Option<PathBuf>,

    /// Recorded raw model output
    #[arg(long)]
    transcript: PathBuf,

    /// Characters per replayed fragment; 0 replays the transcript at once
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,

    /// User prompt recorded in the model request
    #[arg(long, default_value = "")]
    prompt: String,

    /// Where to write the resulting file map
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Prints every event as one JSON line.
struct JsonLinesObserver;

impl JsonLinesObserver {
    fn emit(&self, event: &StreamEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to serialise event: {e}"),
        }
    }
}

impl TurnObserver for JsonLinesObserver {
    fn on_text(&mut self, text: &str) {
        self.emit(&StreamEvent::Text(text.to_string()));
    }

    fn on_file_update(&mut self, update: &FileUpdate) {
        self.emit(&StreamEvent::FileUpdate(update.clone()));
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.emit(&StreamEvent::Diagnostic(diagnostic.clone()));
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Summary<'a> {
    Completed {
        turn_id: &'a str,
        response: &'a str,
        files: Vec<&'a str>,
        diagnostics: usize,
    },
    Failed {
        message: &'a str,
    },
    Cancelled {
        committed: &'a [String],
        provisional: &'a [String],
    },
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!("{context}: {error}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = config::load_config(&config::FileSource::new(&cli.config))
        .unwrap_or_else(|e| fail("failed to load config", e));

    tracing::info!(
        version = %config.version,
        environment = %config.environment,
        config_hash = %config.config_hash,
        profile = %cli.profile,
        "config loaded"
    );

    let files = match &cli.project {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .unwrap_or_else(|e| fail("failed to read project file map", e));
            ProjectFileMap::from_json(&json)
                .unwrap_or_else(|e| fail("failed to parse project file map", e))
        }
        None => ProjectFileMap::new(),
    };

    let transcript = std::fs::read_to_string(&cli.transcript)
        .unwrap_or_else(|e| fail("failed to read transcript", e));
    let client = Arc::new(ScriptedModelClient::from_transcript(
        &transcript,
        cli.chunk_size,
    ));

    let orchestrator = BuildOrchestrator::from_config(client, &config, &cli.profile)
        .unwrap_or_else(|e| fail("failed to select profile", e));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let messages = vec![ChatMessage::user(cli.prompt)];
    let outcome = orchestrator
        .run_turn(messages, &files, &mut JsonLinesObserver, &cancel)
        .await;

    let (summary, code) = match &outcome {
        TurnOutcome::Completed(turn) => (
            Summary::Completed {
                turn_id: &turn.turn_id,
                response: &turn.response,
                files: turn.files.paths().collect(),
                diagnostics: turn.diagnostics.len(),
            },
            0,
        ),
        TurnOutcome::Failed { message, .. } => (Summary::Failed { message }, 2),
        TurnOutcome::Cancelled {
            committed,
            provisional,
        } => (
            Summary::Cancelled {
                committed,
                provisional,
            },
            130,
        ),
    };
    match serde_json::to_string(&summary) {
        Ok(line) => println!("{line}"),
        Err(e) => fail("failed to serialise turn summary", e),
    }

    if let (TurnOutcome::Completed(turn), Some(out)) = (&outcome, &cli.out) {
        let json = turn
            .files
            .to_json_pretty()
            .unwrap_or_else(|e| fail("failed to serialise file map", e));
        std::fs::write(out, json).unwrap_or_else(|e| fail("failed to write file map", e));
        tracing::info!(path = %out.display(), files = turn.files.len(), "file map written");
    }

    std::process::exit(code);
}
