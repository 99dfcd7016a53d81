// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Model client seam
//
// A build turn needs one thing from the hosted model: a lazy stream of text
// fragments for a message history. The concrete API client lives outside
// this crate behind the `ModelClient` trait. `ScriptedModelClient` replays
// recorded fragments and is what the tests and the replay binary use.

use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation history sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

impl ModelRequest {
    pub fn new(settings: &ModelSettings, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: settings.id.clone(),
            messages,
            options: GenerationOptions {
                max_output_tokens: settings.max_output_tokens,
                temperature: settings.temperature,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Failures reported by a model client, either when opening the stream or
/// in place of a fragment mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model transport failed: {0}")]
    Transport(String),

    #[error("model quota exhausted: {0}")]
    Quota(String),

    #[error("unknown model \"{0}\"")]
    UnknownModel(String),

    #[error("model returned an error: {0}")]
    Upstream(String),
}

/// Text fragments in arrival order; an `Err` item ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// Produces a lazy sequence of text fragments for a request.
///
/// Implementations must be Send + Sync so one client can be shared across
/// turns via Arc.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream, ModelError>;
}

// ---------------------------------------------------------------------------
// ScriptedModelClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ScriptEnd {
    Complete,
    Fail(ModelError),
    /// Never completes after the scripted fragments.
    Hang,
}

/// Replays a fixed list of fragments for every request.
pub struct ScriptedModelClient {
    chunks: Vec<String>,
    end: ScriptEnd,
    open_error: Option<ModelError>,
    last_request: Mutex<Option<ModelRequest>>,
}

impl ScriptedModelClient {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            end: ScriptEnd::Complete,
            open_error: None,
            last_request: Mutex::new(None),
        }
    }

    /// Split a recorded transcript into fragments of `chunk_size` characters.
    /// A size of zero replays the transcript as a single fragment.
    pub fn from_transcript(transcript: &str, chunk_size: usize) -> Self {
        Self::new(split_chars(transcript, chunk_size))
    }

    /// Fail the stream with `error` after the scripted fragments.
    pub fn failing_after(mut self, error: ModelError) -> Self {
        self.end = ScriptEnd::Fail(error);
        self
    }

    /// Leave the stream pending forever after the scripted fragments.
    pub fn hanging_after(mut self) -> Self {
        self.end = ScriptEnd::Hang;
        self
    }

    /// Refuse to open the stream at all.
    pub fn failing_to_open(mut self, error: ModelError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// The most recent request passed to [`ModelClient::stream`].
    pub fn last_request(&self) -> Option<ModelRequest> {
        match self.last_request.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, request: ModelRequest) {
        let mut guard = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(request);
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream, ModelError> {
        self.record(request);
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }

        let chunks = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let stream: ChunkStream = match &self.end {
            ScriptEnd::Complete => Box::pin(chunks),
            ScriptEnd::Fail(error) => Box::pin(chunks.chain(stream::iter([Err(error.clone())]))),
            ScriptEnd::Hang => Box::pin(chunks.chain(stream::pending())),
        };
        Ok(stream)
    }
}

fn split_chars(text: &str, chunk_size: usize) -> Vec<String> {
    if chunk_size == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for (i, ch) in text.chars().enumerate() {
        if i > 0 && i % chunk_size == 0 {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
