// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::stream::{Diagnostic, FileUpdate, StreamEvent};

/// Receives a build turn's events in stream order.
///
/// File updates with `is_complete == false` are provisional: they exist for
/// live display and may be superseded or abandoned.
pub trait TurnObserver: Send {
    fn on_text(&mut self, _text: &str) {}

    fn on_file_update(&mut self, _update: &FileUpdate) {}

    fn on_diagnostic(&mut self, _diagnostic: &Diagnostic) {}
}

/// Ignores every event.
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// Keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<StreamEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn narrative(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn file_updates(&self) -> Vec<&FileUpdate> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::FileUpdate(update) => Some(update),
                _ => None,
            })
            .collect()
    }
}

impl TurnObserver for RecordingObserver {
    fn on_text(&mut self, text: &str) {
        self.events.push(StreamEvent::Text(text.to_string()));
    }

    fn on_file_update(&mut self, update: &FileUpdate) {
        self.events.push(StreamEvent::FileUpdate(update.clone()));
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.events.push(StreamEvent::Diagnostic(diagnostic.clone()));
    }
}

/// Forwards events into an unbounded channel for an async consumer such as
/// a UI task. Sends after the receiver is dropped are discarded.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelObserver {
    /// Create an observer together with the stream of events it forwards.
    pub fn new() -> (Self, UnboundedReceiverStream<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }

    fn send(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("turn event receiver dropped");
        }
    }
}

impl TurnObserver for ChannelObserver {
    fn on_text(&mut self, text: &str) {
        self.send(StreamEvent::Text(text.to_string()));
    }

    fn on_file_update(&mut self, update: &FileUpdate) {
        self.send(StreamEvent::FileUpdate(update.clone()));
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.send(StreamEvent::Diagnostic(diagnostic.clone()));
    }
}
