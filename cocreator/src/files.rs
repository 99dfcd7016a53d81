// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Project file map
//
// The in-memory view of a project's files for the duration of one build
// turn. Serialises as `{"<path>": {"content": "..."}}`, the shape the
// persistence layer stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single file's record. Only content is tracked; there is no field-level
/// merge, every write replaces the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub content: String,
}

impl FileRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Mapping from forward-slash separated, case-sensitive path to file record.
///
/// Backed by a `BTreeMap` so serialised output is deterministic; callers
/// must not rely on ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectFileMap {
    files: BTreeMap<String, FileRecord>,
}

impl ProjectFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Overwrite (or create) the file at `path`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), FileRecord::new(content));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.files.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl<P, C> FromIterator<(P, C)> for ProjectFileMap
where
    P: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (path, content) in iter {
            map.insert(path, content);
        }
        map
    }
}

/// Read-only access to current file contents.
///
/// The parser looks up patch targets through this trait, so it never holds
/// a mutable borrow of the orchestrator's working map.
pub trait FileView {
    fn file_content(&self, path: &str) -> Option<&str>;
}

impl FileView for ProjectFileMap {
    fn file_content(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|record| record.content.as_str())
    }
}
