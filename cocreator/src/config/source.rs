// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use super::error::ConfigError;

/// Where the text of a `cocreator.yaml` comes from.
///
/// The replay binary reads one from disk; tests and embedders that already
/// hold the YAML hand it over as a string.
pub trait ConfigSource {
    fn load(&self) -> Result<String, ConfigError>;

    /// Short label for log lines, such as the file path.
    fn origin(&self) -> String;
}

/// A `cocreator.yaml` on disk, read once per [`load_config`](super::load_config) call.
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

/// Config YAML already in memory.
pub struct StringSource {
    pub content: String,
}

impl StringSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }

    fn origin(&self) -> String {
        format!("<inline, {} bytes>", self.content.len())
    }
}
