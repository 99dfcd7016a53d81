// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::profile::AgentProfile;
use crate::stream::{ParserOptions, UnterminatedPolicy};

use super::error::ConfigError;

/// Top-level parsed and validated cocreator config.
#[derive(Debug)]
pub struct Config {
    /// Config version. Always "v1".
    pub version: String,
    /// Environment label (e.g. "dev", "production").
    pub environment: String,
    pub model: ModelSettings,
    pub stream: StreamSettings,
    /// Agent profiles keyed by name.
    pub profiles: HashMap<String, AgentProfile>,
    /// SHA256 hash of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&AgentProfile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
            })
    }

    /// Parser options for the named profile under this config's stream
    /// settings.
    pub fn parser_options(&self, profile: &str) -> Result<ParserOptions, ConfigError> {
        let profile = self.profile(profile)?;
        Ok(profile.parser_options(self.stream.safety_margin, self.stream.unterminated))
    }

    /// Profile names in sorted order.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Which model a build turn calls and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model id with `${VAR}` references resolved.
    pub id: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Parser settings shared by every profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub safety_margin: usize,
    pub unterminated: UnterminatedPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            safety_margin: crate::stream::DEFAULT_SAFETY_MARGIN,
            unterminated: UnterminatedPolicy::Drop,
        }
    }
}
