// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Kept apart from the public Config structs: keywords are normalised,
// `${VAR}` references resolved and the stream policy parsed between the
// two.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub cocreator: String,
    pub environment: Option<String>,
    pub model: RawModelConfig,
    pub stream: Option<RawStreamConfig>,
    /// If false, only the profiles listed under `profiles` exist. Default: true.
    pub use_default_profiles: Option<bool>,
    #[serde(default)]
    pub profiles: HashMap<String, RawProfile>,
}

#[derive(Debug, Deserialize)]
pub struct RawModelConfig {
    pub id: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct RawStreamConfig {
    pub safety_margin: Option<usize>,
    pub unterminated_block: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawProfile {
    #[serde(default = "default_file_keyword")]
    pub file_keyword: String,
    #[serde(default = "default_patch_keyword")]
    pub patch_keyword: String,
    /// If false, `patch_keyword` is ignored and PATCH tags are plain text.
    #[serde(default = "default_true")]
    pub patches: bool,
    #[serde(default = "default_true")]
    pub strip_fences: bool,
}

/// The embedded default profile set.
#[derive(Debug, Deserialize)]
pub struct RawProfileSet {
    pub profiles: HashMap<String, RawProfile>,
}

fn default_file_keyword() -> String {
    "FILE".to_string()
}

fn default_patch_keyword() -> String {
    "PATCH".to_string()
}

fn default_true() -> bool {
    true
}
