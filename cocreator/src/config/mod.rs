// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads cocreator.yaml, validates structure, resolves variable
// interpolation, merges the built-in agent profiles and computes a
// deterministic config hash.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use loader::{compute_hash, load_config};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{Config, ModelSettings, StreamSettings};
