// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use super::raw::{RawProfile, RawProfileSet};

/// The built-in agent profiles, embedded at compile time.
const DEFAULT_PROFILES_YAML: &str = include_str!("../../../schema/default_profiles.yaml");

/// Parse the embedded default profiles.
/// Panics on invalid YAML (this is our own file).
pub fn default_profiles() -> HashMap<String, RawProfile> {
    let raw: RawProfileSet =
        serde_yaml::from_str(DEFAULT_PROFILES_YAML).expect("default profiles YAML is invalid");
    raw.profiles
}
