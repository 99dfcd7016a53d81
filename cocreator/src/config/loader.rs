// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::profile::AgentProfile;
use crate::stream::{UnterminatedPolicy, DEFAULT_SAFETY_MARGIN};

use super::defaults::default_profiles;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a cocreator config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version and stream settings
/// 5. Resolve variable interpolation in string fields
/// 6. Merge default and user profiles, validating keywords
/// 7. Check the safety margin against every profile's end tags
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);
    tracing::debug!(origin = %source.origin(), %config_hash, "config source read");

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.cocreator != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.cocreator
        )));
    }

    let stream = build_stream_settings(raw.stream)?;
    let model = build_model_settings(raw.model)?;
    let environment = match raw.environment {
        Some(env) => resolve_variables(&env)?,
        None => String::new(),
    };

    // Defaults first; a user profile with the same name replaces the default.
    let mut raw_profiles = if raw.use_default_profiles != Some(false) {
        default_profiles()
    } else {
        HashMap::new()
    };
    raw_profiles.extend(raw.profiles);

    if raw_profiles.is_empty() {
        return Err(ConfigError::Validation(
            "no profiles defined and default profiles disabled".to_string(),
        ));
    }

    let mut profiles = HashMap::with_capacity(raw_profiles.len());
    for (name, raw_profile) in raw_profiles {
        let profile = build_profile(&name, &raw_profile)?;
        let needed = profile.longest_end_tag();
        if stream.safety_margin < needed {
            return Err(ConfigError::Validation(format!(
                "stream.safety_margin {} is shorter than the {needed}-byte end tag of profile \"{name}\"",
                stream.safety_margin
            )));
        }
        profiles.insert(name, profile);
    }

    Ok(Config {
        version: raw.cocreator,
        environment,
        model,
        stream,
        profiles,
        config_hash,
    })
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{:x}", hash)
}

fn build_model_settings(raw: raw::RawModelConfig) -> Result<ModelSettings, ConfigError> {
    let id = resolve_variables(&raw.id)?;
    if id.trim().is_empty() {
        return Err(ConfigError::Validation("model.id must not be empty".to_string()));
    }

    if let Some(temperature) = raw.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Validation(format!(
                "model.temperature {temperature} must be between 0.0 and 2.0"
            )));
        }
    }

    if raw.max_output_tokens == Some(0) {
        return Err(ConfigError::Validation(
            "model.max_output_tokens must be positive".to_string(),
        ));
    }

    Ok(ModelSettings {
        id,
        max_output_tokens: raw.max_output_tokens,
        temperature: raw.temperature,
    })
}

fn build_stream_settings(
    raw: Option<raw::RawStreamConfig>,
) -> Result<StreamSettings, ConfigError> {
    let Some(raw) = raw else {
        return Ok(StreamSettings::default());
    };

    let unterminated = match raw.unterminated_block.as_deref() {
        None | Some("drop") => UnterminatedPolicy::Drop,
        Some("commit") => UnterminatedPolicy::Commit,
        Some(other) => {
            return Err(ConfigError::Validation(format!(
                "unknown unterminated_block policy \"{other}\", expected \"drop\" or \"commit\""
            )));
        }
    };

    Ok(StreamSettings {
        safety_margin: raw.safety_margin.unwrap_or(DEFAULT_SAFETY_MARGIN),
        unterminated,
    })
}

fn build_profile(name: &str, raw: &raw::RawProfile) -> Result<AgentProfile, ConfigError> {
    let patch_keyword = raw.patches.then_some(raw.patch_keyword.as_str());
    AgentProfile::new(name, &raw.file_keyword, patch_keyword, raw.strip_fences).map_err(
        |source| ConfigError::InvalidProfile {
            name: name.to_string(),
            source,
        },
    )
}
