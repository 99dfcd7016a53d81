// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR_NAME}` references in a string from environment variables.
/// Returns `ConfigError::UndefinedVariable` if a referenced variable is not set.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(close) if close > 0 => {
                let name = &after[..close];
                let value = std::env::var(name).map_err(|_| ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })?;
                result.push_str(&value);
                rest = &after[close + 1..];
            }
            // Malformed interpolation is kept literally.
            _ => {
                result.push_str("${");
                rest = after;
            }
        }
    }
    result.push_str(rest);

    Ok(result)
}
