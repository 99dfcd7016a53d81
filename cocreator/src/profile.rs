// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

// Agent profiles
//
// Every build-style agent (web app, document, general build, Roblox) runs
// the same streaming parser. A profile is the per-agent part: which tag
// keywords it recognises, whether it may patch, and whether Markdown fences
// are stripped from whole-file content.

use crate::stream::{ParserOptions, UnterminatedPolicy};

/// A named parser configuration for one kind of agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: String,
    /// Uppercase keyword of whole-file blocks.
    pub file_keyword: String,
    /// Uppercase keyword of patch blocks; `None` when the agent may only
    /// write whole files.
    pub patch_keyword: Option<String>,
    pub strip_fences: bool,
}

impl AgentProfile {
    /// Build a profile, normalising and validating the keywords.
    pub fn new(
        name: &str,
        file_keyword: &str,
        patch_keyword: Option<&str>,
        strip_fences: bool,
    ) -> Result<Self, ProfileError> {
        let file_keyword = normalize_keyword(file_keyword)?;
        let patch_keyword = patch_keyword.map(normalize_keyword).transpose()?;

        if patch_keyword.as_deref() == Some(file_keyword.as_str()) {
            return Err(ProfileError::DuplicateKeyword {
                keyword: file_keyword,
            });
        }

        Ok(Self {
            name: name.to_string(),
            file_keyword,
            patch_keyword,
            strip_fences,
        })
    }

    pub fn supports_patches(&self) -> bool {
        self.patch_keyword.is_some()
    }

    /// Length of the longest end tag this profile can produce.
    pub fn longest_end_tag(&self) -> usize {
        let patch = self.patch_keyword.as_ref().map_or(0, String::len);
        self.file_keyword.len().max(patch) + "[/]".len()
    }

    pub fn parser_options(
        &self,
        safety_margin: usize,
        unterminated: UnterminatedPolicy,
    ) -> ParserOptions {
        ParserOptions {
            file_keyword: self.file_keyword.clone(),
            patch_keyword: self.patch_keyword.clone(),
            strip_fences: self.strip_fences,
            safety_margin,
            unterminated,
        }
    }
}

/// Invalid keyword configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("tag keyword must not be empty")]
    EmptyKeyword,

    #[error("tag keyword \"{keyword}\" may only contain ASCII letters, digits and '_'")]
    InvalidKeyword { keyword: String },

    #[error("file and patch keywords are both \"{keyword}\"")]
    DuplicateKeyword { keyword: String },
}

fn normalize_keyword(keyword: &str) -> Result<String, ProfileError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ProfileError::EmptyKeyword);
    }
    if !keyword
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ProfileError::InvalidKeyword {
            keyword: keyword.to_string(),
        });
    }
    Ok(keyword.to_ascii_uppercase())
}
