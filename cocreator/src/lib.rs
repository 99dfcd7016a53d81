// Copyright 2026 The Cocreator Project
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod files;
pub mod model;
pub mod orchestrator;
pub mod patch;
pub mod profile;
pub mod stream;
