// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime configuration
//!
//! Values are layered: defaults, then a `zoe.json` in the working
//! directory, then environment variables, then whatever the embedding
//! (usually the CLI) sets explicitly.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Project configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "zoe.json";

/// Environment variable selecting the [`EntryMode`]
pub const ENV_ENTRY_MODE: &str = "ZOE_ENTRY_MODE";

/// Environment variable overriding the runtime name
pub const ENV_RUNTIME_NAME: &str = "ZOE_RUNTIME_NAME";

/// What a module's `main` receives when the dispatcher calls it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// The full native host surface
    Raw,
    /// A reduced `{ cwd, args }` view
    #[default]
    Curated,
    /// No arguments at all
    Bare,
}

impl FromStr for EntryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(EntryMode::Raw),
            "curated" => Ok(EntryMode::Curated),
            "bare" => Ok(EntryMode::Bare),
            other => Err(format!(
                "unknown entry mode '{}' (expected raw, curated or bare)",
                other
            )),
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryMode::Raw => "raw",
            EntryMode::Curated => "curated",
            EntryMode::Bare => "bare",
        })
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name shown in usage text
    pub runtime_name: String,

    /// One-line description shown in usage text
    pub description: String,

    /// Argument passed to a module's `main`
    pub entry_mode: EntryMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_name: "zoe".to_string(),
            description: "a small JavaScript host".to_string(),
            entry_mode: EntryMode::default(),
        }
    }
}

impl Config {
    /// Defaults, then `zoe.json` from the process working directory, then
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let dir = std::env::current_dir().map_err(|e| ConfigError::Read {
            path: ".".to_string(),
            message: e.to_string(),
        })?;
        Self::load_in(&dir)
    }

    /// [`load`](Self::load) with `dir` as the working directory
    pub fn load_in(dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let project = dir.join(CONFIG_FILE);
        if project.exists() {
            config.merge_from_file(&project)?;
        }

        config.load_from_env();
        Ok(config)
    }

    /// Overlay the fields present in a JSON config file
    pub fn merge_from_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.merge_json(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        tracing::debug!("merged config from {}", path.display());
        Ok(())
    }

    /// Overlay the fields present in a JSON object; absent fields keep their
    /// current values
    pub fn merge_json(&mut self, json: &str) -> Result<(), String> {
        let overlay: serde_json::Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let serde_json::Value::Object(fields) = overlay else {
            return Err("expected a JSON object".to_string());
        };

        let mut merged = serde_json::to_value(&*self).map_err(|e| e.to_string())?;
        if let Some(base) = merged.as_object_mut() {
            base.extend(fields);
        }
        *self = serde_json::from_value(merged).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Apply `ZOE_*` environment overrides. Malformed values are ignored.
    pub fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_ENTRY_MODE) {
            match value.parse() {
                Ok(mode) => self.entry_mode = mode,
                Err(e) => tracing::warn!("ignoring {}: {}", ENV_ENTRY_MODE, e),
            }
        }

        if let Some(name) = lookup(ENV_RUNTIME_NAME) {
            if !name.trim().is_empty() {
                self.runtime_name = name;
            }
        }
    }

    /// Usage text printed when no entry module is given
    pub fn usage(&self) -> String {
        format!(
            "{name} \u{2014} {description}\n\nusage: {name} <filename>\n",
            name = self.runtime_name,
            description = self.description,
        )
    }
}
