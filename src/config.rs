use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::registrar::RegistrarOptions;

pub const CONFIG_ENV: &str = "UNIVERSE_FIXTURE_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct FixtureConfig {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub registrar: RegistrarSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub dcos: ToolEntry,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolEntry {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrarSection {
    /// Prefix for generated repository names.
    pub prefix: Option<String>,
    /// Length of the random suffix after the prefix.
    pub suffix_len: Option<usize>,
    /// Priority index new repositories are inserted at.
    pub index: Option<usize>,
}

impl FixtureConfig {
    pub fn registrar_options(&self) -> RegistrarOptions {
        let defaults = RegistrarOptions::default();
        RegistrarOptions {
            prefix: self.registrar.prefix.clone().unwrap_or(defaults.prefix),
            suffix_len: self.registrar.suffix_len.unwrap_or(defaults.suffix_len),
            index: self.registrar.index.unwrap_or(defaults.index),
        }
    }
}

pub fn load() -> Result<FixtureConfig> {
    let path_override = std::env::var(CONFIG_ENV).ok();
    load_from(path_override.as_deref().map(Path::new))
}

pub fn load_from(path_override: Option<&Path>) -> Result<FixtureConfig> {
    let Some(path) = path_override.map(Path::to_path_buf).or_else(config_path) else {
        return Ok(FixtureConfig::default());
    };

    if !path.exists() {
        return Ok(FixtureConfig::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: FixtureConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut dir| {
        dir.push("universe-fixture");
        dir.push("config.toml");
        dir
    })
}
