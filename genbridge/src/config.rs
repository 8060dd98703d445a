//! Configuration loading for the generator registry.
//!
//! The configuration is stored in TOML format and defines:
//! - Bridge settings (which generator runs by default)
//! - Generators: one external program per entry point

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "genbridge.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),

    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Unknown generator: {0}")]
    UnknownGenerator(String),

    #[error("Generator is disabled: {0}")]
    Disabled(String),

    #[error("No generator named and no default configured")]
    NoDefault,
}

/// Bridge-wide settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Generator used when none is named on the command line.
    #[serde(default)]
    pub default_generator: Option<String>,
}

/// Definition of one generator program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Unique name for this generator.
    pub name: String,

    /// Entry point the program should invoke. Defaults to `name`.
    #[serde(default)]
    pub entry: Option<String>,

    /// Program to run. Bare names are looked up on `PATH`.
    pub program: PathBuf,

    /// Command-line arguments. `{entry}` is replaced by the entry point.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the program.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Whether this generator is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Environment variables to set.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

const fn default_enabled() -> bool {
    true
}

impl GeneratorConfig {
    /// Create an enabled generator definition with no extra settings.
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            program: program.into(),
            args,
            cwd: None,
            enabled: true,
            env: HashMap::new(),
        }
    }

    /// The entry point this generator invokes.
    #[must_use]
    pub fn entry_point(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }

    /// Whether `program` names a filesystem path rather than a `PATH` lookup.
    #[must_use]
    pub fn program_is_path(&self) -> bool {
        self.program.components().count() > 1
    }
}

/// Complete genbridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge settings.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Generator definitions.
    #[serde(default, rename = "generators")]
    pub generators: Vec<GeneratorConfig>,
}

impl BridgeConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration structure (pure function).
    ///
    /// Checks for empty and duplicate names and for a default generator that
    /// does not exist, without performing I/O.
    pub fn validate_structure(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for generator in &self.generators {
            if generator.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Generator name cannot be empty".to_string(),
                ));
            }
            if !names.insert(generator.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate name: {}",
                    generator.name
                )));
            }
        }

        if let Some(ref default) = self.bridge.default_generator
            && !names.contains(default.as_str())
        {
            return Err(ConfigError::ValidationError(format!(
                "Default generator is not defined: {default}"
            )));
        }
        Ok(())
    }

    /// Validate that the paths of enabled generators exist (impure function).
    pub fn validate_paths(&self) -> Result<(), ConfigError> {
        for generator in self.enabled_generators() {
            if let Some(ref cwd) = generator.cwd
                && !cwd.is_dir()
            {
                return Err(ConfigError::PathNotFound(cwd.clone()));
            }

            if generator.program_is_path() {
                let program = match generator.cwd {
                    Some(ref cwd) if generator.program.is_relative() => cwd.join(&generator.program),
                    _ => generator.program.clone(),
                };
                if !program.exists() {
                    return Err(ConfigError::PathNotFound(program));
                }
            }
        }
        Ok(())
    }

    /// Validate the configuration (combines structure and path validation).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_structure()?;
        self.validate_paths()?;
        Ok(())
    }

    /// Get enabled generators.
    pub fn enabled_generators(&self) -> impl Iterator<Item = &GeneratorConfig> {
        self.generators.iter().filter(|g| g.enabled)
    }

    /// Look up an enabled generator by name.
    pub fn generator(&self, name: &str) -> Result<&GeneratorConfig, ConfigError> {
        let generator = self
            .generators
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::UnknownGenerator(name.to_string()))?;
        if !generator.enabled {
            return Err(ConfigError::Disabled(name.to_string()));
        }
        Ok(generator)
    }

    /// Resolve the generator to run when none is named.
    ///
    /// Uses `bridge.default_generator`, or the only enabled generator when
    /// there is exactly one.
    pub fn default_generator(&self) -> Result<&GeneratorConfig, ConfigError> {
        if let Some(ref name) = self.bridge.default_generator {
            return self.generator(name);
        }
        let mut enabled = self.enabled_generators();
        match (enabled.next(), enabled.next()) {
            (Some(only), None) => Ok(only),
            _ => Err(ConfigError::NoDefault),
        }
    }

    /// Resolve a generator by optional name.
    pub fn select(&self, name: Option<&str>) -> Result<&GeneratorConfig, ConfigError> {
        match name {
            Some(name) => self.generator(name),
            None => self.default_generator(),
        }
    }
}

/// Pick the config file to use when none is given explicitly (pure function).
///
/// Prefers `genbridge.toml` in `cwd`, then the one in `config_dir`, and falls
/// back to the `cwd` location so the read error names a sensible path.
#[must_use]
pub fn resolve_config_path(cwd: &Path, config_dir: Option<&Path>) -> PathBuf {
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = config_dir {
        let xdg = dir.join(CONFIG_FILE_NAME);
        if xdg.exists() {
            return xdg;
        }
    }
    local
}

/// The per-user configuration directory.
#[must_use]
pub fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "genbridge", "genbridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}
