use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kiln.toml";
pub const DEFAULT_CONFIGURATION: &str = "Release";
pub const DEFAULT_TOOL: &str = "xcodebuild";
pub const DEFAULT_LOG_PREFIX: &str = "kiln";

/// Optional `kiln.toml` next to the project.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    pub build: Option<BuildConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Build tool program, e.g. `xcodebuild`
    pub tool: Option<String>,
    pub configuration: Option<String>,
    pub scheme: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub prefix: Option<String>,
    /// Where log files go (default: host temp dir)
    pub dir: Option<PathBuf>,
}

impl KilnConfig {
    pub fn tool(&self) -> &str {
        self.build
            .as_ref()
            .and_then(|b| non_empty(b.tool.as_deref()))
            .unwrap_or(DEFAULT_TOOL)
    }

    pub fn log_prefix(&self) -> &str {
        self.log
            .as_ref()
            .and_then(|l| non_empty(l.prefix.as_deref()))
            .unwrap_or(DEFAULT_LOG_PREFIX)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log
            .as_ref()
            .and_then(|l| l.dir.clone())
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Load `kiln.toml` from `dir`. A missing file means defaults.
pub fn load_config(dir: &Path) -> Result<KilnConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(KilnConfig::default());
    }

    let config_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: KilnConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Options exactly as they came off the command line. Empty means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBuildOptions {
    pub configuration: String,
    pub scheme: String,
}

/// Options for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub configuration: String,
    /// `None` builds every scheme
    pub scheme: Option<String>,
}

impl BuildOptions {
    /// Apply defaults field by field: flag, then `kiln.toml`, then built-in.
    pub fn resolve(raw: &RawBuildOptions, config: &KilnConfig) -> Self {
        let file = config.build.as_ref();

        let configuration = non_empty(Some(raw.configuration.as_str()))
            .or_else(|| file.and_then(|b| non_empty(b.configuration.as_deref())))
            .unwrap_or(DEFAULT_CONFIGURATION)
            .to_string();

        let scheme = non_empty(Some(raw.scheme.as_str()))
            .or_else(|| file.and_then(|b| non_empty(b.scheme.as_deref())))
            .map(str::to_string);

        Self {
            configuration,
            scheme,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::resolve(&RawBuildOptions::default(), &KilnConfig::default())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
