//! Configuration loading and settings resolution
//!
//! Two layers:
//! 1. **TOML bootstrap**: optional file, every field has a built-in default
//! 2. **Resolved settings**: per-setting precedence
//!    command-line argument → environment variable → TOML → built-in default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VSR_CONFIG";
pub const LOOKUP_URL_ENV_VAR: &str = "VSR_LOOKUP_URL";
pub const GATEWAY_URL_ENV_VAR: &str = "VSR_GATEWAY_URL";
pub const SIGNATURE_URL_ENV_VAR: &str = "VSR_SIGNATURE_URL";
pub const WORKERS_ENV_VAR: &str = "VSR_WORKERS";
pub const DEADLINE_ENV_VAR: &str = "VSR_DEADLINE_SECS";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub lookup: LookupConfig,
    pub gateway: GatewayConfig,
    pub pipeline: PipelineToml,
    /// External message generator; disabled when absent
    pub generator: Option<GeneratorConfig>,
    pub logging: LoggingConfig,
}

/// Lookup service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Downstream messaging gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint receiving the enriched report JSON
    pub report_url: String,
    /// Endpoint receiving signature classifications
    pub signature_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            report_url: "http://localhost:5000/receivejson".to_string(),
            signature_url: "http://localhost:8080/api/cancer/signatures".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineToml {
    /// Concurrent per-variant enrichments
    pub workers: usize,
    /// Whole-report deadline; 0 disables it
    pub deadline_secs: u64,
    pub profile: EnrichmentProfile,
}

impl Default for PipelineToml {
    fn default() -> Self {
        Self {
            workers: 4,
            deadline_secs: 300,
            profile: EnrichmentProfile::default(),
        }
    }
}

/// External message-generation command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which derived annotations a run computes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentProfile {
    /// NAF and NDP
    #[default]
    AlleleFraction,
    /// Split-read SV allele fraction
    SplitRead,
    /// Both of the above
    Full,
}

impl EnrichmentProfile {
    pub fn includes_allele_fraction(self) -> bool {
        matches!(self, EnrichmentProfile::AlleleFraction | EnrichmentProfile::Full)
    }

    pub fn includes_split_read(self) -> bool {
        matches!(self, EnrichmentProfile::SplitRead | EnrichmentProfile::Full)
    }
}

impl FromStr for EnrichmentProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allele-fraction" => Ok(EnrichmentProfile::AlleleFraction),
            "split-read" => Ok(EnrichmentProfile::SplitRead),
            "full" => Ok(EnrichmentProfile::Full),
            other => Err(Error::Config(format!(
                "Unknown enrichment profile '{}' (expected allele-fraction, split-read or full)",
                other
            ))),
        }
    }
}

impl fmt::Display for EnrichmentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnrichmentProfile::AlleleFraction => "allele-fraction",
            EnrichmentProfile::SplitRead => "split-read",
            EnrichmentProfile::Full => "full",
        })
    }
}

/// Locate the config file
///
/// Explicit path → `VSR_CONFIG` → platform config dir (`vsr/config.toml`).
/// Returns the path and whether it was explicitly requested.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("vsr").join("config.toml"))
        .filter(|p| p.exists())
        .map(|p| (p, false))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML layer, falling back to defaults when no file is found
///
/// An explicitly requested file that cannot be read is an error.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(explicit) {
        Some((path, true)) => {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        Some((path, false)) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{}; using built-in defaults", e);
                Ok(TomlConfig::default())
            }
        },
        None => {
            warn!("No config file found; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Command-line values that override everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub lookup_url: Option<String>,
    pub gateway_url: Option<String>,
    pub signature_url: Option<String>,
    pub workers: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub profile: Option<EnrichmentProfile>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub lookup_url: String,
    pub lookup_timeout: Duration,
    pub lookup_connect_timeout: Duration,
    pub report_url: String,
    pub signature_url: String,
    pub gateway_timeout: Duration,
    pub workers: usize,
    pub deadline: Option<Duration>,
    pub profile: EnrichmentProfile,
    pub generator: Option<GeneratorConfig>,
    pub log_level: String,
}

impl Settings {
    /// Apply CLI → ENV → TOML precedence and validate the result
    pub fn resolve(toml: &TomlConfig, overrides: &Overrides) -> Result<Self> {
        let lookup_url = resolve_setting(
            overrides.lookup_url.clone(),
            LOOKUP_URL_ENV_VAR,
            toml.lookup.base_url.clone(),
        )?;
        let report_url = resolve_setting(
            overrides.gateway_url.clone(),
            GATEWAY_URL_ENV_VAR,
            toml.gateway.report_url.clone(),
        )?;
        let signature_url = resolve_setting(
            overrides.signature_url.clone(),
            SIGNATURE_URL_ENV_VAR,
            toml.gateway.signature_url.clone(),
        )?;
        let workers = resolve_setting(overrides.workers, WORKERS_ENV_VAR, toml.pipeline.workers)?;
        let deadline_secs = resolve_setting(
            overrides.deadline_secs,
            DEADLINE_ENV_VAR,
            toml.pipeline.deadline_secs,
        )?;

        for (name, url) in [
            ("lookup URL", &lookup_url),
            ("gateway report URL", &report_url),
            ("gateway signature URL", &signature_url),
        ] {
            if url.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }

        Ok(Self {
            lookup_url: lookup_url.trim_end_matches('/').to_string(),
            lookup_timeout: Duration::from_secs(toml.lookup.timeout_secs),
            lookup_connect_timeout: Duration::from_secs(toml.lookup.connect_timeout_secs),
            report_url,
            signature_url,
            gateway_timeout: Duration::from_secs(toml.gateway.timeout_secs),
            workers,
            deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            profile: overrides.profile.unwrap_or(toml.pipeline.profile),
            generator: toml.generator.clone(),
            log_level: toml.logging.level.clone(),
        })
    }
}

/// Pick the first of CLI value, parsed environment variable, TOML value
fn resolve_setting<T>(cli: Option<T>, env_var: &str, toml_value: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(value) = cli {
        return Ok(value);
    }

    match std::env::var(env_var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?} is invalid: {}", env_var, raw, e))),
        _ => Ok(toml_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!(
            "allele-fraction".parse::<EnrichmentProfile>().unwrap(),
            EnrichmentProfile::AlleleFraction
        );
        assert_eq!(
            " Split-Read ".parse::<EnrichmentProfile>().unwrap(),
            EnrichmentProfile::SplitRead
        );
        assert_eq!("full".parse::<EnrichmentProfile>().unwrap(), EnrichmentProfile::Full);
        assert!("naf".parse::<EnrichmentProfile>().is_err());
    }

    #[test]
    fn test_profile_display_round_trips() {
        for profile in [
            EnrichmentProfile::AlleleFraction,
            EnrichmentProfile::SplitRead,
            EnrichmentProfile::Full,
        ] {
            assert_eq!(profile.to_string().parse::<EnrichmentProfile>().unwrap(), profile);
        }
    }

    #[test]
    fn test_profile_coverage() {
        assert!(EnrichmentProfile::AlleleFraction.includes_allele_fraction());
        assert!(!EnrichmentProfile::AlleleFraction.includes_split_read());
        assert!(EnrichmentProfile::Full.includes_allele_fraction());
        assert!(EnrichmentProfile::Full.includes_split_read());
        assert!(!EnrichmentProfile::SplitRead.includes_allele_fraction());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [pipeline]
            workers = 8
            profile = "split-read"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.deadline_secs, 300);
        assert_eq!(config.pipeline.profile, EnrichmentProfile::SplitRead);
        assert_eq!(config.lookup, LookupConfig::default());
        assert!(config.generator.is_none());
    }
}
