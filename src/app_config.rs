//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use fl_cookies::{DomainRule, MemoryCookieJar, SameSite};

/// TOML-backed file configuration for fl-cookies defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default jar file location.
    pub jar_path: Option<PathBuf>,
    /// Default document URL the jar is bound to.
    pub document_url: Option<String>,
    /// Regex selecting the shared cookie domain family.
    pub domain_pattern: Option<String>,
    /// Mark written cookies `secure` unless the CLI says otherwise.
    pub secure: Option<bool>,
    /// Default SameSite policy for written cookies.
    pub same_site: Option<SameSite>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = &self.domain_pattern {
            DomainRule::new(pattern).context("Invalid config value for `domain_pattern`")?;
        }

        if let Some(url) = &self.document_url {
            MemoryCookieJar::for_url(url).context("Invalid config value for `document_url`")?;
        }

        if let Some(jar_path) = &self.jar_path
            && jar_path.as_os_str().is_empty()
        {
            bail!("Invalid config value for `jar_path`: path must not be empty");
        }

        Ok(())
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl FromStr for VerbositySetting {
    type Err = anyhow::Error;

    fn from_str(label: &str) -> Result<Self> {
        match label {
            "default" => Ok(Self::Default),
            "verbose" => Ok(Self::Verbose),
            "quiet" => Ok(Self::Quiet),
            "debug" => Ok(Self::Debug),
            _ => bail!("Expected one of: default, verbose, quiet, debug"),
        }
    }
}

impl VerbositySetting {
    /// Returns the tracing filter level for this setting.
    #[must_use]
    pub fn filter_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fl-cookies/config.toml`
/// 2. `$HOME/.config/fl-cookies/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    resolve_config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolves the default jar file path next to the config file.
#[must_use]
pub fn resolve_default_jar_path() -> Option<PathBuf> {
    resolve_config_dir().map(|dir| dir.join("jar.json"))
}

fn resolve_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("fl-cookies"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("fl-cookies"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };
        let key = key.trim();
        let value = value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "jar_path" => {
                cfg.jar_path = Some(parse_string_literal(value).with_context(invalid)?.into());
            }
            "document_url" => {
                cfg.document_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "domain_pattern" => {
                cfg.domain_pattern = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "secure" => {
                let parsed = value
                    .parse::<bool>()
                    .context("Expected 'true' or 'false'")
                    .with_context(invalid)?;
                cfg.secure = Some(parsed);
            }
            "same_site" => {
                let parsed = parse_string_literal(value)
                    .and_then(|label| Ok(label.parse::<SameSite>()?))
                    .with_context(invalid)?;
                cfg.same_site = Some(parsed);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .and_then(|label| label.parse::<VerbositySetting>())
                    .with_context(invalid)?;
                cfg.verbosity = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Drops a trailing `# comment`, ignoring `#` inside double quotes.
fn strip_inline_comment(line: &str) -> &str {
    let mut quoted = false;
    let end = line
        .char_indices()
        .find(|&(_, ch)| {
            if ch == '"' {
                quoted = !quoted;
            }
            ch == '#' && !quoted
        })
        .map_or(line.len(), |(index, _)| index);
    &line[..end]
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .context("Expected double-quoted string")
}
