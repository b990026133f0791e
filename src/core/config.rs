//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.banter/config.toml` unless `--config` points elsewhere.
//! If the default file is missing on first run, a commented-out template is
//! generated so users can discover all options.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::gateway::{GatewaySettings, GenerationSettings};
use crate::inference::resolver::{self, PROVIDER_ENV_VAR};
use crate::inference::{ProviderConfig, ProviderId, ProviderOverrides};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BanterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reply: GenerationConfig,
    #[serde(default)]
    pub analysis: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub zhipu: ProviderOverrides,
    #[serde(default)]
    pub qwen: ProviderOverrides,
    #[serde(default)]
    pub openai: ProviderOverrides,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub provider: Option<String>,
    pub concurrent_analysis: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub expose_error_details: Option<bool>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl BanterConfig {
    fn overrides_for(&self, id: ProviderId) -> &ProviderOverrides {
        match id {
            ProviderId::Zhipu => &self.zhipu,
            ProviderId::Qwen => &self.qwen,
            ProviderId::OpenAi => &self.openai,
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
pub const BIND_ENV_VAR: &str = "BANTER_BIND";
pub const LOG_LEVEL_ENV_VAR: &str = "BANTER_LOG_LEVEL";

const MAX_TEMPERATURE: f32 = 2.0;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: ProviderConfig,
    pub bind: String,
    pub expose_error_details: bool,
    pub request_timeout: Option<Duration>,
    pub gateway: GatewaySettings,
}

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliOverrides<'a> {
    pub provider: Option<&'a str>,
    pub bind: Option<&'a str>,
    pub log_level: Option<&'a str>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.banter/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".banter").join("config.toml"))
}

/// Where the loaded config came from.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Generated(PathBuf),
    GenerateFailed(PathBuf, std::io::Error),
    NoHomeDir,
}

/// A parsed config file and its origin.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: BanterConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    /// Logs where the config came from. Loading itself stays silent because
    /// it runs before the logger exists.
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(path) => {
                info!("Loaded config from {}", path.display());
                debug!("Config: {}", redacted(&self.config));
            }
            ConfigSource::Generated(path) => {
                info!("No config file found, generated default at {}", path.display());
            }
            ConfigSource::GenerateFailed(path, e) => {
                warn!("No config file found; failed to write default to {}: {}", path.display(), e);
            }
            ConfigSource::NoHomeDir => {
                warn!("Could not determine home directory, using default config");
            }
        }
    }
}

/// Load config from `explicit` if given, otherwise from `~/.banter/config.toml`.
///
/// A missing explicit file is an error. A missing default file generates a
/// commented-out template and returns `BanterConfig::default()`.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let Some(path) = config_path() else {
        return Ok(LoadedConfig {
            config: BanterConfig::default(),
            source: ConfigSource::NoHomeDir,
        });
    };

    if !path.exists() {
        let source = match generate_default_config(&path) {
            Ok(()) => ConfigSource::Generated(path),
            Err(e) => ConfigSource::GenerateFailed(path, e),
        };
        return Ok(LoadedConfig {
            config: BanterConfig::default(),
            source,
        });
    }

    read_config(&path)
}

fn read_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: BanterConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path.to_path_buf()),
    })
}

/// Config summary safe to log: which providers carry a key, not the key.
fn redacted(config: &BanterConfig) -> String {
    let keyed: Vec<&str> = [ProviderId::Zhipu, ProviderId::Qwen, ProviderId::OpenAi]
        .into_iter()
        .filter(|id| config.overrides_for(*id).api_key.is_some())
        .map(ProviderId::as_str)
        .collect();
    format!(
        "general={:?} server={:?} reply={:?} analysis={:?} logging={:?} keys_in_file={:?}",
        config.general, config.server, config.reply, config.analysis, config.logging, keyed
    )
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) -> std::io::Result<()> {
    let default_content = r#"# Banter Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# provider = "zhipu"                 # "zhipu", "qwen" or "openai" (env: AI_PROVIDER)
# concurrent_analysis = false        # run the scoring call alongside the reply call

# [server]
# bind = "127.0.0.1:3000"            # env: BANTER_BIND
# expose_error_details = true        # pass backend error text through to the browser
# request_timeout_secs = 30          # per backend call; unset = no timeout

# [reply]
# temperature = 0.7
# max_tokens = 150

# [analysis]
# temperature = 0.3
# max_tokens = 200

# [logging]
# level = "info"                     # env: BANTER_LOG_LEVEL
# file = "banter.log"

# [zhipu]
# api_key = "..."                    # Or set ZHIPU_API_KEY env var
# base_url = "https://open.bigmodel.cn/api/paas/v4"
# model = "glm-4"
# dialect = "raw_key"                # "raw_key" or "bearer" (Authorization header shape)

# [qwen]
# api_key = "sk-..."                 # Or set DASHSCOPE_API_KEY env var
# base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
# model = "qwen-turbo"

# [openai]
# api_key = "sk-..."                 # Or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"
# model = "gpt-3.5-turbo"
"#;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, default_content)
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// Emits warnings for ignored values, so run it after [`logging`] has been applied.
pub fn resolve(config: &BanterConfig, cli: CliOverrides<'_>) -> ResolvedConfig {
    resolve_with(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading environment values through `lookup`.
pub fn resolve_with<F>(config: &BanterConfig, cli: CliOverrides<'_>, lookup: F) -> ResolvedConfig
where
    F: Fn(&str) -> Option<String>,
{
    // Provider: CLI → env → config → default
    let env_provider = lookup(PROVIDER_ENV_VAR);
    let explicit = cli.provider.or(env_provider.as_deref());
    let id = resolver::select_provider(explicit, config.general.provider.as_deref());
    let provider = resolver::resolve_with(id, config.overrides_for(id), &lookup);

    // Bind address: CLI → env → config → default
    let bind = cli
        .bind
        .map(str::to_string)
        .or_else(|| lookup(BIND_ENV_VAR))
        .or_else(|| config.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let gateway = GatewaySettings {
        reply: generation(&config.reply, GenerationSettings::REPLY, "reply"),
        analysis: generation(&config.analysis, GenerationSettings::ANALYSIS, "analysis"),
        concurrent_analysis: config.general.concurrent_analysis.unwrap_or(false),
    };

    ResolvedConfig {
        provider,
        bind,
        expose_error_details: config.server.expose_error_details.unwrap_or(true),
        request_timeout: config
            .server
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        gateway,
    }
}

/// Log level and file, resolved without logging anything.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub file: Option<PathBuf>,
    /// A requested level that could not be parsed.
    pub unrecognized_level: Option<String>,
}

impl LoggingSettings {
    /// Reports anything that was ignored while resolving. Call once the logger is up.
    pub fn log_ignored(&self) {
        if let Some(level) = &self.unrecognized_level {
            warn!("Unknown log level '{}', using {}", level, self.level);
        }
    }
}

/// Logging settings from the process environment.
pub fn logging(config: &BanterConfig, cli: CliOverrides<'_>) -> LoggingSettings {
    logging_with(config, cli, |key| std::env::var(key).ok())
}

/// Log level: CLI → env → config → default. Log file comes from the config only.
pub fn logging_with<F>(config: &BanterConfig, cli: CliOverrides<'_>, lookup: F) -> LoggingSettings
where
    F: Fn(&str) -> Option<String>,
{
    let requested = cli
        .log_level
        .map(str::to_string)
        .or_else(|| lookup(LOG_LEVEL_ENV_VAR))
        .or_else(|| config.logging.level.clone());

    let (level, unrecognized_level) = match requested {
        Some(name) => match LevelFilter::from_str(name.trim()) {
            Ok(level) => (level, None),
            Err(_) => (DEFAULT_LOG_LEVEL, Some(name)),
        },
        None => (DEFAULT_LOG_LEVEL, None),
    };

    LoggingSettings {
        level,
        file: config.logging.file.as_ref().map(PathBuf::from),
        unrecognized_level,
    }
}

/// Applies configured sampling values over `defaults`, ignoring out-of-range ones.
fn generation(config: &GenerationConfig, defaults: GenerationSettings, label: &str) -> GenerationSettings {
    let temperature = match config.temperature {
        Some(t) if (0.0..=MAX_TEMPERATURE).contains(&t) => t,
        Some(t) => {
            warn!(
                "Ignoring {} temperature {} (must be within 0.0..={})",
                label, t, MAX_TEMPERATURE
            );
            defaults.temperature
        }
        None => defaults.temperature,
    };
    let max_tokens = match config.max_tokens {
        Some(0) => {
            warn!("Ignoring {} max_tokens = 0", label);
            defaults.max_tokens
        }
        Some(n) => n,
        None => defaults.max_tokens,
    };
    GenerationSettings {
        temperature,
        max_tokens,
    }
}
