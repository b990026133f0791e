//! # Provider Resolution
//!
//! Maps a provider identifier to a normalized endpoint descriptor.
//! Resolution never fails: an unknown identifier falls back to the default
//! provider and a missing credential is only reported when a call is made.

use std::fmt;

use clap::ValueEnum;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Environment variable that selects the active provider.
pub const PROVIDER_ENV_VAR: &str = "AI_PROVIDER";

/// The supported LLM backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[default]
    Zhipu,
    Qwen,
    #[value(name = "openai", alias = "open-ai")]
    OpenAi,
}

impl ProviderId {
    /// Parses an identifier, accepting a few common aliases. Case-insensitive.
    pub fn parse(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "zhipu" | "glm" => Some(ProviderId::Zhipu),
            "qwen" | "dashscope" => Some(ProviderId::Qwen),
            "openai" | "open-ai" | "gpt" => Some(ProviderId::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Zhipu => "zhipu",
            ProviderId::Qwen => "qwen",
            ProviderId::OpenAi => "openai",
        }
    }

    fn defaults(self) -> Endpoint {
        match self {
            ProviderId::Zhipu => Endpoint {
                base_url: "https://open.bigmodel.cn/api/paas/v4",
                model: "glm-4",
                env_prefix: "ZHIPU",
                dialect: Dialect::RawKey,
            },
            ProviderId::Qwen => Endpoint {
                base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
                model: "qwen-turbo",
                env_prefix: "DASHSCOPE",
                dialect: Dialect::Bearer,
            },
            ProviderId::OpenAi => Endpoint {
                base_url: "https://api.openai.com/v1",
                model: "gpt-3.5-turbo",
                env_prefix: "OPENAI",
                dialect: Dialect::Bearer,
            },
        }
    }

    /// Name of the environment variable holding this provider's API key.
    pub fn credential_env_var(self) -> String {
        format!("{}_API_KEY", self.defaults().env_prefix)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in endpoint facts for one provider.
struct Endpoint {
    base_url: &'static str,
    model: &'static str,
    env_prefix: &'static str,
    dialect: Dialect,
}

/// How a backend expects its credential to be presented.
///
/// All backends speak the same chat-completions body; only the auth header differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `Authorization: <key>`, no scheme prefix.
    RawKey,
}

impl Dialect {
    /// Value for the `Authorization` header.
    pub fn authorization(self, api_key: &str) -> String {
        match self {
            Dialect::Bearer => format!("Bearer {api_key}"),
            Dialect::RawKey => api_key.to_string(),
        }
    }

    /// Attaches this dialect's auth header to an outgoing request.
    pub fn authorize(self, builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, self.authorization(api_key))
    }
}

/// Per-provider overrides coming from the config file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ProviderOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Replaces the built-in auth header shape for this provider.
    pub dialect: Option<Dialect>,
}

/// Normalized descriptor of the active backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub credential: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dialect: Dialect,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl ProviderConfig {
    /// URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Picks the provider: explicit identifier first, then the config file,
/// then the default. Unknown identifiers are logged and replaced by the default.
pub fn select_provider(explicit: Option<&str>, configured: Option<&str>) -> ProviderId {
    for candidate in [explicit, configured].into_iter().flatten() {
        if candidate.trim().is_empty() {
            continue;
        }
        match ProviderId::parse(candidate) {
            Some(id) => return id,
            None => {
                warn!(
                    "Unrecognized provider '{}', falling back to {}",
                    candidate,
                    ProviderId::default()
                );
                return ProviderId::default();
            }
        }
    }
    ProviderId::default()
}

/// Resolves a provider against the process environment.
pub fn resolve(id: ProviderId, overrides: &ProviderOverrides) -> ProviderConfig {
    resolve_with(id, overrides, |key| std::env::var(key).ok())
}

/// Resolves a provider using `lookup` for environment values.
///
/// Precedence for each field: environment → config file → built-in default.
/// Empty values count as unset.
pub fn resolve_with<F>(id: ProviderId, overrides: &ProviderOverrides, lookup: F) -> ProviderConfig
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = id.defaults();
    let env = |suffix: &str| non_empty(lookup(&format!("{}_{suffix}", endpoint.env_prefix)));

    let credential = env("API_KEY").or_else(|| non_empty(overrides.api_key.clone()));

    let base_url = env("BASE_URL")
        .or_else(|| non_empty(overrides.base_url.clone()))
        .unwrap_or_else(|| endpoint.base_url.to_string())
        .trim_end_matches('/')
        .to_string();

    let model = env("MODEL")
        .or_else(|| non_empty(overrides.model.clone()))
        .unwrap_or_else(|| endpoint.model.to_string());

    let config = ProviderConfig {
        id,
        credential,
        base_url,
        model,
        dialect: overrides.dialect.unwrap_or(endpoint.dialect),
    };
    debug!("Resolved provider: {:?}", config);
    config
}

/// Converts an empty or whitespace-only string to None.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
