//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.medgate/config.toml` (user)
//! 3. `/etc/medgate/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.medgate/secrets.toml` (user, must be 0600)
//! 2. `/etc/medgate/secrets.toml` (system, must be 0600)
//!
//! Keys missing from the secrets file fall back to the provider's
//! environment variable (`OPENAI_API_KEY`, `GROQ_API_KEY`, ...).
//!
//! ```toml
//! [[providers]]
//! name = "groq"
//! kind = "groq"
//! model = "llama-3.1-8b-instant"
//! priority = 0
//! timeout_secs = 8
//!
//! [[providers]]
//! name = "gemini"
//! kind = "gemini"
//! model = "gemini-1.5-flash"
//! priority = 1
//!
//! [cache]
//! ttl_secs = 3600
//!
//! [search]
//! top_k = 3
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::gateway::DEFAULT_REQUEST_TIMEOUT;
use crate::prompt::PromptConfig;
use crate::providers::{
    CooldownPolicy, DEFAULT_BASE_COOLDOWN, DEFAULT_COOLDOWN_CEILING, DEFAULT_MAX_TOKENS,
    DEFAULT_PROVIDER_TIMEOUT, ProviderDescriptor,
};
use crate::ratelimit::RateLimitConfig;
use crate::search::{DEFAULT_SEARCH_TIMEOUT, ScoringConfig, SearchConfig};
use crate::{MedgateError, Result};

/// Full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Providers, tried in ascending `priority`.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Backend family of a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Groq,
    Openrouter,
    /// Any other endpoint speaking the OpenAI chat completions contract;
    /// requires `base_url`.
    OpenaiCompatible,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Secrets-file section holding this kind's key.
    pub fn secret_name(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Openrouter => "openrouter",
            ProviderKind::OpenaiCompatible => "openai_compatible",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "google",
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Unique name; also used for metrics, logs and `model_used`.
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    /// Lower is tried first.
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Overrides the base cooldown for this provider.
    #[serde(default)]
    pub cooldown_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn descriptor(&self) -> ProviderDescriptor {
        let mut descriptor = ProviderDescriptor::new(self.name.clone(), self.priority)
            .timeout(
                self.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_PROVIDER_TIMEOUT),
            )
            .max_tokens(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));
        if let Some(secs) = self.cooldown_secs {
            descriptor = descriptor.base_cooldown(Duration::from_secs(secs));
        }
        descriptor
    }
}

/// `[cooldown]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CooldownConfig {
    #[serde(default = "default_base_cooldown_secs")]
    pub base_secs: u64,
    #[serde(default = "default_cooldown_ceiling_secs")]
    pub ceiling_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            base_secs: default_base_cooldown_secs(),
            ceiling_secs: default_cooldown_ceiling_secs(),
        }
    }
}

fn default_base_cooldown_secs() -> u64 {
    DEFAULT_BASE_COOLDOWN.as_secs()
}

fn default_cooldown_ceiling_secs() -> u64 {
    DEFAULT_COOLDOWN_CEILING.as_secs()
}

impl CooldownConfig {
    pub fn policy(&self) -> CooldownPolicy {
        CooldownPolicy::new()
            .base(Duration::from_secs(self.base_secs))
            .ceiling(Duration::from_secs(self.ceiling_secs))
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,
    /// Shared Redis store in front of the in-process cache (feature `redis`).
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            fallback_ttl_secs: default_fallback_ttl_secs(),
            redis_url: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_fallback_ttl_secs() -> u64 {
    60
}

impl CacheSection {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs))
            .fallback_ttl(Duration::from_secs(self.fallback_ttl_secs))
    }
}

/// `[search]` section. Scoring keys (`trust_weight`, `top_k`, ...) sit
/// directly in the section.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    /// Search only runs when enabled and a SerpAPI key is available.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub scoring: ScoringConfig,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            timeout_secs: default_search_timeout_secs(),
            scoring: ScoringConfig::default(),
        }
    }
}

fn default_search_timeout_secs() -> u64 {
    DEFAULT_SEARCH_TIMEOUT.as_secs()
}

impl SearchSection {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::new()
            .timeout(Duration::from_secs(self.timeout_secs))
            .scoring(self.scoring.clone())
    }
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// End-to-end budget per request (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Secrets configuration (API keys), one table per provider or kind.
///
/// ```toml
/// [groq]
/// api_key = "gsk_..."
///
/// [serpapi]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(flatten)]
    pub keys: HashMap<String, ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Secrets section → environment variable name mapping.
const ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("groq", "GROQ_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("google", "GOOGLE_API_KEY"),
    ("serpapi", "SERPAPI_API_KEY"),
];

/// Secrets section for the search API key.
pub const SEARCH_SECRET: &str = "serpapi";

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.medgate/config.toml`
    /// 3. `/etc/medgate/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            MedgateError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| MedgateError::Configuration(format!("{e} (in {path:?})")))
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            MedgateError::Configuration(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.providers {
            if !seen.insert(p.name.as_str()) {
                return Err(MedgateError::Configuration(format!(
                    "duplicate provider name '{}'",
                    p.name
                )));
            }
            if p.kind == ProviderKind::OpenaiCompatible && p.base_url.is_none() {
                return Err(MedgateError::Configuration(format!(
                    "provider '{}' of kind openai_compatible needs base_url",
                    p.name
                )));
            }
        }
        if self.cooldown.base_secs > self.cooldown.ceiling_secs {
            return Err(MedgateError::Configuration(
                "cooldown.base_secs must not exceed cooldown.ceiling_secs".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MedgateError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".medgate").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/medgate/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MedgateError::Configuration(
            "No config file found. Create ~/.medgate/config.toml or /etc/medgate/config.toml"
                .to_string(),
        ))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.request_timeout_secs)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.medgate/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/medgate/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (providers may use env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".medgate").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/medgate/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MedgateError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MedgateError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MedgateError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(MedgateError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get the API key stored under `section`, falling back to its
    /// environment variable.
    pub fn api_key(&self, section: &str) -> Option<String> {
        self.keys
            .get(section)
            .map(|s| s.api_key.clone())
            .or_else(|| {
                ENV_VARS
                    .iter()
                    .find(|(name, _)| *name == section)
                    .and_then(|(_, env_var)| std::env::var(env_var).ok())
            })
            .filter(|k| !k.is_empty())
    }

    /// Key for a configured provider: its own section first, then its kind's.
    pub fn provider_key(&self, provider: &ProviderConfig) -> Option<String> {
        self.keys
            .get(&provider.name)
            .map(|s| s.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key(provider.kind.secret_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(config.providers.is_empty());
        assert_eq!(config.cooldown.base_secs, 30);
        assert_eq!(config.cooldown.ceiling_secs, 600);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.rate_limit.capacity, 20);
        assert_eq!(config.orchestrator.request_timeout_secs, 30);
        assert!(config.search.enabled);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [[providers]]
            name = "openai"
            kind = "openai"
            model = "gpt-4o-mini"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.providers.len(), 1);
        let descriptor = config.providers[0].descriptor();
        assert_eq!(descriptor.priority, 0);
        assert_eq!(descriptor.timeout, DEFAULT_PROVIDER_TIMEOUT);
        assert_eq!(descriptor.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(descriptor.base_cooldown.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [[providers]]
            name = "groq"
            kind = "groq"
            model = "llama-3.1-8b-instant"
            priority = 0
            timeout_secs = 8
            cooldown_secs = 15

            [[providers]]
            name = "local"
            kind = "openai_compatible"
            model = "qwen"
            base_url = "http://localhost:8080/v1"
            priority = 2
            max_tokens = 512

            [cooldown]
            base_secs = 20
            ceiling_secs = 300

            [cache]
            ttl_secs = 120
            fallback_ttl_secs = 0

            [rate_limit]
            capacity = 5
            window_secs = 30

            [search]
            timeout_secs = 3
            top_k = 5
            min_relevance = 0.4
            trusted_domains = ["who.int"]

            [prompt]
            max_history_turns = 4

            [orchestrator]
            request_timeout_secs = 12
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.providers[1].kind, ProviderKind::OpenaiCompatible);
        let groq = config.providers[0].descriptor();
        assert_eq!(groq.timeout, Duration::from_secs(8));
        assert_eq!(groq.base_cooldown, Some(Duration::from_secs(15)));
        assert_eq!(config.providers[1].descriptor().max_tokens, 512);
        assert_eq!(config.cooldown.policy().ceiling, Duration::from_secs(300));
        assert_eq!(config.cache.cache_config().fallback_ttl, Duration::ZERO);
        assert_eq!(config.rate_limit.window, Duration::from_secs(30));
        assert_eq!(config.search.scoring.top_k, 5);
        assert_eq!(config.search.scoring.trusted_domains, vec!["who.int"]);
        // Unset scoring keys keep their defaults
        assert_eq!(config.search.scoring.max_snippet_chars, 300);
        assert_eq!(config.search.search_config().timeout, Duration::from_secs(3));
        assert_eq!(config.prompt.max_history_turns, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn duplicate_provider_names_are_rejected() {
        let toml = r#"
            [[providers]]
            name = "a"
            kind = "openai"
            model = "m"

            [[providers]]
            name = "a"
            kind = "groq"
            model = "m"
        "#;
        let err = Config::parse(toml).unwrap_err().to_string();
        assert!(err.contains("duplicate provider name"));
    }

    #[test]
    fn compatible_provider_needs_base_url() {
        let toml = r#"
            [[providers]]
            name = "local"
            kind = "openai_compatible"
            model = "m"
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [groq]
            api_key = "gsk-test"

            [my-proxy]
            api_key = "proxy-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.api_key("groq"), Some("gsk-test".to_string()));
        assert_eq!(secrets.api_key("nonexistent"), None);

        let provider = ProviderConfig {
            name: "my-proxy".into(),
            kind: ProviderKind::OpenaiCompatible,
            model: "m".into(),
            priority: 0,
            timeout_secs: None,
            base_url: Some("http://localhost".into()),
            max_tokens: None,
            cooldown_secs: None,
        };
        assert_eq!(secrets.provider_key(&provider), Some("proxy-key".to_string()));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
