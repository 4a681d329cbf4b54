//! Application configuration.
//!
//! [`AppConfig`] is read from an optional TOML file and then overridden by
//! environment variables.  Every field has a default, so an empty or
//! missing file is valid; credentials are only checked when the component
//! that needs them is built.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use rta_adapters::{DEFAULT_RPC, DEFAULT_SMTP_PORT, DEFAULT_STREAM_URL, SmtpConfig, SupabaseConfig};
use rta_agent::LlmClientConfig;
use rta_web::WebConfig;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/rta.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub database: DatabaseSettings,
    pub stream: StreamSettings,
    pub notify: NotifySettings,
    pub server: ServerSettings,
    pub routing: RoutingSettings,
}

/// `[llm]`: the chat-completions provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let groq = LlmClientConfig::groq(String::new());
        Self {
            api_key: groq.api_key,
            base_url: groq.base_url,
            model: groq.default_model,
            temperature: groq.temperature,
            max_tokens: groq.max_tokens,
            timeout_secs: groq.timeout_secs,
        }
    }
}

/// `[database]`: the Supabase project queries run against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub key: String,
    pub rpc: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            rpc: DEFAULT_RPC.to_owned(),
        }
    }
}

/// `[stream]`: the server-push data source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub base_url: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_owned(),
        }
    }
}

/// `[notify]`: the SMTP account alerts are sent from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: Option<String>,
    pub recipient: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            from: None,
            recipient: String::new(),
        }
    }
}

/// `[server]`: the HTTP listener.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let web = WebConfig::default();
        Self {
            bind: web.bind_addr,
            port: web.port,
        }
    }
}

/// `[routing]`: marker lists that replace the built-in classifiers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub greeting_markers: Option<Vec<String>>,
    pub alert_markers: Option<Vec<String>>,
}

impl AppConfig {
    /// Read the configuration file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read the configuration file.
    ///
    /// An explicitly given file must exist; the default one may be absent.
    pub fn from_file(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        if !path.exists() {
            if required {
                bail!("config file {} does not exist", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Override fields from environment variables looked up through `var`.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let set = |field: &mut String, name: &str| {
            if let Some(value) = get(name) {
                *field = value;
            }
        };

        if let Some(key) = get("GROQ_API_KEY").or_else(|| get("RTA_LLM_API_KEY")) {
            self.llm.api_key = key;
        }
        set(&mut self.llm.base_url, "RTA_LLM_BASE_URL");
        set(&mut self.llm.model, "RTA_LLM_MODEL");

        set(&mut self.database.url, "SUPABASE_URL");
        set(&mut self.database.key, "SUPABASE_ANON_KEY");

        set(&mut self.stream.base_url, "RTA_STREAM_URL");

        set(&mut self.notify.smtp_host, "SMTP_HOST");
        set(&mut self.notify.username, "SMTP_USERNAME");
        set(&mut self.notify.password, "SMTP_PASSWORD");
        set(&mut self.notify.recipient, "ALERT_RECIPIENT");
        if let Some(from) = get("SMTP_FROM") {
            self.notify.from = Some(from);
        }
        if let Some(port) = get("SMTP_PORT") {
            self.notify.smtp_port = port
                .trim()
                .parse()
                .with_context(|| format!("SMTP_PORT must be a port number, got `{port}`"))?;
        }

        Ok(())
    }

    pub fn llm_client_config(&self) -> LlmClientConfig {
        let llm = &self.llm;
        let mut config =
            LlmClientConfig::openai_compatible(&llm.api_key, &llm.model, &llm.base_url);
        config.temperature = llm.temperature;
        config.max_tokens = llm.max_tokens;
        config.timeout_secs = llm.timeout_secs;
        config
    }

    pub fn supabase_config(&self) -> SupabaseConfig {
        let mut config = SupabaseConfig::new(&self.database.url, &self.database.key);
        config.rpc = self.database.rpc.clone();
        config
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        let notify = &self.notify;
        SmtpConfig {
            host: notify.smtp_host.clone(),
            port: notify.smtp_port,
            username: notify.username.clone(),
            password: notify.password.clone(),
            from: notify.from.clone(),
            recipient: notify.recipient.clone(),
        }
    }

    pub fn web_config(&self) -> WebConfig {
        WebConfig {
            bind_addr: self.server.bind.clone(),
            port: self.server.port,
        }
    }
}
