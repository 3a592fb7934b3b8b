// src/config/mod.rs
//! Runtime configuration: optional TOML file for tuning, environment for secrets
//! and overrides.
//!
//! Resolution order for the file:
//! 1) $BOT_CONFIG_PATH (must exist when set)
//! 2) config/bot.toml
//! 3) built-in defaults
//!
//! Environment variables always win over file values.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";
pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";

/// Upper bound for every configured duration (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3600;

/// Tunables that may live in the TOML file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub source: SourceSettings,
    pub schedule: ScheduleSettings,
    pub summarizer: SummarizerSettings,
    pub server: ServerSettings,
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub homepage_url: String,
    /// Only links starting with this prefix are broadcast.
    pub domain_prefix: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            homepage_url: "https://www.livemint.com/".to_string(),
            domain_prefix: "https://www.livemint.com/".to_string(),
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (compatible; AsthraBot/0.1)".to_string(),
        }
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub fetch_interval_secs: u64,
    pub initial_delay_secs: u64,
    pub item_delay_secs: u64,
    pub quiet_threshold_secs: u64,
    pub seen_ttl_secs: u64,
    /// Publish the "summarization failed" placeholder so the channel shows it.
    pub publish_failure_notices: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 900,
            initial_delay_secs: 5,
            item_delay_secs: 15,
            quiet_threshold_secs: 3 * 3600,
            seen_ttl_secs: 6 * 3600,
            publish_failure_notices: true,
        }
    }
}

impl ScheduleSettings {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }

    pub fn quiet_threshold(&self) -> chrono::Duration {
        chrono_secs(self.quiet_threshold_secs)
    }

    pub fn seen_ttl(&self) -> chrono::Duration {
        chrono_secs(self.seen_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: usize,
    /// Hard ceiling on the model output before the trailer is appended.
    pub max_chars: usize,
    pub attribution: String,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama3-8b-8192".to_string(),
            max_tokens: 256,
            temperature: 0.5,
            timeout_secs: 30,
            max_retries: 2,
            max_chars: 3900,
            attribution: "Asthra Bot".to_string(),
        }
    }
}

impl SummarizerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub enabled: bool,
    pub addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u8,
    pub chunk_limit: usize,
    pub caption_limit: usize,
    pub commands_enabled: bool,
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 15,
            max_retries: 3,
            chunk_limit: 3900,
            caption_limit: 1024,
            commands_enabled: true,
            poll_timeout_secs: 30,
        }
    }
}

impl TelegramSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Secrets come from the environment only.
#[derive(Clone, Default)]
pub struct Credentials {
    pub bot_token: String,
    pub channel_id: String,
    pub groq_api_key: String,
}

// Keep tokens out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token_len", &self.bot_token.len())
            .field("channel_id", &self.channel_id)
            .field("groq_api_key_len", &self.groq_api_key.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub source: SourceSettings,
    pub schedule: ScheduleSettings,
    pub summarizer: SummarizerSettings,
    pub server: ServerSettings,
    pub telegram: TelegramSettings,
    pub credentials: Credentials,
    /// Log outgoing messages instead of calling Telegram.
    pub dry_run: bool,
}

impl BotConfig {
    /// Load `.env`, the optional TOML file and the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let file = load_file_default()?;
        Self::from_parts(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with an environment lookup and validate the result.
    pub fn from_parts<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let FileConfig {
            mut source,
            mut schedule,
            mut summarizer,
            mut server,
            telegram,
        } = file;

        if let Some(v) = non_empty(&lookup, "SOURCE_URL") {
            source.homepage_url = v;
        }
        if let Some(v) = non_empty(&lookup, "SOURCE_DOMAIN_PREFIX") {
            source.domain_prefix = v;
        }

        override_parsed(&lookup, "FETCH_INTERVAL_SECS", &mut schedule.fetch_interval_secs)?;
        override_parsed(&lookup, "INITIAL_DELAY_SECS", &mut schedule.initial_delay_secs)?;
        override_parsed(&lookup, "ITEM_DELAY_SECS", &mut schedule.item_delay_secs)?;
        override_parsed(&lookup, "QUIET_THRESHOLD_SECS", &mut schedule.quiet_threshold_secs)?;
        override_parsed(&lookup, "SEEN_TTL_SECS", &mut schedule.seen_ttl_secs)?;
        override_parsed(
            &lookup,
            "PUBLISH_FAILURE_NOTICES",
            &mut schedule.publish_failure_notices,
        )?;

        if let Some(v) = non_empty(&lookup, "GROQ_API_URL") {
            summarizer.api_url = v;
        }
        if let Some(v) = non_empty(&lookup, "GROQ_MODEL") {
            summarizer.model = v;
        }
        override_parsed(&lookup, "SUMMARY_TIMEOUT_SECS", &mut summarizer.timeout_secs)?;
        override_parsed(&lookup, "SUMMARY_MAX_RETRIES", &mut summarizer.max_retries)?;

        if let Some(v) = non_empty(&lookup, "KEEP_ALIVE_ADDR") {
            server.addr = v;
        }

        let mut dry_run = false;
        override_parsed(&lookup, "DRY_RUN", &mut dry_run)?;

        let groq_api_key = non_empty(&lookup, "GROQ_API_KEY")
            .ok_or_else(|| anyhow!("Missing GROQ_API_KEY env var"))?;
        let (bot_token, channel_id) = if dry_run {
            (
                non_empty(&lookup, "BOT_TOKEN").unwrap_or_default(),
                non_empty(&lookup, "CHANNEL_ID").unwrap_or_default(),
            )
        } else {
            (
                non_empty(&lookup, "BOT_TOKEN")
                    .ok_or_else(|| anyhow!("Missing BOT_TOKEN env var"))?,
                non_empty(&lookup, "CHANNEL_ID")
                    .ok_or_else(|| anyhow!("Missing CHANNEL_ID env var"))?,
            )
        };

        let cfg = Self {
            source,
            schedule,
            summarizer,
            server,
            telegram,
            credentials: Credentials {
                bot_token,
                channel_id,
                groq_api_key,
            },
            dry_run,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.schedule.fetch_interval_secs == 0 {
            bail!("fetch interval must be greater than zero");
        }
        if self.schedule.seen_ttl_secs == 0 {
            bail!("seen TTL must be greater than zero");
        }
        if self.schedule.quiet_threshold_secs == 0 {
            bail!("quiet threshold must be greater than zero");
        }
        if self.telegram.chunk_limit == 0 || self.telegram.caption_limit == 0 {
            bail!("telegram chunk and caption limits must be greater than zero");
        }
        if self.summarizer.max_chars == 0 {
            bail!("summarizer max_chars must be greater than zero");
        }
        let durations = [
            ("FETCH_INTERVAL_SECS", self.schedule.fetch_interval_secs),
            ("INITIAL_DELAY_SECS", self.schedule.initial_delay_secs),
            ("ITEM_DELAY_SECS", self.schedule.item_delay_secs),
            ("QUIET_THRESHOLD_SECS", self.schedule.quiet_threshold_secs),
            ("SEEN_TTL_SECS", self.schedule.seen_ttl_secs),
            ("SUMMARY_TIMEOUT_SECS", self.summarizer.timeout_secs),
            ("source timeout_secs", self.source.timeout_secs),
            ("telegram timeout_secs", self.telegram.timeout_secs),
            ("telegram poll_timeout_secs", self.telegram.poll_timeout_secs),
        ];
        for (name, secs) in durations {
            if secs > MAX_DURATION_SECS {
                bail!("{name}={secs} is out of range (max {MAX_DURATION_SECS} seconds)");
            }
        }
        url::Url::parse(&self.source.homepage_url)
            .with_context(|| format!("invalid source URL {}", self.source.homepage_url))?;
        Ok(())
    }
}

/// Load the file config from an explicit path.
pub fn load_file_from(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading bot config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing bot config {}", path.display()))
}

/// Load the file config using env var + fallback; defaults when nothing exists.
pub fn load_file_default() -> Result<FileConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_file_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    if fallback.exists() {
        return load_file_from(&fallback);
    }
    Ok(FileConfig::default())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = non_empty(lookup, key) {
        *slot = parse_value(&raw).map_err(|e| anyhow!("invalid {key}={raw}: {e}"))?;
    }
    Ok(())
}

// Accept 1/0 and yes/no for booleans as well as plain FromStr values.
fn parse_value<T>(raw: &str) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let normalized = match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "on" if raw.parse::<T>().is_err() => "true".to_string(),
        "0" | "no" | "off" if raw.parse::<T>().is_err() => "false".to_string(),
        _ => raw.to_string(),
    };
    normalized.parse::<T>().map_err(|e| e.to_string())
}

// Saturates instead of panicking; `validate` keeps real values far below this.
fn chrono_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
