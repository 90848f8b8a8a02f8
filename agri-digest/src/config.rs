use crate::locale::Language;
use crate::types::{DigestError, ExtractionRules, Result, SourceDescriptor};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

// ── File config ──────────────────────────────────────────────

/// Contents of the optional YAML configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            digest: DigestConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the YAML file at `path`, or returns the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_yaml_str(&raw)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(DigestError::Config("no sources configured".into()));
        }
        for source in &self.sources {
            url::Url::parse(&source.url).map_err(|e| {
                DigestError::Config(format!("source '{}' has invalid url: {}", source.name, e))
            })?;
        }
        if self.digest.max_total_articles == 0 {
            return Err(DigestError::Config("max_total_articles must be at least 1".into()));
        }
        if self.fetch.fetch_concurrency == 0 {
            return Err(DigestError::Config("fetch_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub max_articles_per_source: usize,
    pub max_total_articles: usize,
    /// Daily trigger time, `HH:MM`.
    pub schedule: String,
    /// `UTC` or a fixed offset such as `+06:00`.
    pub timezone: String,
    pub summary_length: usize,
    pub include_source_links: bool,
    pub filter_irrelevant: bool,
    pub max_message_chars: usize,
    pub max_ai_input_articles: usize,
    /// Overrides the localized default category list.
    pub categories: Option<Vec<String>>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: 10,
            max_total_articles: 8,
            schedule: "08:00".to_string(),
            timezone: "UTC".to_string(),
            summary_length: 200,
            include_source_links: true,
            filter_irrelevant: true,
            max_message_chars: 4096,
            max_ai_input_articles: 40,
            categories: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub min_host_interval_ms: u64,
    pub max_redirects: usize,
    pub max_page_size_mb: usize,
    pub fetch_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Agriculture Digest Bot 1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 2,
            min_host_interval_ms: 2000,
            max_redirects: 5,
            max_page_size_mb: 10,
            fetch_concurrency: 1,
        }
    }
}

fn rules(title: &str, link: &str, summary: &str) -> ExtractionRules {
    ExtractionRules {
        title: title.to_string(),
        link: link.to_string(),
        summary: summary.to_string(),
    }
}

/// The built-in source registry.
pub fn default_sources() -> Vec<SourceDescriptor> {
    const GENERIC_TITLE: &str = "h1, h2, h3, .title, .headline";
    const GENERIC_LINK: &str = "a[href*=\"/news/\"], a[href*=\"/article/\"]";

    vec![
        SourceDescriptor::scrape(
            "Fastmarkets Agriculture",
            "https://www.fastmarkets.com/agriculture/grains-and-oilseeds/",
            rules(
                "h2, h3, .article-title, .headline",
                "a[href*=\"/news/\"], a[href*=\"/analysis/\"]",
                "p, .article-summary, .excerpt",
            ),
        ),
        SourceDescriptor::scrape(
            "Margin.kz",
            "https://margin.kz/",
            rules(GENERIC_TITLE, GENERIC_LINK, "p, .summary, .excerpt, .description"),
        ),
        SourceDescriptor::scrape(
            "APK-Inform",
            "https://www.apk-inform.com/ru/news",
            rules(
                "h1, h2, h3, .news-title, .article-title",
                "a[href*=\"/news/\"], a[href*=\"/ru/news/\"]",
                "p, .news-summary, .article-summary",
            ),
        ),
        SourceDescriptor::scrape(
            "APK News Kazakhstan",
            "https://apk-news.kz/",
            rules(GENERIC_TITLE, GENERIC_LINK, "p, .summary, .excerpt"),
        ),
        SourceDescriptor::scrape(
            "Eldala.kz",
            "https://eldala.kz/",
            rules(GENERIC_TITLE, GENERIC_LINK, "p, .summary, .excerpt, .description"),
        ),
        // Public web preview of the channel; each post links to itself.
        SourceDescriptor::scrape(
            "Andre Sizov Telegram",
            "https://t.me/s/andre_sizov",
            rules(
                ".tgme_widget_message_text",
                "a.tgme_widget_message_date",
                ".tgme_widget_message_text",
            ),
        ),
        SourceDescriptor::scrape(
            "AMIS Outlook",
            "https://www.amis-outlook.org/home",
            rules(GENERIC_TITLE, GENERIC_LINK, "p, .summary, .excerpt, .description"),
        ),
    ]
}

// ── Environment settings ─────────────────────────────────────

/// Credentials and runtime switches read from the environment
/// (call `load_dotenv()` first).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub channel_id: String,
    pub language: Language,
    pub use_openai: bool,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let language = env_or("LANGUAGE", "ru")
            .parse::<Language>()
            .map_err(DigestError::Config)?;
        let port = match env_opt("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| DigestError::Config(format!("invalid PORT: {raw}")))?,
            None => 8080,
        };

        Ok(Self {
            bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            channel_id: env_or("TELEGRAM_CHANNEL_ID", "@agriculture_digest"),
            language,
            use_openai: env_bool("USE_OPENAI", true),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com"),
            port,
        })
    }

    /// True when the AI ranker is enabled and has a key to call with.
    pub fn ai_enabled(&self) -> bool {
        self.use_openai && self.openai_api_key.is_some()
    }

    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| DigestError::Config("TELEGRAM_BOT_TOKEN is not set".into()))
    }
}
