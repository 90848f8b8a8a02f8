use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How articles are pulled out of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// RSS or Atom feed, parsed entry by entry.
    #[serde(alias = "rss", alias = "atom")]
    Feed,
    /// Plain HTML page queried with CSS selectors.
    #[serde(alias = "html")]
    Scrape,
}

/// CSS selector lists used to locate article fields on a scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRules {
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_link_selector")]
    pub link: String,
    #[serde(default = "default_summary_selector")]
    pub summary: String,
}

fn default_title_selector() -> String {
    "h1, h2, h3, .title, .headline".to_string()
}

fn default_link_selector() -> String {
    "a[href*=\"/news/\"], a[href*=\"/article/\"]".to_string()
}

fn default_summary_selector() -> String {
    "p, .summary, .excerpt".to_string()
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            title: default_title_selector(),
            link: default_link_selector(),
            summary: default_summary_selector(),
        }
    }
}

/// A configured news source. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    pub mode: FetchMode,
    #[serde(default)]
    pub rules: ExtractionRules,
    /// Fetch each linked article page and use its body as the summary.
    #[serde(default)]
    pub follow_links: bool,
    /// Lowers the global per-source cap for this source.
    #[serde(default)]
    pub max_articles: Option<usize>,
}

impl SourceDescriptor {
    pub fn feed(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            mode: FetchMode::Feed,
            rules: ExtractionRules::default(),
            follow_links: false,
            max_articles: None,
        }
    }

    pub fn scrape(name: impl Into<String>, url: impl Into<String>, rules: ExtractionRules) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            mode: FetchMode::Scrape,
            rules,
            follow_links: false,
            max_articles: None,
        }
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn with_max_articles(mut self, max_articles: usize) -> Self {
        self.max_articles = Some(max_articles);
        self
    }
}

/// One news item as retrieved from a source. Lives for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source: String,
    pub retrieved_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// An article after scoring and categorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub article: Article,
    /// Relevance in `0.0..=1.0`.
    pub score: f64,
    pub category: String,
    /// Localized summary written by the ranker, if any.
    pub summary: Option<String>,
}

impl RankedArticle {
    pub fn new(article: Article, score: f64, category: impl Into<String>) -> Self {
        Self {
            article,
            score,
            category: category.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.summary = if summary.trim().is_empty() { None } else { Some(summary) };
        self
    }
}

/// Ranker output: articles in rank order plus an optional narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub articles: Vec<RankedArticle>,
    pub overview: Option<String>,
    pub ranker: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Ranker error: {0}")]
    Ranker(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Page size exceeds limit: {size_mb}MB")]
    PageTooLarge { size_mb: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
