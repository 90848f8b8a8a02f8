pub mod types;
pub mod config;
pub mod locale;
pub mod utils;
pub mod fetcher;
pub mod parser;
pub mod scrape;
pub mod traits;
pub mod sources;
pub mod aggregator;
pub mod relevance;
pub mod llm_adapter;
pub mod digest;
pub mod telegram;
pub mod bot;
pub mod scheduler;
pub mod pipeline;
pub mod health;

pub use types::*;
pub use config::{AppConfig, DigestConfig, FetchConfig, Settings};
pub use locale::Language;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use traits::{ArticleSource, DeliveryChannel, RankRequest, Ranker};
pub use aggregator::ArticleCollector;
pub use relevance::KeywordRanker;
pub use llm_adapter::{AiRanker, LlmAdapter, OpenAiAdapter};
pub use digest::{Digest, DigestFormatter};
pub use telegram::{TelegramChannel, TelegramClient};
pub use bot::DigestBot;
pub use scheduler::{DailySchedule, DigestScheduler};
pub use pipeline::{DigestPipeline, RunReport, Trigger};
