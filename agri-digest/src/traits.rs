use crate::digest::Digest;
use crate::locale::Language;
use crate::types::{Article, Ranking, Result};
use async_trait::async_trait;

/// A place articles are pulled from (RSS feed, HTML listing page, ...).
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Human-readable name, also stamped on every article.
    fn name(&self) -> &str;

    /// Per-source cap that lowers the global one, if configured.
    fn max_articles(&self) -> Option<usize> {
        None
    }

    /// Retrieve at most `limit` articles.
    async fn pull(&self, limit: usize) -> Result<Vec<Article>>;
}

/// Parameters handed to a ranker for one run.
#[derive(Debug, Clone)]
pub struct RankRequest {
    pub language: Language,
    pub max_articles: usize,
    /// Allowed category labels; the last one is the catch-all.
    pub categories: Vec<String>,
    pub summary_length: usize,
}

/// Scores, categorizes and optionally summarizes articles.
#[async_trait]
pub trait Ranker: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `request.max_articles` articles, best first.
    async fn rank(&self, articles: &[Article], request: &RankRequest) -> Result<Ranking>;
}

/// Where a finished digest is sent.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, digest: &Digest) -> Result<()>;
}
