use crate::traits::ArticleSource;
use crate::types::{Article, Result, SourceDescriptor};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// RSS/Atom feed source.
pub struct FeedSource {
    descriptor: SourceDescriptor,
    fetcher: Arc<Fetcher>,
}

impl FeedSource {
    pub fn new(descriptor: SourceDescriptor, fetcher: Arc<Fetcher>) -> Self {
        Self { descriptor, fetcher }
    }
}

#[async_trait]
impl ArticleSource for FeedSource {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn max_articles(&self) -> Option<usize> {
        self.descriptor.max_articles
    }

    async fn pull(&self, limit: usize) -> Result<Vec<Article>> {
        info!(source = %self.descriptor.name, url = %self.descriptor.url, "Pulling feed");

        let content = self.fetcher.get_text(&self.descriptor.url).await?;
        let mut articles =
            FeedParser::new().parse_articles(&content, &self.descriptor.name, Utc::now())?;
        articles.truncate(limit);

        info!(source = %self.descriptor.name, count = articles.len(), "Pulled feed articles");
        Ok(articles)
    }
}
