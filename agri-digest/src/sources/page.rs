use crate::scrape::{extract_body_excerpt, extract_listing};
use crate::traits::ArticleSource;
use crate::types::{Article, Result, SourceDescriptor};
use crate::Fetcher;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// HTML listing page scraped with the descriptor's selectors.
pub struct PageSource {
    descriptor: SourceDescriptor,
    fetcher: Arc<Fetcher>,
}

impl PageSource {
    pub fn new(descriptor: SourceDescriptor, fetcher: Arc<Fetcher>) -> Self {
        Self { descriptor, fetcher }
    }

    /// Replaces the listing summary with an excerpt of the article page.
    /// Keeps the listing summary when the page cannot be fetched.
    async fn enrich(&self, article: &mut Article) {
        match self.fetcher.get_text(&article.link).await {
            Ok(html) => {
                let excerpt = extract_body_excerpt(&html);
                if !excerpt.is_empty() {
                    article.summary = excerpt;
                }
            }
            Err(e) => {
                warn!(source = %self.descriptor.name, url = %article.link, error = %e, "Article page fetch failed");
            }
        }
    }
}

#[async_trait]
impl ArticleSource for PageSource {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn max_articles(&self) -> Option<usize> {
        self.descriptor.max_articles
    }

    async fn pull(&self, limit: usize) -> Result<Vec<Article>> {
        info!(source = %self.descriptor.name, url = %self.descriptor.url, "Scraping page");

        let base_url = Url::parse(&self.descriptor.url)?;
        let html = self.fetcher.get_text(&self.descriptor.url).await?;
        let candidates = extract_listing(&html, &base_url, &self.descriptor.rules, limit)?;
        debug!(source = %self.descriptor.name, count = candidates.len(), "Extracted listing candidates");

        let retrieved_at = Utc::now();
        let mut articles: Vec<Article> = candidates
            .into_iter()
            .map(|candidate| Article {
                title: candidate.title,
                link: candidate.link,
                summary: candidate.summary,
                source: self.descriptor.name.clone(),
                retrieved_at,
                published_at: None,
            })
            .collect();

        if self.descriptor.follow_links {
            for article in articles.iter_mut() {
                self.enrich(article).await;
            }
        }

        info!(source = %self.descriptor.name, count = articles.len(), "Scraped articles");
        Ok(articles)
    }
}
