use crate::types::{Article, DigestError, Result};
use crate::utils::text::{normalize_whitespace, strip_html};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::debug;

/// Maps RSS/Atom entries onto articles. One parser per source pull, so
/// duplicate detection is scoped to a single feed document.
pub struct FeedParser {
    seen_guids: HashSet<String>,
    seen_urls: HashSet<String>,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_guids: HashSet::new(),
            seen_urls: HashSet::new(),
        }
    }

    pub fn parse_articles(
        &mut self,
        content: &str,
        source: &str,
        retrieved_at: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        debug!(source = %source, bytes = content.len(), "Parsing feed content");

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| DigestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry, source, retrieved_at))
            .collect();

        debug!(source = %source, count = articles.len(), "Parsed feed entries");
        Ok(articles)
    }

    fn parse_entry(
        &mut self,
        entry: feed_rs::model::Entry,
        source: &str,
        retrieved_at: DateTime<Utc>,
    ) -> Option<Article> {
        let title = entry
            .title
            .map(|t| strip_html(&t.content))
            .filter(|t| !t.is_empty())?;

        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| entry.links.first())?
            .href
            .trim()
            .to_string();
        if link.is_empty() {
            return None;
        }

        if !entry.id.is_empty() && !self.seen_guids.insert(entry.id.clone()) {
            debug!("Skipping duplicate entry with GUID: {}", entry.id);
            return None;
        }
        if !self.seen_urls.insert(link.clone()) {
            debug!("Skipping duplicate entry with URL: {}", link);
            return None;
        }

        let summary = entry
            .summary
            .map(|s| s.content)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|s| strip_html(&s))
            .unwrap_or_default();

        Some(Article {
            title: normalize_whitespace(&title),
            link,
            summary,
            source: source.to_string(),
            retrieved_at,
            published_at: entry.published.or(entry.updated),
        })
    }
}
