use crate::traits::ArticleSource;
use crate::types::Article;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// What happened to one source during a collection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub fetched: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Articles from every source in registry order, plus per-source outcomes.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub articles: Vec<Article>,
    pub outcomes: Vec<SourceOutcome>,
}

impl Collection {
    pub fn failed_sources(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

/// Pulls every source with bounded concurrency and merges the results.
#[derive(Debug, Clone)]
pub struct ArticleCollector {
    per_source_cap: usize,
    concurrency: usize,
}

impl ArticleCollector {
    pub fn new(per_source_cap: usize, concurrency: usize) -> Self {
        Self {
            per_source_cap,
            concurrency: concurrency.max(1),
        }
    }

    /// A failing source is logged and recorded; it never aborts collection.
    pub async fn collect(&self, sources: &[Box<dyn ArticleSource>]) -> Collection {
        info!(sources = sources.len(), concurrency = self.concurrency, "Collecting articles");

        // Boxed up front so the stream holds no higher-ranked closure and the
        // collect future stays `Send` for spawned runs.
        let pulls: Vec<BoxFuture<'_, (Vec<Article>, SourceOutcome)>> = sources
            .iter()
            .map(|source| self.pull_one(source.as_ref()).boxed())
            .collect();
        let results: Vec<(Vec<Article>, SourceOutcome)> = stream::iter(pulls)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut collection = Collection::default();
        for (articles, outcome) in results {
            collection.articles.extend(articles);
            collection.outcomes.push(outcome);
        }

        info!(
            count = collection.articles.len(),
            failed = collection.failed_sources(),
            "Collected {} articles from {} sources",
            collection.articles.len(),
            collection.outcomes.len()
        );
        collection
    }

    async fn pull_one(&self, source: &dyn ArticleSource) -> (Vec<Article>, SourceOutcome) {
        let limit = source
            .max_articles()
            .map_or(self.per_source_cap, |cap| cap.min(self.per_source_cap));
        let started = Instant::now();

        let (articles, error) = match source.pull(limit).await {
            Ok(mut articles) => {
                articles.truncate(limit);
                (articles, None)
            }
            Err(e) => {
                warn!(source = %source.name(), error = %e, "Source failed, skipping");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let outcome = SourceOutcome {
            source: source.name().to_string(),
            fetched: articles.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            error,
        };
        (articles, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DigestError, Result};
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedSource {
        name: String,
        count: usize,
        cap: Option<usize>,
        fail: bool,
    }

    #[async_trait]
    impl ArticleSource for FixedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn max_articles(&self) -> Option<usize> {
            self.cap
        }

        // Ignores the limit on purpose.
        async fn pull(&self, _limit: usize) -> Result<Vec<Article>> {
            if self.fail {
                return Err(DigestError::HttpStatus { url: "http://down".into(), status: 503 });
            }
            Ok((0..self.count)
                .map(|i| Article {
                    title: format!("{} wheat story {}", self.name, i),
                    link: format!("https://{}.example.com/{}", self.name, i),
                    summary: String::new(),
                    source: self.name.clone(),
                    retrieved_at: Utc::now(),
                    published_at: None,
                })
                .collect())
        }
    }

    fn source(name: &str, count: usize, cap: Option<usize>, fail: bool) -> Box<dyn ArticleSource> {
        Box::new(FixedSource { name: name.into(), count, cap, fail })
    }

    #[tokio::test]
    async fn caps_each_source_and_keeps_registry_order() {
        let sources = vec![
            source("a", 12, None, false),
            source("b", 12, Some(3), false),
            source("c", 2, Some(50), false),
        ];
        let collection = ArticleCollector::new(5, 3).collect(&sources).await;

        let counts: Vec<usize> = collection.outcomes.iter().map(|o| o.fetched).collect();
        assert_eq!(counts, vec![5, 3, 2]);
        assert_eq!(collection.articles.len(), 10);
        assert_eq!(collection.articles[0].source, "a");
        assert_eq!(collection.articles[5].source, "b");
        assert_eq!(collection.articles[9].source, "c");
    }

    #[tokio::test]
    async fn failing_source_is_recorded_not_fatal() {
        let sources = vec![
            source("a", 2, None, false),
            source("down", 2, None, true),
            source("c", 2, None, false),
        ];
        let collection = ArticleCollector::new(10, 1).collect(&sources).await;

        assert_eq!(collection.articles.len(), 4);
        assert_eq!(collection.failed_sources(), 1);
        assert!(collection.outcomes[1].error.as_deref().unwrap().contains("503"));
    }
}
