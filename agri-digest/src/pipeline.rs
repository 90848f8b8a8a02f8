use crate::aggregator::{ArticleCollector, SourceOutcome};
use crate::config::DigestConfig;
use crate::digest::{Digest, DigestFormatter, EmptyReason};
use crate::locale::Language;
use crate::relevance::{dedupe_links, filter_relevant, KeywordRanker};
use crate::scheduler::parse_offset;
use crate::traits::{ArticleSource, DeliveryChannel, RankRequest, Ranker};
use crate::types::{Article, Ranking, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    Command,
    Cli,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::Command => write!(f, "command"),
            Trigger::Cli => write!(f, "cli"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered { channel: String },
    Failed { channel: String, error: String },
}

/// Summary of one run, kept in memory until the next run replaces it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub collected: usize,
    pub relevant: usize,
    pub formatted: usize,
    pub dropped_for_size: usize,
    pub ranker: String,
    /// Set when the AI ranker failed and the keyword ranker took over.
    pub ranker_error: Option<String>,
    pub delivery: Option<DeliveryOutcome>,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| !s.succeeded()).count()
    }
}

/// Collect → filter → rank → format, optionally followed by delivery.
///
/// Scheduled runs and bot commands go through the same methods; a run lock
/// keeps them from overlapping.
pub struct DigestPipeline {
    sources: Vec<Box<dyn ArticleSource>>,
    collector: ArticleCollector,
    ranker: Option<Box<dyn Ranker>>,
    fallback: KeywordRanker,
    formatter: DigestFormatter,
    language: Language,
    categories: Vec<String>,
    max_total_articles: usize,
    summary_length: usize,
    filter_irrelevant: bool,
    offset: FixedOffset,
    run_lock: Mutex<()>,
    last_report: RwLock<Option<RunReport>>,
}

pub struct PipelineBuilder {
    config: DigestConfig,
    language: Language,
    concurrency: usize,
    sources: Vec<Box<dyn ArticleSource>>,
    ranker: Option<Box<dyn Ranker>>,
}

impl PipelineBuilder {
    pub fn new(config: DigestConfig, language: Language) -> Self {
        Self {
            config,
            language,
            concurrency: 1,
            sources: Vec::new(),
            ranker: None,
        }
    }

    pub fn fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Add a new content source to the pipeline
    pub fn add_source(mut self, source: Box<dyn ArticleSource>) -> Self {
        info!(source = %source.name(), "Adding source to pipeline");
        self.sources.push(source);
        self
    }

    pub fn sources(mut self, sources: Vec<Box<dyn ArticleSource>>) -> Self {
        for source in sources {
            self = self.add_source(source);
        }
        self
    }

    /// Primary ranker; the keyword ranker is used when this is unset or fails.
    pub fn ranker(mut self, ranker: Box<dyn Ranker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn build(self) -> Result<DigestPipeline> {
        let offset = parse_offset(&self.config.timezone)?;
        let categories = self
            .config
            .categories
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.language.default_categories());

        Ok(DigestPipeline {
            collector: ArticleCollector::new(self.config.max_articles_per_source, self.concurrency),
            formatter: DigestFormatter::new(self.language, &self.config),
            sources: self.sources,
            ranker: self.ranker,
            fallback: KeywordRanker::new(),
            language: self.language,
            categories,
            max_total_articles: self.config.max_total_articles,
            summary_length: self.config.summary_length,
            filter_irrelevant: self.config.filter_irrelevant,
            offset,
            run_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        })
    }
}

impl DigestPipeline {
    pub fn builder(config: DigestConfig, language: Language) -> PipelineBuilder {
        PipelineBuilder::new(config, language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    pub async fn generate(&self, trigger: Trigger) -> (Digest, RunReport) {
        self.generate_at(trigger, Utc::now()).await
    }

    /// Runs the pipeline with `now` fixing the digest date.
    pub async fn generate_at(&self, trigger: Trigger, now: DateTime<Utc>) -> (Digest, RunReport) {
        let _guard = self.run_lock.lock().await;
        let (digest, report) = self.run_stages(trigger, now).await;
        *self.last_report.write().await = Some(report.clone());
        (digest, report)
    }

    /// Generates a digest and hands it to `channel`. A delivery failure is
    /// recorded in the report and returned; it is not retried.
    pub async fn run_and_deliver(
        &self,
        trigger: Trigger,
        channel: &dyn DeliveryChannel,
    ) -> Result<RunReport> {
        let _guard = self.run_lock.lock().await;
        let (digest, mut report) = self.run_stages(trigger, Utc::now()).await;

        let result = channel.deliver(&digest).await;
        report.delivery = Some(match &result {
            Ok(()) => DeliveryOutcome::Delivered { channel: channel.name().to_string() },
            Err(e) => {
                error!(run_id = %report.run_id, channel = %channel.name(), error = %e, "Digest delivery failed");
                DeliveryOutcome::Failed {
                    channel: channel.name().to_string(),
                    error: e.to_string(),
                }
            }
        });
        *self.last_report.write().await = Some(report.clone());

        result.map(|()| report)
    }

    async fn run_stages(&self, trigger: Trigger, now: DateTime<Utc>) -> (Digest, RunReport) {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let date = now.with_timezone(&self.offset).date_naive();
        info!(run_id = %run_id, trigger = %trigger, "Starting digest run");

        let collection = self.collector.collect(&self.sources).await;
        let collected = collection.articles.len();
        let articles = dedupe_links(collection.articles);

        let mut report = RunReport {
            run_id,
            trigger,
            started_at,
            finished_at: started_at,
            sources: collection.outcomes,
            collected,
            relevant: 0,
            formatted: 0,
            dropped_for_size: 0,
            ranker: String::new(),
            ranker_error: None,
            delivery: None,
        };

        if articles.is_empty() {
            warn!(run_id = %run_id, "No articles retrieved from any source");
            report.finished_at = Utc::now();
            return (self.formatter.render_empty(EmptyReason::NoArticles, date), report);
        }

        let relevant = if self.filter_irrelevant {
            filter_relevant(articles, self.language)
        } else {
            articles
        };
        report.relevant = relevant.len();

        if relevant.is_empty() {
            warn!(run_id = %run_id, collected, "No relevant articles after filtering");
            report.finished_at = Utc::now();
            return (self.formatter.render_empty(EmptyReason::NoRelevant, date), report);
        }

        let mut ranking = self.rank(&relevant, &mut report).await;
        ranking.articles.truncate(self.max_total_articles);

        let digest = self.formatter.render(&ranking, date);
        report.formatted = digest.articles.len();
        report.dropped_for_size = digest.dropped;
        report.finished_at = Utc::now();

        info!(
            run_id = %run_id,
            collected,
            relevant = report.relevant,
            formatted = report.formatted,
            ranker = %report.ranker,
            chars = digest.char_count(),
            "Digest generated"
        );
        (digest, report)
    }

    async fn rank(&self, articles: &[Article], report: &mut RunReport) -> Ranking {
        let request = RankRequest {
            language: self.language,
            max_articles: self.max_total_articles,
            categories: self.categories.clone(),
            summary_length: self.summary_length,
        };

        if let Some(ranker) = &self.ranker {
            match ranker.rank(articles, &request).await {
                Ok(ranking) => {
                    report.ranker = ranking.ranker.clone();
                    return ranking;
                }
                Err(e) => {
                    warn!(run_id = %report.run_id, ranker = %ranker.name(), error = %e, "Ranker failed, falling back to keyword ranking");
                    report.ranker_error = Some(e.to_string());
                }
            }
        }

        report.ranker = self.fallback.name().to_string();
        match self.fallback.rank(articles, &request).await {
            Ok(ranking) => ranking,
            Err(e) => {
                error!(run_id = %report.run_id, error = %e, "Keyword ranking failed");
                Ranking {
                    articles: Vec::new(),
                    overview: None,
                    ranker: self.fallback.name().to_string(),
                }
            }
        }
    }
}
