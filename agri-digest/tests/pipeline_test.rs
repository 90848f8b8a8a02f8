use agri_digest::llm_adapter::MockLlmAdapter;
use agri_digest::pipeline::DeliveryOutcome;
use agri_digest::{
    AiRanker, Article, ArticleSource, DeliveryChannel, Digest, DigestConfig, DigestError,
    DigestPipeline, Language, RankRequest, RankedArticle, Ranker, Ranking, Result, Trigger,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 6, 0, 0).unwrap()
}

fn article(source: &str, i: usize) -> Article {
    Article {
        title: format!("Wheat exports from {source} rise, report {i}"),
        link: format!("https://{}.example.com/news/{i}", source.to_lowercase()),
        summary: format!("Grain traders in {source} expect higher wheat export volumes this season."),
        source: source.to_string(),
        retrieved_at: fixed_now(),
        published_at: None,
    }
}

/// Source that returns `count` articles, or an error when `count` is `None`.
struct StaticSource {
    name: String,
    count: Option<usize>,
    cap: Option<usize>,
}

impl StaticSource {
    fn ok(name: &str, count: usize) -> Box<dyn ArticleSource> {
        Box::new(Self { name: name.to_string(), count: Some(count), cap: None })
    }

    fn capped(name: &str, count: usize, cap: usize) -> Box<dyn ArticleSource> {
        Box::new(Self { name: name.to_string(), count: Some(count), cap: Some(cap) })
    }

    fn failing(name: &str) -> Box<dyn ArticleSource> {
        Box::new(Self { name: name.to_string(), count: None, cap: None })
    }
}

#[async_trait]
impl ArticleSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_articles(&self) -> Option<usize> {
        self.cap
    }

    async fn pull(&self, _limit: usize) -> Result<Vec<Article>> {
        // Ignores the limit so the collector's own cap is what gets tested.
        match self.count {
            Some(count) => Ok((1..=count).map(|i| article(&self.name, i)).collect()),
            None => Err(DigestError::HttpStatus {
                url: format!("https://{}.example.com", self.name),
                status: 503,
            }),
        }
    }
}

/// Ranks in reverse input order without truncating.
struct ReverseRanker;

#[async_trait]
impl Ranker for ReverseRanker {
    fn name(&self) -> &str {
        "reverse"
    }

    async fn rank(&self, articles: &[Article], request: &RankRequest) -> Result<Ranking> {
        let total = articles.len() as f64;
        let catch_all = request.categories.last().cloned().unwrap_or_default();
        let ranked = articles
            .iter()
            .rev()
            .enumerate()
            .map(|(i, a)| RankedArticle::new(a.clone(), 1.0 - i as f64 / total, catch_all.clone()))
            .collect();
        Ok(Ranking { articles: ranked, overview: None, ranker: "reverse".into() })
    }
}

#[derive(Default)]
struct RecordingChannel {
    fail: bool,
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, digest: &Digest) -> Result<()> {
        if self.fail {
            return Err(DigestError::Telegram("sendMessage: chat not found".into()));
        }
        self.delivered.lock().unwrap().push(digest.text.clone());
        Ok(())
    }
}

fn config() -> DigestConfig {
    DigestConfig {
        max_articles_per_source: 10,
        max_total_articles: 8,
        ..DigestConfig::default()
    }
}

#[tokio::test]
async fn failing_source_does_not_block_others() {
    init_tracing();
    let pipeline = DigestPipeline::builder(config(), Language::En)
        .add_source(StaticSource::failing("Broken"))
        .add_source(StaticSource::ok("Fastmarkets", 3))
        .build()
        .unwrap();

    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;

    assert_eq!(report.failed_sources(), 1);
    assert_eq!(report.collected, 3);
    assert_eq!(digest.articles.len(), 3);
    assert!(digest.articles.iter().all(|r| r.article.source == "Fastmarkets"));
    assert!(report.sources[0].error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn caps_are_applied_per_source_and_in_total() {
    init_tracing();
    let config = DigestConfig {
        max_articles_per_source: 4,
        max_total_articles: 6,
        ..DigestConfig::default()
    };
    let pipeline = DigestPipeline::builder(config, Language::En)
        .add_source(StaticSource::ok("Alpha", 9))
        .add_source(StaticSource::capped("Beta", 9, 2))
        .build()
        .unwrap();

    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;

    assert_eq!(report.sources[0].fetched, 4);
    assert_eq!(report.sources[1].fetched, 2);
    assert_eq!(report.collected, 6);
    assert!(digest.articles.len() <= 6);
}

#[tokio::test]
async fn total_cap_keeps_ranking_order() {
    init_tracing();
    let config = DigestConfig {
        max_articles_per_source: 5,
        max_total_articles: 10,
        ..DigestConfig::default()
    };
    let pipeline = DigestPipeline::builder(config, Language::En)
        .add_source(StaticSource::ok("Alpha", 5))
        .add_source(StaticSource::ok("Beta", 5))
        .add_source(StaticSource::ok("Gamma", 5))
        .ranker(Box::new(ReverseRanker))
        .build()
        .unwrap();

    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;

    assert_eq!(report.collected, 15);
    assert_eq!(report.ranker, "reverse");
    assert_eq!(digest.articles.len(), 10);
    assert_eq!(digest.dropped, 0);

    // Reverse of collection order: Gamma 5..1, Beta 5..1.
    let expected: Vec<String> = ["Gamma", "Beta"]
        .iter()
        .flat_map(|s| (1..=5).rev().map(move |i| article(s, i).link))
        .collect();
    let actual: Vec<String> = digest.articles.iter().map(|r| r.article.link.clone()).collect();
    assert_eq!(actual, expected);
    assert!(digest.text.contains("*1\\. Wheat exports from Gamma rise, report 5*"));
    assert!(digest.text.contains("*10\\. Wheat exports from Beta rise, report 1*"));
}

#[tokio::test]
async fn mocked_ai_output_is_deterministic() {
    init_tracing();
    let reply = r#"{"overview": "Wheat prices firm on export demand.",
        "articles": [
            {"index": 2, "score": 0.9, "category": "Grains & Oilseeds", "summary": "Exports up 12%."},
            {"index": 1, "score": 0.6, "category": "Market & Trade", "summary": "Traders see demand."}
        ]}"#;

    let build = || {
        DigestPipeline::builder(config(), Language::En)
            .add_source(StaticSource::ok("Fastmarkets", 2))
            .ranker(Box::new(AiRanker::new(Box::new(MockLlmAdapter::new(reply)), 40)))
            .build()
            .unwrap()
    };

    let (first, report) = build().generate_at(Trigger::Scheduled, fixed_now()).await;
    let (second, _) = build().generate_at(Trigger::Scheduled, fixed_now()).await;

    assert_eq!(first.text, second.text);
    assert_eq!(report.ranker, "mock");
    assert!(report.ranker_error.is_none());
    assert_eq!(first.categories, vec!["Grains & Oilseeds", "Market & Trade"]);
    assert!(first.text.starts_with("*🌾 Agriculture Market Digest* \\- October 06, 2025"));
    assert!(first.text.contains("Wheat prices firm on export demand\\."));
    assert!(first.text.contains("*1\\. Wheat exports from Fastmarkets rise, report 2*\nExports up 12%\\."));
}

#[tokio::test]
async fn ai_failure_falls_back_to_keywords() {
    init_tracing();
    let pipeline = DigestPipeline::builder(config(), Language::En)
        .add_source(StaticSource::ok("Fastmarkets", 3))
        .ranker(Box::new(AiRanker::new(
            Box::new(MockLlmAdapter::failing("upstream timeout")),
            40,
        )))
        .build()
        .unwrap();

    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;

    assert_eq!(report.ranker, "keyword");
    assert!(report.ranker_error.as_deref().unwrap().contains("upstream timeout"));
    assert_eq!(digest.articles.len(), 3);
}

#[tokio::test]
async fn command_and_schedule_produce_the_same_digest() {
    init_tracing();
    let pipeline = DigestPipeline::builder(config(), Language::Ru)
        .add_source(StaticSource::ok("APK-Inform", 4))
        .add_source(StaticSource::ok("Margin", 2))
        .build()
        .unwrap();
    let channel = RecordingChannel::default();

    let scheduled = pipeline.run_and_deliver(Trigger::Scheduled, &channel).await.unwrap();
    let command = pipeline.run_and_deliver(Trigger::Command, &channel).await.unwrap();

    let delivered = channel.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], delivered[1]);
    assert_eq!(scheduled.formatted, command.formatted);
    assert_eq!(pipeline.last_report().await.unwrap().trigger, Trigger::Command);
}

#[tokio::test]
async fn message_fits_size_limit() {
    init_tracing();
    let config = DigestConfig {
        max_total_articles: 10,
        max_message_chars: 1200,
        ..DigestConfig::default()
    };
    let pipeline = DigestPipeline::builder(config, Language::En)
        .add_source(StaticSource::ok("Alpha", 5))
        .add_source(StaticSource::ok("Beta", 5))
        .build()
        .unwrap();

    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;

    assert!(digest.char_count() <= 1200);
    assert!(digest.dropped > 0);
    assert_eq!(report.dropped_for_size, digest.dropped);
    assert_eq!(digest.articles.len() + digest.dropped, 10);
}

#[tokio::test]
async fn empty_and_irrelevant_runs_render_notices() {
    init_tracing();
    let pipeline = DigestPipeline::builder(config(), Language::En)
        .add_source(StaticSource::failing("Broken"))
        .build()
        .unwrap();
    let (digest, _) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;
    assert!(digest.is_empty());
    assert!(digest.text.contains("No articles found from any sources today\\."));

    struct OffTopic;

    #[async_trait]
    impl ArticleSource for OffTopic {
        fn name(&self) -> &str {
            "Sports"
        }

        async fn pull(&self, _limit: usize) -> Result<Vec<Article>> {
            let mut a = article("Sports", 1);
            a.title = "Local team wins the cup final".into();
            a.summary = "A dramatic evening at the stadium.".into();
            Ok(vec![a])
        }
    }

    let pipeline = DigestPipeline::builder(config(), Language::En)
        .add_source(Box::new(OffTopic))
        .build()
        .unwrap();
    let (digest, report) = pipeline.generate_at(Trigger::Cli, fixed_now()).await;
    assert_eq!(report.collected, 1);
    assert_eq!(report.relevant, 0);
    assert!(digest.text.contains("No agriculture\\-related articles found today\\."));
}

#[tokio::test]
async fn delivery_failure_is_recorded() {
    init_tracing();
    let pipeline = DigestPipeline::builder(config(), Language::En)
        .add_source(StaticSource::ok("Fastmarkets", 2))
        .build()
        .unwrap();
    let channel = RecordingChannel { fail: true, ..Default::default() };

    let err = pipeline.run_and_deliver(Trigger::Scheduled, &channel).await.unwrap_err();
    assert!(err.to_string().contains("chat not found"));

    let report = pipeline.last_report().await.unwrap();
    assert!(matches!(report.delivery, Some(DeliveryOutcome::Failed { .. })));
    assert_eq!(report.formatted, 2);
}

#[tokio::test]
async fn runs_on_a_spawned_task() {
    init_tracing();
    let pipeline = Arc::new(
        DigestPipeline::builder(config(), Language::En)
            .add_source(StaticSource::ok("Fastmarkets", 2))
            .add_source(StaticSource::failing("Broken"))
            .add_source(StaticSource::ok("Eldala", 1))
            .fetch_concurrency(2)
            .build()
            .unwrap(),
    );
    let channel = Arc::new(RecordingChannel::default());

    let report = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let channel = Arc::clone(&channel);
        async move { pipeline.run_and_deliver(Trigger::Scheduled, channel.as_ref()).await }
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.collected, 3);
    assert_eq!(report.failed_sources(), 1);
    assert!(matches!(report.delivery, Some(DeliveryOutcome::Delivered { .. })));
    assert_eq!(channel.delivered.lock().unwrap().len(), 1);
}

#[test]
fn invalid_timezone_fails_build() {
    let config = DigestConfig { timezone: "Mars/Olympus".into(), ..DigestConfig::default() };
    assert!(DigestPipeline::builder(config, Language::En).build().is_err());
}
