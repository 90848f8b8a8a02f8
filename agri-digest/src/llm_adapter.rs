use crate::locale::Language;
use crate::traits::{RankRequest, Ranker};
use crate::types::{Article, DigestError, RankedArticle, Ranking, Result};
use crate::utils::text::shorten;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of each article summary sent to the model.
const INPUT_SUMMARY_CHARS: usize = 300;
const REQUEST_TIMEOUT_SECS: u64 = 90;

/// Trait for chat-style LLM backends
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Send one system + user exchange and return the reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.2,
            max_tokens: 2000,
        })
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        "openai".to_string()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
        });

        debug!(model = %self.model, "OpenAI request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::Ranker(format!(
                "OpenAI API returned {}: {}",
                status,
                shorten(&body, 300)
            )));
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DigestError::Ranker("missing choices[0].message.content".into()))?
            .to_string();

        Ok(content)
    }
}

/// Canned-response adapter for development and testing
pub struct MockLlmAdapter {
    response: std::result::Result<String, String>,
}

impl MockLlmAdapter {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: Ok(response.into()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()) }
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        self.response.clone().map_err(DigestError::Ranker)
    }
}

/// Ranker that delegates scoring, categorization and summaries to an LLM.
pub struct AiRanker {
    adapter: Box<dyn LlmAdapter>,
    name: String,
    max_input_articles: usize,
}

impl AiRanker {
    pub fn new(adapter: Box<dyn LlmAdapter>, max_input_articles: usize) -> Self {
        let name = adapter.adapter_name();
        Self {
            adapter,
            name,
            max_input_articles: max_input_articles.max(1),
        }
    }
}

#[async_trait]
impl Ranker for AiRanker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rank(&self, articles: &[Article], request: &RankRequest) -> Result<Ranking> {
        let input = &articles[..articles.len().min(self.max_input_articles)];
        if input.is_empty() {
            return Ok(Ranking {
                articles: Vec::new(),
                overview: None,
                ranker: self.name.clone(),
            });
        }

        let system = system_prompt(request);
        let user = user_prompt(input);
        info!(ranker = %self.name, count = input.len(), "Requesting AI ranking");

        let reply = self.adapter.complete(&system, &user).await?;
        let ranking = parse_ranking(&reply, input, request, &self.name)?;

        info!(ranker = %self.name, count = ranking.articles.len(), "AI ranking complete");
        Ok(ranking)
    }
}

fn system_prompt(request: &RankRequest) -> String {
    let categories = request.categories.join("; ");
    match request.language {
        Language::Ru => format!(
            "Ты аналитик сельскохозяйственного рынка Казахстана и СНГ. \
             Оцени значимость каждой новости для участников рынка от 0 до 1, \
             отнеси её к одной категории из списка: {categories}. \
             Для каждой новости напиши краткое описание на русском языке \
             (не длиннее {len} символов). Выбери не более {max} самых важных новостей. \
             Напиши общий обзор дня в 2-3 предложениях. \
             Ответь только JSON вида \
             {{\"overview\": \"...\", \"articles\": [{{\"index\": 1, \"score\": 0.9, \"category\": \"...\", \"summary\": \"...\"}}]}}.",
            len = request.summary_length,
            max = request.max_articles,
        ),
        Language::En => format!(
            "You are an agriculture market analyst. \
             Score each news item's relevance for market participants from 0 to 1 \
             and assign exactly one category from this list: {categories}. \
             Write a short English summary for each item (at most {len} characters). \
             Select at most {max} of the most important items. \
             Write a 2-3 sentence overview of the day. \
             Reply with JSON only, shaped as \
             {{\"overview\": \"...\", \"articles\": [{{\"index\": 1, \"score\": 0.9, \"category\": \"...\", \"summary\": \"...\"}}]}}.",
            len = request.summary_length,
            max = request.max_articles,
        ),
    }
}

fn user_prompt(articles: &[Article]) -> String {
    let mut prompt = String::new();
    for (i, article) in articles.iter().enumerate() {
        let _ = writeln!(prompt, "{}. [{}] {}", i + 1, article.source, article.title);
        if !article.summary.is_empty() {
            let _ = writeln!(prompt, "   {}", shorten(&article.summary, INPUT_SUMMARY_CHARS));
        }
    }
    prompt
}

#[derive(Debug, Deserialize)]
struct AiReply {
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    articles: Vec<AiArticle>,
}

#[derive(Debug, Deserialize)]
struct AiArticle {
    index: usize,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

/// The JSON object inside `raw`, tolerating code fences and chatter.
fn json_body(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Turns a model reply into a ranking over `articles` (1-based indices).
///
/// Unknown and repeated indices are skipped, scores are clamped to
/// `0.0..=1.0`, unknown categories map to the catch-all, and the result is
/// stably sorted by score and cut to `request.max_articles`.
pub fn parse_ranking(
    raw: &str,
    articles: &[Article],
    request: &RankRequest,
    ranker: &str,
) -> Result<Ranking> {
    let body = json_body(raw)
        .ok_or_else(|| DigestError::Ranker("reply contains no JSON object".into()))?;
    let reply: AiReply = serde_json::from_str(body)?;

    let catch_all = request.categories.last().cloned().unwrap_or_default();
    let mut seen = HashSet::new();
    let mut ranked = Vec::new();

    for item in reply.articles {
        let Some(article) = item.index.checked_sub(1).and_then(|i| articles.get(i)) else {
            warn!(index = item.index, "AI returned unknown article index");
            continue;
        };
        if !seen.insert(item.index) {
            continue;
        }

        let score = if item.score.is_finite() { item.score.clamp(0.0, 1.0) } else { 0.0 };
        let category = item
            .category
            .and_then(|c| {
                let wanted = c.trim().to_lowercase();
                request
                    .categories
                    .iter()
                    .find(|known| known.to_lowercase() == wanted)
                    .cloned()
            })
            .unwrap_or_else(|| catch_all.clone());

        let mut entry = RankedArticle::new(article.clone(), score, category);
        if let Some(summary) = item.summary {
            entry = entry.with_summary(summary.trim());
        }
        ranked.push(entry);
    }

    if ranked.is_empty() {
        return Err(DigestError::Ranker("reply ranked no known articles".into()));
    }

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(request.max_articles);

    Ok(Ranking {
        articles: ranked,
        overview: reply
            .overview
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty()),
        ranker: ranker.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn articles(n: usize) -> Vec<Article> {
        (1..=n)
            .map(|i| Article {
                title: format!("Wheat story {i}"),
                link: format!("https://news.example.com/{i}"),
                summary: format!("Summary {i}"),
                source: "Grain Wire".into(),
                retrieved_at: Utc::now(),
                published_at: None,
            })
            .collect()
    }

    fn request(max_articles: usize) -> RankRequest {
        RankRequest {
            language: Language::En,
            max_articles,
            categories: Language::En.default_categories(),
            summary_length: 200,
        }
    }

    #[test]
    fn parses_fenced_reply_and_sorts_stably() {
        let raw = r#"```json
{"overview": "Grain prices firm.",
 "articles": [
   {"index": 2, "score": 0.5, "category": "market & trade", "summary": "Two"},
   {"index": 1, "score": 0.9, "category": "Grains & Oilseeds", "summary": "One"},
   {"index": 3, "score": 0.5, "category": "Space", "summary": ""},
   {"index": 1, "score": 0.1},
   {"index": 9, "score": 1.0}
 ]}
```"#;
        let ranking = parse_ranking(raw, &articles(3), &request(10), "openai").unwrap();

        let links: Vec<&str> = ranking.articles.iter().map(|r| r.article.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://news.example.com/1",
                "https://news.example.com/2",
                "https://news.example.com/3"
            ]
        );
        assert_eq!(ranking.articles[1].category, "Market & Trade");
        assert_eq!(ranking.articles[2].category, "Other");
        assert_eq!(ranking.articles[2].summary, None);
        assert_eq!(ranking.overview.as_deref(), Some("Grain prices firm."));
    }

    #[test]
    fn truncates_to_total_cap_and_clamps_scores() {
        let raw = r#"{"articles": [
            {"index": 1, "score": 3.0}, {"index": 2, "score": -1}, {"index": 3, "score": 0.4}
        ]}"#;
        let ranking = parse_ranking(raw, &articles(3), &request(2), "openai").unwrap();
        assert_eq!(ranking.articles.len(), 2);
        assert_eq!(ranking.articles[0].score, 1.0);
        assert_eq!(ranking.articles[1].score, 0.4);
    }

    #[test]
    fn rejects_replies_without_usable_articles() {
        assert!(parse_ranking("no json here", &articles(2), &request(5), "openai").is_err());
        assert!(parse_ranking(r#"{"articles": []}"#, &articles(2), &request(5), "openai").is_err());
    }

    #[tokio::test]
    async fn ranker_caps_model_input() {
        let ranker = AiRanker::new(
            Box::new(MockLlmAdapter::new(r#"{"articles": [{"index": 5, "score": 0.8}]}"#)),
            3,
        );
        // Index 5 lies beyond the three articles sent to the model.
        let result = ranker.rank(&articles(6), &request(5)).await;
        assert!(matches!(result, Err(DigestError::Ranker(_))));
    }

    #[test]
    fn user_prompt_numbers_articles() {
        let prompt = user_prompt(&articles(2));
        assert!(prompt.starts_with("1. [Grain Wire] Wheat story 1\n   Summary 1\n2. "));
    }
}
