//! Keyword based relevance filtering and the local fallback ranker.

use crate::locale::Language;
use crate::traits::{RankRequest, Ranker};
use crate::types::{Article, RankedArticle, Ranking, Result};
use crate::utils::text::contains_keyword;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

pub const KEYWORD_RANKER: &str = "keyword";

/// Source name fragments and the bonus they earn.
const SOURCE_CREDIBILITY: &[(&str, u32)] = &[
    ("fastmarkets", 3),
    ("apk", 2),
    ("margin", 2),
    ("usda", 2),
    ("reuters", 1),
    ("bloomberg", 1),
];

const LONG_SUMMARY_CHARS: usize = 100;

fn count_keywords(text: &str, keywords: &[&str]) -> usize {
    let lower = text.to_lowercase();
    keywords.iter().filter(|kw| contains_keyword(&lower, kw)).count()
}

/// An article is relevant when its title has a keyword or title and summary
/// together have at least two.
pub fn is_agriculture_related(article: &Article, language: Language) -> bool {
    let keywords = language.relevance_keywords();
    if count_keywords(&article.title, keywords) >= 1 {
        return true;
    }
    let combined = format!("{} {}", article.title, article.summary);
    count_keywords(&combined, keywords) >= 2
}

/// Drops articles whose link already appeared, keeping the first.
pub fn dedupe_links(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(article.link.clone()))
        .collect()
}

pub fn filter_relevant(articles: Vec<Article>, language: Language) -> Vec<Article> {
    let total = articles.len();
    let relevant: Vec<Article> = articles
        .into_iter()
        .filter(|article| is_agriculture_related(article, language))
        .collect();
    debug!(total, relevant = relevant.len(), "Filtered relevant articles");
    relevant
}

/// Deterministic ranker used when the AI ranker is disabled or fails.
#[derive(Debug, Clone, Default)]
pub struct KeywordRanker;

impl KeywordRanker {
    pub fn new() -> Self {
        Self
    }

    pub fn raw_score(&self, article: &Article, language: Language) -> u32 {
        let keywords = language.relevance_keywords();
        let mut score = count_keywords(&article.title, keywords) as u32 * 3;
        score += count_keywords(&article.summary, keywords) as u32 * 2;

        if article.summary.chars().count() > LONG_SUMMARY_CHARS {
            score += 1;
        }

        let source = article.source.to_lowercase();
        if let Some((_, bonus)) = SOURCE_CREDIBILITY.iter().find(|(name, _)| source.contains(name)) {
            score += bonus;
        }
        score
    }

    /// First category whose keyword list matches, else the catch-all.
    pub fn categorize(&self, article: &Article, request: &RankRequest) -> String {
        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        let catch_all = request
            .categories
            .last()
            .cloned()
            .unwrap_or_else(|| "Other".to_string());

        // Keyword lists only line up with the localized default labels.
        if request.categories != request.language.default_categories() {
            return catch_all;
        }

        request
            .language
            .category_keywords()
            .iter()
            .zip(&request.categories)
            .find(|(keywords, _)| keywords.iter().any(|kw| contains_keyword(&text, kw)))
            .map(|(_, label)| label.clone())
            .unwrap_or(catch_all)
    }
}

#[async_trait]
impl Ranker for KeywordRanker {
    fn name(&self) -> &str {
        KEYWORD_RANKER
    }

    async fn rank(&self, articles: &[Article], request: &RankRequest) -> Result<Ranking> {
        let mut scored: Vec<(u32, &Article)> = articles
            .iter()
            .map(|article| (self.raw_score(article, request.language), article))
            .collect();
        // Stable: equal scores keep input order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(request.max_articles);

        let ranked = scored
            .into_iter()
            .map(|(raw, article)| {
                let score = raw as f64 / (raw as f64 + 5.0);
                RankedArticle::new(article.clone(), score, self.categorize(article, request))
            })
            .collect();

        Ok(Ranking {
            articles: ranked,
            overview: None,
            ranker: KEYWORD_RANKER.to_string(),
        })
    }
}
