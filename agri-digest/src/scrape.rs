//! Selector-driven extraction of article listings from HTML pages.
//!
//! All functions here are synchronous: `scraper::Html` is not `Send`, so a
//! parsed document must never be held across an `.await`.

use crate::types::{DigestError, ExtractionRules, Result};
use crate::utils::text::{normalize_whitespace, shorten};
use crate::utils::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Link text shorter than this is replaced by a nearby heading.
const MIN_LINK_TITLE_CHARS: usize = 10;
/// Candidates with titles of this length or shorter are dropped.
const MIN_TITLE_CHARS: usize = 5;
const MIN_SUMMARY_CHARS: usize = 20;
const MAX_ANCESTOR_DEPTH: usize = 5;

const EXCERPT_PARAGRAPHS: usize = 3;
const MAX_EXCERPT_CHARS: usize = 500;
const MIN_FALLBACK_BODY_CHARS: usize = 50;

const BODY_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".content",
    ".article-body",
    ".story-body",
    "main",
];

/// One article candidate found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCandidate {
    pub title: String,
    pub link: String,
    pub summary: String,
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| DigestError::Selector(format!("{raw}: {e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// First `selector` match longer than `min_chars` inside the nearest
/// ancestors of `element`, closest ancestor first.
fn find_near(element: ElementRef<'_>, selector: &Selector, min_chars: usize) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_ANCESTOR_DEPTH)
        .find_map(|ancestor| {
            ancestor
                .select(selector)
                .map(element_text)
                .find(|text| text.chars().count() > min_chars)
        })
}

/// Extracts up to `limit` unique article candidates from a listing page.
pub fn extract_listing(
    html: &str,
    base_url: &Url,
    rules: &ExtractionRules,
    limit: usize,
) -> Result<Vec<ListingCandidate>> {
    let link_selector = parse_selector(&rules.link)?;
    let title_selector = parse_selector(&rules.title)?;
    let summary_selector = parse_selector(&rules.summary)?;

    let document = Html::parse_document(html);
    let mut seen_links = HashSet::new();
    let mut seen_titles = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(&link_selector) {
        if candidates.len() >= limit {
            break;
        }

        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(base_url, href))
        else {
            continue;
        };
        if seen_links.contains(link.as_str()) {
            continue;
        }

        let mut title = element_text(element);
        if title.chars().count() < MIN_LINK_TITLE_CHARS {
            if let Some(nearby) = find_near(element, &title_selector, MIN_TITLE_CHARS) {
                title = nearby;
            }
        }
        // A short link with no heading of its own can pick up a neighbour's.
        if title.chars().count() <= MIN_TITLE_CHARS || seen_titles.contains(&title) {
            continue;
        }

        let summary = find_near(element, &summary_selector, MIN_SUMMARY_CHARS)
            .filter(|summary| *summary != title)
            .unwrap_or_default();

        seen_links.insert(link.to_string());
        seen_titles.insert(title.clone());
        candidates.push(ListingCandidate {
            title,
            link: link.to_string(),
            summary,
        });
    }

    Ok(candidates)
}

/// Builds a short excerpt from an article page: the first few substantial
/// paragraphs of the main content block.
pub fn extract_body_excerpt(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraph) = Selector::parse("p") else {
        return String::new();
    };

    let mut excerpt = String::new();
    for raw in BODY_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let Some(block) = document.select(&selector).next() else {
            continue;
        };

        let paragraphs: Vec<String> = block
            .select(&paragraph)
            .map(element_text)
            .filter(|p| p.chars().count() > MIN_SUMMARY_CHARS)
            .take(EXCERPT_PARAGRAPHS)
            .collect();

        if !paragraphs.is_empty() {
            excerpt = paragraphs.join(" ");
            break;
        }

        let text = element_text(block);
        if text.chars().count() > MIN_FALLBACK_BODY_CHARS {
            excerpt = text;
            break;
        }
    }

    shorten(&excerpt, MAX_EXCERPT_CHARS)
}
