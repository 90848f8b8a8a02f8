//! Rendering of a ranking into a single Telegram MarkdownV2 message.

use crate::config::DigestConfig;
use crate::locale::Language;
use crate::types::{RankedArticle, Ranking};
use crate::utils::text::{shorten, smart_truncate};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

const MAX_TITLE_CHARS: usize = 80;
/// Upper bound for the ranker overview, further capped at a quarter of the
/// message limit so articles always have room.
const MAX_OVERVIEW_CHARS: usize = 600;
const CATEGORY_MARK: &str = "🏷";
const LINK_MARK: &str = "🔗";
const COUNT_MARK: &str = "📊";

/// Escapes special characters for Telegram MarkdownV2 parse mode.
pub fn escape_markdown_v2(text: &str) -> String {
    const SPECIAL: [char; 19] = [
        '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}',
        '.', '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Escapes the URL part of an inline link, where only `)` and `\` are special.
pub fn escape_link_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

/// A rendered digest message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub text: String,
    pub date: NaiveDate,
    /// Categories in display order.
    pub categories: Vec<String>,
    /// Articles in display order.
    pub articles: Vec<RankedArticle>,
    /// Ranked articles left out to respect the message size limit.
    pub dropped: usize,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Nothing was retrieved from any source.
    NoArticles,
    /// Articles were retrieved but none passed the relevance filter.
    NoRelevant,
}

#[derive(Debug, Clone)]
pub struct DigestFormatter {
    language: Language,
    summary_length: usize,
    include_links: bool,
    max_chars: usize,
}

impl DigestFormatter {
    pub fn new(language: Language, config: &DigestConfig) -> Self {
        Self {
            language,
            summary_length: config.summary_length,
            include_links: config.include_source_links,
            max_chars: config.max_message_chars,
        }
    }

    /// Renders `ranking` for `date`. Lowest ranked articles are dropped until
    /// the message fits in the size limit.
    pub fn render(&self, ranking: &Ranking, date: NaiveDate) -> Digest {
        if ranking.articles.is_empty() {
            return self.render_empty(EmptyReason::NoRelevant, date);
        }

        let overview = ranking
            .overview
            .as_deref()
            .map(|o| smart_truncate(o.trim(), MAX_OVERVIEW_CHARS.min(self.max_chars / 4)));
        let overview = overview.as_deref();
        let mut kept = ranking.articles.len();
        loop {
            let (text, categories, articles) = self.compose(&ranking.articles[..kept], overview, date);
            if text.chars().count() <= self.max_chars || kept == 0 {
                let text = self.fit(text);
                let dropped = ranking.articles.len() - kept;
                if dropped > 0 {
                    debug!(dropped, "Dropped articles to fit message size");
                }
                return Digest { text, date, categories, articles, dropped };
            }
            kept -= 1;
        }
    }

    pub fn render_empty(&self, reason: EmptyReason, date: NaiveDate) -> Digest {
        let strings = self.language.strings();
        let message = match reason {
            EmptyReason::NoArticles => strings.no_articles,
            EmptyReason::NoRelevant => strings.no_relevant_articles,
        };
        let text = format!("{}\n\n{}", self.header_line(date), escape_markdown_v2(message));
        Digest {
            text: self.fit(text),
            date,
            categories: Vec::new(),
            articles: Vec::new(),
            dropped: 0,
        }
    }

    fn header_line(&self, date: NaiveDate) -> String {
        let strings = self.language.strings();
        format!(
            "*{}* \\- {}",
            escape_markdown_v2(strings.digest_title),
            escape_markdown_v2(&date.format(strings.date_format).to_string())
        )
    }

    fn compose(
        &self,
        ranked: &[RankedArticle],
        overview: Option<&str>,
        date: NaiveDate,
    ) -> (String, Vec<String>, Vec<RankedArticle>) {
        let strings = self.language.strings();

        // Categories ordered by their best-ranked article.
        let mut groups: Vec<(&str, Vec<&RankedArticle>)> = Vec::new();
        for item in ranked {
            match groups.iter_mut().find(|(category, _)| *category == item.category) {
                Some((_, members)) => members.push(item),
                None => groups.push((item.category.as_str(), vec![item])),
            }
        }

        let sources: HashSet<&str> = ranked.iter().map(|r| r.article.source.as_str()).collect();

        let mut out = String::new();
        out.push_str(&self.header_line(date));
        out.push_str("\n\n");
        out.push_str(&format!(
            "{} *{}*\n\n",
            COUNT_MARK,
            escape_markdown_v2(&self.language.count_line(ranked.len(), sources.len()))
        ));

        if let Some(overview) = overview.filter(|o| !o.trim().is_empty()) {
            out.push_str(&format!(
                "*{}*\n{}\n\n",
                escape_markdown_v2(strings.overview_heading),
                escape_markdown_v2(overview.trim())
            ));
        }

        let mut number = 0;
        let mut displayed = Vec::with_capacity(ranked.len());
        for (category, members) in &groups {
            out.push_str(&format!("{} *{}*\n\n", CATEGORY_MARK, escape_markdown_v2(category)));
            for item in members {
                number += 1;
                self.push_article(&mut out, number, item);
                displayed.push((*item).clone());
            }
        }

        out.push_str("\\-\\-\\-\n");
        out.push_str(&escape_markdown_v2(strings.footer_generated));
        out.push('\n');
        out.push_str(&escape_markdown_v2(strings.footer_updated));

        let categories = groups.iter().map(|(c, _)| c.to_string()).collect();
        (out, categories, displayed)
    }

    fn push_article(&self, out: &mut String, number: usize, item: &RankedArticle) {
        let strings = self.language.strings();
        let article = &item.article;

        let title = shorten(&article.title, MAX_TITLE_CHARS);
        out.push_str(&format!("*{}\\. {}*\n", number, escape_markdown_v2(&title)));

        let summary = item
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(article.summary.as_str())
            .trim();
        if !summary.is_empty() {
            let summary = smart_truncate(summary, self.summary_length);
            out.push_str(&escape_markdown_v2(&summary));
            out.push('\n');
        }

        out.push_str(&format!(
            "{}: {}\n",
            escape_markdown_v2(strings.source_label),
            escape_markdown_v2(&article.source)
        ));

        if self.include_links && !article.link.is_empty() {
            out.push_str(&format!(
                "{} [{}]({})\n",
                LINK_MARK,
                escape_markdown_v2(strings.read_more),
                escape_link_url(&article.link)
            ));
        }
        out.push('\n');
    }

    /// Last resort for an oversized header: cut on the last line break that
    /// fits, or close off the open entity when there is none.
    fn fit(&self, text: String) -> String {
        if text.chars().count() <= self.max_chars {
            return text;
        }
        let cut: String = text.chars().take(self.max_chars).collect();
        // Entities never span lines.
        match cut.rfind('\n') {
            Some(end) if end > 0 => cut[..end].trim_end().to_string(),
            _ => close_entities(&cut),
        }
    }
}

/// Trims a single MarkdownV2 line back to a prefix without an unclosed bold
/// span, link or trailing escape.
fn close_entities(text: &str) -> String {
    let mut stars = Vec::new();
    let mut open_link = None;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '*' => stars.push(i),
            '[' => open_link = Some(i),
            ')' => open_link = None,
            _ => {}
        }
    }

    let mut end = text.len();
    if escaped {
        end -= 1;
    }
    if let Some(start) = open_link {
        end = end.min(start);
    }
    let mut out = text[..end].to_string();

    let open: Vec<usize> = stars.into_iter().filter(|&i| i < end).collect();
    if open.len() % 2 == 1 {
        let last = open[open.len() - 1];
        // A cut inside the leading bold span keeps its text unformatted.
        if out[..last].trim().is_empty() {
            out.remove(last);
        } else {
            out.truncate(last);
        }
    }
    out.trim_end().to_string()
}
