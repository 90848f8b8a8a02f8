/// Text processing utilities
pub mod text {
    use scraper::Html;

    /// Truncate text to at most `max_chars` characters, trying to break at a
    /// sentence end and then at a word boundary.
    pub fn smart_truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }

        // Room for the ellipsis.
        let budget = max_chars.saturating_sub(3);
        let truncated: String = text.chars().take(budget).collect();

        if let Some(last_sentence) = truncated.rfind(". ") {
            if last_sentence > truncated.len() / 2 {
                return truncated[..last_sentence + 1].to_string();
            }
        }
        match truncated.rfind(char::is_whitespace) {
            Some(last_space) if last_space > 0 => {
                format!("{}...", truncated[..last_space].trim_end())
            }
            _ => format!("{truncated}..."),
        }
    }

    /// Cut to `max_chars` characters with a trailing "..." when shortened.
    pub fn shorten(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    }

    /// Collapse runs of whitespace into single spaces.
    pub fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Drop markup and decode entities, keeping only the text nodes.
    pub fn strip_html(text: &str) -> String {
        if !text.contains('<') && !text.contains('&') {
            return normalize_whitespace(text);
        }
        let fragment = Html::parse_fragment(text);
        let joined = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        normalize_whitespace(&joined)
    }

    /// Case-insensitive keyword match. Keywords of three characters or fewer
    /// must match a whole word.
    pub fn contains_keyword(haystack_lower: &str, keyword: &str) -> bool {
        if keyword.chars().count() > 3 {
            return haystack_lower.contains(keyword);
        }
        haystack_lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Resolve `href` against `base`, keeping only http(s) links and
    /// dropping the fragment.
    pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let mut resolved = base.join(href).ok()?;
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return None;
        }
        resolved.set_fragment(None);
        Some(resolved)
    }
}

/// Time utilities
pub mod time {
    use chrono::Duration;

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.num_seconds().max(0);

        if total_seconds < 60 {
            format!("{}s", total_seconds)
        } else if total_seconds < 3600 {
            format!("{}m", total_seconds / 60)
        } else if total_seconds < 86400 {
            format!("{}h {}m", total_seconds / 3600, (total_seconds % 3600) / 60)
        } else {
            format!("{}d", total_seconds / 86400)
        }
    }
}
