//! Localized message text and keyword tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" | "russian" => Ok(Language::Ru),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("unsupported language '{other}', expected 'ru' or 'en'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Ru => write!(f, "ru"),
            Language::En => write!(f, "en"),
        }
    }
}

/// Static text for one language. All strings are raw; callers escape them.
pub struct Strings {
    pub digest_title: &'static str,
    pub overview_heading: &'static str,
    pub source_label: &'static str,
    pub read_more: &'static str,
    pub footer_generated: &'static str,
    pub footer_updated: &'static str,
    pub no_articles: &'static str,
    pub no_relevant_articles: &'static str,
    pub generating: &'static str,
    pub generation_failed: &'static str,
    pub status_failed: &'static str,
    pub date_format: &'static str,
}

const RU: Strings = Strings {
    digest_title: "🌾 Дайджест сельскохозяйственного рынка",
    overview_heading: "📈 Ключевые события дня",
    source_label: "📰 Источник",
    read_more: "Читать полностью",
    footer_generated: "🤖 Создано ботом Agriculture Digest",
    footer_updated: "📅 Обновляется ежедневно с последними новостями сельскохозяйственного рынка",
    no_articles: "📰 Сегодня не удалось получить статьи ни из одного источника.",
    no_relevant_articles: "🌾 Сегодня новостей сельского хозяйства не найдено.",
    generating: "🔄 Готовлю дайджест сельскохозяйственного рынка...",
    generation_failed: "❌ Не удалось сформировать дайджест. Попробуйте позже.",
    status_failed: "❌ Не удалось получить статус бота.",
    date_format: "%d.%m.%Y",
};

const EN: Strings = Strings {
    digest_title: "🌾 Agriculture Market Digest",
    overview_heading: "📈 Key Market Developments",
    source_label: "📰 Source",
    read_more: "Read more",
    footer_generated: "🤖 Generated by Agriculture Digest Bot",
    footer_updated: "📅 Updated daily with the latest agriculture market news",
    no_articles: "📰 No articles found from any sources today.",
    no_relevant_articles: "🌾 No agriculture-related articles found today.",
    generating: "🔄 Generating agriculture digest...",
    generation_failed: "❌ Failed to generate digest. Please try again later.",
    status_failed: "❌ Error retrieving bot status",
    date_format: "%B %d, %Y",
};

impl Language {
    pub fn strings(self) -> &'static Strings {
        match self {
            Language::Ru => &RU,
            Language::En => &EN,
        }
    }

    /// "📊 8 articles from 3 sources" without markup.
    pub fn count_line(self, articles: usize, sources: usize) -> String {
        match self {
            Language::Ru => format!("{articles} статей из {sources} источников"),
            Language::En => format!("{articles} articles from {sources} sources"),
        }
    }

    /// Default category labels. The last entry is the catch-all.
    pub fn default_categories(self) -> Vec<String> {
        let labels: &[&str] = match self {
            Language::Ru => &[
                "Зерновые и масличные",
                "Животноводство",
                "Технологии",
                "Рынок и торговля",
                "Политика и регулирование",
                "Погода и экология",
                "Региональные рынки",
                "Другое",
            ],
            Language::En => &[
                "Grains & Oilseeds",
                "Livestock & Dairy",
                "Technology & Innovation",
                "Market & Trade",
                "Policy & Regulation",
                "Weather & Environment",
                "Regional Markets",
                "Other",
            ],
        };
        labels.iter().map(|s| s.to_string()).collect()
    }

    /// Keywords that mark an article as agriculture related.
    pub fn relevance_keywords(self) -> &'static [&'static str] {
        match self {
            Language::Ru => &[
                "сельское хозяйство", "фермерство", "урожай", "скот", "молочное", "птицеводство",
                "пшеница", "кукуруза", "соя", "рис", "хлопок", "сахар", "кофе",
                "удобрение", "пестицид", "орошение", "сбор урожая", "посадка",
                "продовольственная безопасность", "устойчивое земледелие", "органическое",
                "точное земледелие", "агротех", "сельхозтехника", "трактор", "семена", "зерно",
                "корм", "товар", "рыночная цена", "экспорт", "импорт", "торговля",
                "agriculture", "farming", "crop", "livestock", "dairy", "poultry",
                "wheat", "corn", "soybean", "rice", "cotton", "sugar", "coffee",
            ],
            Language::En => &[
                "agriculture", "farming", "crop", "livestock", "dairy", "poultry",
                "wheat", "corn", "soybean", "rice", "cotton", "sugar", "coffee",
                "fertilizer", "pesticide", "irrigation", "harvest", "planting",
                "food security", "sustainable farming", "organic", "precision agriculture",
                "agtech", "farm equipment", "tractor", "seed", "grain", "feed",
                "commodity", "market price", "export", "import", "trade",
            ],
        }
    }

    /// Keyword lists for the default categories, in matching order.
    /// The catch-all category has no list.
    pub fn category_keywords(self) -> &'static [&'static [&'static str]] {
        match self {
            Language::Ru => &[
                &["пшеница", "кукуруза", "соя", "рис", "ячмень", "рожь", "овес", "подсолнечник", "рапс"],
                &["скот", "свиньи", "птица", "молоко", "мясо", "животноводство", "крупный рогатый скот"],
                &["технология", "цифровизация", "ии", "автоматизация", "робот", "дрон", "сенсор"],
                &["цена", "торговля", "экспорт", "импорт", "рынок", "биржа", "фьючерс"],
                &["политика", "закон", "регулирование", "правительство", "субсидия", "налог"],
                &["погода", "засуха", "дождь", "климат", "экология", "устойчивость", "углерод"],
                &["казахстан", "россия", "украина", "беларусь", "узбекистан", "регион"],
            ],
            Language::En => &[
                &["wheat", "corn", "soybean", "rice", "barley", "rye", "oats", "sunflower", "rapeseed"],
                &["cattle", "pigs", "poultry", "milk", "meat", "livestock", "dairy"],
                &["technology", "digital", "ai", "automation", "robot", "drone", "sensor"],
                &["price", "trade", "export", "import", "market", "exchange", "futures"],
                &["policy", "law", "regulation", "government", "subsidy", "tax"],
                &["weather", "drought", "rain", "climate", "environment", "sustainability", "carbon"],
                &["kazakhstan", "russia", "ukraine", "belarus", "uzbekistan", "region"],
            ],
        }
    }

    pub fn start_text(self) -> &'static str {
        match self {
            Language::Ru => concat!(
                "🌾 Добро пожаловать в Agriculture Digest Bot!\n\n",
                "Бот ежедневно собирает новости и аналитику сельскохозяйственного рынка.\n\n",
                "Команды:\n",
                "/start - приветствие\n",
                "/digest - сформировать дайджест сейчас\n",
                "/help - справка\n",
                "/status - состояние бота\n\n",
                "Дайджест автоматически публикуется в канале каждый день."
            ),
            Language::En => concat!(
                "🌾 Welcome to Agriculture Digest Bot!\n\n",
                "This bot provides daily agriculture market news and insights.\n\n",
                "Available commands:\n",
                "/start - Show this welcome message\n",
                "/digest - Generate and send current digest\n",
                "/help - Show help information\n",
                "/status - Show bot status\n\n",
                "The bot will automatically send daily digests to the configured channel."
            ),
        }
    }

    pub fn help_text(self) -> &'static str {
        match self {
            Language::Ru => concat!(
                "📖 Справка Agriculture Digest Bot\n\n",
                "Команды:\n",
                "• /start - приветствие и описание бота\n",
                "• /digest - сформировать и прислать дайджест\n",
                "• /help - эта справка\n",
                "• /status - состояние и настройки бота\n\n",
                "Как это работает:\n",
                "1. Бот собирает новости из настроенных источников\n",
                "2. Отбирает и ранжирует статьи по значимости\n",
                "3. Группирует статьи по темам\n",
                "4. Формирует дайджест с кратким описанием и ссылками\n",
                "5. Публикует дайджест в Telegram-канале"
            ),
            Language::En => concat!(
                "📖 Agriculture Digest Bot Help\n\n",
                "Commands:\n",
                "• /start - Welcome message and bot introduction\n",
                "• /digest - Manually generate and send current digest\n",
                "• /help - Show this help message\n",
                "• /status - Show bot status and configuration\n\n",
                "How it works:\n",
                "1. Bot collects agriculture news from configured sources\n",
                "2. Filters and ranks articles by relevance\n",
                "3. Groups articles by topic\n",
                "4. Generates a formatted digest with summaries and links\n",
                "5. Sends the digest to the Telegram channel"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language_codes() {
        assert_eq!("ru".parse::<Language>().unwrap(), Language::Ru);
        assert_eq!(" EN ".parse::<Language>().unwrap(), Language::En);
        assert!("de".parse::<Language>().is_err());
    }

    #[test]
    fn category_tables_line_up() {
        for language in [Language::Ru, Language::En] {
            assert_eq!(
                language.category_keywords().len() + 1,
                language.default_categories().len()
            );
        }
    }
}
