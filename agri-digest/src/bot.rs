//! Long-polling command loop for the Telegram bot.

use crate::locale::Language;
use crate::pipeline::{DeliveryOutcome, DigestPipeline, RunReport, Trigger};
use crate::telegram::{TelegramChannel, TelegramClient, Update};
use crate::types::{DigestError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Digest,
    Help,
    Status,
    Unknown(String),
}

impl BotCommand {
    /// Parses the leading `/command` of a message, accepting `@botname`
    /// suffixes. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();

        Some(match name.as_str() {
            "start" => BotCommand::Start,
            "digest" => BotCommand::Digest,
            "help" => BotCommand::Help,
            "status" => BotCommand::Status,
            _ => BotCommand::Unknown(name),
        })
    }
}

/// Static facts shown by `/status`.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub channel_id: String,
    pub schedule: String,
    pub timezone: String,
    pub max_total_articles: usize,
    pub max_articles_per_source: usize,
}

pub struct DigestBot {
    client: Arc<TelegramClient>,
    pipeline: Arc<DigestPipeline>,
    settings: BotSettings,
    language: Language,
    shutdown: Arc<Notify>,
}

impl DigestBot {
    pub fn new(client: Arc<TelegramClient>, pipeline: Arc<DigestPipeline>, settings: BotSettings) -> Self {
        let language = pipeline.language();
        Self {
            client,
            pipeline,
            settings,
            language,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Polls for updates until shut down. Poll errors are logged and retried
    /// after a short pause.
    pub async fn run(&self) {
        let mut offset: Option<i64> = None;
        info!("Bot command loop started");

        loop {
            let updates = tokio::select! {
                result = self.client.get_updates(offset, POLL_TIMEOUT_SECS) => result,
                _ = self.shutdown.notified() => {
                    info!("Bot command loop stopped");
                    return;
                }
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(DigestError::RateLimited { retry_after_secs }) => {
                    warn!(retry_after_secs, "Polling rate limited");
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(e) => {
                    warn!(error = %e, "Polling for updates failed");
                    tokio::time::sleep(POLL_ERROR_DELAY).await;
                }
            }
        }
    }

    /// Signal the command loop to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            return;
        };
        let chat_id = message.chat.id.to_string();
        debug!(chat_id = %chat_id, command = ?command, "Handling command");

        if let Err(e) = self.respond(&command, &chat_id).await {
            error!(chat_id = %chat_id, command = ?command, error = %e, "Command failed");
        }
    }

    pub async fn respond(&self, command: &BotCommand, chat_id: &str) -> Result<()> {
        match command {
            BotCommand::Start => {
                self.client.send_plain(chat_id, self.language.start_text()).await?;
            }
            BotCommand::Help | BotCommand::Unknown(_) => {
                self.client.send_plain(chat_id, self.language.help_text()).await?;
            }
            BotCommand::Status => {
                let text = match self.status_text().await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Could not build status");
                        self.language.strings().status_failed.to_string()
                    }
                };
                self.client.send_plain(chat_id, &text).await?;
            }
            BotCommand::Digest => {
                let strings = self.language.strings();
                self.client.send_plain(chat_id, strings.generating).await?;

                let reply_to = TelegramChannel::new(Arc::clone(&self.client), chat_id);
                if let Err(e) = self.pipeline.run_and_deliver(Trigger::Command, &reply_to).await {
                    warn!(chat_id = %chat_id, error = %e, "On-demand digest failed");
                    self.client.send_plain(chat_id, strings.generation_failed).await?;
                }
            }
        }
        Ok(())
    }

    async fn status_text(&self) -> Result<String> {
        let me = self.client.get_me().await?;
        let last = self.pipeline.last_report().await;
        Ok(format_status(self.language, &me.first_name, me.username.as_deref(), me.id, &self.settings, last.as_ref()))
    }
}

pub fn format_status(
    language: Language,
    name: &str,
    username: Option<&str>,
    id: i64,
    settings: &BotSettings,
    last: Option<&RunReport>,
) -> String {
    let username = username.map(|u| format!("@{u}")).unwrap_or_else(|| "-".to_string());
    let last_run = match last {
        Some(report) => describe_run(language, report),
        None => match language {
            Language::Ru => "ещё не было".to_string(),
            Language::En => "none yet".to_string(),
        },
    };

    match language {
        Language::Ru => format!(
            "🤖 Статус бота\n\n\
             • Имя: {name}\n• Пользователь: {username}\n• ID: {id}\n\n\
             • Канал: {}\n• Расписание: {} ({})\n\
             • Статей в дайджесте: до {}\n• Статей с источника: до {}\n\n\
             Последний запуск: {last_run}",
            settings.channel_id,
            settings.schedule,
            settings.timezone,
            settings.max_total_articles,
            settings.max_articles_per_source,
        ),
        Language::En => format!(
            "🤖 Bot Status\n\n\
             • Name: {name}\n• Username: {username}\n• ID: {id}\n\n\
             • Channel: {}\n• Schedule: {} ({})\n\
             • Max articles: {}\n• Max per source: {}\n\n\
             Last run: {last_run}",
            settings.channel_id,
            settings.schedule,
            settings.timezone,
            settings.max_total_articles,
            settings.max_articles_per_source,
        ),
    }
}

fn describe_run(language: Language, report: &RunReport) -> String {
    let when = report.finished_at.format("%Y-%m-%d %H:%M UTC");
    let failed = report.failed_sources();
    let delivery = match (&report.delivery, language) {
        (Some(DeliveryOutcome::Delivered { .. }), Language::Ru) => "доставлен",
        (Some(DeliveryOutcome::Delivered { .. }), Language::En) => "delivered",
        (Some(DeliveryOutcome::Failed { .. }), Language::Ru) => "ошибка доставки",
        (Some(DeliveryOutcome::Failed { .. }), Language::En) => "delivery failed",
        (None, Language::Ru) => "без доставки",
        (None, Language::En) => "not delivered",
    };

    match language {
        Language::Ru => format!(
            "{when}, {}, статей: {}, источников с ошибкой: {failed}, ранжирование: {}, {delivery}",
            report.trigger, report.formatted, report.ranker
        ),
        Language::En => format!(
            "{when}, {}, {} articles, {failed} failed sources, ranked by {}, {delivery}",
            report.trigger, report.formatted, report.ranker
        ),
    }
}
