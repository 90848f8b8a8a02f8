use agri_digest::bot::BotSettings;
use agri_digest::config::load_dotenv;
use agri_digest::health::{self, HealthInfo};
use agri_digest::sources::build_sources;
use agri_digest::{
    AiRanker, AppConfig, DailySchedule, DigestBot, DigestPipeline, DigestScheduler, Fetcher,
    OpenAiAdapter, Settings, TelegramChannel, TelegramClient, Trigger,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agri-digest", version, about = "Daily agriculture market digest for Telegram")]
struct Cli {
    /// YAML configuration file; built-in defaults are used when absent
    #[arg(long, env = "DIGEST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the health server, bot command loop and daily scheduler
    Serve,
    /// Generate one digest and deliver it to the configured channel
    Once,
    /// Generate one digest and print it without delivering
    Preview,
    /// List configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid environment settings")?;
    let config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, settings).await,
        Command::Once => once(config, settings).await,
        Command::Preview => preview(config, settings).await,
        Command::Sources => {
            for source in &config.sources {
                let cap = source
                    .max_articles
                    .unwrap_or(config.digest.max_articles_per_source);
                let mode = format!("{:?}", source.mode);
                println!("{:<20} {:<7} max {:<3} {}", source.name, mode, cap, source.url);
            }
            Ok(())
        }
    }
}

fn build_pipeline(config: &AppConfig, settings: &Settings) -> anyhow::Result<DigestPipeline> {
    let fetcher = Arc::new(Fetcher::new(config.fetch.clone()).context("failed to build HTTP client")?);
    let mut builder = DigestPipeline::builder(config.digest.clone(), settings.language)
        .fetch_concurrency(config.fetch.fetch_concurrency)
        .sources(build_sources(&config.sources, fetcher));

    match settings.openai_api_key.clone().filter(|_| settings.ai_enabled()) {
        Some(api_key) => {
            let adapter = OpenAiAdapter::new(
                api_key,
                settings.openai_model.clone(),
                settings.openai_base_url.clone(),
            )?;
            builder = builder.ranker(Box::new(AiRanker::new(
                Box::new(adapter),
                config.digest.max_ai_input_articles,
            )));
            info!(model = %settings.openai_model, "AI ranking enabled");
        }
        None => warn!("AI ranking disabled, using keyword ranking"),
    }

    Ok(builder.build()?)
}

async fn serve(config: AppConfig, settings: Settings) -> anyhow::Result<()> {
    let schedule = DailySchedule::parse(&config.digest.schedule, &config.digest.timezone)?;
    let token = settings.require_bot_token()?;
    let client = Arc::new(TelegramClient::new(token)?);
    let pipeline = Arc::new(build_pipeline(&config, &settings)?);

    let channel = Arc::new(TelegramChannel::new(Arc::clone(&client), settings.channel_id.clone()));
    let scheduler = Arc::new(DigestScheduler::new(schedule, Arc::clone(&pipeline), channel));
    let bot = Arc::new(DigestBot::new(
        Arc::clone(&client),
        Arc::clone(&pipeline),
        BotSettings {
            channel_id: settings.channel_id.clone(),
            schedule: config.digest.schedule.clone(),
            timezone: config.digest.timezone.clone(),
            max_total_articles: config.digest.max_total_articles,
            max_articles_per_source: config.digest.max_articles_per_source,
        },
    ));

    match client.get_me().await {
        Ok(me) => info!(bot_id = me.id, username = ?me.username, "Connected to Telegram"),
        Err(e) => warn!(error = %e, "Could not reach Telegram, continuing"),
    }

    let health_shutdown = Arc::new(Notify::new());
    let info = HealthInfo {
        token_configured: true,
        channel_configured: !settings.channel_id.is_empty(),
    };
    let health_task = tokio::spawn(health::serve(settings.port, info, Arc::clone(&health_shutdown)));
    let bot_task = tokio::spawn({
        let bot = Arc::clone(&bot);
        async move { bot.run().await }
    });
    let scheduler_task = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    info!(
        channel = %settings.channel_id,
        schedule = %config.digest.schedule,
        timezone = %config.digest.timezone,
        sources = pipeline.source_names().len(),
        "Digest service started"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutting down");

    health_shutdown.notify_one();
    bot.shutdown();
    scheduler.shutdown();

    if let Ok(Err(e)) = health_task.await {
        error!(error = %e, "Health server failed");
    }
    let _ = tokio::join!(bot_task, scheduler_task);
    info!("Digest service stopped");
    Ok(())
}

async fn once(config: AppConfig, settings: Settings) -> anyhow::Result<()> {
    let client = Arc::new(TelegramClient::new(settings.require_bot_token()?)?);
    let pipeline = build_pipeline(&config, &settings)?;
    let channel = TelegramChannel::new(client, settings.channel_id.clone());

    let report = pipeline
        .run_and_deliver(Trigger::Cli, &channel)
        .await
        .context("digest delivery failed")?;
    info!(
        run_id = %report.run_id,
        articles = report.formatted,
        failed_sources = report.failed_sources(),
        "Digest sent"
    );
    Ok(())
}

async fn preview(config: AppConfig, settings: Settings) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config, &settings)?;
    let (digest, report) = pipeline.generate(Trigger::Cli).await;

    println!("{}", digest.text);
    info!(
        run_id = %report.run_id,
        collected = report.collected,
        relevant = report.relevant,
        articles = report.formatted,
        ranker = %report.ranker,
        chars = digest.char_count(),
        "Preview generated"
    );
    Ok(())
}
