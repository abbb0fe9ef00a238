use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, Layer, Registry};

use crate::config::{BotConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use crate::discord::bot::JovanesBot;

mod ai;
mod config;
mod database;
mod discord;
mod errors;
mod games;
mod gate;
mod services;
mod session;

fn main() -> anyhow::Result<()> {
    let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = read_config(&config_path)?;

    let (_file_guard, _stdout_guard) = init_logging(&config.log_directory);

    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("Unable to create the database directory {}", parent.display()))?;
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("Unable to start the tokio runtime")?;
    runtime.block_on(async {
        tracing::info!("Starting bot with {} owner(s)", config.owner_ids.len());
        let mut bot = JovanesBot::new(config).await?;
        bot.run_bot().await?;
        Ok(())
    })
}

fn init_logging(log_directory: &str) -> (tracing_appender::non_blocking::WorkerGuard, tracing_appender::non_blocking::WorkerGuard) {
    let file_appender = tracing_appender::rolling::hourly(log_directory, "rolling.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_filter(LevelFilter::WARN);

    let (non_blocking, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_writer(non_blocking)
        .with_filter(LevelFilter::INFO);

    Registry::default().with(file_layer).with(stdout_layer).init();

    (file_guard, stdout_guard)
}

fn read_config(path: &str) -> anyhow::Result<BotConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("Unable to read the config file {}", path))?;
    BotConfig::from_yaml(&contents).with_context(|| format!("Error parsing the config file {}", path))
}
