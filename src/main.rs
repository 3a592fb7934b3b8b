// src/main.rs
//! Asthra Bot — binary entrypoint.
//! Loads configuration, wires the broadcast loop, the command poller and the
//! keep-alive server, then waits for Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use asthra_bot::api::{self, AppState};
use asthra_bot::broadcast::scheduler::{spawn_broadcast_loop, tick_channel, SchedulerCfg};
use asthra_bot::broadcast::{BroadcastSettings, BroadcastState, Broadcaster};
use asthra_bot::commands::spawn_command_loop;
use asthra_bot::config::BotConfig;
use asthra_bot::format::Formatter;
use asthra_bot::ingest::providers::mint::MintSource;
use asthra_bot::metrics::Metrics;
use asthra_bot::notify::{DynPublisher, LogPublisher, TelegramApi, TelegramPublisher};
use asthra_bot::status::StatusSnapshot;
use asthra_bot::summarize::{GroqSummarizer, SummaryClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev before anything reads the environment.
    let _ = dotenvy::dotenv();
    asthra_bot::init_tracing();

    // Missing credentials stop the process here, before any loop starts.
    let cfg = BotConfig::from_env().context("loading configuration")?;
    tracing::info!(
        source = %cfg.source.homepage_url,
        dry_run = cfg.dry_run,
        credentials = ?cfg.credentials,
        "configuration loaded"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    // --- core pipeline ---
    let source = Arc::new(MintSource::new(&cfg.source));
    let summarizer = SummaryClient::new(
        Arc::new(GroqSummarizer::new(
            &cfg.summarizer,
            cfg.credentials.groq_api_key.clone(),
        )),
        cfg.summarizer.max_chars,
        cfg.summarizer.attribution.clone(),
    );
    let telegram = TelegramApi::new(&cfg.telegram, &cfg.credentials.bot_token);
    let publisher: DynPublisher = if cfg.dry_run {
        Arc::new(LogPublisher)
    } else {
        Arc::new(TelegramPublisher::new(
            telegram.clone(),
            cfg.credentials.channel_id.clone(),
        ))
    };

    let broadcaster = Broadcaster::new(
        source,
        summarizer,
        publisher,
        Formatter::from_settings(&cfg.telegram),
        BroadcastSettings::from(&cfg.schedule),
    );
    let now = broadcaster.now();
    let state = BroadcastState::new(cfg.schedule.seen_ttl(), now);

    let (status_tx, status_rx) =
        watch::channel(StatusSnapshot::new(cfg.source.homepage_url.clone(), now));
    let (trigger, requests) = tick_channel();

    let broadcast_task = spawn_broadcast_loop(
        broadcaster,
        state,
        SchedulerCfg::from(&cfg.schedule),
        requests,
        status_tx,
    );

    // --- glue around the core ---
    if !cfg.dry_run && cfg.telegram.commands_enabled {
        spawn_command_loop(
            telegram,
            cfg.telegram.poll_timeout_secs,
            status_rx.clone(),
            trigger,
        );
    }

    if cfg.server.enabled {
        let mut router = api::create_router(AppState { status: status_rx });
        if let Some(m) = &metrics {
            router = router.merge(m.router());
        }
        tokio::spawn(api::serve(cfg.server.addr.clone(), router));
    }

    tokio::select! {
        res = broadcast_task => {
            res.context("broadcast loop panicked")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}
