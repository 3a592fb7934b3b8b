// src/commands.rs
//! Telegram command handling via `getUpdates` long polling.
//!
//! `/start` greets, `/status` replies with the latest snapshot, `/latest` asks
//! the broadcast loop for an immediate tick. Handlers only read the status
//! channel; the loop stays the single writer of broadcast state.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broadcast::scheduler::TickTrigger;
use crate::notify::TelegramApi;
use crate::status::StatusSnapshot;

pub const GREETING: &str =
    "Hello! I am Asthra Bot. I post short summaries of fresh Livemint stories to this channel.";

/// Back-off after a failed poll.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Latest,
}

/// Parse `/cmd`, `/cmd@BotName` and `/cmd args`; anything else is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_ascii_lowercase().as_str() {
        "start" | "help" => Some(Command::Start),
        "status" => Some(Command::Status),
        "latest" => Some(Command::Latest),
        _ => None,
    }
}

/// Reply text for a command. `/latest` enqueues a tick as a side effect.
pub fn respond(cmd: Command, status: &StatusSnapshot, trigger: &TickTrigger) -> String {
    match cmd {
        Command::Start => GREETING.to_string(),
        Command::Status => status.render_text(),
        Command::Latest => {
            if trigger.request() {
                "🔍 Checking for fresh stories now…".to_string()
            } else {
                "⏳ A check is already queued.".to_string()
            }
        }
    }
}

pub async fn run_command_loop(
    api: TelegramApi,
    poll_timeout_secs: u64,
    status: watch::Receiver<StatusSnapshot>,
    trigger: TickTrigger,
) {
    let mut offset: i64 = 0;
    tracing::info!(target: "commands", "command polling started");

    loop {
        let updates = match api.get_updates(offset, poll_timeout_secs).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(target: "commands", error = %e, "getUpdates failed");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(msg) = update.message else { continue };
            let Some(cmd) = msg.text.as_deref().and_then(parse_command) else {
                continue;
            };

            let reply = {
                let snapshot = status.borrow();
                respond(cmd, &snapshot, &trigger)
            };
            let chat_id = msg.chat.id.to_string();
            tracing::info!(target: "commands", ?cmd, chat_id = %chat_id, "command received");
            if let Err(e) = api.send_message(&chat_id, &reply, None).await {
                tracing::warn!(target: "commands", error = %e, "command reply failed");
            }
        }
    }
}

pub fn spawn_command_loop(
    api: TelegramApi,
    poll_timeout_secs: u64,
    status: watch::Receiver<StatusSnapshot>,
    trigger: TickTrigger,
) -> JoinHandle<()> {
    tokio::spawn(run_command_loop(api, poll_timeout_secs, status, trigger))
}
