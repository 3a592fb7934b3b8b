// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod broadcast;
pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod seen;
pub mod status;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::broadcast::{BroadcastState, Broadcaster, TickReport};
pub use crate::config::BotConfig;
pub use crate::format::{Formatter, MessageChunk};
pub use crate::ingest::types::{ContentItem, NewsSource};
pub use crate::notify::Publisher;
pub use crate::seen::SeenSet;
pub use crate::summarize::{Summarizer, SummaryClient, SummaryOutcome};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `asthra_bot=info,warn`);
/// `LOG_FORMAT=json` switches to JSON lines for log shippers.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("asthra_bot=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}
