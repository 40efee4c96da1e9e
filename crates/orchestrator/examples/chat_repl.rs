//! Interactive chat against the orchestrator.
//!
//! Run with: cargo run -p orchestrator --example chat_repl
//!
//! Configuration via .env file or environment variables:
//!   GROK_API_KEY     - Enables the `grok` provider
//!   OPENAI_API_KEY   - Enables the `openai` provider
//!   ORCH_*, BREAKER_*, RATE_LIMIT_* - See `OrchestratorConfig::from_env`
//!
//! Without any API key the REPL falls back to an echo provider, so tool
//! intents (prices, portfolios, alerts) and commands can still be tried.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use agent_tools::{default_registry, CoinGecko};
use http_brain::HttpBrain;
use mock_brain::EchoBrain;
use orchestrator::{InboundMessage, Orchestrator, OrchestratorConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

const PROVIDERS: &[(&str, f64)] = &[("GROK", 0.8), ("OPENAI", 0.7)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orchestrator=info".parse()?)
                .add_directive("agent_tools=info".parse()?),
        )
        .init();

    let config = OrchestratorConfig::from_env();
    let mut builder =
        Orchestrator::builder(config).with_tools(default_registry(Arc::new(CoinGecko::new())));

    let mut providers = 0;
    for (prefix, quality) in PROVIDERS {
        match HttpBrain::from_env(prefix) {
            Ok(brain) => {
                info!("Provider {} enabled", prefix.to_lowercase());
                builder = builder.with_provider(Arc::new(brain), *quality);
                providers += 1;
            }
            Err(e) => warn!("Provider {} disabled: {}", prefix.to_lowercase(), e),
        }
    }
    if providers == 0 {
        println!("No API keys found, answering open questions with the echo provider.");
        builder = builder.with_provider(Arc::new(EchoBrain::new().with_prefix("echo: ")), 0.1);
    }

    let orchestrator = builder.build()?;
    let _janitor = orchestrator.spawn_cache_janitor(Duration::from_secs(60));

    println!("Type a message, `help` for commands, or Ctrl+D to quit.");
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;
        let response = orchestrator
            .handle_message(InboundMessage::direct("local", text, timestamp))
            .await;

        println!("{}", response.text);
        println!(
            "  [{:?} via {} in {}ms]",
            response.status,
            response.metadata.served_by.as_deref().unwrap_or("-"),
            response.metadata.latency_ms
        );
        if !response.metadata.errors.is_empty() {
            println!("  [errors: {}]", response.metadata.errors.join("; "));
        }
    }

    Ok(())
}
