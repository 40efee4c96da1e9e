//! Simple test for HttpBrain chat completion.
//!
//! Run with: cargo run -p http-brain --example test_chat
//! Or with a custom message: cargo run -p http-brain --example test_chat -- "Your message here"
//!
//! Make sure to set environment variables in .env:
//!   GROK_API_KEY - API key for authentication
//!   PROVIDER_PREFIX - optional, use another variable prefix (default: GROK)

use http_brain::{Brain, BrainParams, HttpBrain};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Get message from command line args or use default
    let args: Vec<String> = env::args().collect();
    let message_text = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        "Hello! Please respond with a short greeting.".to_string()
    };

    let prefix = env::var("PROVIDER_PREFIX").unwrap_or_else(|_| "GROK".to_string());
    println!("Initializing HttpBrain from {}_* ...", prefix);
    let brain = HttpBrain::from_env(&prefix)?;

    println!("Brain initialized: {}", brain.name());
    println!("API URL: {}", brain.config().api_url);
    println!("Model: {}", brain.config().model);
    if let Some(ref prompt) = brain.config().system_prompt {
        let preview: String = prompt.chars().take(50).collect();
        let suffix = if prompt.len() > 50 { "..." } else { "" };
        println!("System prompt: \"{}{}\"", preview, suffix);
    } else {
        println!("System prompt: (none)");
    }
    println!();

    println!("Sending: \"{}\"", message_text);
    println!("Waiting for response...\n");

    let response = brain.generate(&message_text, &BrainParams::new()).await?;

    println!("=== Response ===");
    println!("{}", response);
    println!("================");

    Ok(())
}
