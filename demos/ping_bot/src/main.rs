//! Ping Bot demo
//!
//! A handful of commands on top of the asena runtime. The builtin `pause`
//! and `resume` commands are added by the runtime itself.
//!
//! # Usage
//!
//! Start a bridge on `ws://127.0.0.1:8765`, then:
//!
//! ```bash
//! cargo run --package ping-bot -- --config demos/ping_bot/asena.toml
//! ```

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::Result;
use asena::prelude::*;
use clap::Parser;
use regex::Regex;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "ping-bot", about = "Demo bot for the asena shell")]
struct Args {
    /// Configuration file (defaults to asena.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. production
    #[arg(short, long)]
    profile: Option<String>,

    /// Bridge URL, overrides the configuration
    #[arg(long)]
    url: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Replies twice so the round trip of the first reply can be reported.
async fn ping(ctx: Arc<CommandContext>) -> Result<String, BoxError> {
    let start = Instant::now();
    ctx.reply("Ping!").await?;
    Ok(format!("*Pong!*\nLatency: {} ms", start.elapsed().as_millis()))
}

async fn echo(ctx: Arc<CommandContext>) -> String {
    match ctx.matched() {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("Usage: {}echo <text>", ctx.prefix()),
    }
}

async fn deleted(ctx: Arc<CommandContext>) {
    if let Some(id) = ctx.revoked_id() {
        info!(chat = %ctx.chat(), sender = %ctx.sender(), id, "Message deleted");
    }
}

fn render_menu(registry: &CommandRegistry) -> String {
    let mut text = String::from("*asena menu*\n");
    for (category, names) in registry.listing() {
        text.push_str(&format!("\n_{}_\n", category.to_uppercase()));
        for name in names {
            text.push_str(&format!("• {name}\n"));
        }
    }
    text
}

fn commands(started: Instant, menu: Arc<OnceLock<String>>) -> Result<Vec<Command>> {
    Ok(vec![
        on_command("ping")
            .desc("Checks the bot's response time")
            .category("misc")
            .handler(ping),
        on_command("alive")
            .desc("Shows how long the bot has been running")
            .category("misc")
            .handler(move |_ctx| async move {
                let secs = started.elapsed().as_secs();
                format!(
                    "I'm alive!\nUptime: {}h {}m {}s",
                    secs / 3600,
                    secs / 60 % 60,
                    secs % 60
                )
            }),
        on_command("echo")
            .desc("Repeats the given text")
            .category("misc")
            .handler(echo),
        on_command("menu")
            .desc("Lists all commands")
            .category("misc")
            .handler(move |_ctx| {
                let menu = Arc::clone(&menu);
                async move { menu.get().cloned() }
            }),
        on_pattern(Regex::new(r"(?i)^(hi|hello)\s+bot\b")?)
            .name("greet")
            .desc("Says hello back")
            .hidden()
            .handler(|ctx: Arc<CommandContext>| async move {
                let name = ctx.message().push_name.clone().unwrap_or_else(|| "there".into());
                format!("Hello {name}!")
            }),
        on_delete().name("deleted").hidden().handler(deleted),
    ])
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let menu = Arc::new(OnceLock::new());

    let mut builder = AsenaRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    if let Some(url) = &args.url {
        builder = builder.set("connection.url", url);
    }

    let runtime = builder
        .commands(commands(Instant::now(), Arc::clone(&menu))?)
        .build()?;
    let _ = menu.set(render_menu(runtime.registry()));

    info!(commands = runtime.registry().len(), "Ping bot ready");
    let code = runtime.run().await?;
    std::process::exit(code);
}
