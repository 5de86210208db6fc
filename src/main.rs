use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use game_event_bridge::channel::ChannelTransport;
use game_event_bridge::cli::Args;
use game_event_bridge::config::BridgeConfig;
use game_event_bridge::replay::{parse_script, Replay, ScriptStep};

fn init_tracing() {
    // stdout carries the messages; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

async fn read_script(args: &Args) -> std::io::Result<String> {
    match &args.script {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    let mut steps = parse_script(&read_script(&args).await?)?;
    if !args.no_auto_activate {
        let at_ms = steps.first().map_or(0, ScriptStep::at_ms);
        steps.insert(0, ScriptStep::Activate { at_ms });
    }

    let (transport, mut rx) = ChannelTransport::unbounded();

    // The receiving end plays the host page.
    let printer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        let mut printed = 0usize;
        while let Some(message) = rx.recv().await {
            let mut line = message.to_json()?;
            line.push('\n');
            out.write_all(line.as_bytes()).await?;
            printed += 1;
        }
        out.flush().await?;
        Ok::<usize, Box<dyn std::error::Error + Send + Sync>>(printed)
    });

    // Dropping the replay drops the last sender and ends the printer.
    let report = {
        let replay = Replay::new(config, Arc::new(transport))?;
        replay.run(&steps)
    };

    let printed = printer.await?.map_err(|e| e as Box<dyn std::error::Error>)?;
    tracing::debug!(printed, "replay finished");

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
