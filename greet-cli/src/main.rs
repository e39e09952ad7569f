use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use greet_client::config::Config;
use http::Uri;
use humantime_serde::re::humantime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, Subcommand)]
enum Command {
    /// Single request, single response
    Unary,
    /// Single request, stream of responses
    ServerStreaming,
    /// Stream of requests, single aggregated response
    ClientStreaming,
    /// Stream of requests and stream of responses at the same time
    #[default]
    BidiStreaming,
}

#[derive(Debug, Parser)]
struct Opts {
    /// Configuration file with the server and payloads to use
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Server to connect to
    #[clap(short, long)]
    uri: Option<Uri>,
    /// Delay between streamed requests, e.g. "1s" or "250ms"
    #[clap(short, long, value_parser = humantime::parse_duration)]
    pacing: Option<Duration>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();

    let mut config = match opts.config {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(uri) = opts.uri {
        config.uri = uri;
    }
    if let Some(pacing) = opts.pacing {
        config.pacing = pacing;
    }

    let mut greet = config
        .to_greet_builder()
        .connect()
        .await
        .context("Failed to reach greet server")?;

    match opts.command.unwrap_or_default() {
        Command::Unary => {
            println!("Starting to do Unary RPC...");
            let result = greet
                .greet(config.greetings.unary)
                .await
                .context("Error while calling Greet RPC")?;
            println!("Response from Greet: {result}");
        }
        Command::ServerStreaming => {
            println!("Starting to do Server Streaming RPC...");
            let received = greet
                .greet_many_times(config.greetings.many_times, |r| {
                    println!("Response from GreetManyTimes: {}", r.result)
                })
                .await
                .context("Error while reading GreetManyTimes stream")?;
            info!("GreetManyTimes done after {} responses", received);
        }
        Command::ClientStreaming => {
            println!("Starting to do Client Streaming RPC...");
            let result = greet
                .long_greet(config.greetings.long_greet, config.pacing)
                .await
                .context("Error while receiving response from LongGreet")?;
            println!("LongGreet response: {result}");
        }
        Command::BidiStreaming => {
            println!("Starting to do BiDi Streaming RPC...");
            let summary = greet
                .greet_everyone(config.greetings.everyone, config.pacing, |r| {
                    println!("Received {}", r.result)
                })
                .await
                .context("Error while streaming GreetEveryone")?;
            info!(
                "GreetEveryone done: {} requests sent, {} responses received",
                summary.sent.sent(),
                summary.received
            );
        }
    }

    Ok(())
}
