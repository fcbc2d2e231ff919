use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use polebot_protocol::{TelemetryFrame, TelemetryPublish};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "polebot-bridge", about = "Relay robot telemetry to and from a polebot server")]
struct Cli {
    #[arg(long, global = true, default_value = "http://127.0.0.1:3001")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Forward JSON lines from stdin as telemetry for one robot.
    Publish {
        #[arg(long, default_value = "polebot-1")]
        robot_id: String,
    },
    /// Print every telemetry frame the server streams.
    Watch {
        /// Print only frames whose message id changed.
        #[arg(long)]
        changes_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Publish { robot_id } => publish(&cli.server, &robot_id).await,
        Command::Watch { changes_only } => watch(&cli.server, changes_only).await,
    }
}

async fn publish(server: &str, robot_id: &str) -> Result<()> {
    let url = ws_url(server, "/ws/publish")?;
    let (mut socket, _) = connect_async(&url).await.with_context(|| format!("connecting to {url}"))?;
    info!(%url, robot_id, "publishing telemetry");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sent = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(text) = publish_frame(&line, robot_id)? else { continue };
                socket.send(Message::Text(text)).await?;
                sent += 1;
                debug!(sent, "telemetry forwarded");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    socket.close(None).await.ok();
    info!(sent, "telemetry publisher stopped");
    Ok(())
}

async fn watch(server: &str, changes_only: bool) -> Result<()> {
    let url = ws_url(server, "/ws")?;
    let (mut socket, _) = connect_async(&url).await.with_context(|| format!("connecting to {url}"))?;
    info!(%url, "watching telemetry");

    let mut last_seen = None;
    loop {
        tokio::select! {
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let frame: TelemetryFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(error = %err, "ignoring malformed telemetry frame");
                            continue;
                        }
                    };
                    let current = frame.data.as_ref().map(|envelope| envelope.message_id);
                    if changes_only && current == last_seen {
                        continue;
                    }
                    last_seen = current;
                    println!("{text}");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            },
            _ = tokio::signal::ctrl_c() => {
                socket.close(None).await.ok();
                break;
            }
        }
    }

    info!("telemetry watch stopped");
    Ok(())
}

/// Maps the server's HTTP base URL to the websocket URL for `path`.
fn ws_url(server: &str, path: &str) -> Result<String> {
    let server = server.trim_end_matches('/');
    let rest = if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else if server.contains("://") {
        bail!("unsupported server url: {server}");
    } else {
        format!("ws://{server}")
    };
    Ok(format!("{rest}{path}"))
}

/// Wraps one stdin line as a publish message. Blank lines yield `None`.
fn publish_frame(line: &str, robot_id: &str) -> Result<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let payload: serde_json::Value =
        serde_json::from_str(line).with_context(|| format!("telemetry line is not JSON: {line}"))?;
    let message = TelemetryPublish { robot_id: Some(robot_id.to_string()), payload };
    Ok(Some(serde_json::to_string(&message)?))
}
