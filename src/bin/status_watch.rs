//! # Status Watch
//!
//! Runs the realtime layer headless and prints backend status, push state and
//! unread count changes until interrupted. Resumes the session cached in the
//! configured session file, if any.

use anyhow::Context;
use clap::Parser;
use eventhub_realtime::config::RealtimeConfig;
use eventhub_realtime::logging::init_structured_logging;
use eventhub_realtime::system::RealtimeSystem;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "status-watch")]
#[command(about = "Watch EventHub backend status and notifications")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "EVENTHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Override the cached session file
    #[arg(long)]
    session_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let mut config = RealtimeConfig::load(cli.config.as_deref())
        .context("Failed to load realtime configuration")?;
    if let Some(path) = cli.session_file {
        config.session_file = Some(path);
    }

    let system = RealtimeSystem::connect(&config).context("Failed to build realtime system")?;
    system.start().await;

    let mut status = system.backend_status();
    let mut push = system.push_state();
    let mut unread = system.unread_count();

    println!("backend: {}", *status.borrow_and_update());
    println!("push:    {}", *push.borrow_and_update());
    println!("unread:  {}", *unread.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            Ok(()) = status.changed() => println!("backend: {}", *status.borrow_and_update()),
            Ok(()) = push.changed() => println!("push:    {}", *push.borrow_and_update()),
            Ok(()) = unread.changed() => println!("unread:  {}", *unread.borrow_and_update()),
        }
    }

    system.shutdown().await;
    Ok(())
}
