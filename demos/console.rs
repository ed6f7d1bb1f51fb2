//! Operator console for the chat relay
//!
//! Run with: cargo run --example console -- [--host HOST] [--port PORT]
//!
//! Commands (one per line on stdin):
//!   start    start listening
//!   stop     stop listening and drop every client
//!   stats    print server statistics
//!   clients  print the connected display names
//!   quit     stop and exit

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use chat_relay::{
    ListenerState, LogEvent, LogLevel, RelayObserver, RelayServer, ServerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "console", about = "Chat relay operator console")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Close connections whose display name is already taken
    #[arg(long)]
    unique_names: bool,

    /// Broadcast GROUPLIST to everyone after each group creation
    #[arg(long)]
    announce_groups: bool,

    /// Maximum simultaneous connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Start listening immediately
    #[arg(long)]
    autostart: bool,
}

/// Prints relay events the way the console log pane would
struct ConsoleLog;

impl RelayObserver for ConsoleLog {
    fn on_log(&self, event: &LogEvent) {
        let tag = match event.level {
            LogLevel::Debug => return,
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        };
        println!("[{}] {}", tag, event);
    }

    fn on_client_list_changed(&self, names: &[String]) {
        println!("Connected clients ({}): {}", names.len(), names.join(", "));
    }

    fn on_state_changed(&self, state: ListenerState) {
        match state {
            ListenerState::Listening => println!("Status: listening"),
            ListenerState::Stopped => println!("Status: stopped"),
        }
    }
}

async fn print_stats(server: &RelayServer) {
    let stats = server.stats().await;
    println!(
        "state={:?} active={} total={} rejected={} clients={} groups={}",
        server.state(),
        stats.active_connections,
        stats.total_connections,
        stats.rejected_connections,
        stats.registered_clients,
        stats.groups,
    );
    println!(
        "frames: received={} relayed={} dropped={} malformed={}",
        stats.frames_received, stats.frames_relayed, stats.frames_dropped, stats.malformed_frames,
    );
    println!(
        "transfers: completed={} failed={} bytes_relayed={} uptime={:?}",
        stats.transfers_completed, stats.transfers_failed, stats.bytes_relayed, stats.uptime,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=warn".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(SocketAddr::new(args.host, args.port))
        .max_connections(args.max_connections)
        .unique_names(args.unique_names)
        .announce_groups(args.announce_groups);

    let mut server = RelayServer::with_observer(config, ConsoleLog);

    if args.autostart {
        if let Err(e) = server.start().await {
            eprintln!("Start failed: {}", e);
        }
    }

    println!("Commands: start | stop | stats | clients | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                None
            }
        };

        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            "start" => {
                if let Err(e) = server.start().await {
                    eprintln!("Start failed: {}", e);
                }
            }
            "stop" => server.stop().await,
            "stats" => print_stats(&server).await,
            "clients" => {
                let names = server.directory().snapshot_names().await;
                println!("Connected clients ({}): {}", names.len(), names.join(", "));
            }
            "quit" | "exit" => break,
            other => println!("Unknown command: {}", other),
        }
    }

    server.stop().await;
    Ok(())
}
