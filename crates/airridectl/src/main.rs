//! Command-line client for the airride control socket.
//!
//! Speaks the plain-text `verb [name]` protocol over a Unix stream
//! socket: one request, one reply, connection closed. Exit code
//! follows the protocol's own convention: 0 on `OK`, 1 on anything
//! else.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

const DEFAULT_SOCKET: &str = "/run/airride.sock";

#[derive(Debug, Parser)]
#[command(name = "airridectl", about = "Control client for the airride supervisor")]
struct Cli {
    /// Path to the supervisor's control socket.
    #[arg(long, default_value = DEFAULT_SOCKET)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a service.
    Start { name: String },
    /// Stop a service.
    Stop { name: String },
    /// Stop then start a service.
    Restart { name: String },
    /// Show a single service's status.
    Status { name: String },
    /// List every known service.
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = match &cli.command {
        Command::Start { name } => format!("start {name}"),
        Command::Stop { name } => format!("stop {name}"),
        Command::Restart { name } => format!("restart {name}"),
        Command::Status { name } => format!("status {name}"),
        Command::List => "list".to_string(),
    };

    let reply = send_request(&cli.socket, &request)
        .with_context(|| format!("failed to reach {}", cli.socket.display()))?;

    print!("{reply}");

    if reply == "OK\n" || reply.starts_with("Service:") || reply.starts_with("Services:") {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn send_request(socket: &PathBuf, request: &str) -> Result<String> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(request.as_bytes())?;
    stream.shutdown(std::net::Shutdown::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    Ok(reply)
}
