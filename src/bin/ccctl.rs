//! ccctl - command-line client for a CuckooCache orchestrator
//!
//! ```text
//! ccctl --addr 127.0.0.1:7000 set greeting hello   # prints OK
//! ccctl --addr 127.0.0.1:7000 get greeting         # prints hello
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};

use cuckoocache::{CacheClient, Op, Request, Response, Status};

/// Command-line client for CuckooCache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Orchestrator address
    #[arg(long, env = "CCCTL_ADDR", default_value = "127.0.0.1:7000")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a key
    Get { key: String },
    /// Store a key
    Set { key: String, value: String },
}

impl Command {
    fn request(self) -> Request {
        match self {
            Command::Get { key } => Request::get(key),
            Command::Set { key, value } => Request::set(key, value),
        }
    }
}

/// Text printed for a response to a request of kind `op`
fn render(op: Op, response: &Response) -> String {
    match (response.status, op) {
        (Status::Ok, Op::Get) => String::from_utf8_lossy(&response.value).into_owned(),
        (Status::Ok, Op::Set) => "OK".to_string(),
        (Status::NotFound, _) => "NOT_FOUND".to_string(),
        (Status::Error, _) => format!("ERROR: {}", response.status.as_byte()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let req = cli.command.request();
    let op = req.op;

    let mut client = CacheClient::connect(cli.addr.as_str(), u32::MAX)
        .await
        .with_context(|| format!("failed to connect to {}", cli.addr))?;
    let response = client.call(req).await.context("request failed")?;

    println!("{}", render(op, &response));
    Ok(())
}
