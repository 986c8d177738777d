//! rudis - command-line tools for a key-value store.
//!
//! Provides one-shot commands plus bulk dump/load utilities.

use clap::{Parser, Subcommand};
use colored::Colorize;
use rudis_client::{Client, ClientConfig};
use rudis_protocol::Command;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rudis")]
#[command(about = "Command-line tools for a key-value store")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Database index
    #[arg(short, long, default_value_t = 0)]
    db: u32,

    /// Password
    #[arg(short, long, env = "RUDIS_PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the server
    Ping,

    /// Print the value of a key
    Get {
        /// Key to read
        key: String,
    },

    /// Set a key to a value
    Set {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
    },

    /// Delete a key
    Del {
        /// Key to delete
        key: String,
    },

    /// Write every key in the database to stdout as re-loadable frames
    Dump,

    /// Stream frames from stdin to the server
    Load,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Load writes raw frames straight to the socket; everything else goes
    // through a pooled client.
    if let Commands::Load = cli.command {
        if let Err(e) = load(&cli.server).await {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut config = ClientConfig::new(cli.server.clone()).with_db(cli.db);
    if let Some(password) = cli.password.clone() {
        config = config.with_password(password);
    }
    let client = Client::new(config);

    if let Err(e) = run(&client, cli.command).await {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: &Client, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Ping => {
            client.ping().await?;
            println!("PONG");
        }
        Commands::Get { key } => {
            let value = client.get(&key).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&value).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Commands::Set { key, value } => {
            client.set(&key, &value).await?;
            println!("OK");
        }
        Commands::Del { key } => {
            println!("{}", i64::from(client.del(&key).await?));
        }
        Commands::Dump => {
            let count = dump(client).await?;
            eprintln!("{} {} keys", "Dumped".green(), count);
        }
        Commands::Load => unreachable!(), // Already handled in main
    }
    Ok(())
}

/// Walks every key and writes one re-loadable request frame per stored
/// value to stdout, preceded by a `FLUSHDB` frame so loading starts from a
/// clean database.
async fn dump(client: &Client) -> Result<usize, Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&Command::new("FLUSHDB").encode()).await?;

    let keys = client.keys("*").await?;
    for key in &keys {
        match client.type_of(key).await?.as_str() {
            "string" => {
                let value = client.get(key).await?;
                let frame = Command::new("SET").arg(key).arg(value).encode();
                stdout.write_all(&frame).await?;
            }
            "list" => {
                for value in client.lrange(key, 0, -1).await? {
                    let frame = Command::new("RPUSH").arg(key).arg(value).encode();
                    stdout.write_all(&frame).await?;
                }
            }
            "set" => {
                for member in client.smembers(key).await? {
                    let frame = Command::new("SADD").arg(key).arg(member).encode();
                    stdout.write_all(&frame).await?;
                }
            }
            "hash" => {
                let fields: HashMap<String, Vec<u8>> = client.hgetall(key).await?;
                for (field, value) in fields {
                    let frame = Command::new("HSET")
                        .arg(key)
                        .arg(field)
                        .arg(value)
                        .encode();
                    stdout.write_all(&frame).await?;
                }
            }
            "zset" => {
                for member in client.zrange(key, 0, -1).await? {
                    let score = client.zscore(key, &member).await?;
                    let frame = Command::new("ZADD")
                        .arg(key)
                        .arg(score.to_string())
                        .arg(member)
                        .encode();
                    stdout.write_all(&frame).await?;
                }
            }
            other => {
                tracing::warn!(
                    "skipping key {:?} of unsupported type {other}",
                    String::from_utf8_lossy(key)
                );
            }
        }
    }

    stdout.flush().await?;
    Ok(keys.len())
}

/// Streams raw frames from stdin to the server, then drains the replies
/// until the server closes the connection after `QUIT`.
async fn load(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; 8192];

    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n]).await?;
    }
    stream.write_all(&Command::new("QUIT").encode()).await?;

    let mut drained = 0usize;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        drained += n;
    }
    tracing::debug!("drained {drained} reply bytes");
    Ok(())
}
