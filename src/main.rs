//! redops - run single Redis commands through a pooled connection.

use clap::Parser;
use redops::config::{Cli, Command};
use redops::{Redis, RedisPool, StoreError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays clean
    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(redis: &Redis, command: Command) -> Result<(), StoreError> {
    match command {
        Command::Ping => {
            let pong = redis.ping().await?;
            println!("{}", if pong { "PONG" } else { "no PONG" });
        }
        Command::Get { key } => match redis.get(&key).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Command::Del { keys } => {
            println!("{}", redis.del(&keys).await?);
        }
        Command::Hgetall { key } => {
            for (field, value) in redis.hgetall(&key).await? {
                println!("{field}\t{}", String::from_utf8_lossy(&value));
            }
        }
        Command::Hmset { key, pairs } => {
            if pairs.len() % 2 != 0 {
                return Err(StoreError::validation("HMSET expects FIELD VALUE pairs"));
            }
            let pairs: Vec<(&str, &str)> = pairs
                .chunks(2)
                .map(|pair| (pair[0].as_str(), pair[1].as_str()))
                .collect();
            redis.hmset(&key, &pairs).await?;
            println!("OK");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(&cli);

    let config = cli.redis_config()?;
    info!(
        network = %config.network,
        addr = %config.addr,
        database = config.database,
        "Starting redops v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = RedisPool::new(config)?;
    let redis = Redis::new(pool.clone());

    let result = run(&redis, cli.command).await;
    pool.close();

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        return Err(e.into());
    }
    Ok(())
}
