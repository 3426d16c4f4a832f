//! Command-line client for the surge control API.

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "surge-cli")]
#[command(about = "Operate a running surge engine over its control API", long_about = None)]
struct Cli {
    /// Base URL of the control API.
    #[arg(short, long, default_value = "http://localhost:3000", env = "SURGE_URL")]
    url: String,

    /// Bearer key, if the server requires one.
    #[arg(short, long, env = "SURGE_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show run phase, counters and throughput
    Status,
    /// Start a run
    Start {
        /// Successes to reach
        #[arg(short, long)]
        target: i64,
        /// Absolute http(s) URL each unit is sent to
        #[arg(short, long)]
        destination: String,
        #[arg(long)]
        max_concurrency: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Stop the active run
    Stop,
    /// Pause the active run
    Pause,
    /// Resume a paused run
    Resume,
    /// Show the tunables in effect
    Config,
    /// Update tunables; omitted values are left unchanged
    SetConfig {
        #[arg(long)]
        max_concurrency: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        min_delay_ms: Option<u64>,
        #[arg(long)]
        max_delay_ms: Option<u64>,
        #[arg(long)]
        pool_size: Option<usize>,
    },
}

/// JSON object holding only the values that were given.
fn partial(fields: &[(&str, Option<Value>)]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), v)))
        .collect();
    Value::Object(map)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)),
        Commands::Config => client.get(format!("{}/config", base)),
        Commands::Stop => client.post(format!("{}/stop", base)),
        Commands::Pause => client.post(format!("{}/pause", base)),
        Commands::Resume => client.post(format!("{}/resume", base)),
        Commands::Start {
            target,
            destination,
            max_concurrency,
            batch_size,
        } => {
            let overrides = partial(&[
                ("max_concurrency", max_concurrency.map(Value::from)),
                ("batch_size", batch_size.map(Value::from)),
            ]);
            let mut body = json!({ "target": target, "destination": destination });
            if overrides.as_object().is_some_and(|o| !o.is_empty()) {
                body["overrides"] = overrides;
            }
            client.post(format!("{}/start", base)).json(&body)
        }
        Commands::SetConfig {
            max_concurrency,
            batch_size,
            min_delay_ms,
            max_delay_ms,
            pool_size,
        } => {
            let body = partial(&[
                ("max_concurrency", max_concurrency.map(Value::from)),
                ("batch_size", batch_size.map(Value::from)),
                ("min_delay_ms", min_delay_ms.map(Value::from)),
                ("max_delay_ms", max_delay_ms.map(Value::from)),
                ("pool_size", pool_size.map(Value::from)),
            ]);
            client.put(format!("{}/config", base)).json(&body)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
        Ok(())
    } else {
        eprintln!("Error: control API returned status {}", status);
        eprintln!("{}", rendered);
        std::process::exit(1);
    }
}
