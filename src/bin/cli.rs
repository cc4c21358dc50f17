//! Telemetry Hub CLI
//!
//! Command-line client for a running telemetry hub:
//! - Check health
//! - List signals
//! - Query recent history
//! - Send a batch

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "telemetry-hub-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the telemetry hub HTTP API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:5000", global = true)]
    pub api_url: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the server is up
    Health,

    /// List every signal name ever ingested
    Signals,

    /// Show recent history of every signal
    Query {
        /// Lookback in hours, fractional allowed
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
    },

    /// Send one batch of signal values
    Send {
        /// Sample time, ISO 8601 (default: now)
        #[arg(short, long)]
        time: Option<String>,

        /// Values in name=value format
        #[arg(required = true)]
        signals: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.api_url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let response = client
                .get(format!("{}/health", base))
                .send()
                .await
                .with_context(|| format!("cannot connect to telemetry hub at {}", base))?;
            let body = expect_success(response).await?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Table => println!(
                    "API Status: {}",
                    body["status"].as_str().unwrap_or("unknown")
                ),
            }
        }

        Commands::Signals => {
            let response = client.get(format!("{}/api/signals", base)).send().await?;
            let body = expect_success(response).await?;
            let names: Vec<String> = serde_json::from_value(body.clone())?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Table if names.is_empty() => println!("No signals recorded yet."),
                OutputFormat::Table => {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
        }

        Commands::Query { hours } => {
            let response = client
                .get(format!("{}/api/telemetry", base))
                .query(&[("hours", hours)])
                .send()
                .await?;
            let body = expect_success(response).await?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
                OutputFormat::Table => print_table(&body),
            }
        }

        Commands::Send { time, signals } => {
            let timestamp = match time.as_deref() {
                None | Some("now") => Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                Some(s) => s.to_string(),
            };
            let signals = parse_signals(&signals)?;
            let count = signals.len();

            let body = serde_json::json!({
                "timestamp": timestamp,
                "signals": signals,
            });

            let response = client
                .post(format!("{}/api/telemetry", base))
                .json(&body)
                .send()
                .await?;
            let reply = expect_success(response).await?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
                OutputFormat::Table => println!("Sent {} signal(s) at {}", count, timestamp),
            }
        }
    }

    Ok(())
}

/// Body of a 2xx response, or the server's error message
async fn expect_success(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    anyhow::bail!("request failed ({}): {}", status, message)
}

fn parse_signals(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut signals = Map::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("expected name=value, got '{}'", pair))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("value for '{}' is not a number", name))?;
        signals.insert(name.trim().to_string(), Value::from(value));
    }
    Ok(signals)
}

fn print_table(data: &Value) {
    let series = match data.as_object() {
        Some(s) if !s.is_empty() => s,
        _ => {
            println!("No data for the selected time range");
            return;
        }
    };

    println!(
        "{:<24} | {:>7} | {:<27} | {:>12}",
        "Signal", "Points", "Latest", "Value"
    );
    println!("{}", "-".repeat(80));

    for (name, points) in series {
        let points = points.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let (latest, value) = match points.last() {
            Some(p) => (
                p["timestamp"]
                    .as_str()
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S%.3f").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                p["value"]
                    .as_f64()
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        println!(
            "{:<24} | {:>7} | {:<27} | {:>12}",
            name,
            points.len(),
            latest,
            value
        );
    }
}
