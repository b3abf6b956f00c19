use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    /// Base URL of the rollcalld HTTP API
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face image under a name
    Register {
        /// Image file (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,
        /// Name to register; omit to let the daemon auto-assign one
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Mark attendance with a probe image
    Mark {
        /// Image file (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Print the attendance log
    Attendance,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Register { image, name } => {
            let body = json!({ "image_base64": encode_image(&image)?, "name": name });
            let resp = post_json(&client, &cli.server, "/register", &body).await?;
            println!("{}", field(&resp, "message")?);
        }
        Commands::Mark { image } => {
            let body = json!({ "image_base64": encode_image(&image)? });
            let resp = post_json(&client, &cli.server, "/mark", &body).await?;
            println!(
                "{} marked present at {}",
                field(&resp, "name")?,
                field(&resp, "time")?
            );
        }
        Commands::Attendance => {
            let resp = get_json(&client, &cli.server, "/attendance").await?;
            let records = resp
                .get("records")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if records.is_empty() {
                println!("No attendance records");
            }
            for record in &records {
                println!(
                    "{}  {}",
                    record.get("time").and_then(Value::as_str).unwrap_or("-"),
                    record.get("name").and_then(Value::as_str).unwrap_or("-"),
                );
            }
        }
        Commands::Status => {
            let resp = get_json(&client, &cli.server, "/health").await?;
            println!("rollcalld {}", field(&resp, "version")?);
            println!("encoder:            {}", field(&resp, "encoder")?);
            println!("store mode:         {}", field(&resp, "store_mode")?);
            println!(
                "registered faces:   {}",
                resp.get("registered").and_then(Value::as_u64).unwrap_or(0)
            );
            println!(
                "attendance records: {}",
                resp.get("records").and_then(Value::as_u64).unwrap_or(0)
            );
        }
    }

    Ok(())
}

fn encode_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

async fn post_json(
    client: &reqwest::Client,
    server: &str,
    path: &str,
    body: &Value,
) -> Result<Value> {
    let url = format!("{}{}", server.trim_end_matches('/'), path);
    let resp: Value = client
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .json()
        .await
        .context("parsing response body")?;
    ensure_ok(resp)
}

async fn get_json(client: &reqwest::Client, server: &str, path: &str) -> Result<Value> {
    let url = format!("{}{}", server.trim_end_matches('/'), path);
    let resp: Value = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .json()
        .await
        .context("parsing response body")?;
    ensure_ok(resp)
}

/// The daemon reports failures as `{"status": "error", "message": ...}`
/// with HTTP 200, so the body is the source of truth.
fn ensure_ok(resp: Value) -> Result<Value> {
    if resp.get("status").and_then(Value::as_str) == Some("error") {
        let message = resp
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        anyhow::bail!("{message}");
    }
    Ok(resp)
}

fn field<'a>(resp: &'a Value, key: &str) -> Result<&'a str> {
    resp.get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing '{key}' in response"))
}
