use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "reputation-cli")]
#[command(about = "Command-line client for the reputation gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Caller identity sent in the client header.
    #[arg(long)]
    client_id: Option<String>,

    #[arg(long, default_value = "x-client-id")]
    client_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the reputation of a URL
    Check {
        /// Absolute http(s) URL to assess
        target: String,
    },
    /// Show gateway health and cache statistics
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(id) = &cli.client_id {
        headers.insert(
            HeaderName::from_bytes(cli.client_header.as_bytes())?,
            HeaderValue::from_str(id)?,
        );
    }

    match cli.command {
        Commands::Check { target } => {
            let res = client
                .post(format!("{}/api/v1/check", cli.url))
                .headers(headers)
                .json(&json!({ "url": target }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client
                .get(format!("{}/health", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let retry_after = res
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let json: Value = res.json().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Some(secs) = retry_after {
            eprintln!("Retry after: {}s", secs);
        }
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
