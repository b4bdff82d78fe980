use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "connector-cli")]
#[command(about = "Management CLI for the HTTP exchange connector", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "CONNECTOR_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connector status and connection statistics
    Status,
    /// Live connection handlers and request log state
    Handlers,
    /// Start logging raw requests to a file on the connector host
    StartLog {
        path: String,
        /// Entries per file before rotating
        #[arg(short, long, default_value_t = 10_000)]
        count: usize,
    },
    /// Stop logging raw requests
    StopLog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let endpoint = |path: &str| format!("{}{}", cli.url.trim_end_matches('/'), path);
    let res = match cli.command {
        Commands::Status => client.get(endpoint("/admin/status")),
        Commands::Handlers => client.get(endpoint("/admin/handlers")),
        Commands::StartLog { path, count } => client
            .post(endpoint("/admin/request-log"))
            .json(&json!({ "path": path, "count": count })),
        Commands::StopLog => client.delete(endpoint("/admin/request-log")),
    }
    .headers(headers)
    .send()
    .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
