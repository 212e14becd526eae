//! Management CLI for the item gateway.
//!
//! Log in first, then pass the returned token to the other commands:
//!
//! ```text
//! gateway-cli login --username admin --password secret
//! gateway-cli --token <jwt> list
//! gateway-cli --token <jwt> create --name "widget"
//! ```

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the item gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Bearer token from a previous login.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a bearer token
    Login {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Gateway, backend, and breaker health
    Health,
    /// List all items
    List,
    /// Fetch one item by id
    Get { id: i64 },
    /// Create an item; omit --id to let the backend assign one
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<i64>,
    },
    /// Force the circuit breaker back to closed
    ResetBreaker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    match cli.command {
        Commands::Login { username, password } => {
            let res = client
                .post(format!("{}/auth", cli.url))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::List => {
            let res = client
                .get(format!("{}/items", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Get { id } => {
            let res = client
                .get(format!("{}/items/{}", cli.url, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Create { name, id } => {
            let mut body = json!({ "name": name });
            if let Some(id) = id {
                body["id"] = json!(id);
            }
            let res = client
                .post(format!("{}/items", cli.url))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ResetBreaker => {
            let res = client
                .post(format!("{}/reset-breaker", cli.url))
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
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
