use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use dynamic_gateway::routing::{decode_routes, RouteDefinition};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the dynamic gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and route table status
    Status,
    /// List the live routes
    Routes,
    /// Add or overwrite one route from a JSON file
    Add { file: PathBuf },
    /// Replace every route with the JSON array in a file
    Replace { file: PathBuf },
    /// Delete all routes
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let routes_url = format!("{}/admin/routes", cli.url);

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)).send().await?,
        Commands::Routes => client.get(&routes_url).send().await?,
        Commands::Add { file } => {
            let definition: RouteDefinition = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            client.post(&routes_url).json(&definition).send().await?
        }
        Commands::Replace { file } => {
            let payload = std::fs::read_to_string(file)?;
            // Fail locally on payloads the gateway would discard
            decode_routes(&payload)?;
            client.put(&routes_url).body(payload).send().await?
        }
        Commands::Clear => client.delete(&routes_url).send().await?,
    };

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
