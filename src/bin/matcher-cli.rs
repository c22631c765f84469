use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "matcher-cli")]
#[command(about = "Management CLI for the route matcher", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List registered routes and their criteria
    Routes,
    /// Show the adaptive cache order with hit counts
    Cache,
    /// Ask the matcher which route a request resolves to
    Resolve {
        /// Matcher base URL
        #[arg(long, default_value = "http://localhost:8080")]
        target: String,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Path and query, e.g. /users/1?v=2
        path: String,
        /// Extra headers as `Name: value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
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

    let endpoint = match cli.command {
        Commands::Status => "status",
        Commands::Routes => "routes",
        Commands::Cache => "cache",
        Commands::Resolve {
            target,
            method,
            path,
            headers: extra,
        } => {
            let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut request = client.request(method, format!("{}{}", target, path));
            for header in &extra {
                match header.split_once(':') {
                    Some((name, value)) => request = request.header(name.trim(), value.trim()),
                    None => eprintln!("Ignoring malformed header: {}", header),
                }
            }
            let res = request.send().await?;
            println!("HTTP {}", res.status());
            print_body(res).await?;
            return Ok(());
        }
    };

    let res = client
        .get(format!("{}/admin/{}", cli.url, endpoint))
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
    print_body(res).await
}

async fn print_body(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
