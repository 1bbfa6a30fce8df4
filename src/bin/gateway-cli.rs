use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the shortlink gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every backend and print the report
    Health,
    /// Show circuit breakers and recorded backend health
    Status,
    /// Resolve a short code without following the redirect
    Resolve { code: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let client = reqwest::Client::new();
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let client = reqwest::Client::new();
            let res = client.get(format!("{base}/status")).send().await?;
            print_response(res).await?;
        }
        Commands::Resolve { code } => {
            let client = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()?;
            let res = client.get(format!("{base}/r/{code}")).send().await?;
            match res.headers().get(reqwest::header::LOCATION) {
                Some(location) => println!("{code} -> {}", location.to_str()?),
                None => print_response(res).await?,
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
