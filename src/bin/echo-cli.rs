use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::Value;
use std::io::Write;

#[derive(Parser)]
#[command(name = "echo-cli")]
#[command(about = "Client for the HTTP echo server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8088")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show in-flight requests and live remote addresses
    Status,
    /// Add a comma-separated list of integers on the server
    Sum {
        /// e.g. 123,456
        ids: String,
    },
    /// Send an echo request with fault parameters
    Echo {
        /// Query parameter as key=value, e.g. --param sleep=100 --param type=json
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Stream /chunk and print lines as they arrive
    Chunk {
        #[arg(short, long, default_value_t = 5)]
        repeat: usize,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_json(res).await?;
        }
        Commands::Sum { ids } => {
            let res = client
                .get(format!("{}/cal/sum", cli.url))
                .query(&[("ids", ids)])
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Echo { params } => {
            let res = client
                .get(format!("{}/", cli.url))
                .query(&params)
                .send()
                .await?;
            println!("{} {:?}", res.status(), res.headers().get(reqwest::header::CONTENT_TYPE));
            println!("{}", res.text().await?);
        }
        Commands::Chunk { repeat } => {
            let res = client
                .get(format!("{}/chunk", cli.url))
                .query(&[("repeat", repeat)])
                .send()
                .await?;
            let mut stream = res.bytes_stream();
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                stdout.write_all(&chunk?)?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
