use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "sessions-cli")]
#[command(about = "Operator CLI for the edge session service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8787")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a new session and print its id
    Create,
    /// Record an event in a session
    Record {
        /// Session id
        session: String,
        /// Event id; the event timestamp is used as key when omitted
        event: Option<String>,
    },
    /// List the events of a session
    List {
        /// Session id
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Create => {
            let res = client.post(format!("{base}/api/session")).send().await?;
            if let Some(json) = read_json(res).await? {
                match json.get("id").and_then(Value::as_str) {
                    Some(id) => println!("{id}"),
                    None => println!("{}", serde_json::to_string_pretty(&json)?),
                }
            }
        }
        Commands::Record { session, event } => {
            let path = event.map(|id| format!("/{id}")).unwrap_or_else(|| "/".to_string());
            let res = client
                .post(format!("{base}/api/session/{session}{path}"))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::List { session } => {
            let res = client
                .get(format!("{base}/api/session/{session}/"))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        return Ok(None);
    }

    Ok(Some(res.json().await?))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(json) = read_json(res).await? {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
