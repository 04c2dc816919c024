use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use ingress_resolver::config::ResolverConfig;
use ingress_resolver::resolver::Resolver;
use ingress_resolver::store::load_snapshot;

#[derive(Parser)]
#[command(name = "ingress-cli")]
#[command(about = "Management CLI for the ingress route resolver", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key, if the server requires one
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show fragment status, for all fragments or one
    Status {
        namespace: Option<String>,
        name: Option<String>,
    },
    /// Show resolved route tables, for all virtual hosts or one
    Routes { fqdn: Option<String> },
    /// Ask the engine how it would route a request
    Dispatch {
        host: String,
        #[arg(default_value = "/")]
        path: String,
        /// TLS server name; omit for a plaintext request
        #[arg(long)]
        sni: Option<String>,
        /// Request header as name=value, repeatable
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
    /// Report an active health probe result for a route
    Probe {
        route_id: String,
        #[arg(long)]
        unhealthy: bool,
    },
    /// Resolve a snapshot file locally and print the result
    Check {
        snapshot: PathBuf,
        /// Namespaces allowed to declare roots (repeatable)
        #[arg(long = "root-namespace")]
        root_namespaces: Vec<String>,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Status {
            namespace: Some(namespace),
            name: Some(name),
        } => client.get(format!("{}/api/status/{}/{}", cli.url, namespace, name)),
        Commands::Status { .. } => client.get(format!("{}/api/status", cli.url)),
        Commands::Routes { fqdn: Some(fqdn) } => {
            client.get(format!("{}/api/routes/{}", cli.url, fqdn))
        }
        Commands::Routes { fqdn: None } => client.get(format!("{}/api/routes", cli.url)),
        Commands::Dispatch {
            host,
            path,
            sni,
            headers,
        } => client.post(format!("{}/api/dispatch", cli.url)).json(&json!({
            "host": host,
            "path": path,
            "sni": sni,
            "headers": headers.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
        })),
        Commands::Probe {
            route_id,
            unhealthy,
        } => client.post(format!("{}/api/probes", cli.url)).json(&json!({
            "route_id": route_id,
            "healthy": !unhealthy,
        })),
        Commands::Check {
            snapshot,
            root_namespaces,
        } => return check(&snapshot, root_namespaces),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

/// Resolve a snapshot file without a running server.
fn check(path: &Path, root_namespaces: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = load_snapshot(path)?;
    let resolver = Resolver::new(&ResolverConfig {
        root_namespaces,
        snapshot_path: None,
    });
    let resolution = resolver.resolve(&snapshot);
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED {
        eprintln!("Error: Admin API rejected the API key");
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Status: {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: Admin API returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
