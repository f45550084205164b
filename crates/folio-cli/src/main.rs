use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "A CLI for drafting, approving and publishing content")]
struct Cli {
    /// Base URL for the Folio service
    #[arg(long, default_value = "http://localhost:26400")]
    service_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a draft for a URL in a collection
    Add {
        collection: String,
        /// Path the content will be published at
        url: String,
        #[arg(long, default_value = "")]
        content_type: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Show the in-progress draft for a URL
    Get { collection: String, url: String },
    /// Approve the in-progress draft for a URL
    Approve {
        collection: String,
        url: String,
        /// RFC 3339 timestamp to publish at (defaults to now)
        #[arg(long)]
        publish_date: Option<DateTime<Utc>>,
    },
    /// Show the currently published content for a URL
    Published { url: String },
    /// Show when the next approved version of a URL goes live
    NextPublish { url: String },
    /// Draft and approve every URL listed in a file, one per line
    Seed {
        file: PathBuf,
        #[arg(long, default_value = "seed")]
        collection: String,
        #[arg(long, default_value = "")]
        content_type: String,
        #[arg(long, default_value = "")]
        content: String,
    },
}

#[derive(Serialize)]
struct NewDraft<'a> {
    content_type: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct PatchOperation {
    op: &'static str,
    path: &'static str,
    value: Value,
}

struct FolioClient {
    client: Client,
    base: Url,
}

impl FolioClient {
    fn new(service_url: &str) -> Result<Self> {
        let base = Url::parse(service_url)
            .with_context(|| format!("invalid service URL '{service_url}'"))?;
        if base.cannot_be_a_base() {
            bail!("service URL '{service_url}' cannot have paths appended");
        }

        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    /// Appends `prefix` and then each segment of the content path,
    /// percent-encoding the segments individually. The root page adds no
    /// segments.
    fn endpoint(&self, prefix: &[&str], content_url: &str) -> Url {
        let mut endpoint = self.base.clone();
        if let Ok(mut segments) = endpoint.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1"])
                .extend(prefix)
                .extend(content_url.split('/').filter(|segment| !segment.is_empty()));
        }
        endpoint
    }

    async fn add(
        &self,
        collection: &str,
        url: &str,
        content_type: &str,
        content: &str,
    ) -> Result<Value> {
        let endpoint = self.endpoint(&["collections", collection, "content"], url);
        let response = self
            .client
            .post(endpoint)
            .json(&NewDraft {
                content_type,
                content,
            })
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn get(&self, collection: &str, url: &str) -> Result<Value> {
        let endpoint = self.endpoint(&["collections", collection, "content"], url);
        let response = self.client.get(endpoint).send().await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn approve(&self, collection: &str, url: &str, publish_date: DateTime<Utc>) -> Result<()> {
        let endpoint = self.endpoint(&["collections", collection, "content"], url);
        let patches = [
            PatchOperation {
                op: "replace",
                path: "approved",
                value: json!(true),
            },
            PatchOperation {
                op: "replace",
                path: "publish_date",
                value: json!(publish_date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            },
        ];
        let response = self.client.patch(endpoint).json(&patches).send().await?;

        expect_success(response).await?;
        Ok(())
    }

    async fn published(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.endpoint(&["content"], url))
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn next_publish(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.endpoint(&["publish-dates"], url))
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    bail!("request failed with {status}: {message}")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let folio = FolioClient::new(&cli.service_url)?;

    match cli.command {
        Commands::Add {
            collection,
            url,
            content_type,
            content,
        } => {
            let item = folio.add(&collection, &url, &content_type, &content).await?;
            println!("Draft created with ID: {}", item["id"].as_str().unwrap_or("?"));
        }
        Commands::Get { collection, url } => print_json(&folio.get(&collection, &url).await?)?,
        Commands::Approve {
            collection,
            url,
            publish_date,
        } => {
            let publish_date = publish_date.unwrap_or_else(Utc::now);
            folio.approve(&collection, &url, publish_date).await?;
            println!("Approved {url} for publishing at {}", publish_date.to_rfc3339());
        }
        Commands::Published { url } => print_json(&folio.published(&url).await?)?,
        Commands::NextPublish { url } => print_json(&folio.next_publish(&url).await?)?,
        Commands::Seed {
            file,
            collection,
            content_type,
            content,
        } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            seed(&folio, &contents, &collection, &content_type, &content).await;
        }
    }

    Ok(())
}

async fn seed(folio: &FolioClient, urls: &str, collection: &str, content_type: &str, content: &str) {
    let mut published = 0;
    let mut failed = 0;

    for url in urls.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let result = async {
            folio.add(collection, url, content_type, content).await?;
            folio.approve(collection, url, Utc::now()).await
        }
        .await;

        match result {
            Ok(()) => published += 1,
            Err(err) => {
                failed += 1;
                eprintln!("Failed to seed {url}: {err:#}");
            }
        }
    }

    println!("Seeded {published} URLs ({failed} failed)");
}
