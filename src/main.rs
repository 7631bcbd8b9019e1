mod changelist;
mod client;
mod config;
mod cookies;
mod dashboard;
mod draft_message;
mod drafts;
mod error;
mod fragment;
mod geometry;
mod hooks;
mod inline;
mod keys;
mod page;
mod parser;
mod skipped;
mod syntax;
mod table;
mod types;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::client::{parse_issue_ref, ReqwestClient};
use crate::config::{normalize_base_url, Config};
use crate::cookies::{cookie_file_path, CookieJar};
use crate::ui::App;

#[derive(Parser)]
#[command(name = "veld")]
#[command(about = "A keyboard-driven TUI for Rietveld code review servers")]
#[command(version)]
struct Args {
    /// Issue number or URL (e.g., https://codereview.example.org/1234/ or
    /// .../1234/diff/1/2). Without one, shows the dashboard.
    issue: Option<String>,

    /// Server root, overriding the config file
    #[arg(long)]
    server: Option<String>,

    /// XSRF token sent with every POST
    #[arg(long)]
    xsrf_token: Option<String>,
}

/// Log to ~/.config/veld/veld.log; the terminal belongs to the UI
fn init_logging() {
    let Some(dir) = Config::config_dir() else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("veld.log"))
    else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = Config::load().context("failed to load config")?;
    if let Some(server) = &args.server {
        config.server.base_url = normalize_base_url(server);
    }
    if let Some(token) = args.xsrf_token {
        config.server.xsrf_token = token;
    }

    let location = args
        .issue
        .as_deref()
        .map(parse_issue_ref)
        .transpose()
        .context("invalid issue")?;
    if let Some(base) = location.as_ref().and_then(|l| l.base_url.clone()) {
        // A full URL names its server unless --server says otherwise
        if args.server.is_none() {
            config.server.base_url = base;
        }
    }

    let client = ReqwestClient::new(&config).context("failed to set up the HTTP client")?;
    let jar = match cookie_file_path() {
        Some(path) => CookieJar::load(path),
        None => CookieJar::in_memory(),
    };
    info!(
        server = %config.server.base_url,
        cookies = ?jar.path(),
        "starting veld"
    );

    let mut app = App::new(config, Arc::new(client), jar);
    match location {
        Some(location) => app.open_issue(location.issue, location.patch),
        None => app.open_dashboard(),
    }
    let result = app.run();
    app.unload().await;
    result
}
