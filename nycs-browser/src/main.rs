//! nycs-browser - NYC schools directory and SAT scores in the terminal
//!
//! One-shot mode (`--query`) fetches, filters once and prints. Otherwise an
//! interactive loop reads stdin: a plain line is a new search query,
//! `:x <dbn>` toggles a school's SAT details, `:r` refetches, `:q` quits.
//!
//! Logs go to stderr so stdout carries only the rendered view.

use anyhow::{Context, Result};
use clap::Parser;
use nycs_browser::logging;
use nycs_browser::presenter::{self, Command, PresenterState};
use nycs_browser::{build_repository, SchoolsViewModel, SearchOptions};
use nycs_common::config::{AppConfig, ConfigResolver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

/// Command-line arguments for nycs-browser
#[derive(Parser, Debug)]
#[command(name = "nycs-browser")]
#[command(about = "Browse NYC schools and their SAT averages")]
#[command(version)]
struct Args {
    /// Config file (default: platform config dir, nycs/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open-data API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Delay before filtering after a query change, in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Also match queries against expanded borough names
    #[arg(long)]
    match_borough_name: bool,

    /// Fetch, filter by this query, print and exit
    #[arg(short, long)]
    query: Option<String>,

    /// With --query, print matches as JSON
    #[arg(long, requires = "query")]
    json: bool,
}

impl Args {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.api.request_timeout_secs = Some(secs);
        }
        if let Some(ms) = self.debounce_ms {
            config.search.debounce_ms = ms;
        }
        if self.match_borough_name {
            config.search.match_borough_name = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Before config, so resolution warnings are not lost
    let logs = logging::init();

    let resolver = match &args.config {
        Some(path) => ConfigResolver::with_path(path),
        None => ConfigResolver::new(),
    };
    let mut config = resolver.resolve().context("Failed to load configuration")?;
    args.apply_to(&mut config);

    logs.apply_level(&config.logging.level)
        .context("Failed to apply configured log level")?;

    info!(
        "Starting nycs-browser v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.api.base_url
    );

    let repository = build_repository(&config);
    let mut view_model = SchoolsViewModel::new(SearchOptions::from(&config.search));

    match &args.query {
        Some(query) => run_once(&mut view_model, repository, query, args.json).await,
        None => run_interactive(&mut view_model, repository).await,
    }
}

async fn run_once(
    view_model: &mut SchoolsViewModel,
    repository: Arc<dyn nycs_browser::SchoolRepository>,
    query: &str,
    json: bool,
) -> Result<()> {
    view_model
        .fetch_data(repository)
        .await
        .context("Fetch task failed")?;

    view_model.on_search_criteria_changed(query);
    view_model.wait_for_filter().await;

    if let Some(banner) = presenter::render_status(&view_model.fetch_status()) {
        eprintln!("{}", banner);
    }

    let view = view_model.filtered_view();
    if json {
        let body = serde_json::to_string_pretty(view.entries())
            .context("Failed to serialize results")?;
        println!("{}", body);
    } else {
        print!("{}", presenter::render_list(&view, &PresenterState::new()));
    }

    Ok(())
}

async fn run_interactive(
    view_model: &mut SchoolsViewModel,
    repository: Arc<dyn nycs_browser::SchoolRepository>,
) -> Result<()> {
    let (presenter_tx, presenter_rx) = watch::channel(PresenterState::new());
    let render_task = tokio::spawn(render_loop(
        view_model.subscribe_loading(),
        view_model.subscribe_filtered(),
        view_model.subscribe_fetch_status(),
        presenter_rx,
    ));

    // Fire and forget; the render task picks up the results
    let _fetch = view_model.fetch_data(Arc::clone(&repository));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match Command::parse(&line) {
            Ok(Command::Search(query)) => view_model.on_search_criteria_changed(query),
            Ok(Command::Toggle(dbn)) => {
                presenter_tx.send_modify(|state| {
                    state.toggle(&dbn);
                });
            }
            Ok(Command::Refresh) => {
                let _fetch = view_model.fetch_data(Arc::clone(&repository));
            }
            Ok(Command::Quit) => break,
            Err(e) => warn!("{}", e),
        }
    }

    render_task.abort();
    Ok(())
}

/// Redraw whenever any published state changes
async fn render_loop(
    mut loading: watch::Receiver<bool>,
    mut filtered: watch::Receiver<Arc<nycs_browser::JoinedView>>,
    mut status: watch::Receiver<nycs_browser::FetchStatus>,
    mut presenter_state: watch::Receiver<PresenterState>,
) {
    loop {
        if *loading.borrow_and_update() {
            println!("{}", presenter::render_loading());
        } else {
            if let Some(banner) = presenter::render_status(&status.borrow_and_update()) {
                println!("{}", banner);
            }
            let view = Arc::clone(&filtered.borrow_and_update());
            print!("{}", presenter::render_list(&view, &presenter_state.borrow_and_update()));
        }

        let changed = tokio::select! {
            r = loading.changed() => r,
            r = filtered.changed() => r,
            r = status.changed() => r,
            r = presenter_state.changed() => r,
        };
        if changed.is_err() {
            break;
        }
    }
}
