mod ai;
mod app;
mod config;
mod congress;
mod db;
mod error;
mod models;
mod services;
mod sync;

use app::App;
use config::Config;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (informational by default; headless tool, so
    // everything goes to stderr)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = match args.get(1).map(String::as_str) {
        None => {
            print_usage();
            std::process::exit(2);
        }
        Some("--help" | "-h" | "help") => {
            print_usage();
            return Ok(());
        }
        Some(command) => command,
    };

    // Load configuration
    let config = Config::load()?;
    let app = App::new(config).await?;

    run_command(&app, command).await
}

async fn run_command(app: &App, command: &str) -> Result<()> {
    match command {
        "sync" => {
            let report = app.sync_recent().await?;
            println!(
                "Synced {} bills: {} new, {} updated, {} unchanged",
                report.processed(),
                report.inserted,
                report.updated,
                report.unchanged
            );
        }
        "baseline" => {
            let report = app.sync_baseline().await?;
            println!(
                "Baseline walked {} bills: {} new, {} updated, {} unchanged",
                report.processed(),
                report.inserted,
                report.updated,
                report.unchanged
            );
        }
        "actions" => {
            let synced = app.sync_actions().await?;
            println!("Synced action histories for {} bills", synced);
        }
        "texts" => {
            let refreshed = app.refresh_text_urls().await?;
            println!("Refreshed text records for {} bills", refreshed);
        }
        "cache" => {
            let report = app.refresh_text_cache().await?;
            println!(
                "Cached {} documents, removed {} superseded files",
                report.fetched, report.replaced
            );
        }
        "sweep" => {
            let removed = app.sweep_cache().await?;
            println!("Removed {} orphaned cache files", removed);
        }
        "classify" => {
            let classified = app.classify_pending().await?;
            println!("Classified {} bills", classified);
        }
        "summarize" => {
            let summarized = app.summarize_updated().await?;
            println!("Summarized {} bills", summarized);
        }
        "cycle" => {
            app.run_cycle().await?;
        }
        unknown => {
            eprintln!("Unknown command: {}", unknown);
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: billwatch <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sync       Sync bills updated within the recent window");
    eprintln!("  baseline   Full sync of the configured congress");
    eprintln!("  actions    Fetch action histories for pending bills");
    eprintln!("  texts      Refresh text-version URLs for acted-on bills");
    eprintln!("  cache      Download updated bill text documents");
    eprintln!("  sweep      Remove cache files with no text record");
    eprintln!("  classify   Assign importance labels to unlabeled bills");
    eprintln!("  summarize  Summarize bills whose text moved");
    eprintln!("  cycle      Run every stage in order");
}
