use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use stock_dashboard::Result;
use stock_dashboard::catalog::Catalog;
use stock_dashboard::display::{Dashboard, Layout, TerminalSink};
use stock_dashboard::logging::LoggingConfig;
use stock_dashboard::monitor::{HttpProbe, Monitor};
use stock_dashboard::status::StatusReporter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Draw the dashboard and poll every enabled product
    Watch {
        /// Path to a catalog TOML
        catalog: PathBuf,
        /// Poll each product once, then exit
        #[arg(long)]
        once: bool,
        /// Stop polling after this many seconds
        #[arg(long)]
        stop_after: Option<u64>,
    },
    /// Print the planned dashboard rows without drawing them
    Layout {
        /// Path to a catalog TOML
        catalog: PathBuf,
    },
    /// Print the fully-resolved catalog TOML (after imports/extends)
    Resolve {
        /// Path to a catalog TOML
        catalog: PathBuf,
    },
}

fn main() -> Result<()> {
    // A missing .env is fine.
    dotenv::dotenv().ok();

    let args = Args::parse();
    match args.cmd {
        Command::Watch {
            catalog,
            once,
            stop_after,
        } => cmd_watch(&catalog, once, stop_after),
        Command::Layout { catalog } => cmd_layout(&catalog),
        Command::Resolve { catalog } => cmd_resolve(&catalog),
    }
}

fn cmd_watch(path: &Path, once: bool, stop_after: Option<u64>) -> Result<()> {
    let doc = stock_dashboard::config::load(path)?;
    stock_dashboard::logging::init(&LoggingConfig::from_doc(&doc)?)?;
    let catalog = Catalog::from_doc(&doc)?;
    let products = catalog.products();
    tracing::info!(catalog = %path.display(), products = products.len(), "starting watch");

    let dashboard = Arc::new(Dashboard::new(Arc::new(TerminalSink::stdout())));
    dashboard.initialize(&products)?;

    let reporter = StatusReporter::new(Arc::clone(&dashboard));
    let probe = Arc::new(HttpProbe::new(&catalog.settings)?);
    let monitor = Monitor::new(products, catalog.settings.clone(), reporter, probe);
    if let Some(secs) = stop_after {
        let cancel = monitor.cancel_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            tracing::info!(secs, "stop-after elapsed; stopping monitor");
            cancel.store(true, Ordering::Relaxed);
        });
    }
    monitor.run(once)
}

fn cmd_layout(path: &Path) -> Result<()> {
    let doc = stock_dashboard::config::load(path)?;
    let catalog = Catalog::from_doc(&doc)?;
    let layout = Layout::plan(&catalog.products())?;
    for row in &layout.rows {
        println!("{:>3}. {}", row.row, row.text);
    }
    Ok(())
}

fn cmd_resolve(path: &Path) -> Result<()> {
    let doc = stock_dashboard::config::load(path)?;
    // Best-effort pretty print of the resolved catalog.
    let s = toml::to_string_pretty(&doc.value).unwrap_or_else(|_| format!("{:?}", doc.value));
    print!("{s}");
    Ok(())
}
