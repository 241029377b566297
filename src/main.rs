use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod columns;
mod controller;
mod domain;
mod inputter;
mod model;
mod record;
mod source;
mod ui;
mod view_state;

use controller::Controller;
use domain::{DEFAULT_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_URL, PVConfig, PVError};
use model::{Model, Status};
use source::{FileSource, HttpSource, RecordSource};
use ui::TableUI;

/// Browse a paginated product catalog in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Products endpoint, queried with `limit` and `skip`
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Number of products fetched per batch
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Offset of the first fetched product
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Read products from a local JSON file instead of the endpoint
    #[arg(short, long)]
    file: Option<String>,

    /// Rows per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Log file, defaults to pv.log in the temp directory
    #[arg(long)]
    log_file: Option<String>,

    /// Milliseconds to wait for terminal events per frame
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), PVError> {
    let cfg = build_config(&args)?;
    init_logging(args.log_file.as_deref())?;
    let source = build_source(&args, &cfg)?;
    info!("Starting pv on {}", source.describe());

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, source);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &PVConfig,
    source: Arc<dyn RecordSource>,
) -> Result<(), PVError> {
    let mut model = Model::init(cfg, source);
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Quitting pv");
    Ok(())
}

fn build_config(args: &Args) -> Result<PVConfig, PVError> {
    if args.limit == 0 {
        return Err(PVError::Config("--limit must be at least 1".to_string()));
    }
    if args.page_size == 0 {
        return Err(PVError::Config("--page-size must be at least 1".to_string()));
    }
    Ok(PVConfig::default()
        .url(args.url.clone())
        .limit(args.limit)
        .skip(args.skip)
        .page_size(args.page_size)
        .event_poll_time(args.poll_ms))
}

fn build_source(args: &Args, cfg: &PVConfig) -> Result<Arc<dyn RecordSource>, PVError> {
    match &args.file {
        Some(file) => Ok(Arc::new(FileSource::new(expand_path(file)?))),
        None => Ok(Arc::new(HttpSource::new(cfg.url.clone())?)),
    }
}

fn expand_path(path: &str) -> Result<PathBuf, PVError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| PVError::Config(format!("Can not expand {path}: {e}")))
}

fn init_logging(log_file: Option<&str>) -> Result<(), PVError> {
    let path = match log_file {
        Some(path) => expand_path(path)?,
        None => std::env::temp_dir().join("pv.log"),
    };
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
