//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ViewerConfig;
use crate::data::scheduler::ResponseOrdering;
use crate::data::view::BitmapType;
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(
    name = "activity-viewer",
    about = "Desktop viewer for IP activity bitmaps",
    version
)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides `backend.base_url`).
    #[arg(long)]
    pub backend: Option<String>,

    /// Bitmap shown at start-up: s, d or sd.
    #[arg(long)]
    pub bitmap: Option<BitmapType>,

    /// Pixels per cell requested from the backend.
    #[arg(long)]
    pub scale: Option<u32>,

    /// Log filter directive (overrides `logging.filter`; `RUST_LOG` still wins).
    #[arg(long)]
    pub log: Option<String>,

    /// Apply responses in arrival order instead of dropping stale ones.
    #[arg(long)]
    pub arrival_order: bool,

    /// Print the effective configuration as YAML and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Load the configuration file (if any) and apply the flags on top of it.
    pub fn resolve_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(url) = &self.backend {
            config.backend.base_url = url.clone();
        }
        if let Some(bitmap_type) = self.bitmap {
            config.bitmap.bitmap_type = bitmap_type;
        }
        if let Some(scale) = self.scale {
            config.bitmap.scale = scale;
        }
        if let Some(filter) = &self.log {
            config.logging.filter = filter.clone();
        }
        if self.arrival_order {
            config.interaction.response_ordering = ResponseOrdering::ArrivalOrder;
        }
    }
}

pub fn run_from_env() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }
    crate::logging::init(&config.logging.filter);
    crate::app::run_viewer(config)
}
