use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use wpmigrate_engine::{MigrationConfig, PostZone, DEFAULT_CONCURRENCY, DEFAULT_TIME_ZONE};

/// Migrates a WordPress RSS export into Hugo content with locally hosted media.
#[derive(Parser, Debug)]
#[command(name = "wpmigrate", version)]
pub struct Cli {
    /// Feed URL or path to a saved feed file
    #[arg(long)]
    pub feed: String,

    /// Directory for the generated Markdown posts
    #[arg(long, default_value = "content/posts")]
    pub out: PathBuf,

    /// Static root holding the images, galleries and videos areas
    #[arg(long = "static", default_value = "static")]
    pub static_root: PathBuf,

    /// Migrate only the first N posts (0 = all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Maximum number of simultaneous media downloads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// IANA time zone for front-matter dates, e.g. Europe/Berlin
    #[arg(long, default_value = DEFAULT_TIME_ZONE)]
    pub tz: String,

    /// Keep existing output instead of emptying it first
    #[arg(long)]
    pub no_clean: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Exit with status 2 if any post or download failed
    #[arg(long)]
    pub strict: bool,

    /// Log debug details
    #[arg(short, long)]
    pub verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn migration_config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::new(&self.out, &self.static_root);
        config.limit = self.limit;
        config.clean = !self.no_clean;
        config.timezone = PostZone::from_name(&self.tz);
        config.download.concurrency = self.concurrency.max(1);
        if let Some(secs) = self.timeout {
            config.download.fetch.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}
