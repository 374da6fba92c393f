mod cli;
mod logging;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;
use wpmigrate_engine::{load_feed, DownloadCoordinator, MigrationReport, Migrator};
use wpmigrate_logging::{level_for, migrate_error, migrate_info, migrate_warn};

use crate::cli::Cli;

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(level_for(cli.verbose, cli.quiet), cli.log_file.as_deref());

    match run(&cli) {
        Ok(report) => {
            if report.has_failures() {
                report_failures(&report);
                if cli.strict {
                    return ExitCode::from(EXIT_PARTIAL);
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            migrate_error!("{err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<MigrationReport> {
    let config = cli.migration_config();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    runtime.block_on(async {
        let feed = load_feed(&cli.feed, &config.download.fetch)
            .await
            .with_context(|| format!("cannot load feed {}", cli.feed))?;
        migrate_info!("feed {:?}: {} items", feed.title, feed.posts.len());

        let coordinator = DownloadCoordinator::with_http(Handle::current(), &config.download)
            .context("cannot build HTTP client")?;
        let migrator = Migrator::new(config, coordinator);
        migrator
            .prepare()
            .context("cannot prepare output directories")?;
        Ok(migrator.run(&feed.posts).await)
    })
}

fn report_failures(report: &MigrationReport) {
    for post in &report.failed_posts {
        migrate_warn!("failed post #{}: {} ({})", post.index, post.link, post.reason);
    }
    for download in &report.downloads.failed {
        migrate_warn!(
            "failed download: {} -> {} after {} attempt(s): {}",
            download.url,
            download.destination.display(),
            download.attempts,
            download.reason
        );
    }
}
