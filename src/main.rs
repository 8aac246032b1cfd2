//! Tracker daemon.
//!
//! Loads configuration, starts the monitor endpoint, then runs one
//! reconciliation pass every twelve hours. A debug run performs one pass
//! with all mutations and email suppressed, then exits.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use horizontal_tracker::config::TrackerConfig;
use horizontal_tracker::error::Result;
use horizontal_tracker::feeds::{self, HorizontalLabels};
use horizontal_tracker::github::{GithubApi, RestClient};
use horizontal_tracker::monitor::{serve_monitor, RunLog};
use horizontal_tracker::reconcile::{run_pass, PassOptions, PassStats};
use horizontal_tracker::report;

#[derive(Debug, Parser)]
#[command(name = "horizontal-tracker", about = "Horizontal review issue tracker")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "tracker.toml")]
    config: String,

    /// Debug mode: one pass, no mutations, no email.
    #[arg(long)]
    debug: bool,

    /// Run one pass and exit, mutations included.
    #[arg(long)]
    once: bool,
}

async fn one_pass(
    api: &Arc<dyn GithubApi>,
    http: &reqwest::Client,
    cfg: &TrackerConfig,
    log: &RunLog,
) -> Result<PassStats> {
    // both feeds are fetched fresh each pass
    let official = HorizontalLabels::fetch(http).await?;
    let tracked = feeds::tracked(http, api, log).await?;
    let opts = PassOptions {
        horizontal_ttl: cfg.horizontal_ttl(),
    };
    run_pass(api.clone(), &official, &tracked, &opts, log).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut cfg = TrackerConfig::load_from(Some(&cli.config))?;
    cfg.debug = cfg.debug || cli.debug;
    cfg.announce();

    let log = Arc::new(RunLog::new());
    let api: Arc<dyn GithubApi> = Arc::new(RestClient::new(&cfg, log.clone())?);
    let http = reqwest::Client::new();

    {
        let addr = cfg.monitor_addr.clone();
        let log = log.clone();
        let api = api.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_monitor(addr, log, api).await {
                tracing::error!("monitor endpoint failed: {err}");
            }
        });
    }

    let mut interval = tokio::time::interval(cfg.pass_interval());
    loop {
        interval.tick().await;

        match one_pass(&api, &http, &cfg, &log).await {
            Ok(stats) => {
                log.log(format!(
                    "we're done and it seems nothing broke: {} horizontal issues, {} spec issues",
                    stats.horizontal_issues, stats.spec_issues_total
                ));
            }
            Err(err) => {
                log.error(format!("something went wrong: {err}"));
            }
        }

        if !cfg.debug {
            if let Some(email) = &cfg.email {
                if let Err(err) = report::send_report(email, &log.lines()).await {
                    tracing::error!("could not send the report: {err}");
                    let _ = report::send_error_notice(email, &err.to_string()).await;
                }
            }
        }

        if cfg.debug || cli.once {
            break;
        }
    }
    Ok(())
}
