//! Admin CLI.
//!
//! `hrt labels [REPOS...]` checks every tracked specification repository for
//! the official horizontal labels (renaming, creating, or updating as
//! needed) and for the horizontal-admin team. `hrt snapshot` rebuilds the
//! shortname → specification snapshot and publishes it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use horizontal_tracker::config::TrackerConfig;
use horizontal_tracker::feeds::{label_repairs, HorizontalLabels, LabelRepair, HR_REPOS_URL};
use horizontal_tracker::github::{GithubApi, RepoArena, RestClient};
use horizontal_tracker::monitor::RunLog;
use horizontal_tracker::snapshot;

/// Repositories always included on top of the published list.
const EXTRA_LABEL_REPOS: [&str; 1] = ["w3c/note-respec-repo-template"];

/// Team expected on every tracked repository.
const ADMIN_TEAM: &str = "horizontal-admin";

#[derive(Debug, Parser)]
#[command(name = "hrt", about = "Horizontal tracker admin tool")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "tracker.toml")]
    config: String,

    /// Log mutations without performing them.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Repair official horizontal labels and the admin team on spec repos.
    Labels {
        /// Repositories to process; defaults to the published list.
        repos: Vec<String>,
    },
    /// Rebuild and publish the shortname snapshot.
    Snapshot {
        /// Read the W3C specification list from a file instead of the API.
        #[arg(long)]
        specs: Option<PathBuf>,
    },
}

async fn label_command(
    api: &Arc<dyn GithubApi>,
    http: &reqwest::Client,
    log: &RunLog,
    repos: Vec<String>,
) -> Result<()> {
    let official = HorizontalLabels::fetch(http).await?;
    let arena = RepoArena::new(api.clone());

    let repos = if repos.is_empty() {
        let mut published: Vec<String> = http
            .get(HR_REPOS_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        published.extend(EXTRA_LABEL_REPOS.iter().map(|s| s.to_string()));
        published
    } else {
        log.log(format!("process new repositories: {}", repos.join(",")));
        repos
    };

    for name in &repos {
        let handle = arena.repo(name);
        let groups = match api.repo_config(handle.full_name()).await {
            Ok(Some(cfg)) => cfg.group,
            Ok(None) => Vec::new(),
            Err(err) => {
                log.error(format!("{name}: can't read w3c.json: {err}"));
                Vec::new()
            }
        };
        let existing = match handle.labels(Some(-1)).await {
            Ok(existing) => existing,
            Err(err) => {
                log.error(format!("{name}: can't list labels: {err}"));
                continue;
            }
        };

        let repairs = label_repairs(official.labels(), &existing, &groups);
        if !repairs.is_empty() {
            log.log(format!("adding horizontal labels for {name}"));
        }
        for repair in repairs {
            let outcome = match &repair {
                LabelRepair::Rename { oldname, label } => {
                    handle.rename_label(oldname, label).await
                }
                LabelRepair::Create(label) => handle.ensure_label(label).await.map(|_| ()),
                LabelRepair::Update(label) => handle.update_label(label).await,
            };
            if let Err(err) = outcome {
                log.error(format!("{name}: can't set proper labels: {err}"));
            }
        }

        match api.teams(handle.full_name()).await {
            Ok(teams) => match teams.iter().find(|t| t.name == ADMIN_TEAM) {
                None => {
                    if let Err(err) = api.grant_team(handle.full_name(), ADMIN_TEAM, "triage").await
                    {
                        log.error(format!("{name}: can't set {ADMIN_TEAM} team: {err}"));
                    }
                }
                Some(team) if team.permission != "pull" => {
                    log.warn(format!("{name}: triage team has {} ?", team.permission));
                }
                Some(_) => {}
            },
            Err(err) => {
                log.error(format!("{name}: can't list teams: {err}"));
            }
        }
    }

    println!(
        "{} {} repositories checked, {} warnings, {} errors",
        "done:".green().bold(),
        repos.len(),
        log.warning_count(),
        log.error_count()
    );
    Ok(())
}

async fn snapshot_command(
    api: &Arc<dyn GithubApi>,
    http: &reqwest::Client,
    cfg: &TrackerConfig,
    log: &RunLog,
    specs_file: Option<PathBuf>,
) -> Result<()> {
    let official = HorizontalLabels::fetch(http).await?;
    let arena = RepoArena::new(api.clone());

    // every s: label across the horizontal repositories
    let mut collected = Vec::new();
    for repo in official.repositories() {
        let handle = arena.repo(&repo.full_name);
        let labels = handle
            .labels(Some(-1))
            .await
            .with_context(|| format!("listing labels of {}", repo.full_name))?;
        for label in labels.into_iter().filter(|l| l.is_shortname()) {
            collected.push((repo.full_name.clone(), label));
        }
    }
    let records = snapshot::reconcile_labels(collected, log);

    let specs: Vec<serde_json::Value> = match specs_file {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => {
            let key = cfg
                .w3c_api_key
                .as_deref()
                .context("w3c_api_key is required to query the W3C API")?;
            snapshot::fetch_specifications(http, key).await?
        }
    };

    let (map, fixes) = snapshot::build_snapshot(&records, &specs, log);
    for fix in fixes {
        let handle = arena.repo(&fix.repo);
        match handle.update_label(&fix.label).await {
            Ok(()) => log.log(format!(
                "we added {} to {}/{}",
                fix.label.description.clone().unwrap_or_default(),
                fix.repo,
                fix.label.name
            )),
            Err(err) => log.error(format!(
                "failed adding description to {}/{}: {err}",
                fix.repo, fix.label.name
            )),
        }
    }
    snapshot::publish(api, &map, log).await?;

    println!(
        "{} {} shortnames published, {} warnings, {} errors",
        "done:".green().bold(),
        map.len(),
        log.warning_count(),
        log.error_count()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut cfg = TrackerConfig::load_from(Some(&cli.config))?;
    cfg.debug = cfg.debug || cli.dry_run;

    let log = Arc::new(RunLog::new());
    let api: Arc<dyn GithubApi> = Arc::new(RestClient::new(&cfg, log.clone())?);
    let http = reqwest::Client::new();

    match cli.command {
        Command::Labels { repos } => label_command(&api, &http, &log, repos).await,
        Command::Snapshot { specs } => snapshot_command(&api, &http, &cfg, &log, specs).await,
    }
}
