mod config;
mod diff;
mod error;
mod filter;
mod git;
mod report;
mod review;

use anyhow::{Context, Result};
use clap::Parser;
use config::{OutputFormat, RevdiffConfig};
use filter::ExtensionFilter;
use git::{ContentResolver, GitChangeLister, RepoCache};
use review::{DiffOptions, DiffRange};
use std::path::PathBuf;
use std::time::Duration;

/// Build a git-style unified diff of a repository's changes for review
#[derive(Parser)]
#[command(name = "revdiff", version, about)]
struct Cli {
    /// Repository path (defaults to current directory)
    path: Option<String>,

    /// Base revision to compare against (default: auto-detect)
    #[arg(long)]
    base: Option<String>,

    /// Head revision (default: the working tree, including untracked files)
    #[arg(long)]
    head: Option<String>,

    /// Lines of context around each change
    #[arg(short = 'U', long = "unified")]
    context: Option<usize>,

    /// Leave deleted files out of the diff
    #[arg(long)]
    exclude_deletes: bool,

    /// Only include these extensions or glob patterns (e.g. 'rs,toml' or '**/*.proto')
    #[arg(long = "ext")]
    extensions: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Print a per-file summary instead of the diff
    #[arg(long)]
    stat: bool,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the effective settings as the global defaults
    #[arg(long)]
    save_config: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let start_dir = cli.path.clone().unwrap_or_else(|| ".".to_string());
    let repo_root = git::get_repo_root_in(&start_dir)?;

    let mut config = config::load_config(&repo_root);
    apply_cli_overrides(&mut config, &cli);
    if cli.save_config {
        let path = config::save_config(&config)?;
        eprintln!("Saved settings to {}", path.display());
    }

    let base = match cli.base.clone() {
        Some(base) => base,
        None if !config.repo.base.is_empty() => config.repo.base.clone(),
        None => git::detect_base_branch_in(&repo_root),
    };
    let head = cli.head.as_deref();
    log::debug!("diffing {} against {}", head.unwrap_or("working tree"), base);

    let options = diff_options(&config)?;
    if !options.extension_filter.is_empty() {
        let patterns: Vec<&str> = options.extension_filter.patterns().collect();
        log::debug!("extension filter: {}", patterns.join(" "));
    }

    // A single listing per run, so no freshness window
    let mut repo = RepoCache::new(GitChangeLister::new(&repo_root), &base, head, Duration::ZERO);
    let changes = repo.changes()?.to_vec();

    let source = ContentResolver::for_repo(&repo_root);
    let range = DiffRange {
        base: repo.base(),
        head: repo.head(),
    };
    let report = review::generate_diff(&changes, &options, &source, range)
        .with_context(|| format!("Nothing to review against {}", range.base))?;

    if !report.excluded.is_empty() {
        eprintln!("{} file(s) left out:", report.excluded.len());
        for exclusion in &report.excluded {
            eprintln!("  {} ({})", exclusion.path, exclusion.reason.describe());
        }
    }

    let out = if cli.stat {
        report::format_stat(&report)
    } else {
        report::format_report(&report, range, config.output.format)?
    };

    match &cli.output {
        Some(path) => std::fs::write(path, format!("{out}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{out}"),
    }

    Ok(())
}

/// Command-line flags win over config files. `--base` is resolved in `main`
/// and never lands in the config, so `--save-config` cannot persist it.
fn apply_cli_overrides(config: &mut RevdiffConfig, cli: &Cli) {
    if let Some(context) = cli.context {
        config.diff.context_lines = context;
    }
    if cli.exclude_deletes {
        config.diff.exclude_deletes = true;
    }
    if let Some(ref extensions) = cli.extensions {
        config.diff.extensions = extensions.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
}

fn diff_options(config: &RevdiffConfig) -> Result<DiffOptions> {
    let diff = &config.diff;
    Ok(DiffOptions {
        context_lines: diff.context_lines,
        exclude_deletes: diff.exclude_deletes,
        extension_filter: ExtensionFilter::parse(&diff.extensions)?,
        max_file_bytes: (diff.max_file_bytes > 0).then_some(diff.max_file_bytes),
        diff_timeout: (diff.diff_timeout_ms > 0).then(|| Duration::from_millis(diff.diff_timeout_ms)),
        jobs: diff.jobs,
    })
}
