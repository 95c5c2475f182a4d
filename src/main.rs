use clap::{Parser, Subcommand};
use colored::Colorize;
use gh_linker::{GitHubService, LinkOutcome, Settings};
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// gh-linker: turns GitHub issue, pull request and comment URLs into
/// Markdown links titled via the GitHub CLI.
#[derive(Parser, Debug)]
#[command(name = "gh-linker", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// URLs to convert (e.g., https://github.com/org/repo/issues/42)
    urls: Vec<String>,

    /// Settings file to use instead of ./.gh-linker.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Explicit path to the gh executable (overrides the config file and
    /// GH_LINKER_GH_PATH)
    #[arg(long)]
    gh_path: Option<String>,

    /// Print cache statistics after processing
    #[arg(long)]
    stats: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether gh can be found and how it was located
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let settings = Settings::load_with(cli.config.as_deref(), cli.gh_path.as_deref())?;
    debug!(?settings, "settings loaded");

    let service = GitHubService::new(settings);

    if let Some(Command::Check) = cli.command {
        return check(&service).await;
    }

    if cli.urls.is_empty() {
        return Err("at least one URL is required. Usage: gh-linker <URL>... or gh-linker check".into());
    }

    for url in &cli.urls {
        let _span = info_span!("link", url = %url).entered();
        match service.markdown_for(url).await {
            LinkOutcome::Linked(link) => println!("{link}"),
            LinkOutcome::Unchanged(text) => println!("{text}"),
            LinkOutcome::Fallback { text, reason } => {
                eprintln!("{} {}: {}", "warning:".yellow().bold(), text, reason);
                println!("{text}");
            }
        }
    }

    if cli.stats {
        print_stats(&service);
    }

    Ok(())
}

async fn check(service: &GitHubService) -> Result<(), Box<dyn std::error::Error>> {
    if !service.check_availability().await {
        eprintln!(
            "{} GitHub CLI not found. {}",
            "error:".red().bold(),
            gh_linker::tool::resolver::installation_instructions()
        );
        return Err("gh is not available".into());
    }

    let status = service.status();
    if let Some(resolved) = status.tool_path {
        println!(
            "{} gh found at {} ({})",
            "ok:".green().bold(),
            resolved.path,
            resolved.method
        );
    }
    Ok(())
}

fn print_stats(service: &GitHubService) {
    let stats = service.cache_stats();
    eprintln!("{}", "Cache statistics".bold());
    for (name, cache) in [("titles", stats.titles), ("comments", stats.comments)] {
        eprintln!(
            "  {:<9} {}/{} entries, {} hits, {} misses",
            name, cache.size, cache.max_size, cache.hits, cache.misses
        );
    }
}
