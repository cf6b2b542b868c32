//! Chorus CLI: aggregated keyword search across content platforms.

mod render;

use anyhow::{Context, Result};
use chorus_common::model::SearchStatus;
use chorus_common::observability::{init_logging, LogConfig};
use chorus_common::SharedConfig;
use chorus_config::ChorusConfigLoader;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "chorus",
    about = "Search a keyword across seven content platforms and collect top comments",
    version
)]
struct Cli {
    /// Configuration file (YAML); CHORUS_* environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Duplicate logs to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search all (or selected) platforms for a keyword.
    Search {
        keyword: String,

        /// Platforms to search, comma-separated names or aliases
        /// (e.g. "bilibili,zhihu" or "wb,xhs"). Default: all.
        #[arg(short, long)]
        platforms: Option<String>,

        #[arg(short, long, value_enum, default_value = "plain")]
        output: Output,

        /// Write the result to a file (JSON unless --output markdown).
        #[arg(short, long)]
        save: Option<PathBuf>,
    },
    /// List the supported platforms and their comment caps.
    Platforms,
    /// Print the active configuration, optionally applying overrides first.
    Config {
        /// `key=value` overrides merged into the in-process configuration
        /// before printing; values parse as JSON where possible and unknown
        /// keys are ignored.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Json,
    Markdown,
    Plain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig {
        emit_stderr: cli.verbose,
        ..LogConfig::default()
    })
    .context("logging setup failed")?;

    let mut loader = ChorusConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = SharedConfig::new(loader.load().context("configuration load failed")?);

    match cli.command {
        Command::Search {
            keyword,
            platforms,
            output,
            save,
        } => run_search(&config, &keyword, platforms, output, save).await,
        Command::Platforms => {
            show_platforms(&config);
            Ok(())
        }
        Command::Config { set } => {
            if !set.is_empty() {
                let patch = parse_overrides(&set)?;
                config.update(patch);
            }
            let snapshot = config.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn run_search(
    config: &SharedConfig,
    keyword: &str,
    platforms: Option<String>,
    output: Output,
    save: Option<PathBuf>,
) -> Result<()> {
    let platform_list: Option<Vec<String>> = platforms.map(|names| {
        names
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    });

    eprintln!("searching: {keyword}");
    match &platform_list {
        Some(names) => eprintln!("platforms: {}", names.join(", ")),
        None => eprintln!("platforms: all supported"),
    }

    let result = chorus_core::search(config, keyword, platform_list.as_deref()).await;

    let rendered = match output {
        Output::Json => serde_json::to_string_pretty(&result)?,
        Output::Markdown => render::to_markdown(&result),
        Output::Plain => render::to_plain(&result),
    };
    println!("{rendered}");

    if let Some(path) = save {
        let contents = match output {
            Output::Markdown => render::to_markdown(&result),
            _ => serde_json::to_string_pretty(&result)?,
        };
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("saved to {}", path.display());
    }

    eprintln!(
        "done in {:.2}s, {} items, status {:?}",
        result.duration,
        result.total_count(),
        result.status
    );
    if !result.errors.is_empty() {
        eprintln!(
            "platforms with errors: {}",
            result
                .errors
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    // Partial results are a normal outcome; only a fully failed run exits
    // non-zero.
    if result.status == SearchStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Turn `key=value` pairs into a config patch. Values that parse as JSON
/// (numbers, booleans) are taken typed; everything else stays a string.
fn parse_overrides(pairs: &[String]) -> Result<chorus_common::ConfigPatch> {
    let mut object = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("override {pair:?} is not KEY=VALUE"))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        object.insert(key.trim().to_string(), value);
    }
    serde_json::from_value(serde_json::Value::Object(object)).context("invalid override value")
}

fn show_platforms(config: &SharedConfig) {
    let snapshot = config.snapshot();
    println!("supported platforms:");
    for platform in chorus_core::supported_platforms(config) {
        let aliases: Vec<&str> = snapshot
            .platform_aliases
            .iter()
            .filter(|(_, canonical)| canonical.as_str() == platform.as_str())
            .map(|(alias, _)| alias.as_str())
            .collect();
        let alias_note = if aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", aliases.join(", "))
        };
        println!(
            "  {:<12} | up to {} items | {} comments each{}",
            platform.as_str(),
            snapshot.limits.max_contents,
            snapshot.limits.comment_cap(platform),
            alias_note
        );
    }
}
