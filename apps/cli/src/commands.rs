//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use qexp_core::{
    KnowledgeGraph, KnowledgeGraphBuilder, Primer, ProfileBuilder, ProfileMaterializer,
    categories, write_json,
};
use qexp_shared::{
    AppConfig, CONFIG_FILE_NAME, init_config, load_config_from, read_article_ids,
    read_parent_titles,
};
use qexp_storage::DataCache;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// qexp: knowledge-graph profiles for query expansion.
#[derive(Parser)]
#[command(
    name = "qexp",
    version,
    about = "Build an entity knowledge graph and sample article profiles from it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = CONFIG_FILE_NAME, env = "QEXP_CONFIG", global = true)]
    pub config: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch, link and join the seed articles into the knowledge graph.
    Kg,

    /// Sample a random-walk profile for every seed article.
    Profiles {
        /// Fixed RNG seed for reproducible walks (overrides the config).
        #[arg(long)]
        seed: Option<u64>,

        /// Skip page-id resolution and article caching; dump raw walks.
        #[arg(long)]
        skip_materialize: bool,
    },

    /// Sample linked pages of every parent title and cache their text.
    Priming,

    /// Collect the categories declared by every cached article revision.
    Categories,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a starter config file.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "qexp=info",
        1 => "qexp=debug",
        _ => "qexp=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.as_path();
    match cli.command {
        Command::Kg => cmd_kg(&load(path)?).await,
        Command::Profiles {
            seed,
            skip_materialize,
        } => cmd_profiles(&load(path)?, seed, skip_materialize).await,
        Command::Priming => cmd_priming(&load(path)?).await,
        Command::Categories => cmd_categories(&load(path)?),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(path),
            ConfigAction::Show => cmd_config_show(path),
        },
    }
}

fn load(path: &Path) -> Result<AppConfig> {
    load_config_from(path).wrap_err_with(|| format!("loading {}", path.display()))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_kg(config: &AppConfig) -> Result<()> {
    let started = Instant::now();
    let article_ids = read_article_ids(&config.data.article_path)?;
    info!(articles = article_ids.len(), "building knowledge graph");

    let builder = KnowledgeGraphBuilder::from_config(config)?;
    let graph = builder.build(&article_ids).await?;
    graph.save(&config.data.kg_path)?;

    println!();
    println!("  Knowledge graph built");
    println!("  Vertices: {}", graph.vertex_count());
    println!("  Edges:    {}", graph.edge_count());
    println!("  Path:     {}", config.data.kg_path.display());
    println!("  Time:     {:.1}s", started.elapsed().as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_profiles(
    config: &AppConfig,
    seed: Option<u64>,
    skip_materialize: bool,
) -> Result<()> {
    let started = Instant::now();
    let article_ids = read_article_ids(&config.data.article_path)?;
    let graph = KnowledgeGraph::load(&config.data.kg_path)
        .wrap_err("run `qexp kg` before sampling profiles")?;

    let builder =
        ProfileBuilder::from_config(&config.profiles).with_seed(seed.or(config.profiles.seed));
    let profiles = builder.build(&graph, &article_ids)?;
    let empty = profiles.iter().filter(|(_, members)| members.is_empty()).count();

    if skip_materialize {
        let raw: std::collections::BTreeMap<_, _> = profiles.into_iter().collect();
        write_json(&config.data.profiles_dump, &raw)?;
    } else {
        let materializer = ProfileMaterializer::from_config(config).await?;
        let resolved = materializer.materialize(profiles).await?;
        write_json(&config.data.profiles_dump, &resolved)?;
    }

    println!();
    println!("  Profiles sampled");
    println!("  Seeds:  {}", article_ids.len());
    println!("  Empty:  {empty}");
    println!("  Path:   {}", config.data.profiles_dump.display());
    println!("  Time:   {:.1}s", started.elapsed().as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_priming(config: &AppConfig) -> Result<()> {
    let article_ids = read_article_ids(&config.data.article_path)?;
    let titles = read_parent_titles(&config.data.article_path)?;

    let primer = Primer::from_config(config, &article_ids)?;
    let links = primer.run(&titles).await?;
    write_json(&config.data.links_dump, &links)?;

    println!(
        "Sampled links for {} parent titles: {}",
        links.len(),
        config.data.links_dump.display()
    );
    Ok(())
}

fn cmd_categories(config: &AppConfig) -> Result<()> {
    let revisions = DataCache::open(&config.data.extracts_path)?;
    let found = categories::article_categories(&revisions)?;
    write_json(&config.data.article_categories, &found)?;

    println!(
        "Categories for {} articles: {}",
        found.len(),
        config.data.article_categories.display()
    );
    Ok(())
}

fn cmd_config_init(path: &Path) -> Result<()> {
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: &Path) -> Result<()> {
    let config = load(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = ["qexp", "profiles", "--seed", "7", "-vv", "--config", "x.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(
            cli.command,
            Command::Profiles {
                seed: Some(7),
                skip_materialize: false
            }
        ));
    }

    #[test]
    fn config_defaults_to_local_file() {
        let cli = Cli::try_parse_from(["qexp", "config", "show"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE_NAME));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
