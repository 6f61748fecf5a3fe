//! Binary entrypoint for the mapsmith CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and seed the canonical world
//! - `status` - print store counts per record type and category
//! - `validate` - scan the graph and report referential-integrity issues
//! - `export [--connection-type <t>] [--source <id>] [--output <file>]` -
//!   write the renderer JSON projection
//! - `migrate <legacy.json> [--output <file>]` - convert a legacy config
//!   document to the unified schema
//! - `import <unified.json>` - load a unified config into the store
//!
//! See the library crate docs for module-level details: `mapsmith::`.
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use mapsmith::config::Config;
use mapsmith::worldmap::{
    import_unified, migrate_document, ConnectionType, ExportFilters, ExportService, GraphService,
    WorldStore, WorldStoreBuilder,
};

#[derive(Parser)]
#[command(name = "mapsmith")]
#[command(about = "World-map administration engine for browser games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration and seed the world store
    Init,
    /// Show store statistics
    Status,
    /// Scan the graph for referential-integrity issues
    Validate,
    /// Export the graph as renderer JSON
    Export {
        /// Only include edges of this connection type (start, end, bidirectional)
        #[arg(long)]
        connection_type: Option<String>,
        /// Only include edges leaving this source location
        #[arg(long)]
        source: Option<String>,
        /// Include disabled locations and connections
        #[arg(long)]
        include_disabled: bool,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Convert a legacy config document to the unified schema
    Migrate {
        /// Legacy JSON document
        input: String,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Load a unified config document into the store
    Import {
        /// Unified JSON document
        input: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            let config = Config::create_default(&cli.config)?;
            println!("Wrote {}", cli.config);
            let store = open_store(&config)?;
            let locations = store.list_locations()?;
            println!(
                "Opened store at {} ({} location(s))",
                config.storage.data_dir,
                locations.len()
            );
        }
        Commands::Status => {
            let config = load_config(&cli.config)?;
            let store = open_store(&config)?;
            print_status(&store)?;
        }
        Commands::Validate => {
            let config = load_config(&cli.config)?;
            let store = open_store(&config)?;
            let graph = GraphService::new(store);
            let report = graph.validate_graph()?;
            println!(
                "Checked {} connection(s), {} location(s)",
                report.connections_checked, report.locations_checked
            );
            if report.is_clean() {
                println!("Graph is consistent");
            } else {
                for issue in &report.issues {
                    println!("  {}", issue);
                }
                bail!("{} integrity issue(s) found", report.issues.len());
            }
        }
        Commands::Export {
            connection_type,
            source,
            include_disabled,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let store = open_store(&config)?;
            let filters = ExportFilters {
                connection_type: connection_type
                    .as_deref()
                    .map(parse_connection_type)
                    .transpose()?,
                source_location_id: source,
                include_disabled,
            };
            let export = ExportService::new(store).export_graph(&filters)?;
            let json = serde_json::to_string_pretty(&export)?;
            write_output(output.as_deref(), &json)?;
            info!(
                "exported {} node(s), {} edge(s)",
                export.stats.nodes_count, export.stats.edges_count
            );
        }
        Commands::Migrate { input, output } => {
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input))?;
            let document: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", input))?;
            let outcome = migrate_document(document)?;
            if outcome.is_noop() {
                println!("Document is already in the unified schema; no changes");
            }
            let json = serde_json::to_string_pretty(outcome.config())?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Import { input } => {
            let config = load_config(&cli.config)?;
            let store = open_store(&config)?;
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input))?;
            let document: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", input))?;
            let unified = migrate_document(document)?.into_config();
            let report = import_unified(&store, unified)?;
            println!(
                "Imported {} pathway(s), {} town(s)",
                report.pathways_imported, report.towns_imported
            );
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    Config::load(path).with_context(|| format!("run `mapsmith init` to create {}", path))
}

fn open_store(config: &Config) -> Result<WorldStore> {
    let mut builder = WorldStoreBuilder::new(&config.storage.data_dir);
    if !config.world.seed_on_init {
        builder = builder.without_world_seed();
    }
    Ok(builder.open()?)
}

fn parse_connection_type(text: &str) -> Result<ConnectionType> {
    match text {
        "start" => Ok(ConnectionType::Start),
        "end" => Ok(ConnectionType::End),
        "bidirectional" => Ok(ConnectionType::Bidirectional),
        other => bail!("unknown connection type '{}'", other),
    }
}

fn write_output(path: Option<&str>, contents: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents).with_context(|| format!("writing {}", path))?;
            println!("Wrote {}", path);
        }
        None => println!("{}", contents),
    }
    Ok(())
}

fn print_status(store: &WorldStore) -> Result<()> {
    let locations = store.list_locations()?;
    let connections = store.list_connections()?;
    let spawn_lists = store.list_spawn_lists()?;
    let players = store.list_players()?;

    let mut by_category: std::collections::BTreeMap<&str, usize> = Default::default();
    for location in &locations {
        *by_category.entry(location.category().as_str()).or_insert(0) += 1;
    }

    println!("Locations:   {}", locations.len());
    for (category, count) in by_category {
        println!("  {:<10} {}", category, count);
    }
    println!("Connections: {}", connections.len());
    println!("Spawn lists: {}", spawn_lists.len());
    println!("Players:     {}", players.len());
    Ok(())
}

/// Initialize env_logger honoring the configured level, `-v` overrides, and
/// whether stdout is a TTY (color only when interactive).
fn init_logging(config: &Option<Config>, verbose: u8) {
    let level = match verbose {
        0 => config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let style = if atty::is(atty::Stream::Stdout) {
        "auto"
    } else {
        "never"
    };
    let env = env_logger::Env::default()
        .filter_or("MAPSMITH_LOG", level)
        .write_style_or("MAPSMITH_LOG_STYLE", style);
    let _ = env_logger::Builder::from_env(env).try_init();
}
