use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use hemiciclo::config::{BrowserOptions, GraphConfig, ScraperConfig};
use hemiciclo::graph::{
    GraphClient, GraphStore, ImportReport, MemoryGraph, ensure_constraints, import_deputies,
    import_groups,
};
use hemiciclo::plenary::DocumentStore;
use hemiciclo::store::{read_deputy_rows, read_group_rows, write_records};
use hemiciclo::types::{EnrichedDeputy, GroupMembership, Legislature};
use hemiciclo::utils::{DeputyStats, GroupFilter, MembershipStats, SubstitutionStats};
use hemiciclo::{ChromeSession, CongresoScraper};
use log::LevelFilter;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "hemiciclo")]
#[command(about = "A congreso.es scraper and Neo4j importer", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        default_value = "15",
        global = true,
        value_parser = parse_legislature,
        help = "Legislature number to scrape or import"
    )]
    legislature: Legislature,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct BrowserArgs {
    #[arg(long, help = "Run the browser with a visible window")]
    show_browser: bool,

    #[arg(
        long,
        help = "Stop each listing after this many pages",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_pages: Option<u32>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        help = "Summary format"
    )]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Download plenary session transcripts that are not stored yet
    Plenaries {
        #[arg(long, default_value = "diarios_html", help = "Directory for transcripts")]
        output_dir: PathBuf,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Scrape deputies and join them with their substitution records
    Deputies {
        #[arg(long, default_value = "diputados.csv", help = "CSV file to write")]
        csv: PathBuf,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Scrape join/leave history of every parliamentary group
    Groups {
        #[arg(long, default_value = "grupos.csv", help = "CSV file to write")]
        csv: PathBuf,

        #[arg(long, help = "Only groups whose name contains this text")]
        group: Option<String>,

        #[arg(
            long,
            help = "Maximum number of groups to process",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        limit: Option<u16>,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Scrape the substitutions listing on its own
    Substitutions {
        #[arg(long, default_value = "sustituciones.csv", help = "CSV file to write")]
        csv: PathBuf,

        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Load group and deputy CSV files into Neo4j
    Import {
        #[arg(long, help = "Group membership CSV")]
        groups: Option<PathBuf>,

        #[arg(long, help = "Enriched deputies CSV")]
        deputies: Option<PathBuf>,

        #[arg(long, help = "Import into an in-memory graph instead of Neo4j")]
        dry_run: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Summary format"
        )]
        format: OutputFormat,
    },
}

fn parse_legislature(s: &str) -> Result<Legislature, String> {
    Legislature::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

async fn launch(legislature: &Legislature, args: &BrowserArgs) -> CongresoScraper<ChromeSession> {
    let options = BrowserOptions::from_env(!args.show_browser);
    let session = ChromeSession::launch(&options).await.unwrap_or_else(|e| {
        log::error!("Error starting browser: {}", e);
        process::exit(1);
    });

    let config = ScraperConfig {
        legislature: legislature.clone(),
        max_pages: args.max_pages,
        ..ScraperConfig::default()
    };
    CongresoScraper::new(session, config)
}

async fn close(scraper: CongresoScraper<ChromeSession>) {
    if let Err(e) = scraper.close().await {
        log::warn!("Error closing browser: {}", e);
    }
}

fn write_csv<T: hemiciclo::store::CsvRecord>(path: &Path, rows: &[T]) {
    write_records(path, rows).unwrap_or_else(|e| {
        log::error!("Error writing {}: {}", path.display(), e);
        process::exit(1);
    });
}

#[derive(Serialize)]
struct ImportSummary {
    groups: Option<ImportReport>,
    deputies: Option<ImportReport>,
}

async fn run_import<G: GraphStore>(
    store: &G,
    groups: &[GroupMembership],
    deputies: &[EnrichedDeputy],
    legislature: &Legislature,
    summary: &mut ImportSummary,
) {
    ensure_constraints(store).await;
    if summary.groups.is_some() {
        summary.groups = Some(import_groups(store, groups, legislature).await);
    }
    if summary.deputies.is_some() {
        summary.deputies = Some(import_deputies(store, deputies, legislature).await);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let legislature = cli.legislature;

    match cli.command {
        Commands::Plenaries {
            output_dir,
            browser,
        } => {
            let store = DocumentStore::open(&output_dir, &legislature)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error creating {}: {}", output_dir.display(), e);
                    process::exit(1);
                });

            let mut scraper = launch(&legislature, &browser).await;
            let result = scraper.fetch_plenaries(&store).await;
            close(scraper).await;

            let report = result.unwrap_or_else(|e| {
                log::error!("Error downloading plenary sessions: {}", e);
                process::exit(1);
            });

            match browser.format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => {
                    for (i, doc) in report.documents.iter().enumerate() {
                        println!("{:>4}. {}", i + 1, doc);
                    }
                    println!("\nPages read:       {}", report.pages);
                    println!("New transcripts:  {}", report.downloaded);
                    println!("Stored under:     {}", store.dir().display());
                }
            }
        }

        Commands::Deputies { csv, browser } => {
            let mut scraper = launch(&legislature, &browser).await;
            let result = scraper.fetch_enriched_deputies().await;
            close(scraper).await;

            let deputies = result.unwrap_or_else(|e| {
                log::error!("Error scraping deputies: {}", e);
                process::exit(1);
            });
            write_csv(&csv, &deputies);

            match browser.format {
                OutputFormat::Json => serialize_json(&deputies),
                OutputFormat::Text => print!("{}", DeputyStats::from_deputies(&deputies)),
            }
        }

        Commands::Groups {
            csv,
            group,
            limit,
            browser,
        } => {
            let filter = GroupFilter {
                name: group,
                limit: limit.map(usize::from),
            }
            .validate()
            .unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let mut scraper = launch(&legislature, &browser).await;
            let result = scraper.fetch_groups(&filter).await;
            close(scraper).await;

            let memberships = result.unwrap_or_else(|e| {
                log::error!("Error scraping groups: {}", e);
                process::exit(1);
            });
            write_csv(&csv, &memberships);

            match browser.format {
                OutputFormat::Json => serialize_json(&memberships),
                OutputFormat::Text => print!("{}", MembershipStats::from_memberships(&memberships)),
            }
        }

        Commands::Substitutions { csv, browser } => {
            let mut scraper = launch(&legislature, &browser).await;
            let result = scraper.fetch_substitutions().await;
            close(scraper).await;

            let substitutions = result.unwrap_or_else(|e| {
                log::error!("Error scraping substitutions: {}", e);
                process::exit(1);
            });
            write_csv(&csv, &substitutions);

            match browser.format {
                OutputFormat::Json => serialize_json(&substitutions),
                OutputFormat::Text => {
                    print!("{}", SubstitutionStats::from_substitutions(&substitutions))
                }
            }
        }

        Commands::Import {
            groups,
            deputies,
            dry_run,
            format,
        } => {
            if groups.is_none() && deputies.is_none() {
                log::error!("Invalid args: pass --groups and/or --deputies");
                process::exit(1);
            }

            let group_rows = match &groups {
                Some(path) => read_group_rows(path).unwrap_or_else(|e| {
                    log::error!("Error reading {}: {}", path.display(), e);
                    process::exit(1);
                }),
                None => Vec::new(),
            };
            let deputy_rows = match &deputies {
                Some(path) => read_deputy_rows(path).unwrap_or_else(|e| {
                    log::error!("Error reading {}: {}", path.display(), e);
                    process::exit(1);
                }),
                None => Vec::new(),
            };

            let mut summary = ImportSummary {
                groups: groups.as_ref().map(|_| ImportReport::default()),
                deputies: deputies.as_ref().map(|_| ImportReport::default()),
            };

            let snapshot = if dry_run {
                let graph = MemoryGraph::new();
                run_import(&graph, &group_rows, &deputy_rows, &legislature, &mut summary).await;
                Some(graph.snapshot())
            } else {
                let config = GraphConfig::from_env().unwrap_or_else(|e| {
                    log::error!("Error reading Neo4j settings: {}", e);
                    process::exit(1);
                });
                let client = GraphClient::connect(&config).await.unwrap_or_else(|e| {
                    log::error!("Error connecting to Neo4j: {}", e);
                    process::exit(1);
                });
                run_import(&client, &group_rows, &deputy_rows, &legislature, &mut summary).await;
                None
            };

            match format {
                OutputFormat::Json => serialize_json(&summary),
                OutputFormat::Text => {
                    for report in [&summary.groups, &summary.deputies].into_iter().flatten() {
                        print!("{}", report);
                    }
                    if let Some(graph) = snapshot {
                        print!("{}", graph);
                    }
                }
            }
        }
    }
}
