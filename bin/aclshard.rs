use std::path::PathBuf;
use std::sync::Arc;

use aclshard::segment::{IndexDocument, IndexSnapshot, SegmentId, SegmentWriter};
use aclshard::{
    ContentRecord, FilterSettings, RouterStrategy, RoutingConfig, SecurityFilterBuilder,
    SecuritySnapshot, Settings, ShardRouter,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "aclshard")]
#[command(about = "Shard routing and ACL filter inspection", long_about = None)]
struct Args {
    /// JSON settings document (filter + routing sections)
    #[arg(long, env = "ACLSHARD_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the shard owning a content record
    Route {
        /// Number of shards
        #[arg(long)]
        shards: u32,

        /// Router strategy (date_month, quarterly, db_id_modulo)
        #[arg(long)]
        strategy: Option<String>,

        /// Months per bucket for date_month
        #[arg(long)]
        granularity: Option<u32>,

        /// ISO-8601 routing timestamp
        #[arg(long)]
        timestamp: Option<String>,

        /// Record id
        #[arg(long, default_value = "0")]
        id: u64,
    },
    /// Build a security filter over a JSON fixture and print visible docs
    Filter {
        /// Fixture with descriptor and content segments
        #[arg(long)]
        fixture: PathBuf,

        /// Authority of the requester (repeatable)
        #[arg(long = "authority")]
        authorities: Vec<String>,
    },
}

#[derive(Deserialize)]
struct FixtureDescriptor {
    id: i64,
    #[serde(default)]
    authorities: Vec<String>,
}

#[derive(Deserialize)]
struct FixtureContent {
    acl_id: Option<i64>,
}

#[derive(Deserialize)]
struct Fixture {
    descriptors: Vec<Vec<FixtureDescriptor>>,
    content: Vec<Vec<FixtureContent>>,
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            Ok(Settings::from_json(&json)?)
        }
        None => Ok(Settings::default()),
    }
}

fn seal_segments<T>(
    segments: &[Vec<T>],
    to_doc: impl Fn(&T) -> IndexDocument,
) -> IndexSnapshot {
    let readers = segments
        .iter()
        .enumerate()
        .map(|(i, docs)| {
            let mut writer = SegmentWriter::new(SegmentId(i as u64));
            for doc in docs {
                writer.add_document(to_doc(doc));
            }
            Arc::new(writer.seal())
        })
        .collect();
    IndexSnapshot::new(1, readers)
}

fn run_route(
    mut routing: RoutingConfig,
    shards: u32,
    strategy: Option<String>,
    granularity: Option<u32>,
    timestamp: Option<String>,
    id: u64,
) -> Result<()> {
    if let Some(strategy) = strategy {
        routing.strategy = RouterStrategy::parse(&strategy)?;
    }
    if let Some(granularity) = granularity {
        routing.granularity_months = granularity;
    }

    let router = ShardRouter::from_config(&routing)?;
    let mut record = ContentRecord::new(id, 0);
    if let Some(timestamp) = timestamp {
        record = record.with_field(routing.date_field.clone(), timestamp);
    } else if router != ShardRouter::DbIdModulo {
        bail!("--timestamp is required for the {} router", router.name());
    }

    let shard = router.content_shard(shards, &record)?;
    println!("{}", shard);
    Ok(())
}

fn run_filter(filter_settings: FilterSettings, fixture: PathBuf, authorities: Vec<String>) -> Result<()> {
    let json = std::fs::read_to_string(&fixture)
        .with_context(|| format!("reading fixture {}", fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&json).context("parsing fixture")?;

    let id_field = filter_settings.descriptor_id_field.clone();
    let authority_field = filter_settings.descriptor_authority_field.clone();
    let content_field = filter_settings.content_descriptor_field.clone();

    let descriptors = seal_segments(&fixture.descriptors, |d| {
        d.authorities.iter().fold(
            IndexDocument::new().numeric(id_field.as_str(), d.id),
            |doc, a| doc.keyword(authority_field.as_str(), a.as_str()),
        )
    });
    let content = seal_segments(&fixture.content, |c| match c.acl_id {
        Some(acl_id) => IndexDocument::new().numeric(content_field.as_str(), acl_id),
        None => IndexDocument::new(),
    });

    let builder = SecurityFilterBuilder::new(filter_settings)?;
    let filter = builder.build_filter(authorities, SecuritySnapshot::new(&descriptors, &content))?;

    for (i, segment) in filter.segments().iter().enumerate() {
        let visible: Vec<usize> = segment.bits.ones().collect();
        println!("segment {} ({} docs): {:?}", i, segment.bits.len(), visible);
    }
    info!(visible = filter.visible_count(), "filter built");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(args.settings.as_ref())?;

    info!("aclshard v{}", aclshard::VERSION);

    match args.command {
        Command::Route {
            shards,
            strategy,
            granularity,
            timestamp,
            id,
        } => run_route(settings.routing, shards, strategy, granularity, timestamp, id),
        Command::Filter {
            fixture,
            authorities,
        } => run_filter(settings.filter, fixture, authorities),
    }
}
