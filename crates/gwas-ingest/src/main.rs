//! GWAS Ingest - catalog release staging and curation preparation

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gwas_common::logging::{init_logging, LogConfig, LogLevel, PendingLogUpload};
use gwas_ingest::config::IngestConfig;
use gwas_ingest::curation::GwasCatalogCuration;
use gwas_ingest::release::{fetch_release_info, DEFAULT_RELEASE_INFO_URL};
use gwas_ingest::storage::{ObjectStore, S3ObjectStore};
use gwas_ingest::transfer::{
    TableToStorage, TransferContext, TransferJob, TransferKind, TransferManager, Transferable,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

const RELEASES_URL: &str = "ftp://ftp.ebi.ac.uk/pub/databases/gwas/releases";

/// Catalog files staged by default: (file in the release directory, destination)
const CURATED_INPUTS: [(&str, &str); 3] = [
    (
        "gwas-catalog-associations_ontology-annotated.tsv",
        "gs://gwas_catalog_inputs/gwas_catalog_associations_ontology_annotated.tsv",
    ),
    (
        "gwas-catalog-download-studies-v1.0.3.1.txt",
        "gs://gwas_catalog_inputs/gwas_catalog_download_studies.tsv",
    ),
    (
        "gwas-catalog-download-ancestries-v1.0.3.1.txt",
        "gs://gwas_catalog_inputs/gwas_catalog_download_ancestries.tsv",
    ),
];

const DEFAULT_SUMMARY_STATISTICS_GLOB: &str =
    "gs://gwas_catalog_inputs/raw_summary_statistics/**h.tsv.gz";

#[derive(Parser, Debug)]
#[command(name = "gwas-ingest")]
#[command(author, version, about = "GWAS Catalog ingestion and curation tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log the planned work without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Also write logs to a local path or a gs:// object
    #[arg(long, global = true, value_name = "PATH|gs://...")]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy the latest catalog release files into object storage
    UpdateCurationMetadata(UpdateArgs),

    /// Build the curation manifest for the next curation round
    PrepareCuration(PrepareArgs),
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Source (ftp:// or http(s)://) and gs:// destination; repeatable
    #[arg(
        short = 'f',
        long = "file-to-transfer",
        num_args = 2,
        value_names = ["SOURCE", "DESTINATION"],
        action = clap::ArgAction::Append
    )]
    files: Vec<String>,

    /// Catalog release statistics endpoint
    #[arg(short = 'g', long = "release-info-url", default_value = DEFAULT_RELEASE_INFO_URL)]
    release_info_url: String,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Previous curation table (local path or gs://)
    #[arg(long)]
    previous_curation: String,

    /// Catalog studies download (local path or gs://)
    #[arg(long)]
    downloaded_studies: String,

    /// Glob over synced harmonised summary statistics
    #[arg(long, default_value = DEFAULT_SUMMARY_STATISTICS_GLOB)]
    summary_statistics_glob: String,

    /// Manifest destination (local path or gs://)
    #[arg(long)]
    output: String,
}

/// Default inputs, dated with today's release directory.
///
/// The transfer engine falls back to `latest` when today's directory does
/// not exist yet.
fn default_transfers() -> Vec<(String, String)> {
    let today = chrono::Utc::now().format("%Y/%m/%d");
    CURATED_INPUTS
        .iter()
        .map(|(file, destination)| {
            (
                format!("{}/{}/{}", RELEASES_URL, today, file),
                destination.to_string(),
            )
        })
        .collect()
}

fn transfer_pairs(files: &[String]) -> Vec<(String, String)> {
    if files.is_empty() {
        return default_transfers();
    }
    files
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose > 0 {
        log_config.level = LogLevel::from_verbosity(cli.verbose);
    }
    if let Some(log_file) = &cli.log_file {
        log_config.log_file = Some(log_file.clone());
    }
    let logging = init_logging(&log_config)?;

    let config = IngestConfig::from_env().context("Invalid configuration")?;
    let store: Arc<dyn ObjectStore> = Arc::new(
        S3ObjectStore::new(&config.storage)
            .await
            .context("Failed to create object storage client")?,
    );

    let outcome = match cli.command {
        Command::UpdateCurationMetadata(args) => {
            update_curation_metadata(&config, store.clone(), args, cli.dry_run).await
        },
        Command::PrepareCuration(args) => {
            prepare_curation(&config, store.clone(), args, cli.dry_run).await
        },
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }

    if let Some(pending) = logging.finish() {
        if cli.dry_run {
            eprintln!("Dry run: log kept at {}", pending.path().display());
        } else {
            upload_log(store.as_ref(), pending).await;
        }
    }

    outcome
}

fn transfer_context(config: &IngestConfig, store: Arc<dyn ObjectStore>) -> Result<TransferContext> {
    let http = TransferContext::http_client(config.http_timeout())?;
    Ok(
        TransferContext::new(store, Arc::new(config.ftp_connector()))
            .with_http_client(http)
            .with_retry(config.retry_policy())
            .with_block_size(config.ftp.block_size),
    )
}

async fn update_curation_metadata(
    config: &IngestConfig,
    store: Arc<dyn ObjectStore>,
    args: UpdateArgs,
    dry_run: bool,
) -> Result<()> {
    let pairs = transfer_pairs(&args.files);
    let limit = config.transfer.max_concurrent_transfers;
    if pairs.len() > limit {
        anyhow::bail!(
            "File transfer limit exceeded: {} requested, at most {} allowed",
            pairs.len(),
            limit
        );
    }

    let jobs = pairs
        .iter()
        .map(|(source, destination)| {
            TransferJob::remote(source, destination)
                .with_context(|| format!("Invalid transfer {} -> {}", source, destination))
        })
        .collect::<Result<Vec<_>>>()?;

    let ctx = transfer_context(config, store)?;
    fetch_release_info(&ctx.http, &args.release_info_url)
        .await
        .context("Failed to fetch release info")?;

    if dry_run {
        for job in &jobs {
            info!("Dry run: would transfer {} to {}", job.source(), job.destination());
        }
        return Ok(());
    }

    let mut batches: BTreeMap<TransferKind, Vec<TransferJob>> = BTreeMap::new();
    for job in jobs {
        batches.entry(job.kind()).or_default().push(job);
    }

    let manager = TransferManager::new(ctx, limit);
    let mut transferred = 0;
    for (kind, batch) in batches {
        let report = manager
            .transfer(batch)
            .await
            .with_context(|| format!("{} batch failed", kind))?;
        transferred += report.succeeded.len();
    }

    info!("Transferred {} files", transferred);
    Ok(())
}

async fn prepare_curation(
    config: &IngestConfig,
    store: Arc<dyn ObjectStore>,
    args: PrepareArgs,
    dry_run: bool,
) -> Result<()> {
    let curation = GwasCatalogCuration::from_previous_curation(
        store.clone(),
        &args.previous_curation,
        &args.downloaded_studies,
        &args.summary_statistics_glob,
    )
    .await
    .context("Failed to load curation inputs")?;

    let manifest = curation.result().context("Failed to reconcile curation")?;
    for (status, count) in manifest.count_by_status() {
        info!("{}: {}", status, count);
    }

    if dry_run {
        info!("Dry run: manifest with {} rows not written to {}", manifest.len(), args.output);
        return Ok(());
    }

    if args.output.starts_with("gs://") {
        let job = TableToStorage::new(Arc::new(manifest), &args.output)?;
        let ctx = transfer_context(config, store)?;
        TransferManager::new(ctx, 1)
            .transfer(vec![job])
            .await
            .context("Failed to upload curation manifest")?;
    } else {
        let data = gwas_ingest::transfer::Tabular::to_tsv(&manifest)?;
        tokio::fs::write(&args.output, data)
            .await
            .with_context(|| format!("Failed to write {}", args.output))?;
        info!("Wrote curation manifest to {}", args.output);
    }

    Ok(())
}

async fn upload_log(store: &dyn ObjectStore, pending: PendingLogUpload) {
    let destination = pending.destination.clone();
    let result = async {
        let data = pending.read()?;
        store
            .put(destination.bucket(), destination.object(), data)
            .await
            .context("Log upload failed")
    }
    .await;

    // The subscriber has been shut down, so report on stderr
    match result {
        Ok(upload) => eprintln!("Logs uploaded to {}", upload.uri()),
        Err(e) => eprintln!("Failed to upload logs to {}: {:#}", destination, e),
    }
}
