//! Command implementations.
//!
//! Documents are read as JSON lines (`{"url": ..., "text": ..., "language": ...}`).
//! Results are printed to stdout as JSON; logs go to stderr.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

use sieve_dedup::IndexSnapshot;
use sieve_service::{
    save_run, CancellationToken, Settings, SieveService, StorageCache, INDEX_CHECKPOINT,
};
use sieve_storage::Storage;
use sieve_text::{build_text_service, CacheStore, DisabledTextService, MemoryCache, TextService};
use sieve_topics::ClusterConfig;
use sieve_types::{Document, SourceDocument};

use crate::cli::ClusterArgs;

/// Loaded settings with logging initialized.
pub struct Context {
    pub settings: Settings,
}

impl Context {
    /// Load configuration, apply CLI overrides and install the log subscriber.
    pub fn init(
        config_path: Option<&str>,
        log_level_override: Option<&str>,
        db_path_override: Option<&str>,
    ) -> Result<Self> {
        let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

        if let Some(log_level) = log_level_override {
            settings.log_level = log_level.to_string();
        }
        if let Some(db_path) = db_path_override {
            settings.db_path = db_path.to_string();
        }

        let subscriber = tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
            )
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;

        settings.validate().context("Invalid configuration")?;
        Ok(Self { settings })
    }

    fn open_storage(&self) -> Result<Arc<Storage>> {
        let db_path = Path::new(&self.settings.db_path);
        fs::create_dir_all(db_path).context("Failed to create database directory")?;
        info!(path = %db_path.display(), "Opening storage");
        let storage = Storage::open(db_path).context("Failed to open storage")?;
        Ok(Arc::new(storage))
    }

    fn service(
        &self,
        text: Arc<dyn TextService>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<SieveService> {
        SieveService::new(self.settings.clone(), text, cache).context("Failed to create service")
    }

    fn cluster_config(&self, args: &ClusterArgs) -> ClusterConfig {
        let mut config = self.settings.topics.cluster.clone();
        if let Some(min_cluster_size) = args.min_cluster_size {
            config.min_cluster_size = min_cluster_size;
        }
        if let Some(min_samples) = args.min_samples {
            config.min_samples = min_samples;
        }
        if let Some(epsilon) = args.epsilon {
            config.epsilon = epsilon;
        }
        config
    }
}

/// `dedup`: print stats, write unique documents.
pub fn run_dedup(ctx: &Context, input: &Path, output: Option<&Path>, persist: bool) -> Result<()> {
    let documents = read_documents(input)?;

    let storage = if persist {
        Some(ctx.open_storage()?)
    } else {
        None
    };
    let service = ctx.service(Arc::new(DisabledTextService), Arc::new(MemoryCache::new()))?;
    if let Some(storage) = &storage {
        service.load_index(storage)?;
    }

    let (unique, stats) = service.deduplicate_and_index(documents)?;
    info!(
        total = stats.total_input,
        unique = stats.unique,
        exact_url = stats.exact_url_duplicates,
        near = stats.near_duplicates,
        "Deduplicated input"
    );

    if let Some(storage) = &storage {
        service.save_index(storage)?;
        storage.flush()?;
    }

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_documents(BufWriter::new(file), &unique)?;
            print_json(&stats)?;
        }
        None => write_documents(io::stdout().lock(), &unique)?,
    }
    Ok(())
}

/// `cluster`: deduplicate, then print unlabeled clusters.
pub fn run_cluster(ctx: &Context, input: &Path, args: &ClusterArgs) -> Result<()> {
    let documents = read_documents(input)?;
    let service = ctx.service(Arc::new(DisabledTextService), Arc::new(MemoryCache::new()))?;

    let (unique, _) = service.deduplicate_and_index(documents)?;
    let clusters = service.cluster(&unique, &ctx.cluster_config(args))?;
    print_json(&clusters)
}

#[derive(Serialize)]
struct LabelOutput<'a> {
    clusters: &'a [sieve_types::TopicCluster],
    report: &'a sieve_service::RunReport,
}

/// `label`: deduplicate, cluster and label, then save the run.
pub async fn run_label(ctx: &Context, input: &Path, offline: bool, args: &ClusterArgs) -> Result<()> {
    let documents = read_documents(input)?;
    let storage = ctx.open_storage()?;

    let text: Arc<dyn TextService> = if offline {
        Arc::new(DisabledTextService)
    } else {
        build_text_service(&ctx.settings.text).context("Failed to create text service")?
    };
    let cache = Arc::new(StorageCache::new(Arc::clone(&storage)));
    let service = ctx.service(text, cache)?;
    service.load_index(&storage)?;

    let (unique, stats) = service.deduplicate_and_index(documents)?;
    info!(
        unique = stats.unique,
        removed = stats.duplicates_removed(),
        "Deduplicated input"
    );

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, finishing in-flight calls");
                cancel.cancel();
            }
        })
    };

    let run = service
        .cluster_and_label(unique, &ctx.cluster_config(args), &cancel)
        .await;
    watcher.abort();
    let run = run?;

    service.save_index(&storage)?;
    save_run(&storage, &run)?;
    storage.flush()?;

    print_json(&LabelOutput {
        clusters: &run.clusters,
        report: &run.report,
    })
}

#[derive(Serialize)]
struct StatsOutput {
    db_path: String,
    indexed_documents: usize,
    checkpoints: u64,
    cache_entries: u64,
    documents: u64,
    clusters: u64,
}

/// `stats`: index size and record counts.
pub fn run_stats(ctx: &Context) -> Result<()> {
    let storage = ctx.open_storage()?;
    let stats = storage.get_stats()?;
    let indexed_documents = match storage.get_checkpoint(INDEX_CHECKPOINT)? {
        Some(bytes) => IndexSnapshot::from_bytes(&bytes)
            .context("Stored index checkpoint is unreadable")?
            .len(),
        None => 0,
    };

    print_json(&StatsOutput {
        db_path: ctx.settings.db_path.clone(),
        indexed_documents,
        checkpoints: stats.checkpoint_count,
        cache_entries: stats.cache_entry_count,
        documents: stats.document_count,
        clusters: stats.cluster_count,
    })
}

/// Read a JSON-lines document file. Malformed lines are logged and skipped.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut documents = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match SourceDocument::parse_line(&line) {
            Ok(source) => documents.push(source.into_document()),
            Err(e) => warn!(line = number + 1, error = %e, "Skipping malformed document"),
        }
    }
    info!(path = %path.display(), documents = documents.len(), "Read documents");
    Ok(documents)
}

fn write_documents<W: Write>(mut writer: W, documents: &[Document]) -> Result<()> {
    for doc in documents {
        serde_json::to_writer(&mut writer, doc)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
