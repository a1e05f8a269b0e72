use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use globset::Glob;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

use rigby_core::chunk_store::ChunkStore;
use rigby_core::layout;
use rigby_core::manifest::{is_http_url, Chunk, Manifest};
use rigby_core::progress::{HumanProgress, JsonProgress, Progress};
use rigby_core::restore::RestoreTask;
use rigby_core::scheduler;
use rigby_core::stats::RestoreStats;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "rigby", version, about = "Content-addressed file restoration and repair")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Restore an output tree to exactly match one or more manifests
    Restore {
        /// Manifest paths, glob patterns, or http(s) URLs
        manifests: Vec<String>,
        /// Output directory to restore into
        #[arg(long)]
        out_dir: PathBuf,
        /// Local chunk cache root (two-level fan-out layout)
        #[arg(long)]
        chunks_root: Option<PathBuf>,
        /// Remote chunk store base URL
        #[arg(long)]
        base_url: Option<String>,
        /// Fail instead of downloading chunks missing from the local cache
        #[arg(long, default_value_t = false)]
        no_download: bool,
        /// Emit machine-readable JSON events instead of the live view
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Worker count (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Restore { manifests, out_dir, chunks_root, base_url, no_download, json, workers } => {
            restore(&manifests, &out_dir, chunks_root, base_url, no_download, json, workers)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn restore(
    manifests: &[String],
    out_dir: &Path,
    chunks_root: Option<PathBuf>,
    base_url: Option<String>,
    no_download: bool,
    json: bool,
    workers: Option<usize>,
) -> Result<()> {
    if manifests.is_empty() {
        bail!("at least one manifest path, glob, or URL is required");
    }
    if chunks_root.is_none() && base_url.is_none() {
        bail!("either --chunks-root or --base-url is required");
    }

    let sources = expand_manifest_inputs(manifests)?;
    if sources.is_empty() {
        bail!("no manifest files matched the provided inputs");
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory {}", out_dir.display()))?;
    let out_root = std::fs::canonicalize(out_dir)
        .with_context(|| format!("resolve output directory {}", out_dir.display()))?;

    let chunks_root = match chunks_root {
        Some(root) => Some(
            std::fs::canonicalize(&root)
                .with_context(|| format!("chunks root does not exist: {}", root.display()))?,
        ),
        None => None,
    };

    let http = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("build HTTP client")?;

    // Plan every task up front; manifest and path-safety problems abort the
    // run before any worker starts.
    let mut tasks: Vec<RestoreTask> = Vec::new();
    let mut expected = HashSet::new();
    for source in &sources {
        let manifest = Manifest::load(source, &http)?;
        let prefix = layout::normalize_prefix(manifest.path_prefix.as_deref());
        let prefix = layout::resolve_effective_prefix(&out_root, &prefix, &manifest.files);
        let chunks: Arc<[Chunk]> = manifest.chunks.into();

        for file in manifest.files {
            let rel = if prefix.is_empty() {
                file.path.clone()
            } else {
                format!("{prefix}/{}", file.path)
            };
            let output_path = layout::resolve_output_path(&out_root, &rel)?;
            if !expected.insert(layout::path_key(&output_path)) {
                bail!("manifests target the same output path twice: {rel}");
            }
            tasks.push(RestoreTask::new(output_path, rel, file, chunks.clone()));
        }
    }

    let total_bytes: u64 = tasks.iter().map(|t| t.file.size).sum();
    let stats = Arc::new(RestoreStats::new(tasks.len() as u64, total_bytes));
    let out_display = out_root.display().to_string();
    let progress: Box<dyn Progress> = if json {
        Box::new(JsonProgress::new(stats.clone(), out_display))
    } else {
        Box::new(HumanProgress::new(stats.clone(), out_display))
    };

    let store = ChunkStore::new(chunks_root, base_url, no_download, http);
    let workers = workers.unwrap_or_else(scheduler::default_workers);
    let cancel = AtomicBool::new(false);

    progress.on_started();
    scheduler::run_restore(&tasks, &store, &stats, progress.as_ref(), workers, &cancel)?;

    let deleted = layout::reconcile_tree(&out_root, &expected)?;
    progress.finalize(deleted);
    Ok(())
}

/// Expand manifest arguments: URLs pass through, existing files resolve to
/// absolute paths, anything containing glob metacharacters is matched
/// against the current directory tree. Duplicates collapse.
fn expand_manifest_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let cwd = std::env::current_dir()?;

    for raw in patterns {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if is_http_url(raw) {
            if seen.insert(raw.to_string()) {
                results.push(raw.to_string());
            }
            continue;
        }

        let path = Path::new(raw);
        if path.is_file() {
            let full = std::fs::canonicalize(path)?;
            let full = full.to_string_lossy().to_string();
            if seen.insert(full.clone()) {
                results.push(full);
            }
            continue;
        }

        if !raw.contains('*') && !raw.contains('?') {
            continue;
        }
        let glob = Glob::new(&raw.replace('\\', "/"))
            .with_context(|| format!("invalid manifest glob: {raw}"))?
            .compile_matcher();
        let mut matched: Vec<String> = Vec::new();
        for entry in WalkDir::new(&cwd).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&cwd) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if glob.is_match(&rel) {
                matched.push(entry.path().to_string_lossy().to_string());
            }
        }
        matched.sort();
        for full in matched {
            if seen.insert(full.clone()) {
                results.push(full);
            }
        }
    }

    Ok(results)
}
