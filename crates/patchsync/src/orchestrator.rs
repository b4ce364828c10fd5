//! 🧭 orchestrator.rs — the top-level entry point: one source root in,
//! one or many graphs synchronized, one root Source Description out.
//!
//! 🧠 Knowledge graph: run the handshake once at the root, detect single-
//! vs multi-graph mode by the presence of an index file, run a
//! `SyncEngine` per graph, and rewrite `.well-known/resourcesync` only if
//! its capability-list count actually moved. The counter-reconciliation
//! step (`vql_files_count.txt`) is this crate's own bookkeeping, added to
//! give operators a cheap drift signal without re-walking every sink.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::engine::{EngineConfig, SyncEngine, SyncOutcome};
use crate::error::Result;
use crate::handshake::HandshakeGuard;
use crate::metadata::RootDescription;
use crate::progress;

const GRAPH_INDEX_FILE: &str = "vql_graph_folder.csv";
const COUNTER_FILE: &str = "vql_files_count.txt";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_batch_size: usize,
    pub write_separate_manifest: bool,
    pub move_resources: bool,
    pub builder_class: String,
}

/// Aggregate counters across every graph processed this run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub graphs_processed: usize,
    pub total_sealed: u64,
    pub total_open_tail: i64,
}

pub struct Orchestrator {
    source_root: PathBuf,
    sink_root: PathBuf,
    public_root: String,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(source_root: PathBuf, sink_root: PathBuf, public_root: String, config: OrchestratorConfig) -> Self {
        let public_root = normalize_url(&public_root);
        Self {
            source_root,
            sink_root,
            public_root,
            config,
        }
    }

    /// `run(sourceRoot, sinkRoot, publicRoot, options)`.
    pub fn run(&self) -> Result<RunSummary> {
        fs::create_dir_all(&self.source_root)?;
        fs::create_dir_all(&self.sink_root)?;

        let guard = HandshakeGuard::new();
        if guard.verify(&self.source_root, &self.sink_root)?.is_none() {
            tracing::warn!("no handshake at source root, nothing to synchronize");
            return Ok(RunSummary::default());
        }

        let root_description = RootDescription::new(self.sink_root.clone());
        let mut source_description = root_description.load()?;
        let initial_count = source_description.capability_lists.len();
        let root_description_url = root_description.url(&self.public_root);

        let graph_dirs = self.discover_graphs()?;
        let mut summary = RunSummary::default();

        for (sink_subdir, source_dir, sink_dir, public_prefix) in graph_dirs {
            let engine = SyncEngine::new(
                source_dir,
                sink_dir,
                public_prefix.clone(),
                EngineConfig {
                    max_batch_size: self.config.max_batch_size,
                    write_separate_manifest: self.config.write_separate_manifest,
                    move_resources: self.config.move_resources,
                    builder_class: self.config.builder_class.clone(),
                },
            );

            let spinner = progress::graph_spinner(&sink_subdir);
            let result = engine.synchronize(&root_description_url);
            spinner.finish_and_clear();
            let outcome = result?;
            self.record_outcome(&outcome, &mut summary);

            let capability_list_url = format!("{public_prefix}capability-list.xml");
            if outcome.state_changed && !source_description.contains(&capability_list_url) {
                source_description.add(capability_list_url);
            }
            tracing::info!(graph = %sink_subdir, sealed = outcome.sealed_count, open_tail_delta = outcome.open_tail_delta, "graph synchronized");
        }

        if source_description.capability_lists.len() != initial_count {
            root_description.save(&source_description)?;
        }

        self.reconcile_counters(&summary)?;

        Ok(summary)
    }

    fn record_outcome(&self, outcome: &SyncOutcome, summary: &mut RunSummary) {
        summary.graphs_processed += 1;
        summary.total_sealed += outcome.sealed_count as u64;
        summary.total_open_tail += outcome.open_tail_delta;
    }

    /// Multi-graph mode triggers on `vql_graph_folder.csv` at the source
    /// root: one graph per immediate subdirectory, sharing the root's
    /// Source Description. Otherwise the root itself is the one graph.
    fn discover_graphs(&self) -> Result<Vec<(String, PathBuf, PathBuf, String)>> {
        if self.source_root.join(GRAPH_INDEX_FILE).exists() {
            let mut graphs = Vec::new();
            for entry in fs::read_dir(&self.source_root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let source_dir = self.source_root.join(&name);
                let sink_dir = self.sink_root.join(&name);
                let public_prefix = format!("{}{name}/", self.public_root);
                graphs.push((name, source_dir, sink_dir, public_prefix));
            }
            graphs.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(graphs)
        } else {
            Ok(vec![(
                ".".to_string(),
                self.source_root.clone(),
                self.sink_root.clone(),
                self.public_root.clone(),
            )])
        }
    }

    /// `vql_files_count.txt` as `"<totalSealed>,<totalOpenTail>"`. Adds
    /// this run's counters to what's already stored, then warns (never
    /// fails) if the sink's running total diverges from the upstream's
    /// own count file — a divergence here means a dropped file somewhere,
    /// not a broken invariant this engine can repair on its own.
    fn reconcile_counters(&self, summary: &RunSummary) -> Result<()> {
        let sink_counter_path = self.sink_root.join(COUNTER_FILE);
        let (mut stored_sealed, mut stored_open_tail) = read_counter(&sink_counter_path)?.unwrap_or((0, 0));
        stored_sealed += summary.total_sealed as i64;
        stored_open_tail += summary.total_open_tail;
        fs::write(&sink_counter_path, format!("{stored_sealed},{stored_open_tail}"))?;

        if let Some((upstream_sealed, upstream_open_tail)) =
            read_counter(&self.source_root.join(COUNTER_FILE))?
        {
            if upstream_sealed != stored_sealed || upstream_open_tail != stored_open_tail {
                tracing::warn!(
                    upstream_sealed,
                    upstream_open_tail,
                    sink_sealed = stored_sealed,
                    sink_open_tail = stored_open_tail,
                    "sink file counter diverges from upstream's own count"
                );
            }
        }
        Ok(())
    }
}

fn read_counter(path: &Path) -> Result<Option<(i64, i64)>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let mut parts = contents.trim().splitn(2, ',');
    let (Some(a), Some(b)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => Ok(Some((a, b))),
        _ => Ok(None),
    }
}

fn normalize_url(url: &str) -> String {
    let url = if url.is_empty() { "http://example.com/" } else { url };
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Count files anywhere under `dir`, used only by tests that need to
/// assert a directory is non-trivially populated without hardcoding a
/// particular filename.
#[cfg(test)]
fn count_entries(dir: &Path) -> usize {
    WalkDir::new(dir).min_depth(1).into_iter().filter_map(|e| e.ok()).count()
}
