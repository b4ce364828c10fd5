//! ⚙️ engine.rs — the state machine that reconciles one graph per run.
//!
//! 🧠 Knowledge graph: a single-pass state machine for one graph: plan
//! batches, seal the full ones, maybe rewrite the tail, publish metadata,
//! then clean up the superseded tail — and if anything between sealing
//! and cleanup goes wrong, sweep the open-tail chain back to a consistent
//! state before propagating the `Err`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveContext, ArchiveRecord, ArchiveWriterBackend, OPEN_TAIL_PREFIX};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::metadata::GraphMetadata;
use crate::planner::{BatchKind, BatchPlanner};
use crate::published_state::{self, PublishedState};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_batch_size: usize,
    pub write_separate_manifest: bool,
    pub move_resources: bool,
    pub builder_class: String,
}

/// What one `synchronize` call accomplished, for the orchestrator's
/// running counters and the root Source Description decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state_changed: bool,
    pub sealed_count: usize,
    /// Signed delta in open-tail membership size: positive when the tail
    /// grew, negative when it shrank (can't happen), zero when untouched.
    pub open_tail_delta: i64,
}

pub struct SyncEngine {
    source_dir: PathBuf,
    sink_dir: PathBuf,
    public_prefix: String,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(source_dir: PathBuf, sink_dir: PathBuf, public_prefix: String, config: EngineConfig) -> Self {
        Self {
            source_dir,
            sink_dir,
            public_prefix,
            config,
        }
    }

    pub fn capability_list_url(&self) -> String {
        format!("{}capability-list.xml", self.public_prefix)
    }

    /// `synchronize()`. Ensures directories exist, then runs
    /// the plan/seal/publish/cleanup cycle, sweeping the open-tail chain
    /// on any failure between sealing and cleanup before propagating it.
    pub fn synchronize(&self, root_description_url: &str) -> Result<SyncOutcome> {
        fs::create_dir_all(&self.source_dir)?;
        fs::create_dir_all(&self.sink_dir)?;

        let published = published_state::inspect(&self.sink_dir)?;
        let files = ResourceCatalog::new().enumerate(&self.source_dir)?;
        let planner = BatchPlanner::new(self.config.max_batch_size)?;
        let plan = planner.plan(files);

        let metadata = GraphMetadata::new(self.sink_dir.clone(), self.public_prefix.clone());

        match self.run_cycle(&plan, &published, &metadata, root_description_url) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, sink = %self.sink_dir.display(), "sync failed, sweeping open-tail chain");
                if let Err(sweep_err) = self.recover_open_tail_chain() {
                    tracing::error!(error = %sweep_err, "error recovery sweep itself failed");
                }
                Err(e)
            }
        }
    }

    fn run_cycle(
        &self,
        plan: &crate::planner::BatchPlan,
        published: &PublishedState,
        metadata: &GraphMetadata,
        root_description_url: &str,
    ) -> Result<SyncOutcome> {
        let mut new_archives: Vec<ArchiveRecord> = Vec::new();
        let mut sealed_count = 0usize;
        let mut open_tail_delta: i64 = 0;
        let mut superseded_uri: Option<String> = None;

        let ctx = ArchiveContext {
            target_dir: self.sink_dir.clone(),
            public_prefix: self.public_prefix.clone(),
            write_separate_manifest: self.config.write_separate_manifest,
            move_resources: self.config.move_resources,
        };
        let writer = ArchiveWriterBackend::from_builder_class(&self.config.builder_class);

        for batch in &plan.sealed {
            let hydrated: Vec<_> = batch
                .files
                .iter()
                .map(|f| f.hydrate())
                .collect::<Result<_>>()?;
            let record = writer.write(batch, &hydrated, &ctx)?;
            sealed_count += batch.files.len();
            new_archives.push(record);
        }

        if let Some(tail) = &plan.open_tail {
            let tail_uris: std::collections::BTreeSet<String> = tail
                .files
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect();
            let unchanged = published
                .open_tail
                .as_ref()
                .is_some_and(|existing| existing.source_uris == tail_uris);

            if !unchanged {
                let old_size = published
                    .open_tail
                    .as_ref()
                    .map(|t| t.source_uris.len())
                    .unwrap_or(0);
                open_tail_delta = tail_uris.len() as i64 - old_size as i64;

                let hydrated: Vec<_> = tail
                    .files
                    .iter()
                    .map(|f| f.hydrate())
                    .collect::<Result<_>>()?;
                let record = writer.write(tail, &hydrated, &ctx)?;
                superseded_uri = published
                    .open_tail
                    .as_ref()
                    .map(|t| format!("{}{}", self.public_prefix, file_name(&t.zip_path)));
                new_archives.push(record);
            }
        } else if let Some(existing) = &published.open_tail {
            // No eligible files remain for an open tail this run (e.g. the
            // source went quiet): the old tail has nothing to compare
            // against, so it's treated as superseded with nothing to
            // replace it.
            open_tail_delta = -(existing.source_uris.len() as i64);
            superseded_uri = Some(format!("{}{}", self.public_prefix, file_name(&existing.zip_path)));
        }

        let state_changed = !new_archives.is_empty() || superseded_uri.is_some();
        if state_changed {
            // Write the dump first: if it fails (e.g. a superseded URI that
            // isn't actually in the dump), the capability list must not be
            // created pointing at a dump that was never durably written.
            metadata.update(&new_archives, superseded_uri.as_deref())?;
            metadata.ensure_capability_list(root_description_url)?;
        }

        if let Some(uri) = &superseded_uri {
            self.delete_superseded_tail(uri)?;
        }

        Ok(SyncOutcome {
            state_changed,
            sealed_count,
            open_tail_delta,
        })
    }

    fn delete_superseded_tail(&self, superseded_uri: &str) -> Result<()> {
        let Some(basename) = superseded_uri.rsplit('/').next() else {
            return Ok(());
        };
        let Some(base) = basename.strip_suffix(".zip") else {
            return Ok(());
        };
        remove_if_exists(&self.sink_dir.join(format!("{base}.zip")))?;
        remove_if_exists(&self.sink_dir.join(format!("{base}.xml")))?;
        remove_if_exists(&self.sink_dir.join(format!("manifest_{base}.xml")))?;
        Ok(())
    }

    /// Recovery step: delete every `part_end_*` artifact and drop every
    /// Resource Dump entry whose URI begins with the open-tail public
    /// prefix. Sealed archives are never touched.
    fn recover_open_tail_chain(&self) -> Result<()> {
        if self.sink_dir.exists() {
            for entry in fs::read_dir(&self.sink_dir)? {
                let entry = entry?;
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                let is_tail_artifact = name.starts_with(OPEN_TAIL_PREFIX)
                    || name.starts_with(&format!("manifest_{OPEN_TAIL_PREFIX}"));
                if is_tail_artifact {
                    fs::remove_file(entry.path())?;
                }
            }
        }

        let dump_path = self.sink_dir.join("resource-dump.xml");
        if dump_path.exists() {
            let xml = fs::read_to_string(&dump_path)?;
            let mut doc: crate::xml::ResourceDumpDocument = quick_xml::de::from_str(&xml)?;
            let open_tail_prefix = format!("{}{OPEN_TAIL_PREFIX}", self.public_prefix);
            doc.urls.retain(|u| !u.loc.starts_with(&open_tail_prefix));
            fs::write(&dump_path, quick_xml::se::to_string(&doc)?)?;
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn default_config() -> EngineConfig {
        EngineConfig {
            max_batch_size: 2,
            write_separate_manifest: true,
            move_resources: false,
            builder_class: "zip".to_string(),
        }
    }

    fn touch(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn the_one_where_a_quiet_source_changes_nothing() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        let engine = SyncEngine::new(
            src.path().to_path_buf(),
            sink.path().to_path_buf(),
            "http://example.com/pub/".to_string(),
            default_config(),
        );
        let outcome = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert_eq!(outcome, SyncOutcome::default());
        assert!(
            !sink.path().join("capability-list.xml").exists(),
            "nothing changed, so no capability-list.xml pointing at an unwritten resource-dump.xml"
        );
    }

    #[test]
    fn the_one_where_enough_files_seal_a_batch_and_leave_an_open_tail() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        for (i, ts) in ["20160101000000", "20160102000000", "20160103000000", "20160104000000"]
            .into_iter()
            .enumerate()
        {
            touch(src.path(), &format!("rdfpatch-{ts}"), &format!("body {i}"));
        }

        let engine = SyncEngine::new(
            src.path().to_path_buf(),
            sink.path().to_path_buf(),
            "http://example.com/pub/".to_string(),
            default_config(),
        );
        let outcome = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();

        assert!(outcome.state_changed);
        assert_eq!(outcome.sealed_count, 2);
        assert_eq!(outcome.open_tail_delta, 1);
        assert!(sink.path().join("part_def_00000.zip").exists());
        assert!(sink.path().join("part_end_00000.zip").exists());
        assert!(sink.path().join("resource-dump.xml").exists());
        assert!(sink.path().join("capability-list.xml").exists());
    }

    #[test]
    fn the_one_where_an_unchanged_tail_is_a_no_op_on_the_second_run() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        touch(src.path(), "rdfpatch-20160101000000", "only file, held back");

        let config = default_config();
        let engine = SyncEngine::new(
            src.path().to_path_buf(),
            sink.path().to_path_buf(),
            "http://example.com/pub/".to_string(),
            config.clone(),
        );
        let first = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert!(!first.state_changed, "single file is entirely held back");

        // Add a second file so the first becomes eligible for the tail.
        touch(src.path(), "rdfpatch-20160102000000", "now there are two");
        let second = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert!(second.state_changed);
        assert_eq!(second.open_tail_delta, 1);

        // Re-running with the same two files (nothing new written) should
        // be a no-op: the tail's URI set hasn't changed.
        let third = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert!(!third.state_changed);
        assert_eq!(third.open_tail_delta, 0);
    }

    #[test]
    fn the_one_where_a_source_gone_quiet_tears_down_the_stale_tail() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        touch(src.path(), "rdfpatch-20160101000000", "alone, held back");
        touch(src.path(), "rdfpatch-20160102000000", "now eligible for the tail");

        let engine = SyncEngine::new(
            src.path().to_path_buf(),
            sink.path().to_path_buf(),
            "http://example.com/pub/".to_string(),
            default_config(),
        );
        engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert!(sink.path().join("part_end_00000.zip").exists());

        // Open-tail member files stay in sourceDir (they must remain
        // rewritable); simulate the upstream pruning the file out from
        // under us between runs so nothing is left to fill the tail.
        fs::remove_file(src.path().join("rdfpatch-20160101000000")).unwrap();

        let outcome = engine
            .synchronize("http://example.com/.well-known/resourcesync")
            .unwrap();
        assert!(outcome.state_changed);
        assert_eq!(outcome.open_tail_delta, -1);
        assert!(!sink.path().join("part_end_00000.zip").exists());
    }
}
