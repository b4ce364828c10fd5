//! 🗂️ metadata.rs — Source Description → Capability List → Resource Dump.
//!
//! 🧠 Knowledge graph: three documents, three different rewrite
//! disciplines. `resource-dump.xml` is rewritten on every change and
//! tracks its own `md_at`/`md_completed` — attributes that are easy to
//! lose silently across a naive read-then-write round trip if a library
//! isn't careful, so we own both fields explicitly instead of trusting a
//! default. `capability-list.xml` is written once and never touched again.
//! `.well-known/resourcesync` lives at the sink root, shared by every
//! graph, and is rewritten only when the set of Capability Lists changes
//! (written when, and only when, something actually changed — most runs
//! don't touch it at all).

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveRecord;
use crate::error::{Error, Result};
use crate::xml::{self, CapabilityListDocument, ResourceDumpDocument, SourceDescriptionDocument};

const RESOURCE_DUMP_FILE: &str = "resource-dump.xml";
const CAPABILITY_LIST_FILE: &str = "capability-list.xml";
const WELL_KNOWN_DIR: &str = ".well-known";
const WELL_KNOWN_FILE: &str = "resourcesync";

/// Owns the read-modify-write cycle for one graph's `resource-dump.xml`
/// and `capability-list.xml`.
pub struct GraphMetadata {
    sink_dir: PathBuf,
    public_prefix: String,
}

impl GraphMetadata {
    pub fn new(sink_dir: PathBuf, public_prefix: String) -> Self {
        Self { sink_dir, public_prefix }
    }

    fn resource_dump_path(&self) -> PathBuf {
        self.sink_dir.join(RESOURCE_DUMP_FILE)
    }

    fn capability_list_path(&self) -> PathBuf {
        self.sink_dir.join(CAPABILITY_LIST_FILE)
    }

    pub fn capability_list_url(&self) -> String {
        format!("{}{CAPABILITY_LIST_FILE}", self.public_prefix)
    }

    fn resource_dump_url(&self) -> String {
        format!("{}{RESOURCE_DUMP_FILE}", self.public_prefix)
    }

    fn load_resource_dump(&self) -> Result<Option<ResourceDumpDocument>> {
        let path = self.resource_dump_path();
        if !path.exists() {
            return Ok(None);
        }
        let xml = fs::read_to_string(&path)?;
        Ok(Some(quick_xml::de::from_str(&xml)?))
    }

    /// Ensure `capability-list.xml` exists; idempotent — a second call
    /// against an already-written list is a no-op.
    pub fn ensure_capability_list(&self, root_description_url: &str) -> Result<()> {
        let path = self.capability_list_path();
        if path.exists() {
            return Ok(());
        }
        let doc = CapabilityListDocument::new(root_description_url, self.resource_dump_url());
        fs::write(&path, quick_xml::se::to_string(&doc)?)?;
        Ok(())
    }

    /// Apply `resource-dump.xml`'s update rules: set
    /// `md_at` only on first creation, always refresh `md_completed`,
    /// drop `superseded_uri` if given, then append every new archive.
    ///
    /// A `superseded_uri` that isn't actually present is an invariant
    /// violation, not a silent no-op: the engine only passes one when it
    /// believes the prior open tail was published under that URI, so a
    /// miss here means the dump and the sink have already diverged.
    pub fn update(
        &self,
        new_archives: &[ArchiveRecord],
        superseded_uri: Option<&str>,
    ) -> Result<()> {
        let now = xml::now_w3c();
        let mut doc = match self.load_resource_dump()? {
            Some(doc) => doc,
            None => ResourceDumpDocument::new(self.capability_list_url(), now.clone()),
        };
        doc.md.completed = now;
        if let Some(uri) = superseded_uri {
            if !doc.remove(uri) {
                return Err(Error::MetadataEntryMissing {
                    uri: uri.to_string(),
                    path: self.resource_dump_path(),
                });
            }
        }
        for record in new_archives {
            doc.remove(&record.public_uri);
            doc.urls.push(record.to_url_entry());
        }
        fs::write(self.resource_dump_path(), quick_xml::se::to_string(&doc)?)?;
        Ok(())
    }
}

/// The root `.well-known/resourcesync` Source Description, shared across
/// every graph under one sink root. Rewritten only when the orchestrator
/// observes its capability-list count actually change.
pub struct RootDescription {
    sink_root: PathBuf,
}

impl RootDescription {
    pub fn new(sink_root: PathBuf) -> Self {
        Self { sink_root }
    }

    fn path(&self) -> PathBuf {
        self.sink_root.join(WELL_KNOWN_DIR).join(WELL_KNOWN_FILE)
    }

    pub fn url(&self, public_root: &str) -> String {
        format!("{public_root}.well-known/{WELL_KNOWN_FILE}")
    }

    pub fn load(&self) -> Result<SourceDescriptionDocument> {
        let path = self.path();
        if !path.exists() {
            return Ok(SourceDescriptionDocument::new());
        }
        let xml = fs::read_to_string(&path)?;
        Ok(quick_xml::de::from_str(&xml)?)
    }

    pub fn save(&self, doc: &SourceDescriptionDocument) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, quick_xml::se::to_string(doc)?)?;
        Ok(())
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}
