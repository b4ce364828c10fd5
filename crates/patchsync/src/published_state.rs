//! 🔍 published_state.rs — what does a sink directory currently think it has?
//!
//! 🧠 Knowledge graph: a startup scan — glob `part_def_*.zip` for the
//! sealed list, glob `part_end_*.zip` for the (at most one) open tail,
//! and if the tail exists, read its sidecar resourcelist to recover which
//! local files produced it. That recovered URI set is the equality key
//! `SyncEngine` uses to decide whether the tail needs rewriting at all.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{OPEN_TAIL_PREFIX, SEALED_PREFIX};
use crate::error::{Error, Result};
use crate::xml::ResourceListDocument;

/// The currently-published open tail: its zip path, index, and the set of
/// local source paths that produced it (from the sidecar resourcelist).
#[derive(Debug, Clone)]
pub struct OpenTailInfo {
    pub zip_path: PathBuf,
    pub index: u32,
    pub source_uris: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishedState {
    /// Sealed archive filenames, lexicographically sorted (== index order).
    pub sealed: Vec<String>,
    pub open_tail: Option<OpenTailInfo>,
}

/// `inspect(sinkDir) -> (sealedList, openTail?)`.
pub fn inspect(sink_dir: &Path) -> Result<PublishedState> {
    if !sink_dir.exists() {
        return Ok(PublishedState::default());
    }

    let mut sealed = Vec::new();
    let mut open_tails = Vec::new();
    for entry in fs::read_dir(sink_dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with(SEALED_PREFIX) && name.ends_with(".zip") {
            sealed.push(name);
        } else if name.starts_with(OPEN_TAIL_PREFIX) && name.ends_with(".zip") {
            open_tails.push(name);
        }
    }
    sealed.sort();

    if open_tails.len() > 1 {
        return Err(Error::InconsistentSink {
            sink_dir: sink_dir.to_path_buf(),
        });
    }

    let open_tail = match open_tails.into_iter().next() {
        Some(zip_name) => {
            let index = zip_name
                .strip_prefix(OPEN_TAIL_PREFIX)
                .and_then(|s| s.strip_suffix(".zip"))
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);
            let sidecar_name = zip_name.replace(".zip", ".xml");
            let sidecar_path = sink_dir.join(&sidecar_name);
            let source_uris = if sidecar_path.exists() {
                let xml = fs::read_to_string(&sidecar_path)?;
                let doc: ResourceListDocument = quick_xml::de::from_str(&xml)?;
                doc.uris()
            } else {
                BTreeSet::new()
            };
            Some(OpenTailInfo {
                zip_path: sink_dir.join(&zip_name),
                index,
                source_uris,
            })
        }
        None => None,
    };

    Ok(PublishedState { sealed, open_tail })
}
