//! 🤝 handshake.rs — detecting when the upstream restarted from scratch.
//!
//! 🧠 Knowledge graph: a short opaque token written once by the upstream
//! to `started_at.txt` at the source root. If the sink's copy disagrees,
//! either the sink is legitimately fresh (no owned files yet — accept it)
//! or it holds somebody else's publication (owned files exist, no token
//! of its own — refuse rather than guess), or it's a genuine restart
//! (token differs — wipe only what this engine owns and adopt the new
//! token).

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const HANDSHAKE_FILE: &str = "started_at.txt";
const GRAPH_INDEX_FILE: &str = "vql_graph_folder.csv";
const COUNTER_FILE: &str = "vql_files_count.txt";

/// Filename prefixes (or exact names) this engine considers itself the
/// owner of — the set a handshake mismatch is allowed to delete.
const OWNED_PREFIXES: &[&str] = &[
    HANDSHAKE_FILE,
    GRAPH_INDEX_FILE,
    COUNTER_FILE,
    "rdfpatch-",
    "resource-dump.xml",
    "capability-list.xml",
    "manifest_",
    "part_def_",
    "part_end_",
];

pub fn is_owned_name(name: &str) -> bool {
    OWNED_PREFIXES.iter().any(|p| name == *p || name.starts_with(p))
}

#[derive(Debug, Default)]
pub struct HandshakeGuard;

impl HandshakeGuard {
    pub fn new() -> Self {
        Self
    }

    /// `verify(sourceDir, sinkDir) -> token | none`, implementing the
    /// decision table. Returns `None` for both "no handshake to check"
    /// (warn, do nothing) and the accept-as-fresh branch that simply
    /// proceeds without adopting a token yet — callers only need the
    /// `Some(token)` case to know a mismatch wipe already happened.
    pub fn verify(&self, source_dir: &Path, sink_dir: &Path) -> Result<Option<String>> {
        let source_token = read_token(&source_dir.join(HANDSHAKE_FILE))?;
        let Some(source_token) = source_token else {
            tracing::warn!(source = %source_dir.display(), "no handshake token in source, skipping graph");
            return Ok(None);
        };

        let sink_token_path = sink_dir.join(HANDSHAKE_FILE);
        let sink_token = read_token(&sink_token_path)?;

        match sink_token {
            None => {
                if sink_has_owned_files(sink_dir)? {
                    return Err(Error::HandshakeConflictNonEmpty {
                        sink_dir: sink_dir.to_path_buf(),
                    });
                }
                fs::write(&sink_token_path, &source_token)?;
                Ok(Some(source_token))
            }
            Some(existing) if existing == source_token => Ok(Some(source_token)),
            Some(_different) => {
                wipe_owned_files(sink_dir)?;
                fs::write(&sink_token_path, &source_token)?;
                Ok(Some(source_token))
            }
        }
    }
}

fn read_token(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

fn sink_has_owned_files(sink_dir: &Path) -> Result<bool> {
    if !sink_dir.exists() {
        return Ok(false);
    }
    for entry in fs::read_dir(sink_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if entry.file_type()?.is_dir() || is_owned_name(name) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Delete every file this engine owns, plus every immediate subdirectory
/// (the multi-graph case — each graph subdirectory is itself wholly owned).
fn wipe_owned_files(sink_dir: &Path) -> Result<()> {
    if !sink_dir.exists() {
        return Ok(());
    }
    let mut removed = Vec::new();
    for entry in fs::read_dir(sink_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            fs::remove_dir_all(entry.path())?;
            removed.push(name.to_string());
        } else if is_owned_name(name) {
            fs::remove_file(entry.path())?;
            removed.push(name.to_string());
        }
    }
    tracing::info!(sink = %sink_dir.display(), removed = removed.len(), "handshake mismatch, wiped owned sink files");
    Ok(())
}
