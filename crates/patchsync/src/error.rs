//! 💥 error.rs — the closed taxonomy of things that can go wrong.
//!
//! 🧠 Knowledge graph: every row of the error table in the design doc gets
//! exactly one variant here. No catch-all `Other(String)`. If you hit a new
//! failure mode, you add a variant — you don't stringly-type your way out.
//!
//! `Io`/`Xml`/`Zip` wrap the three ambient codecs (`std::io`, `quick_xml`,
//! `zip`) because a filesystem failure or a malformed XML document is still
//! a `patchsync` failure, not a foreign one, by the time it reaches a caller.

use std::path::PathBuf;

use thiserror::Error;

/// 💥 Everything that can go wrong while cataloging, planning, archiving,
/// or publishing a graph.
#[derive(Debug, Error)]
pub enum Error {
    /// `max_files_compressed` exceeds the Sitemap protocol's 50,000-item
    /// cap, or the CLI surface otherwise can't make sense of itself.
    /// Fatal at startup — no filesystem change has happened yet.
    #[error("{max_files_compressed} exceeds the Sitemap protocol limit of 50000 items per document")]
    ConfigInvalid { max_files_compressed: usize },

    /// Source and sink `started_at.txt` disagree, and the sink is *not*
    /// empty of owned artifacts — wiping it would be destroying someone
    /// else's unrelated publication, so we refuse instead.
    #[error(
        "source handshake is present but sink '{sink_dir}' already has owned files and no handshake of its own"
    )]
    HandshakeConflictNonEmpty { sink_dir: PathBuf },

    /// A `rdfpatch-0d*` dump file exists but no `# at checkpoint <digits>`
    /// line was found in it.
    #[error("no '# at checkpoint' line found in dump file '{path}'")]
    CheckpointMissing { path: PathBuf },

    /// A second dump file in the same catalog scan carries a different
    /// checkpoint value than the one already cached — dump files in one
    /// run are never allowed to disagree about where the stream forked.
    #[error(
        "dump file '{path}' reports checkpoint {found}, but an earlier dump file in this run reported {cached}"
    )]
    CheckpointMismatch {
        path: PathBuf,
        cached: String,
        found: String,
    },

    /// More than one `part_end_*.zip` exists in a sink directory — the
    /// open-tail invariant (at most one) has already been violated by
    /// something other than this engine.
    #[error("found more than one part_end_*.zip in '{sink_dir}'; inconsistent sink structure")]
    InconsistentSink { sink_dir: PathBuf },

    /// An archive referenced by `resource-dump.xml` metadata could not be
    /// located, or a metadata entry expected to exist did not.
    #[error("expected to find '{uri}' in {path}")]
    MetadataEntryMissing { uri: String, path: PathBuf },

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML (de)serialization failure — a sidecar or metadata document
    /// didn't round-trip. Held as a plain message: quick-xml draws this
    /// from distinct serialize/deserialize error types and we don't care
    /// which side it came from by the time it's ours.
    #[error("XML error: {0}")]
    Xml(String),

    /// Zip container write/read failure.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<quick_xml::se::SeError> for Error {
    fn from(e: quick_xml::se::SeError) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<quick_xml::de::DeError> for Error {
    fn from(e: quick_xml::de::DeError) -> Self {
        Error::Xml(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
