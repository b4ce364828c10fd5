//! 📚 catalog.rs — turning a pile of files into an ordered `InputFile` list.
//!
//! 🧠 Knowledge graph: the two filename families (`rdfpatch-<ts>` and
//! `rdfpatch-0d<seq>`) are both monotonic by construction, so lexicographic
//! filename order *is* chronological order — we never sort by a parsed
//! timestamp, we sort by string and trust the upstream's naming contract.
//!
//! MD5 and size are expensive; `enumerate` never touches file contents for
//! either. Only `hydrate` (called by the planner once it knows which files
//! are actually going into a batch) does that work.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

const PATCH_PREFIX: &str = "rdfpatch-";
const DUMP_PREFIX: &str = "rdfpatch-0d";

/// One RDF change file, identified and timestamped but not yet hashed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub path: PathBuf,
    pub filename: String,
    pub timestamp: String,
}

impl InputFile {
    /// Read size and MD5 off disk. Called once per file the planner
    /// actually selects for a batch — never during `enumerate`.
    pub fn hydrate(&self) -> Result<HydratedFile> {
        let mut f = File::open(&self.path)?;
        let size = f.metadata()?.len();
        let mut ctx = md5::Context::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = f.read(&mut buf)?;
            if n == 0 {
                break;
            }
            ctx.consume(&buf[..n]);
        }
        let digest = ctx.compute();
        Ok(HydratedFile {
            input: self.clone(),
            size,
            md5: format!("{digest:x}"),
        })
    }
}

/// An `InputFile` plus the two attributes that cost a full read to obtain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedFile {
    pub input: InputFile,
    pub size: u64,
    pub md5: String,
}

/// Enumerates a source directory's own `rdfpatch-*` files — does not
/// descend into subdirectories, since a multi-graph source root's
/// subdirectories are each enumerated as their own graph by the
/// orchestrator, not folded into the parent's catalog.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    dump_timestamp: Option<String>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `enumerate(sourceDir) -> ordered InputFile sequence`.
    /// Files that match neither filename family are silently skipped. A
    /// dump file with no checkpoint line is fatal; a patch file with a
    /// malformed 14-digit suffix is skipped and logged, not fatal — the
    /// error table's "ignore file" policy governs at the catalog boundary,
    /// not the narrower per-family description above it.
    pub fn enumerate(&mut self, source_dir: &Path) -> Result<Vec<InputFile>> {
        let mut names: Vec<String> = WalkDir::new(source_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .collect();
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for filename in names {
            let path = source_dir.join(&filename);
            if let Some(timestamp) = self.timestamp_for(&path, &filename)? {
                out.push(InputFile {
                    path,
                    filename,
                    timestamp,
                });
            }
        }
        Ok(out)
    }

    fn timestamp_for(&mut self, path: &Path, filename: &str) -> Result<Option<String>> {
        if filename.starts_with(DUMP_PREFIX) {
            let found = read_checkpoint(path)?;
            match (&self.dump_timestamp, found) {
                (None, None) => {
                    return Err(Error::CheckpointMissing {
                        path: path.to_path_buf(),
                    });
                }
                (None, Some(found)) => self.dump_timestamp = Some(found),
                // A later dump file with no checkpoint line of its own just
                // inherits the cached value, per the "read once, reuse for
                // every dump file" rule.
                (Some(_), None) => {}
                (Some(cached), Some(found)) if *cached != found => {
                    return Err(Error::CheckpointMismatch {
                        path: path.to_path_buf(),
                        cached: cached.clone(),
                        found,
                    });
                }
                (Some(_), Some(_)) => {}
            }
            Ok(self.dump_timestamp.clone())
        } else if filename.starts_with(PATCH_PREFIX) {
            match parse_patch_suffix(filename) {
                Some(ts) => Ok(Some(ts)),
                None => {
                    tracing::warn!(filename, "malformed rdfpatch suffix, ignoring file");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }
}

/// `rdfpatch-YYYYMMDDHHMMSS` → `YYYY-MM-DDTHH:MM:SSZ`. Returns `None` if the
/// suffix isn't exactly 14 ASCII digits.
fn parse_patch_suffix(filename: &str) -> Option<String> {
    let suffix = filename.strip_prefix(PATCH_PREFIX)?;
    if suffix.len() != 14 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}-{}-{}T{}:{}:{}Z",
        &suffix[0..4],
        &suffix[4..6],
        &suffix[6..8],
        &suffix[8..10],
        &suffix[10..12],
        &suffix[12..14],
    ))
}

/// Scan a dump file for the first `# at checkpoint <digits>` line and
/// format the digits the same way a patch suffix would be: a 14-digit
/// positional timestamp, so the two families compare naturally once
/// sorted. `None` if the file carries no such line — not every dump file
/// needs one, only the first one a catalog scan encounters.
fn read_checkpoint(path: &Path) -> Result<Option<String>> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if let Some(rest) = line.trim_start().strip_prefix("# at checkpoint") {
            // First contiguous run of digits on the line, not every digit
            // in it — a trailing comment or a second number must not get
            // concatenated into the checkpoint value.
            let digits: String = rest
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.len() == 14 {
                return Ok(Some(format!(
                    "{}-{}-{}T{}:{}:{}Z",
                    &digits[0..4],
                    &digits[4..6],
                    &digits[6..8],
                    &digits[8..10],
                    &digits[10..12],
                    &digits[12..14],
                )));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn touch(dir: &Path, name: &str, contents: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn the_one_where_patch_files_sort_chronologically() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rdfpatch-20160613082341", "a");
        touch(dir.path(), "rdfpatch-20160101000000", "b");
        touch(dir.path(), "not-ours.txt", "c");

        let files = ResourceCatalog::new().enumerate(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "rdfpatch-20160101000000");
        assert_eq!(files[0].timestamp, "2016-01-01T00:00:00Z");
        assert_eq!(files[1].filename, "rdfpatch-20160613082341");
    }

    #[test]
    fn the_one_where_a_malformed_suffix_gets_quietly_dropped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rdfpatch-not14digits", "a");
        touch(dir.path(), "rdfpatch-20160613082341", "b");

        let files = ResourceCatalog::new().enumerate(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "rdfpatch-20160613082341");
    }

    #[test]
    fn the_one_where_every_dump_file_shares_the_first_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            "rdfpatch-0d00001",
            "triples go here\n# at checkpoint 20160613082341\nmore triples\n",
        );
        touch(dir.path(), "rdfpatch-0d00002", "no checkpoint line in this one\n");

        let files = ResourceCatalog::new().enumerate(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.timestamp == "2016-06-13T08:23:41Z"));
    }

    #[test]
    fn the_one_where_disagreeing_dump_checkpoints_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rdfpatch-0d00001", "# at checkpoint 20160613082341\n");
        touch(dir.path(), "rdfpatch-0d00002", "# at checkpoint 20170101000000\n");

        let err = ResourceCatalog::new().enumerate(dir.path()).unwrap_err();
        assert!(matches!(err, Error::CheckpointMismatch { .. }));
    }

    #[test]
    fn the_one_where_a_dump_file_with_no_checkpoint_line_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rdfpatch-0d00001", "nothing to see here\n");

        let err = ResourceCatalog::new().enumerate(dir.path()).unwrap_err();
        assert!(matches!(err, Error::CheckpointMissing { .. }));
    }

    #[test]
    fn the_one_where_the_checkpoint_line_only_reads_the_first_digit_run() {
        let dir = tempfile::tempdir().unwrap();
        // A trailing digit run on the same line (a comment, a revision
        // marker) must not get concatenated onto the checkpoint value.
        touch(
            dir.path(),
            "rdfpatch-0d00001",
            "# at checkpoint 20160613082341 (rev 2)\n",
        );

        let files = ResourceCatalog::new().enumerate(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].timestamp, "2016-06-13T08:23:41Z");
    }

    #[test]
    fn the_one_where_hydrate_computes_size_and_md5() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "rdfpatch-20160613082341", "hello world");

        let files = ResourceCatalog::new().enumerate(dir.path()).unwrap();
        let hydrated = files[0].hydrate().unwrap();
        assert_eq!(hydrated.size, 11);
        assert_eq!(hydrated.md5, format!("{:x}", md5::compute("hello world")));
    }
}
