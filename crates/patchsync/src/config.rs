//! 🔧 config.rs — the CLI surface, validated once before a single byte moves.
//!
//! 🧠 Knowledge graph: validation happens inline — publish_url defaulting,
//! trailing-slash normalization, the 50000 ceiling — before anything
//! touches the filesystem. A `clap::Parser` struct instead of hand-rolled
//! positional args, but the "fail loud, fail before touching disk"
//! discipline stays non-negotiable.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::planner::MAX_BATCH_SIZE_LIMIT;

/// 🚀 Publish a stream of RDF patch/dump files as a ResourceSync feed.
#[derive(Debug, Parser)]
#[command(name = "patchsync", version, about)]
pub struct Cli {
    /// Path to the source root (where the upstream writes `rdfpatch-*`).
    #[arg(long, env = "PATCHSYNC_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Path to the sink root (what gets published).
    #[arg(long, env = "PATCHSYNC_SINK_DIR")]
    pub sink_dir: PathBuf,

    /// Public URL prefix under which `sink_dir` is served.
    #[arg(long, env = "PATCHSYNC_PUBLISH_URL")]
    pub publish_url: String,

    /// Selector for the `ArchiveWriter` implementation. Only `zip` exists
    /// today; the flag is an extension point, not a live plugin registry.
    #[arg(long, env = "PATCHSYNC_BUILDER_CLASS", default_value = "zip")]
    pub builder_class: String,

    /// Maximum files per sealed batch. Capped at the Sitemap protocol's
    /// 50,000-entries-per-document limit.
    #[arg(long, env = "PATCHSYNC_MAX_FILES_COMPRESSED", default_value_t = 50_000)]
    pub max_files_compressed: usize,

    /// Emit a browsable `manifest_part_*.xml` sidecar alongside each zip.
    #[arg(long, env = "PATCHSYNC_WRITE_SEPARATE_MANIFEST", default_value_t = YesNo::Yes)]
    pub write_separate_manifest: YesNo,

    /// Move zipped files into the sink instead of deleting them from the
    /// source once packaged.
    #[arg(long, env = "PATCHSYNC_MOVE_RESOURCES", default_value_t = YesNo::No)]
    pub move_resources: YesNo,
}

/// A `clap`-friendly `y`/`n` flag for these two options, kept instead of
/// a bare boolean so `--write_separate_manifest n` round-trips through
/// config files and env vars the way operators already write them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_bool(self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

impl std::str::FromStr for YesNo {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "y" | "Y" | "yes" | "true" => Ok(YesNo::Yes),
            "n" | "N" | "no" | "false" => Ok(YesNo::No),
            other => Err(format!("expected 'y' or 'n', got '{other}'")),
        }
    }
}

impl std::fmt::Display for YesNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            YesNo::Yes => "y",
            YesNo::No => "n",
        })
    }
}

impl Cli {
    /// Validate and normalize into the shape the orchestrator actually
    /// wants. Fatal at startup — `ConfigInvalid` — no
    /// filesystem change happens before this returns `Ok`.
    pub fn into_config(self) -> Result<AppConfig> {
        if self.max_files_compressed == 0 || self.max_files_compressed > MAX_BATCH_SIZE_LIMIT {
            return Err(Error::ConfigInvalid {
                max_files_compressed: self.max_files_compressed,
            });
        }
        Ok(AppConfig {
            source_dir: self.source_dir,
            sink_dir: self.sink_dir,
            publish_url: self.publish_url,
            builder_class: self.builder_class,
            max_files_compressed: self.max_files_compressed,
            write_separate_manifest: self.write_separate_manifest.as_bool(),
            move_resources: self.move_resources.as_bool(),
        })
    }
}

/// The validated, orchestrator-ready configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source_dir: PathBuf,
    pub sink_dir: PathBuf,
    pub publish_url: String,
    pub builder_class: String,
    pub max_files_compressed: usize,
    pub write_separate_manifest: bool,
    pub move_resources: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_yes_no_parses_both_spellings() {
        assert_eq!("y".parse::<YesNo>().unwrap(), YesNo::Yes);
        assert_eq!("n".parse::<YesNo>().unwrap(), YesNo::No);
        assert!("maybe".parse::<YesNo>().is_err());
    }

    #[test]
    fn the_one_where_an_oversized_batch_limit_is_rejected_before_touching_disk() {
        let cli = Cli {
            source_dir: PathBuf::from("/src"),
            sink_dir: PathBuf::from("/sink"),
            publish_url: "http://example.com/".to_string(),
            builder_class: "zip".to_string(),
            max_files_compressed: 60_000,
            write_separate_manifest: YesNo::Yes,
            move_resources: YesNo::No,
        };
        let err = cli.into_config().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }
}
