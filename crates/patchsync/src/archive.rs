//! 🗜️ archive.rs — zipping a batch into a published archive.
//!
//! 🧠 Knowledge graph: `ArchiveWriter` is an extension point — resolve the
//! configured implementation, no runtime plugin registry behind it yet —
//! one built-in backend today, same trait → impl → enum
//! dispatcher → `from_config` shape the rest of this crate's seams use.
//! The `NNNNN` index is allocated by globbing the target directory and
//! taking `max(existing) + 1` rather than tracking a counter anywhere,
//! because the filesystem is the only source of truth a crash can't desync.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::catalog::HydratedFile;
use crate::error::Result;
use crate::planner::{Batch, BatchKind};
use crate::xml::{Link, ResourceDumpManifestDocument, ResourceMd, UrlEntry};

pub const SEALED_PREFIX: &str = "part_def_";
pub const OPEN_TAIL_PREFIX: &str = "part_end_";
const INDEX_WIDTH: usize = 5;

/// 🧾 Everything `ArchiveWriter::write` needs besides the batch itself.
#[derive(Debug, Clone)]
pub struct ArchiveContext {
    pub target_dir: PathBuf,
    pub public_prefix: String,
    pub write_separate_manifest: bool,
    pub move_resources: bool,
}

/// 📦 What comes back once an archive is on disk: enough to build its
/// `<url>` entry in `resource-dump.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    pub public_uri: String,
    pub filename: String,
    pub size: u64,
    pub md5: String,
    pub mime_type: String,
    pub last_modified: String,
    pub content_link: Option<Link>,
}

impl ArchiveRecord {
    pub fn to_url_entry(&self) -> UrlEntry {
        UrlEntry {
            loc: self.public_uri.clone(),
            lastmod: Some(self.last_modified.clone()),
            md: Some(ResourceMd {
                hash: Some(format!("md5:{}", self.md5)),
                length: Some(self.size),
                mime_type: Some(self.mime_type.clone()),
            }),
            ln: self.content_link.clone(),
        }
    }
}

/// 🎭 The polymorphic writer — one built-in backend (zip) today, a seam
/// for more tomorrow. Resolved by `--builder_class`, default `zip`.
#[derive(Debug, Clone, Copy)]
pub enum ArchiveWriterBackend {
    Zip(ZipArchiveWriter),
}

impl ArchiveWriterBackend {
    pub fn from_builder_class(name: &str) -> Self {
        match name {
            // The only built-in today; an unrecognized name still falls
            // back to it rather than failing — `--builder_class` is an
            // extension point without a plugin registry behind it yet.
            _ => ArchiveWriterBackend::Zip(ZipArchiveWriter),
        }
    }

    pub fn write(
        &self,
        batch: &Batch,
        hydrated: &[HydratedFile],
        ctx: &ArchiveContext,
    ) -> Result<ArchiveRecord> {
        match self {
            ArchiveWriterBackend::Zip(w) => w.write(batch, hydrated, ctx),
        }
    }
}

/// 🗜️ The one archive writer this crate ships: a deflate zip with an
/// in-zip `manifest.xml`, an optional sidecar manifest, and (open-tail
/// only) a sidecar resourcelist recording the local paths zipped.
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiveWriter;

impl ZipArchiveWriter {
    pub fn write(
        &self,
        batch: &Batch,
        hydrated: &[HydratedFile],
        ctx: &ArchiveContext,
    ) -> Result<ArchiveRecord> {
        let prefix = match batch.kind {
            BatchKind::Sealed => SEALED_PREFIX,
            BatchKind::OpenTail => OPEN_TAIL_PREFIX,
        };
        fs::create_dir_all(&ctx.target_dir)?;
        let index = next_index(&ctx.target_dir, prefix)?;
        let base = format!("{prefix}{index:0width$}", width = INDEX_WIDTH);
        let zip_filename = format!("{base}.zip");
        let zip_path = ctx.target_dir.join(&zip_filename);

        let manifest_urls: Vec<UrlEntry> = hydrated
            .iter()
            .map(|h| UrlEntry {
                loc: h.input.filename.clone(),
                lastmod: Some(h.input.timestamp.clone()),
                md: Some(ResourceMd {
                    hash: Some(format!("md5:{}", h.md5)),
                    length: Some(h.size),
                    mime_type: None,
                }),
                ln: None,
            })
            .collect();
        let manifest = ResourceDumpManifestDocument::new(manifest_urls);
        let manifest_xml = quick_xml::se::to_string(&manifest)?;

        let file = fs::File::create(&zip_path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for h in hydrated {
            zip.start_file(h.input.filename.clone(), options)?;
            let mut src = fs::File::open(&h.input.path)?;
            let mut buf = Vec::with_capacity(h.size as usize);
            src.read_to_end(&mut buf)?;
            zip.write_all(&buf)?;
        }
        zip.start_file("manifest.xml", options)?;
        zip.write_all(manifest_xml.as_bytes())?;
        zip.finish()?;

        let zip_size = fs::metadata(&zip_path)?.len();
        let zip_md5 = format!("{:x}", md5::compute(fs::read(&zip_path)?));
        let last_modified = hydrated
            .iter()
            .map(|h| h.input.timestamp.clone())
            .max()
            .unwrap_or_else(crate::xml::now_w3c);

        if batch.kind == BatchKind::OpenTail {
            let sidecar = crate::xml::ResourceListDocument::new(
                hydrated
                    .iter()
                    .map(|h| UrlEntry {
                        loc: h.input.path.to_string_lossy().into_owned(),
                        lastmod: Some(h.input.timestamp.clone()),
                        md: None,
                        ln: None,
                    })
                    .collect(),
            );
            let sidecar_xml = quick_xml::se::to_string(&sidecar)?;
            fs::write(ctx.target_dir.join(format!("{base}.xml")), sidecar_xml)?;
        }

        let mut content_link = None;
        if ctx.write_separate_manifest {
            let sidecar_name = format!("manifest_{base}.xml");
            fs::write(ctx.target_dir.join(&sidecar_name), &manifest_xml)?;
            content_link = Some(Link {
                rel: "content".to_string(),
                href: format!("{}{sidecar_name}", ctx.public_prefix),
            });
        }

        // Only a sealed batch's members are consumed from the source: an
        // open-tail archive must be rewritable, which means the files that
        // produced it stay put in sourceDir so the next run can re-read
        // and re-compare them against what's already published.
        if batch.kind == BatchKind::Sealed {
            if ctx.move_resources {
                for h in hydrated {
                    fs::rename(&h.input.path, ctx.target_dir.join(&h.input.filename)).or_else(|_| {
                        fs::copy(&h.input.path, ctx.target_dir.join(&h.input.filename))
                            .map(|_| ())
                            .and_then(|_| fs::remove_file(&h.input.path))
                    })?;
                }
            } else {
                for h in hydrated {
                    fs::remove_file(&h.input.path)?;
                }
            }
        }

        Ok(ArchiveRecord {
            public_uri: format!("{}{zip_filename}", ctx.public_prefix),
            filename: zip_filename,
            size: zip_size,
            md5: zip_md5,
            mime_type: "application/zip".to_string(),
            last_modified,
            content_link,
        })
    }
}

/// `(max existing numeric suffix for this prefix) + 1`, zero if none exist.
fn next_index(dir: &Path, prefix: &str) -> Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut max = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let Some(digits) = rest.strip_suffix(".zip") else {
            continue;
        };
        if let Ok(n) = digits.parse::<u32>() {
            max = Some(max.map_or(n, |m: u32| m.max(n)));
        }
    }
    Ok(max.map_or(0, |m| m + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;

    fn write_input(dir: &Path, name: &str, contents: &str) -> crate::catalog::InputFile {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        crate::catalog::InputFile {
            path,
            filename: name.to_string(),
            timestamp: "2016-06-13T08:23:41Z".to_string(),
        }
    }

    #[test]
    fn the_one_where_next_index_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_index(dir.path(), SEALED_PREFIX).unwrap(), 0);
    }

    #[test]
    fn the_one_where_next_index_follows_the_highest_existing_suffix() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("part_def_00000.zip")).unwrap();
        File::create(dir.path().join("part_def_00007.zip")).unwrap();
        assert_eq!(next_index(dir.path(), SEALED_PREFIX).unwrap(), 8);
    }

    #[test]
    fn the_one_where_a_sealed_batch_produces_a_zip_and_no_sidecar_resourcelist() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        let input = write_input(src.path(), "rdfpatch-20160613082341", "hello world");
        let hydrated = input.hydrate().unwrap();

        let batch = Batch {
            kind: BatchKind::Sealed,
            files: vec![input],
        };
        let ctx = ArchiveContext {
            target_dir: sink.path().to_path_buf(),
            public_prefix: "http://example.com/pub/".to_string(),
            write_separate_manifest: true,
            move_resources: false,
        };
        let writer = ArchiveWriterBackend::from_builder_class("zip");
        let record = writer.write(&batch, &[hydrated], &ctx).unwrap();

        assert_eq!(record.filename, "part_def_00000.zip");
        assert!(sink.path().join("part_def_00000.zip").exists());
        assert!(sink.path().join("manifest_part_def_00000.xml").exists());
        assert!(!sink.path().join("part_def_00000.xml").exists());
        assert!(!src.path().join("rdfpatch-20160613082341").exists(), "consumed, not moved");
    }

    #[test]
    fn the_one_where_an_open_tail_batch_gets_a_sidecar_resourcelist() {
        let src = tempfile::tempdir().unwrap();
        let sink = tempfile::tempdir().unwrap();
        let input = write_input(src.path(), "rdfpatch-20160613082341", "hello world");
        let hydrated = input.hydrate().unwrap();

        let batch = Batch {
            kind: BatchKind::OpenTail,
            files: vec![input],
        };
        let ctx = ArchiveContext {
            target_dir: sink.path().to_path_buf(),
            public_prefix: "http://example.com/pub/".to_string(),
            write_separate_manifest: false,
            move_resources: true,
        };
        let writer = ArchiveWriterBackend::from_builder_class("zip");
        let record = writer.write(&batch, &[hydrated], &ctx).unwrap();

        assert_eq!(record.filename, "part_end_00000.zip");
        assert!(sink.path().join("part_end_00000.xml").exists());
        assert!(record.content_link.is_none());
    }
}
