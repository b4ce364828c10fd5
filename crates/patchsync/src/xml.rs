//! 🧾 xml.rs — the ResourceSync wire format, as plain structs.
//!
//! 🧠 Knowledge graph: `md_at`/`md_completed` are exactly the kind of
//! attribute a naive read-then-rewrite cycle loves to drop silently. We
//! don't get to lose anything here — these structs round-trip through
//! `quick_xml`'s serde integration and we persist every attribute we care
//! about ourselves, explicitly, every time.
//!
//! Every document in this module is sitemap-shaped: an `urlset` (or, for
//! the root Source Description, a `sourcedescription`) carrying `rs:md`/
//! `rs:ln` extension elements from the ResourceSync namespace. See
//! <http://www.openarchives.org/rs/1.0/resourcesync> for the vocabulary;
//! we only model the subset this engine actually needs.

use serde::{Deserialize, Serialize};

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const RS_NS: &str = "http://www.openarchives.org/rs/terms/";

/// 🔗 A `rs:ln` link — `rel` plus `href`, nothing fancier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    #[serde(rename = "@rel")]
    pub rel: String,
    #[serde(rename = "@href")]
    pub href: String,
}

/// 🔖 The `rs:md` element attached to a single `<url>` entry: hash, length,
/// mime type of the archive it describes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceMd {
    #[serde(rename = "@hash", skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(rename = "@length", skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// 📍 One `<url>` entry: a location, an optional last-modified, and the
/// optional `rs:md`/`rs:ln` extensions a Resource Dump entry carries but a
/// plain resourcelist entry doesn't.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UrlEntry {
    pub loc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(rename = "rs:md", skip_serializing_if = "Option::is_none")]
    pub md: Option<ResourceMd>,
    #[serde(rename = "rs:ln", skip_serializing_if = "Option::is_none")]
    pub ln: Option<Link>,
}

/// 📦 `resource-dump.xml` — one per graph. `at`/`completed` are the
/// attributes most prone to silently vanishing across a naive
/// read/write round-trip; here they're just fields we set and keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "urlset")]
pub struct ResourceDumpDocument {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "@xmlns:rs")]
    pub xmlns_rs: String,
    #[serde(rename = "rs:md")]
    pub md: ResourceDumpMd,
    #[serde(rename = "rs:ln")]
    pub up: Link,
    #[serde(rename = "url", default)]
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDumpMd {
    #[serde(rename = "@capability")]
    pub capability: String,
    #[serde(rename = "@at")]
    pub at: String,
    #[serde(rename = "@completed")]
    pub completed: String,
}

impl ResourceDumpDocument {
    pub fn new(up_href: impl Into<String>, at: impl Into<String>) -> Self {
        let at = at.into();
        Self {
            xmlns: SITEMAP_NS.to_string(),
            xmlns_rs: RS_NS.to_string(),
            md: ResourceDumpMd {
                capability: "resourcedump".to_string(),
                at: at.clone(),
                completed: at,
            },
            up: Link {
                rel: "up".to_string(),
                href: up_href.into(),
            },
            urls: Vec::new(),
        }
    }

    /// Remove the entry whose `loc` matches `uri` exactly, returning
    /// whether something was actually removed.
    pub fn remove(&mut self, uri: &str) -> bool {
        let before = self.urls.len();
        self.urls.retain(|u| u.loc != uri);
        self.urls.len() != before
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.urls.iter().any(|u| u.loc == uri)
    }
}

/// 📋 `capability-list.xml` — one per graph, created once and never
/// rewritten afterwards (idempotent, by design).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "urlset")]
pub struct CapabilityListDocument {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "@xmlns:rs")]
    pub xmlns_rs: String,
    #[serde(rename = "rs:ln")]
    pub up: Link,
    #[serde(rename = "url")]
    pub capabilities: Vec<CapabilityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub loc: String,
    #[serde(rename = "rs:md")]
    pub md: CapabilityMd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMd {
    #[serde(rename = "@capability")]
    pub capability: String,
}

impl CapabilityListDocument {
    pub fn new(up_href: impl Into<String>, resource_dump_url: impl Into<String>) -> Self {
        Self {
            xmlns: SITEMAP_NS.to_string(),
            xmlns_rs: RS_NS.to_string(),
            up: Link {
                rel: "up".to_string(),
                href: up_href.into(),
            },
            capabilities: vec![CapabilityEntry {
                loc: resource_dump_url.into(),
                md: CapabilityMd {
                    capability: "resourcedump".to_string(),
                },
            }],
        }
    }
}

/// 🌐 `.well-known/resourcesync` — the root Source Description, shared
/// across every graph under one sink root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "sourcedescription")]
pub struct SourceDescriptionDocument {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "@xmlns:rs")]
    pub xmlns_rs: String,
    #[serde(rename = "rs:md")]
    pub md: CapabilityMd,
    #[serde(rename = "url", default)]
    pub capability_lists: Vec<CapabilityListLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityListLink {
    pub loc: String,
    #[serde(rename = "rs:md")]
    pub md: CapabilityMd,
}

impl SourceDescriptionDocument {
    pub fn new() -> Self {
        Self {
            xmlns: SITEMAP_NS.to_string(),
            xmlns_rs: RS_NS.to_string(),
            md: CapabilityMd {
                capability: "description".to_string(),
            },
            capability_lists: Vec::new(),
        }
    }

    pub fn contains(&self, loc: &str) -> bool {
        self.capability_lists.iter().any(|c| c.loc == loc)
    }

    pub fn add(&mut self, loc: impl Into<String>) {
        let loc = loc.into();
        if !self.contains(&loc) {
            self.capability_lists.push(CapabilityListLink {
                loc,
                md: CapabilityMd {
                    capability: "capabilitylist".to_string(),
                },
            });
        }
    }
}

impl Default for SourceDescriptionDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// 📄 The open-tail sidecar: a bare resourcelist recording the URI set
/// (and, for convenience, the last-modified of each member) that produced
/// the current `part_end_*.zip`. Compared wholesale on the next run to
/// decide whether the open tail needs rewriting at all.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename = "urlset")]
pub struct ResourceListDocument {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "url", default)]
    pub urls: Vec<UrlEntry>,
}

impl ResourceListDocument {
    pub fn new(urls: Vec<UrlEntry>) -> Self {
        Self {
            xmlns: SITEMAP_NS.to_string(),
            urls,
        }
    }

    pub fn uris(&self) -> std::collections::BTreeSet<String> {
        self.urls.iter().map(|u| u.loc.clone()).collect()
    }
}

/// 📑 `manifest.xml` (in-zip) / `manifest_part_*.xml` (sidecar copy) — a
/// `ResourceDumpManifest`: same shape as a resourcelist, but every entry
/// carries the member's `rs:md` hash/length. Member files inside the zip
/// are addressed by basename, so `loc` here is the member's basename, not
/// a public URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename = "urlset")]
pub struct ResourceDumpManifestDocument {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "@xmlns:rs")]
    pub xmlns_rs: String,
    #[serde(rename = "url", default)]
    pub urls: Vec<UrlEntry>,
}

impl ResourceDumpManifestDocument {
    pub fn new(urls: Vec<UrlEntry>) -> Self {
        Self {
            xmlns: SITEMAP_NS.to_string(),
            xmlns_rs: RS_NS.to_string(),
            urls,
        }
    }
}

/// 🕰️ W3C-datetime, no fractional seconds: `YYYY-MM-DDTHH:MM:SSZ`, the
/// current UTC instant.
pub fn now_w3c() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
