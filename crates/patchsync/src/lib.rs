//! 🚀 patchsync — the core library crate: catalog, plan, zip, publish.
//!
//! 📦 Takes a directory an upstream process is dropping `rdfpatch-*` files
//! into, and keeps a ResourceSync v1.0 publication of it up to date: one
//! or more Capability Lists, a Resource Dump per graph, and the zipped
//! batches they describe. Every run is a single pass — no background
//! tasks, no retries, just "look at the filesystem, reconcile, done".
//!
//! Module map, leaves first: [`catalog`] enumerates input files,
//! [`planner`] turns them into sealed/open-tail batches, [`archive`] zips
//! a batch, [`published_state`] reads back what's already on disk,
//! [`engine`] runs the per-graph state machine, [`handshake`] and
//! [`metadata`] are the engine's two collaborators, and [`orchestrator`]
//! ties graphs together under one sink root.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod metadata;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod published_state;
pub mod xml;

pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};
